//! Process bootstrap
//!
//! This module handles:
//! - Configuration loading
//! - Client construction and dependency wiring

pub mod config;
pub mod services;

pub use config::load_config;
pub use services::{init_services, Services};
