// streamfan API Library
//
// Provides the HTTP registration endpoint for webhook subscribers

pub mod http;

// Re-export commonly used types
pub use http::{create_router, AppState};
