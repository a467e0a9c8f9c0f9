//! Configuration loading

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::Config;

const CONFIG_PATH_ENV: &str = "STREAMFAN_CONFIG_PATH";

/// Searched in order when neither `--config` nor `STREAMFAN_CONFIG_PATH` names a file
const SEARCH_PATHS: [&str; 2] = ["config.yaml", "/etc/streamfan/config.yaml"];

/// Load and validate configuration
///
/// Config file search order:
/// 1. `explicit` (the `--config` flag); it must exist and parse
/// 2. `STREAMFAN_CONFIG_PATH` environment variable
/// 3. ./config.yaml (current working directory)
/// 4. /etc/streamfan/config.yaml
/// 5. Fall back to environment variables only
///
/// Environment variables override file values in every case.
pub fn load_config(explicit: Option<&str>) -> Result<Config> {
    let config = if let Some(path) = explicit {
        if !Path::new(path).exists() {
            anyhow::bail!("Config file {path} does not exist");
        }
        Config::from_file(path).with_context(|| format!("Failed to load {path}"))?
    } else {
        match discover_config_path() {
            Some(path) => {
                eprintln!("Loading config from {path}");
                Config::from_file(&path).with_context(|| format!("Failed to load {path}"))?
            }
            None => {
                eprintln!("No config file found, using environment variables");
                Config::from_env().context("Failed to load config from environment")?
            }
        }
    };

    // Fail fast on misconfigurations
    if let Err(errors) = config.validate() {
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s): {}",
            errors.len(),
            errors.join("; ")
        ));
    }

    Ok(config)
}

fn discover_config_path() -> Option<String> {
    std::env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|p| Path::new(p).exists())
        .or_else(|| {
            SEARCH_PATHS
                .into_iter()
                .find(|p| Path::new(p).exists())
                .map(str::to_string)
        })
}

/// Log the effective settings once logging is up
pub fn log_summary(config: &Config) {
    info!(
        catalog = %config.catalog.api_base_url,
        source = %config.source.endpoint,
        checkpoint = ?config.checkpoint.backend,
        interval_ms = config.poller.interval_ms,
        "Configuration loaded and validated successfully"
    );
    if config.server.enabled {
        info!("HTTP address: {}", config.http_address());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_explicit_path_must_exist() {
        let err = load_config(Some("/definitely/not/here.yaml")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_explicit_file_is_validated() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "source:\n  batch_limit: 0").unwrap();

        let err = load_config(Some(file.path().to_str().unwrap())).unwrap_err();
        assert!(err.to_string().contains("batch_limit"));
    }

    #[test]
    fn test_search_order() {
        assert_eq!(SEARCH_PATHS, ["config.yaml", "/etc/streamfan/config.yaml"]);
    }

    #[test]
    fn test_explicit_file_loads() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "catalog:\n  api_base_url: http://catalog.local/streams/\nsource:\n  endpoint: http://kinesis.local\npoller:\n  interval_ms: 250"
        )
        .unwrap();

        let config = load_config(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(config.catalog.api_base_url, "http://catalog.local/streams/");
        assert_eq!(config.poller.interval_ms, 250);
    }
}
