use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::{env, fs};

lazy_static! {
    /// Lazy static reference to core configuration loaded from the file named by
    /// the `CREDFLOW_CONFIG` environment variable, falling back to defaults.
    pub static ref CORE_CONFIG: CoreConfig = load();
}

fn load() -> CoreConfig {
    match env::var(crate::CREDFLOW_CONFIG)
        .ok()
        .and_then(|path| fs::read_to_string(path).ok())
    {
        Some(toml_str) => parse_toml(&toml_str),
        None => CoreConfig::default(),
    }
}

/// Parses and returns core configuration.
fn parse_toml(toml_str: &str) -> CoreConfig {
    toml::from_str::<Config>(toml_str)
        .expect("Error parsing credflow config")
        .core
}

/// Gets `credflow-core` configuration variables.
pub fn core_config() -> &'static CORE_CONFIG {
    &CORE_CONFIG
}

/// Configuration variables for the `credflow-core` crate.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct CoreConfig {
    /// Upper bound on a single action execution, in seconds.
    pub action_timeout_secs: u64,
    /// Timeout for outbound HTTP calls, in seconds.
    pub http_timeout_secs: u64,
    /// Validity period applied to issued credentials, in days.
    pub credential_ttl_days: i64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            action_timeout_secs: 30,
            http_timeout_secs: 10,
            // Five years, the platform's default credential lifetime.
            credential_ttl_days: 1826,
        }
    }
}

/// Wrapper struct for parsing the `core` table.
#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct Config {
    /// Core configuration data.
    #[serde(default)]
    core: CoreConfig,
}
