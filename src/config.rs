use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs, path::Path};

use crate::headers::DeniedKeySet;

pub const DEFAULT_ADDRESS: &str = ":8888";
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Process-wide proxy settings. Built once at startup and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub address: String,
    pub log_request_body: bool,
    pub log_response_body: bool,
    /// Header names stripped from every relayed response.
    pub denied_headers: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            log_request_body: false,
            log_response_body: false,
            denied_headers: vec!["Cookie".to_string()],
        }
    }
}

impl Config {
    /// Address suitable for `TcpListener::bind`. A bare `:port` binds every interface.
    #[must_use]
    pub fn bind_address(&self) -> String {
        if self.address.starts_with(':') {
            format!("0.0.0.0{}", self.address)
        } else {
            self.address.clone()
        }
    }

    pub fn denied_key_set(&self) -> Result<DeniedKeySet> {
        DeniedKeySet::from_names(&self.denied_headers)
            .context("Invalid header name in denied_headers")
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).context("Failed to parse configuration as valid TOML")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_config(&content)
}
