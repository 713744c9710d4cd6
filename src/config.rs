use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::{fs, path::Path};
use tracing::info;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub limits: LimitsSection,
}

#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct LimitsSection {
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5001
}

fn default_base_url() -> String {
    "https://api.mistral.ai/v1".to_string()
}

fn default_model() -> String {
    "mistral-large-latest".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(&path).map_err(|e| PipelineError::Config {
            message: format!("cannot read config file: {e}"),
        })?;
        toml::from_str(&content).map_err(|e| PipelineError::Config {
            message: format!("invalid config file: {e}"),
        })
    }

    /// Load the config file if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            info!(path = %path.as_ref().display(), "No config file found, using defaults");
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.server.port, 5001);
        assert_eq!(cfg.llm.model, "mistral-large-latest");
        assert_eq!(cfg.limits.max_upload_bytes, 50 * 1024 * 1024);
    }

    #[test]
    fn partial_config_overrides_only_named_keys() {
        let cfg: Config = toml::from_str(
            r#"
            [llm]
            base_url = "http://localhost:11434/v1"
            model = "qwen3:8b"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.llm.base_url, "http://localhost:11434/v1");
        assert_eq!(cfg.llm.model, "qwen3:8b");
        assert_eq!(cfg.llm.request_timeout_secs, 120);
        assert_eq!(cfg.server.host, "0.0.0.0");
    }
}
