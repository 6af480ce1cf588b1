//! draftctl configuration

use anyhow::Context;
use fieldops_drafts::AutosaveConfig;
use fieldops_gateway::GatewayConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub autosave: AutosaveConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Bearer credential for the drafts API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Token sent as `Authorization: Bearer <token>`
    #[serde(default)]
    pub token: Option<String>,
}

impl Config {
    /// Load from a TOML file, or defaults when the file does not exist
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Apply command-line and environment overrides
    pub fn apply_overrides(&mut self, api_url: Option<String>, token: Option<String>) {
        if let Some(url) = api_url {
            self.gateway.base_url = url;
        }
        if let Some(token) = token {
            self.auth.token = Some(token);
        }
    }
}
