//! Node configuration, loaded from JSON.

use std::path::Path;

use anyhow::Context;
use braid_sync::SyncConfig;
use serde::{Deserialize, Serialize};

/// Configuration for a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Catch-up configuration.
    pub sync: SyncConfig,
}

impl NodeConfig {
    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: NodeConfig = serde_json::from_str(json).context("parsing node config")?;
        config.sync.validate().context("validating sync config")?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_json_str(&json).with_context(|| format!("loading {}", path.display()))
    }
}
