//! Configuration schema for kvinstall
//!
//! Configuration is stored at `~/.config/kvinstall/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Asset directory settings
    pub assets: AssetsConfig,

    /// Infra cluster access
    pub infra: InfraConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Where assets are read from and written to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Default asset directory when --dir is not given
    pub dir: PathBuf,

    /// Directory whose files override the built-in templates path by path
    pub templates_dir: Option<PathBuf>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            templates_dir: None,
        }
    }
}

/// Infra cluster (KubeVirt) access settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InfraConfig {
    /// kubectl binary used to talk to the infra cluster
    pub kubectl: String,

    /// Kubeconfig for the infra cluster; kubectl's own default when unset
    pub kubeconfig: Option<PathBuf>,

    /// Timeout in seconds for a single infra cluster call
    pub timeout_secs: u64,
}

impl Default for InfraConfig {
    fn default() -> Self {
        Self {
            kubectl: "kubectl".to_string(),
            kubeconfig: None,
            timeout_secs: 30,
        }
    }
}
