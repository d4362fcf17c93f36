//! Error types for kvinstall
//!
//! All modules use `KvinstallResult<T>` as their return type.

use crate::installconfig::validation::ErrorList;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for kvinstall operations
pub type KvinstallResult<T> = Result<T, KvinstallError>;

/// All errors that can occur in kvinstall
#[derive(Error, Debug)]
pub enum KvinstallError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Install config errors
    #[error("install-config.yaml not found in {0}")]
    InstallConfigMissing(PathBuf),

    #[error("invalid install config: {0}")]
    InstallConfigInvalid(ErrorList),

    #[error("platform validation failed: {0}")]
    Validation(ErrorList),

    #[error("{0}")]
    ReplicaCount(String),

    // Asset errors
    #[error("failed to generate asset \"{asset}\": {source}")]
    Generate {
        asset: String,
        #[source]
        source: Box<KvinstallError>,
    },

    #[error("failed to load asset \"{asset}\" from {filename}: {reason}")]
    AssetLoad {
        asset: String,
        filename: String,
        reason: String,
    },

    #[error("template {path}: {reason}")]
    Template { path: String, reason: String },

    #[error("template directory not found: {0}")]
    TemplateNotFound(String),

    #[error("certificate {name}: {reason}")]
    Certificate { name: String, reason: String },

    #[error("invalid data URL: {0}")]
    DataUrl(String),

    #[error("invalid network {value}: {reason}")]
    Network { value: String, reason: String },

    // Infra cluster errors
    #[error("kubectl not found at {0}")]
    KubectlNotFound(String),

    #[error("metadata.json not found in {0}")]
    MetadataMissing(PathBuf),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl KvinstallError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Wrap an error raised while generating the named asset
    pub fn generate(asset: impl Into<String>, source: KvinstallError) -> Self {
        Self::Generate {
            asset: asset.into(),
            source: Box::new(source),
        }
    }

    /// Create a certificate error
    pub fn certificate(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Certificate {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::InstallConfigMissing(_) => {
                Some("Write install-config.yaml into the asset directory (--dir)")
            }
            Self::KubectlNotFound(_) => Some("Install kubectl or set infra.kubectl in the config"),
            Self::MetadataMissing(_) => {
                Some("Point --dir at the directory used for `create ignition-configs`")
            }
            Self::AssetLoad { .. } => Some("Remove the corrupt file to regenerate it"),
            Self::Generate { source, .. } => source.hint(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = KvinstallError::InstallConfigMissing(PathBuf::from("/tmp/cluster"));
        assert!(err.to_string().contains("install-config.yaml not found"));
    }

    #[test]
    fn error_hint() {
        let err = KvinstallError::KubectlNotFound("kubectl".to_string());
        assert_eq!(
            err.hint(),
            Some("Install kubectl or set infra.kubectl in the config")
        );
    }

    #[test]
    fn generate_error_keeps_inner_hint() {
        let inner = KvinstallError::InstallConfigMissing(PathBuf::from("."));
        let err = KvinstallError::generate("Bootstrap Ignition Config", inner);
        assert!(err.to_string().contains("Bootstrap Ignition Config"));
        assert!(err.hint().is_some());
    }
}
