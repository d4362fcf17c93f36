//! kvinstall - cluster installer core
//!
//! Builds install assets (manifests, certificates, kubeconfigs and Ignition
//! configs) from an `install-config.yaml` through a dependency graph, with
//! first-class support for clusters hosted on KubeVirt.

pub mod asset;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod ignition;
pub mod installconfig;
pub mod kubeconfig;
pub mod kubevirt;
pub mod machines;
pub mod manifests;
pub mod metadata;
pub mod tls;
pub mod ui;

pub use error::{KvinstallError, KvinstallResult};
