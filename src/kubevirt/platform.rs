//! KubeVirt platform section of the install config

use crate::installconfig::validation::{ErrorList, FieldPath, ValidationError};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Where and how the tenant cluster's VMs run inside the infra cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Platform {
    /// Infra cluster namespace holding the control plane and compute VMs
    pub namespace: String,

    pub storage_class: String,

    /// Network attachment definition every node interface joins
    pub network_name: String,

    #[serde(rename = "apiVIP")]
    pub api_vip: String,

    #[serde(rename = "ingressVIP")]
    pub ingress_vip: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub persistent_volume_access_mode: String,

    /// Infra cluster API endpoint the nodes log in to for credential refresh
    #[serde(rename = "infraClusterAPIURL", skip_serializing_if = "String::is_empty")]
    pub infra_cluster_api_url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_machine_platform: Option<MachinePool>,
}

/// Per-pool VM sizing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MachinePool {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cpu: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub memory: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub storage_size: String,
}

/// KubeVirt has no platform defaults: every field is either required or
/// valid when empty.
pub fn set_platform_defaults(_platform: &mut Platform) {}

/// Structural checks that need no infra cluster access
pub fn validate_platform(platform: &Platform, path: &FieldPath) -> ErrorList {
    let mut errors = ErrorList::new();

    if platform.namespace.is_empty() {
        errors.push(ValidationError::invalid(
            path.child("Infra Cluster Namespace"),
            &platform.namespace,
            "Infra Cluster Namespace can't be empty",
        ));
    }

    if platform.network_name.is_empty() {
        errors.push(ValidationError::invalid(
            path.child("NetworkName"),
            &platform.network_name,
            "NetworkName can't be empty",
        ));
    }

    if let Err(detail) = validate_ip(&platform.api_vip) {
        errors.push(ValidationError::invalid(
            path.child("APIVIP"),
            &platform.api_vip,
            detail,
        ));
    }

    if let Err(detail) = validate_ip(&platform.ingress_vip) {
        errors.push(ValidationError::invalid(
            path.child("IngressVIP"),
            &platform.ingress_vip,
            detail,
        ));
    }

    errors
}

pub(crate) fn validate_ip(ip: &str) -> Result<IpAddr, String> {
    ip.parse::<IpAddr>()
        .map_err(|_| format!("\"{}\" is not a valid IP", ip))
}
