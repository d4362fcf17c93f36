//! `install-config.yaml` schema

use crate::kubevirt::platform::Platform as KubevirtPlatform;
use serde::{Deserialize, Serialize};

/// User supplied cluster description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstallConfig {
    pub api_version: String,
    pub metadata: ObjectMeta,
    pub base_domain: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ssh_key: String,
    pub pull_secret: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fips: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub additional_trust_bundle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub image_content_sources: Vec<ImageContentSource>,
    pub networking: Networking,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_plane: Option<MachinePool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub compute: Vec<MachinePool>,
    pub platform: Platform,
}

impl InstallConfig {
    /// `<name>.<baseDomain>`
    pub fn cluster_domain(&self) -> String {
        format!("{}.{}", self.metadata.name, self.base_domain)
    }

    /// Control plane replica count after defaulting
    pub fn control_plane_replicas(&self) -> i64 {
        self.control_plane
            .as_ref()
            .and_then(|cp| cp.replicas)
            .unwrap_or(3)
    }

    pub fn kubevirt(&self) -> Option<&KubevirtPlatform> {
        self.platform.kubevirt.as_ref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectMeta {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub http_proxy: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub https_proxy: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub no_proxy: String,
}

/// Mirrors for one source repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageContentSource {
    pub source: String,
    pub mirrors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Networking {
    pub network_type: String,
    pub machine_network: Vec<MachineNetworkEntry>,
    pub cluster_network: Vec<ClusterNetworkEntry>,
    pub service_network: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineNetworkEntry {
    pub cidr: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNetworkEntry {
    pub cidr: String,
    #[serde(default)]
    pub host_prefix: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MachinePool {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hyperthreading: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
}

/// Exactly one member is expected to be set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Platform {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baremetal: Option<BareMetalPlatform>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubevirt: Option<KubevirtPlatform>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub none: Option<NonePlatform>,
}

impl Platform {
    /// Names of every platform that is set
    pub fn configured(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.baremetal.is_some() {
            names.push("baremetal");
        }
        if self.kubevirt.is_some() {
            names.push("kubevirt");
        }
        if self.none.is_some() {
            names.push("none");
        }
        names
    }

    /// Name of the first configured platform, "none" when unset
    pub fn name(&self) -> &'static str {
        self.configured().first().copied().unwrap_or("none")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BareMetalPlatform {
    #[serde(rename = "apiVIP")]
    pub api_vip: String,
    #[serde(rename = "ingressVIP")]
    pub ingress_vip: String,
    #[serde(rename = "bootstrapProvisioningIP")]
    pub bootstrap_provisioning_ip: String,
    #[serde(rename = "provisioningNetworkCIDR", skip_serializing_if = "String::is_empty")]
    pub provisioning_network_cidr: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NonePlatform {}

#[cfg(test)]
mod tests {
    use super::*;

    const KUBEVIRT_CONFIG: &str = r#"
apiVersion: v1
baseDomain: example.com
metadata:
  name: tenant
networking:
  machineNetwork:
  - cidr: 192.168.123.0/24
  serviceNetwork:
  - 172.30.0.0/16
controlPlane:
  name: master
  replicas: 3
compute:
- name: worker
  replicas: 2
platform:
  kubevirt:
    namespace: tenant-ns
    storageClass: standard
    networkName: tenant-net
    apiVIP: 192.168.123.15
    ingressVIP: 192.168.123.20
pullSecret: '{"auths":{}}'
sshKey: ssh-ed25519 AAAA user@example
"#;

    #[test]
    fn parses_kubevirt_install_config() {
        let config: InstallConfig = serde_yaml_ng::from_str(KUBEVIRT_CONFIG).unwrap();
        assert_eq!(config.cluster_domain(), "tenant.example.com");
        assert_eq!(config.control_plane_replicas(), 3);
        assert_eq!(config.compute[0].replicas, Some(2));
        assert_eq!(config.platform.name(), "kubevirt");

        let kubevirt = config.kubevirt().unwrap();
        assert_eq!(kubevirt.api_vip, "192.168.123.15");
        assert_eq!(kubevirt.network_name, "tenant-net");
        assert_eq!(config.networking.machine_network[0].cidr, "192.168.123.0/24");
    }

    #[test]
    fn none_platform_parses_from_empty_map() {
        let config: InstallConfig =
            serde_yaml_ng::from_str("metadata:\n  name: a\nplatform:\n  none: {}\n").unwrap();
        assert_eq!(config.platform.configured(), vec!["none"]);
    }
}
