//! Cluster-wide proxy manifest

use crate::asset::{Asset, AssetFile, AssetKind, AssetType, Parents};
use crate::error::KvinstallResult;
use crate::installconfig::types::InstallConfig;
use crate::installconfig::InstallConfigAsset;
use crate::manifests::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const PROXY_FILENAME: &str = "manifests/cluster-proxy-01-config.yaml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyManifest {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: ProxySpec,
    pub status: ProxyStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxySpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub http_proxy: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub https_proxy: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub no_proxy: String,
    #[serde(rename = "trustedCA")]
    pub trusted_ca: ConfigMapRef,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMapRef {
    pub name: String,
}

/// Effective proxy settings, also handed to bootstrap templates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyStatus {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub http_proxy: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub https_proxy: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub no_proxy: String,
}

impl ProxyStatus {
    pub fn is_set(&self) -> bool {
        !self.http_proxy.is_empty() || !self.https_proxy.is_empty()
    }
}

/// The proxy manifest and its computed status
#[derive(Default)]
pub struct Proxy {
    pub manifest: ProxyManifest,
    file: Option<AssetFile>,
}

impl Proxy {
    pub fn status(&self) -> &ProxyStatus {
        &self.manifest.status
    }
}

impl Asset for Proxy {
    fn kind(&self) -> AssetKind {
        AssetKind::Proxy
    }

    fn dependencies(&self) -> Vec<Box<dyn Asset>> {
        vec![Box::new(InstallConfigAsset::default())]
    }

    fn generate(&mut self, parents: &Parents) -> KvinstallResult<()> {
        let config = parents.get::<InstallConfigAsset>()?.config()?;

        let mut manifest = ProxyManifest {
            api_version: "config.openshift.io/v1".to_string(),
            kind: "Proxy".to_string(),
            metadata: ObjectMeta::named("cluster"),
            ..Default::default()
        };

        if let Some(proxy) = &config.proxy {
            manifest.spec.http_proxy = proxy.http_proxy.clone();
            manifest.spec.https_proxy = proxy.https_proxy.clone();
            manifest.spec.no_proxy = proxy.no_proxy.clone();

            if !proxy.http_proxy.is_empty() || !proxy.https_proxy.is_empty() {
                manifest.status = ProxyStatus {
                    http_proxy: proxy.http_proxy.clone(),
                    https_proxy: proxy.https_proxy.clone(),
                    no_proxy: no_proxy(config),
                };
            }
        }

        if !config.additional_trust_bundle.is_empty() {
            manifest.spec.trusted_ca.name = "user-ca-bundle".to_string();
        }

        let data = serde_yaml_ng::to_string(&manifest)?;
        self.file = Some(AssetFile::new(PROXY_FILENAME, data));
        self.manifest = manifest;
        Ok(())
    }

    fn files(&self) -> Vec<&AssetFile> {
        self.file.iter().collect()
    }
}

impl AssetType for Proxy {
    const KIND: AssetKind = AssetKind::Proxy;
}

/// Hosts and networks that bypass the proxy: cluster-internal names, the
/// etcd members, every configured network and the user's own entries.
/// Sorted and comma separated; `*` stays `*`.
pub fn no_proxy(config: &InstallConfig) -> String {
    let user = config
        .proxy
        .as_ref()
        .map(|p| p.no_proxy.as_str())
        .unwrap_or_default();
    if user.trim() == "*" {
        return "*".to_string();
    }

    let domain = config.cluster_domain();
    let mut set: BTreeSet<String> = [".cluster.local", ".svc", "localhost", "127.0.0.1"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    set.insert(format!("api-int.{}", domain));

    for i in 0..config.control_plane_replicas().max(0) {
        set.insert(format!("etcd-{}.{}", i, domain));
    }

    let networking = &config.networking;
    set.extend(networking.machine_network.iter().map(|n| n.cidr.clone()));
    set.extend(networking.service_network.iter().cloned());
    set.extend(networking.cluster_network.iter().map(|n| n.cidr.clone()));

    set.extend(
        user.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    );

    set.into_iter().collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installconfig::testing;
    use crate::installconfig::types::ProxyConfig;

    fn with_proxy(no_proxy: &str) -> InstallConfig {
        let mut config = testing::none_config();
        config.proxy = Some(ProxyConfig {
            http_proxy: "http://proxy.example.com:3128".to_string(),
            https_proxy: String::new(),
            no_proxy: no_proxy.to_string(),
        });
        config
    }

    #[test]
    fn no_proxy_is_sorted_and_complete() {
        let value = no_proxy(&with_proxy("internal.example.com, .corp"));
        let entries: Vec<&str> = value.split(',').collect();

        let mut sorted = entries.clone();
        sorted.sort();
        assert_eq!(entries, sorted);
        for expected in [
            ".cluster.local",
            ".svc",
            "127.0.0.1",
            "localhost",
            "api-int.test-cluster.example.com",
            "etcd-0.test-cluster.example.com",
            "etcd-2.test-cluster.example.com",
            "10.0.0.0/16",
            "10.128.0.0/14",
            "172.30.0.0/16",
            "internal.example.com",
            ".corp",
        ] {
            assert!(entries.contains(&expected), "missing {}", expected);
        }
    }

    #[test]
    fn wildcard_is_kept() {
        assert_eq!(no_proxy(&with_proxy("*")), "*");
    }

    #[test]
    fn status_only_set_with_a_proxy() {
        let mut parents = Parents::new();
        parents.insert(testing::asset(testing::none_config())).unwrap();
        let mut proxy = Proxy::default();
        proxy.generate(&parents).unwrap();
        assert!(!proxy.status().is_set());
        assert_eq!(proxy.files()[0].filename, PROXY_FILENAME);

        let mut parents = Parents::new();
        parents.insert(testing::asset(with_proxy(""))).unwrap();
        let mut proxy = Proxy::default();
        proxy.generate(&parents).unwrap();
        assert!(proxy.status().is_set());
        assert!(proxy.status().no_proxy.contains(".svc"));
    }
}
