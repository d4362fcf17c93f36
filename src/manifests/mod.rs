//! Cluster manifests handed to the bootstrap node
//!
//! Only the cluster-scoped config objects the installer owns are written
//! here. Operator manifests come from the release payload.

pub mod cloud_provider;
pub mod proxy;

pub use cloud_provider::CloudProviderConfig;
pub use proxy::{Proxy, ProxyStatus};

use crate::asset::{Asset, AssetFile, AssetKind, AssetType, FileFetcher, Parents};
use crate::error::{KvinstallError, KvinstallResult};
use crate::installconfig::types::InstallConfig;
use crate::installconfig::{ClusterId, InstallConfigAsset};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

const CLUSTER_CONFIG_FILENAME: &str = "manifests/cluster-config.yaml";
const PULL_SECRET_FILENAME: &str = "manifests/openshift-config-secret-pull-secret.yaml";
const INFRASTRUCTURE_FILENAME: &str = "manifests/cluster-infrastructure-02-config.yml";
const DNS_FILENAME: &str = "manifests/cluster-dns-02-config.yml";
const INGRESS_FILENAME: &str = "manifests/cluster-ingress-02-config.yml";
const NETWORK_FILENAME: &str = "manifests/cluster-network-02-config.yml";

/// Files every run produces, in write order
const REQUIRED_FILES: &[&str] = &[
    CLUSTER_CONFIG_FILENAME,
    PULL_SECRET_FILENAME,
    INFRASTRUCTURE_FILENAME,
    DNS_FILENAME,
    INGRESS_FILENAME,
    NETWORK_FILENAME,
];

/// Files only some platforms or configs produce
const OPTIONAL_FILES: &[&str] = &[
    proxy::PROXY_FILENAME,
    cloud_provider::CLOUD_PROVIDER_CONFIG_FILENAME,
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ObjectMeta {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMap {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl ConfigMap {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: "ConfigMap".to_string(),
            metadata: ObjectMeta {
                name: name.to_string(),
                namespace: Some(namespace.to_string()),
            },
            data: BTreeMap::new(),
        }
    }

    pub fn with_data(mut self, key: &str, value: impl Into<String>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }
}

/// Platform name as the infrastructure object spells it
fn platform_type(config: &InstallConfig) -> &'static str {
    match config.platform.name() {
        "kubevirt" => "KubeVirt",
        "baremetal" => "BareMetal",
        _ => "None",
    }
}

/// The install config as the cluster sees it: everything but the pull
/// secret, which travels in its own Secret.
fn cluster_config(config: &InstallConfig) -> KvinstallResult<ConfigMap> {
    let mut redacted = config.clone();
    redacted.pull_secret.clear();
    Ok(ConfigMap::new("kube-system", "cluster-config-v1")
        .with_data("install-config", serde_yaml_ng::to_string(&redacted)?))
}

fn pull_secret(config: &InstallConfig) -> serde_json::Value {
    use base64::Engine;
    json!({
        "apiVersion": "v1",
        "kind": "Secret",
        "type": "kubernetes.io/dockerconfigjson",
        "metadata": { "name": "pull-secret", "namespace": "openshift-config" },
        "data": {
            ".dockerconfigjson": base64::engine::general_purpose::STANDARD.encode(&config.pull_secret),
        },
    })
}

fn infrastructure(config: &InstallConfig, infra_id: &str) -> serde_json::Value {
    let domain = config.cluster_domain();
    let mut spec = json!({});
    if config.kubevirt().is_some() {
        spec = json!({ "cloudConfig": { "key": "config", "name": "cloud-provider-config" } });
    }

    json!({
        "apiVersion": "config.openshift.io/v1",
        "kind": "Infrastructure",
        "metadata": { "name": "cluster" },
        "spec": spec,
        "status": {
            "apiServerURL": format!("https://api.{}:6443", domain),
            "apiServerInternalURI": format!("https://api-int.{}:6443", domain),
            "etcdDiscoveryDomain": domain,
            "infrastructureName": infra_id,
            "platform": platform_type(config),
        },
    })
}

fn dns(config: &InstallConfig) -> serde_json::Value {
    json!({
        "apiVersion": "config.openshift.io/v1",
        "kind": "DNS",
        "metadata": { "name": "cluster" },
        "spec": { "baseDomain": config.cluster_domain() },
    })
}

fn ingress(config: &InstallConfig) -> serde_json::Value {
    json!({
        "apiVersion": "config.openshift.io/v1",
        "kind": "Ingress",
        "metadata": { "name": "cluster" },
        "spec": { "domain": format!("apps.{}", config.cluster_domain()) },
    })
}

fn network(config: &InstallConfig) -> serde_json::Value {
    let networking = &config.networking;
    let cluster_network: Vec<_> = networking
        .cluster_network
        .iter()
        .map(|n| json!({ "cidr": n.cidr, "hostPrefix": n.host_prefix }))
        .collect();

    json!({
        "apiVersion": "config.openshift.io/v1",
        "kind": "Network",
        "metadata": { "name": "cluster" },
        "spec": {
            "clusterNetwork": cluster_network,
            "serviceNetwork": networking.service_network,
            "networkType": networking.network_type,
        },
    })
}

/// Cluster config objects plus the proxy and cloud provider manifests
#[derive(Default)]
pub struct Manifests {
    files: Vec<AssetFile>,
}

impl Asset for Manifests {
    fn kind(&self) -> AssetKind {
        AssetKind::Manifests
    }

    fn dependencies(&self) -> Vec<Box<dyn Asset>> {
        vec![
            Box::new(InstallConfigAsset::default()),
            Box::new(ClusterId::default()),
            Box::new(Proxy::default()),
            Box::new(CloudProviderConfig::default()),
        ]
    }

    fn generate(&mut self, parents: &Parents) -> KvinstallResult<()> {
        let config = parents.get::<InstallConfigAsset>()?.config()?;
        let cluster_id = parents.get::<ClusterId>()?;

        let mut files = vec![
            AssetFile::new(
                CLUSTER_CONFIG_FILENAME,
                serde_yaml_ng::to_string(&cluster_config(config)?)?,
            ),
            AssetFile::new(PULL_SECRET_FILENAME, serde_yaml_ng::to_string(&pull_secret(config))?),
            AssetFile::new(
                INFRASTRUCTURE_FILENAME,
                serde_yaml_ng::to_string(&infrastructure(config, &cluster_id.infra_id))?,
            ),
            AssetFile::new(DNS_FILENAME, serde_yaml_ng::to_string(&dns(config))?),
            AssetFile::new(INGRESS_FILENAME, serde_yaml_ng::to_string(&ingress(config))?),
            AssetFile::new(NETWORK_FILENAME, serde_yaml_ng::to_string(&network(config))?),
        ];

        for kind in [AssetKind::Proxy, AssetKind::CloudProviderConfig] {
            files.extend(parents.get_dyn(kind)?.files().into_iter().cloned());
        }

        self.files = files;
        Ok(())
    }

    fn files(&self) -> Vec<&AssetFile> {
        self.files.iter().collect()
    }

    fn load(&mut self, fetcher: &dyn FileFetcher) -> KvinstallResult<bool> {
        let mut files = Vec::new();

        for name in REQUIRED_FILES {
            match fetcher.fetch_by_name(name)? {
                Some(file) => files.push(file),
                None => return Ok(false),
            }
        }
        for name in OPTIONAL_FILES {
            if let Some(file) = fetcher.fetch_by_name(name)? {
                files.push(file);
            }
        }

        for file in &files {
            serde_yaml_ng::from_slice::<serde_yaml_ng::Value>(&file.data).map_err(|e| {
                KvinstallError::AssetLoad {
                    asset: self.name().to_string(),
                    filename: file.filename.clone(),
                    reason: e.to_string(),
                }
            })?;
        }

        self.files = files;
        Ok(true)
    }
}

impl AssetType for Manifests {
    const KIND: AssetKind = AssetKind::Manifests;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::DiskFetcher;
    use crate::installconfig::testing;
    use tempfile::TempDir;

    fn generate(config: InstallConfig) -> Manifests {
        let mut parents = Parents::new();
        parents.insert(testing::asset(config)).unwrap();
        parents
            .insert(Box::new(ClusterId::new("uuid", "test-cluster-bx7k2")))
            .unwrap();
        for mut asset in [
            Box::new(Proxy::default()) as Box<dyn Asset>,
            Box::new(CloudProviderConfig::default()),
        ] {
            asset.generate(&parents).unwrap();
            parents.insert(asset).unwrap();
        }

        let mut manifests = Manifests::default();
        manifests.generate(&parents).unwrap();
        manifests
    }

    fn yaml(manifests: &Manifests, name: &str) -> serde_yaml_ng::Value {
        let file = manifests.files().into_iter().find(|f| f.filename == name).unwrap();
        serde_yaml_ng::from_slice(&file.data).unwrap()
    }

    #[test]
    fn kubevirt_includes_cloud_provider_and_proxy() {
        let manifests = generate(testing::kubevirt_config());
        let names: Vec<_> = manifests.files().iter().map(|f| f.filename.clone()).collect();
        assert!(names.contains(&proxy::PROXY_FILENAME.to_string()));
        assert!(names.contains(&cloud_provider::CLOUD_PROVIDER_CONFIG_FILENAME.to_string()));

        let infra = yaml(&manifests, INFRASTRUCTURE_FILENAME);
        assert_eq!(infra["status"]["platform"].as_str(), Some("KubeVirt"));
        assert_eq!(infra["status"]["infrastructureName"].as_str(), Some("test-cluster-bx7k2"));
        assert_eq!(
            infra["spec"]["cloudConfig"]["name"].as_str(),
            Some("cloud-provider-config")
        );
    }

    #[test]
    fn cluster_config_drops_pull_secret() {
        let manifests = generate(testing::none_config());
        let map = yaml(&manifests, CLUSTER_CONFIG_FILENAME);
        let install_config = map["data"]["install-config"].as_str().unwrap();
        assert!(install_config.contains("test-cluster"));
        assert!(!install_config.contains("auths"));

        let dns = yaml(&manifests, DNS_FILENAME);
        assert_eq!(dns["spec"]["baseDomain"].as_str(), Some("test-cluster.example.com"));
    }

    #[test]
    fn load_round_trip_and_missing() {
        let temp = TempDir::new().unwrap();
        let mut asset = Manifests::default();
        assert!(!asset.load(&DiskFetcher::new(temp.path())).unwrap());

        let generated = generate(testing::kubevirt_config());
        for file in generated.files() {
            let path = temp.path().join(&file.filename);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, &file.data).unwrap();
        }

        assert!(asset.load(&DiskFetcher::new(temp.path())).unwrap());
        assert_eq!(asset.files().len(), generated.files().len());
    }

    #[test]
    fn corrupt_manifest_fails_load() {
        let temp = TempDir::new().unwrap();
        let generated = generate(testing::none_config());
        for file in generated.files() {
            let path = temp.path().join(&file.filename);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, &file.data).unwrap();
        }
        std::fs::write(temp.path().join(DNS_FILENAME), "spec: [unclosed").unwrap();

        let mut asset = Manifests::default();
        let err = asset.load(&DiskFetcher::new(temp.path())).unwrap_err();
        assert!(matches!(err, KvinstallError::AssetLoad { .. }));
        assert!(asset.files().is_empty());
    }
}
