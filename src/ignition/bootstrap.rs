//! Bootstrap node Ignition config (`bootstrap.ign`)
//!
//! The bootstrap node runs a temporary control plane from the release
//! image and serves the machine configs to the masters. Everything it needs
//! lands under `/opt/openshift`: manifests and MachineConfigs readable by
//! all, kubeconfigs and key material readable by root only.

use crate::asset::{Asset, AssetFile, AssetKind, AssetType, FileFetcher, Parents};
use crate::error::KvinstallResult;
use crate::ignition::files::{add_parent_files, file_from_bytes, file_from_string, replace_or_append};
use crate::ignition::render::{add_storage_files, add_systemd_units};
use crate::ignition::types::{Config, PasswdUser};
use crate::ignition::{expiry, load_config};
use crate::installconfig::types::{ImageContentSource, InstallConfig};
use crate::installconfig::{InstallConfigAsset, IronicCreds, ReleaseImage};
use crate::kubeconfig::KubeconfigAsset;
use crate::machines::{Master, Worker};
use crate::manifests::{Manifests, Proxy, ProxyStatus};
use crate::tls::{self, TlsAsset};
use serde::Serialize;
use tracing::{debug, warn};

pub const BOOTSTRAP_FILENAME: &str = "bootstrap.ign";
pub const CLUSTER_PROFILE_ENV: &str = "OPENSHIFT_INSTALL_EXPERIMENTAL_CLUSTER_PROFILE";

pub(crate) const ROOT_DIR: &str = "/opt/openshift";
pub(crate) const ROOT_CA_PATH: &str = "/opt/openshift/tls/root-ca.crt";
const KUBELET_KUBECONFIG_PATH: &str = "/etc/kubernetes/kubeconfig";
/// Admin kubeconfig used by the bootstrap services, against the internal API
const ADMIN_KUBECONFIG_PATH: &str = "/opt/openshift/auth/kubeconfig";

const ENABLED_UNITS: &[&str] = &[
    "progress.service",
    "kubelet.service",
    "chown-gatewayd-key.service",
    "systemd-journal-gatewayd.socket",
    "approve-csr.service",
    // platform specific
    "keepalived.service",
    "coredns.service",
    "ironic.service",
    "master-bmh-update.service",
];

/// Written world readable
const MANIFEST_KINDS: &[AssetKind] = &[AssetKind::Manifests, AssetKind::Master, AssetKind::Worker];

pub(crate) const KUBECONFIG_KINDS: &[AssetKind] = &[
    AssetKind::KubeconfigAdminInternalClient,
    AssetKind::KubeconfigKubelet,
    AssetKind::KubeconfigLoopback,
];

/// Key material copied to the node, root only
pub(crate) const TLS_KINDS: &[AssetKind] = &[
    AssetKind::RootCa,
    AssetKind::AdminKubeConfigSigner,
    AssetKind::AggregatorSigner,
    AssetKind::EtcdSigner,
    AssetKind::EtcdMetricSigner,
    AssetKind::KubeApiserverLocalhostSigner,
    AssetKind::KubeApiserverServiceNetworkSigner,
    AssetKind::KubeApiserverLbSigner,
    AssetKind::KubeApiserverToKubeletSigner,
    AssetKind::KubeControlPlaneSigner,
    AssetKind::KubeletBootstrapKubeconfigSigner,
    AssetKind::KubeletCsrSigner,
    AssetKind::ServiceCaSigner,
    AssetKind::AdminKubeConfigClient,
    AssetKind::AggregatorClient,
    AssetKind::EtcdClient,
    AssetKind::EtcdMetricClient,
    AssetKind::KubeApiserverLocalhostServer,
    AssetKind::KubeApiserverServiceNetworkServer,
    AssetKind::KubeApiserverExternalLbServer,
    AssetKind::KubeApiserverInternalLbServer,
    AssetKind::KubeApiserverToKubeletClient,
    AssetKind::KubeControllerManagerClient,
    AssetKind::KubeSchedulerClient,
    AssetKind::KubeletClient,
    AssetKind::JournalGatewayd,
    AssetKind::MachineConfigServer,
    AssetKind::AdminKubeConfigCaBundle,
    AssetKind::EtcdCaBundle,
    AssetKind::EtcdMetricCaBundle,
    AssetKind::KubeApiserverCompleteServerCaBundle,
    AssetKind::KubeApiserverCompleteClientCaBundle,
    AssetKind::KubeletBootstrapCaBundle,
    AssetKind::KubeletClientCaBundle,
    AssetKind::ServiceCaBundle,
    AssetKind::ServiceAccountKeyPair,
    AssetKind::BoundSaSigningKey,
];

/// Variables visible to the bootstrap templates
#[derive(Debug, Clone, Serialize)]
pub struct TemplateData {
    pub additional_trust_bundle: String,
    pub cluster_profile: String,
    pub etcd_cluster: String,
    pub proxy: Option<ProxyData>,
    pub pull_secret: String,
    pub registries: Vec<Registry>,
    pub release_image: String,
    pub platform_data: PlatformData,
}

/// Proxy settings with every field present, so templates can test them
#[derive(Debug, Clone, Serialize)]
pub struct ProxyData {
    pub http_proxy: String,
    pub https_proxy: String,
    pub no_proxy: String,
}

impl From<&ProxyStatus> for ProxyData {
    fn from(status: &ProxyStatus) -> Self {
        Self {
            http_proxy: status.http_proxy.clone(),
            https_proxy: status.https_proxy.clone(),
            no_proxy: status.no_proxy.clone(),
        }
    }
}

/// A source registry and its mirrors
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registry {
    pub location: String,
    pub mirrors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PlatformData {
    pub bare_metal: Option<BareMetalData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BareMetalData {
    pub provisioning_ip: String,
    pub ironic_username: String,
    pub ironic_password: String,
    pub api_vip: String,
    pub ingress_vip: String,
}

/// Image content sources merged by source, mirrors deduplicated in order
pub fn merged_registries(sources: &[ImageContentSource]) -> Vec<Registry> {
    let mut registries: Vec<Registry> = Vec::new();

    for source in sources {
        let index = match registries.iter().position(|r| r.location == source.source) {
            Some(index) => index,
            None => {
                registries.push(Registry {
                    location: source.source.clone(),
                    mirrors: Vec::new(),
                });
                registries.len() - 1
            }
        };
        let mirrors = &mut registries[index].mirrors;
        for mirror in &source.mirrors {
            if !mirrors.contains(mirror) {
                mirrors.push(mirror.clone());
            }
        }
    }

    registries
}

/// `https://etcd-<i>.<domain>:2379` for every control plane member
pub fn etcd_cluster(config: &InstallConfig) -> String {
    let domain = config.cluster_domain();
    (0..config.control_plane_replicas().max(0))
        .map(|i| format!("https://etcd-{}.{}:2379", i, domain))
        .collect::<Vec<_>>()
        .join(",")
}

fn cluster_profile() -> String {
    match std::env::var(CLUSTER_PROFILE_ENV) {
        Ok(profile) if !profile.is_empty() => {
            warn!("Found override for Cluster Profile: {:?}", profile);
            profile
        }
        _ => String::new(),
    }
}

fn template_data(parents: &Parents, config: &InstallConfig) -> KvinstallResult<TemplateData> {
    let proxy = parents.get::<Proxy>()?.status();
    let release_image = parents.get::<ReleaseImage>()?;
    let ironic = parents.get::<IronicCreds>()?;

    let bare_metal = config.platform.baremetal.as_ref().map(|bm| BareMetalData {
        provisioning_ip: bm.bootstrap_provisioning_ip.clone(),
        ironic_username: ironic.username.clone(),
        ironic_password: ironic.password.clone(),
        api_vip: bm.api_vip.clone(),
        ingress_vip: bm.ingress_vip.clone(),
    });

    Ok(TemplateData {
        additional_trust_bundle: config.additional_trust_bundle.clone(),
        cluster_profile: cluster_profile(),
        etcd_cluster: etcd_cluster(config),
        proxy: proxy.is_set().then(|| ProxyData::from(proxy)),
        pull_secret: config.pull_secret.clone(),
        registries: merged_registries(&config.image_content_sources),
        release_image: release_image.pull_spec.clone(),
        platform_data: PlatformData { bare_metal },
    })
}

/// `bootstrap.ign`
#[derive(Default)]
pub struct Bootstrap {
    config: Option<Config>,
    file: Option<AssetFile>,
}

impl Bootstrap {
    pub fn config(&self) -> Option<&Config> {
        self.config.as_ref()
    }
}

impl Asset for Bootstrap {
    fn kind(&self) -> AssetKind {
        AssetKind::Bootstrap
    }

    fn dependencies(&self) -> Vec<Box<dyn Asset>> {
        let mut deps: Vec<Box<dyn Asset>> = vec![
            Box::new(InstallConfigAsset::default()),
            Box::new(Proxy::default()),
            Box::new(ReleaseImage::default()),
            Box::new(IronicCreds::default()),
            Box::new(Manifests::default()),
            Box::new(Master::default()),
            Box::new(Worker::default()),
            TlsAsset::boxed(AssetKind::BootstrapSshKeyPair),
        ];
        deps.extend(KUBECONFIG_KINDS.iter().map(|k| KubeconfigAsset::boxed(*k)));
        deps.extend(TLS_KINDS.iter().map(|k| TlsAsset::boxed(*k)));
        deps
    }

    fn generate(&mut self, parents: &Parents) -> KvinstallResult<()> {
        let install_config = parents.get::<InstallConfigAsset>()?.config()?;
        let data = template_data(parents, install_config)?;
        let tree = parents.templates();

        let mut config = Config::new();
        add_storage_files(&mut config, tree, "/", "bootstrap/files", &data)?;
        add_systemd_units(&mut config, tree, "bootstrap/systemd/units", &data, ENABLED_UNITS)?;

        let platform = install_config.platform.name();
        let platform_files = format!("bootstrap/{}/files", platform);
        if tree.is_dir(&platform_files) {
            add_storage_files(&mut config, tree, "/", &platform_files, &data)?;
        }
        let platform_units = format!("bootstrap/{}/systemd/units", platform);
        if tree.is_dir(&platform_units) {
            add_systemd_units(&mut config, tree, &platform_units, &data, ENABLED_UNITS)?;
        }

        add_parent_files(&mut config, parents, ROOT_DIR, "root", 0o644, MANIFEST_KINDS)?;
        add_parent_files(&mut config, parents, ROOT_DIR, "root", 0o600, KUBECONFIG_KINDS)?;
        add_parent_files(&mut config, parents, ROOT_DIR, "root", 0o600, TLS_KINDS)?;

        for (kind, path) in [
            (AssetKind::KubeconfigKubelet, KUBELET_KUBECONFIG_PATH),
            (AssetKind::KubeconfigAdminInternalClient, ADMIN_KUBECONFIG_PATH),
        ] {
            for file in parents.get_dyn(kind)?.files() {
                replace_or_append(
                    &mut config.storage.files,
                    file_from_bytes(path, "root", 0o600, &file.data),
                );
            }
        }

        let root_ca = tls::material(parents, AssetKind::RootCa)?;
        replace_or_append(
            &mut config.storage.files,
            file_from_string(ROOT_CA_PATH, "root", 0o644, &root_ca.cert_pem),
        );

        let ssh = tls::material(parents, AssetKind::BootstrapSshKeyPair)?;
        config.passwd.users.push(PasswdUser::with_keys(
            "core",
            [install_config.ssh_key.as_str(), ssh.public_key.as_str()],
        ));

        debug!(
            "Bootstrap config has {} files and {} units",
            config.storage.files.len(),
            config.systemd.units.len()
        );

        self.file = Some(AssetFile::new(BOOTSTRAP_FILENAME, config.marshal()?));
        self.config = Some(config);
        Ok(())
    }

    fn files(&self) -> Vec<&AssetFile> {
        self.file.iter().collect()
    }

    fn load(&mut self, fetcher: &dyn FileFetcher) -> KvinstallResult<bool> {
        let Some((config, file)) = load_config(fetcher, BOOTSTRAP_FILENAME, self.name())? else {
            return Ok(false);
        };

        expiry::warn_expired(&config);
        self.config = Some(config);
        self.file = Some(file);
        Ok(true)
    }
}

impl AssetType for Bootstrap {
    const KIND: AssetKind = AssetKind::Bootstrap;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetStore, DiskFetcher};
    use crate::data::TemplateTree;
    use crate::ignition::dataurl;
    use crate::ignition::types::File;
    use crate::installconfig::testing;
    use crate::installconfig::types::BareMetalPlatform;
    use serial_test::serial;
    use tempfile::TempDir;

    fn write_install_config(dir: &std::path::Path, config: InstallConfig) {
        let asset = InstallConfigAsset::from_config(config).unwrap();
        std::fs::write(dir.join("install-config.yaml"), &asset.files()[0].data).unwrap();
    }

    fn generate(config: InstallConfig) -> (TempDir, Bootstrap) {
        let temp = TempDir::new().unwrap();
        write_install_config(temp.path(), config);
        let store = AssetStore::new(temp.path(), TemplateTree::embedded());
        let mut parents = store.fetch(vec![Box::new(Bootstrap::default())]).unwrap();
        store.persist(&parents, &[AssetKind::Bootstrap]).unwrap();

        let bootstrap = parents.take::<Bootstrap>().unwrap();
        (temp, bootstrap)
    }

    fn find<'a>(config: &'a Config, path: &str) -> &'a File {
        config
            .storage
            .files
            .iter()
            .find(|f| f.path == path)
            .unwrap_or_else(|| panic!("{} missing", path))
    }

    fn contents(file: &File) -> String {
        String::from_utf8(dataurl::decode(file.contents.source.as_deref().unwrap()).unwrap()).unwrap()
    }

    #[test]
    fn registries_merge_by_source() {
        let sources = vec![
            ImageContentSource {
                source: "quay.io/a".to_string(),
                mirrors: vec!["m1/a".to_string(), "m2/a".to_string()],
            },
            ImageContentSource {
                source: "quay.io/b".to_string(),
                mirrors: vec!["m1/b".to_string()],
            },
            ImageContentSource {
                source: "quay.io/a".to_string(),
                mirrors: vec!["m2/a".to_string(), "m3/a".to_string()],
            },
        ];
        let merged = merged_registries(&sources);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].mirrors, vec!["m1/a", "m2/a", "m3/a"]);
    }

    #[test]
    fn etcd_endpoints_follow_replicas() {
        let config = testing::none_config();
        assert_eq!(
            etcd_cluster(&config),
            "https://etcd-0.test-cluster.example.com:2379,\
             https://etcd-1.test-cluster.example.com:2379,\
             https://etcd-2.test-cluster.example.com:2379"
        );
    }

    #[test]
    #[serial]
    fn generated_config_layout() {
        std::env::remove_var(CLUSTER_PROFILE_ENV);
        let (_temp, bootstrap) = generate(testing::kubevirt_config());
        let config = bootstrap.config().unwrap();

        let root_ca = find(config, ROOT_CA_PATH);
        assert_eq!(root_ca.mode, Some(0o644));
        assert!(contents(root_ca).contains("BEGIN CERTIFICATE"));

        assert_eq!(find(config, "/opt/openshift/tls/root-ca.key").mode, Some(0o600));
        assert_eq!(find(config, "/opt/openshift/auth/kubeconfig-loopback").mode, Some(0o600));
        assert_eq!(find(config, KUBELET_KUBECONFIG_PATH).mode, Some(0o600));
        assert_eq!(
            find(config, "/opt/openshift/manifests/cluster-config.yaml").mode,
            Some(0o644)
        );
        assert_eq!(
            find(
                config,
                "/opt/openshift/openshift/99_openshift-machineconfig_99-master-infra-service-account.yaml"
            )
            .mode,
            Some(0o644)
        );

        let registries = contents(find(config, "/etc/containers/registries.conf"));
        assert!(registries.contains("location = \"mirror.example.com/ocp/release\""));

        let kubelet = config
            .systemd
            .units
            .iter()
            .find(|u| u.name == "kubelet.service")
            .unwrap();
        assert_eq!(kubelet.enabled, Some(true));
        let bootkube = config
            .systemd
            .units
            .iter()
            .find(|u| u.name == "bootkube.service")
            .unwrap();
        assert_eq!(bootkube.enabled, None);

        let core = &config.passwd.users[0];
        assert_eq!(core.name, "core");
        assert_eq!(core.ssh_authorized_keys.len(), 2);
        assert_eq!(core.ssh_authorized_keys[0], testing::SSH_KEY);
        assert!(core.ssh_authorized_keys[1].starts_with("ssh-ed25519 "));

        let mut paths: Vec<_> = config.storage.files.iter().map(|f| &f.path).collect();
        let total = paths.len();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), total);
    }

    #[test]
    #[serial]
    fn every_node_path_is_provided() {
        std::env::remove_var(CLUSTER_PROFILE_ENV);
        let (_temp, bootstrap) = generate(testing::kubevirt_config());
        let config = bootstrap.config().unwrap();

        assert_eq!(
            crate::ignition::testing::dangling_node_paths(config),
            Vec::<String>::new()
        );
        assert_eq!(find(config, ADMIN_KUBECONFIG_PATH).mode, Some(0o600));
        let client_ca = contents(find(
            config,
            "/opt/openshift/tls/kube-apiserver-complete-client-ca-bundle.crt",
        ));
        assert_eq!(client_ca.matches("BEGIN CERTIFICATE").count(), 5);
    }

    #[test]
    #[serial]
    fn baremetal_adds_platform_files_and_units() {
        std::env::remove_var(CLUSTER_PROFILE_ENV);
        let mut install_config = testing::none_config();
        install_config.platform.none = None;
        install_config.platform.baremetal = Some(BareMetalPlatform {
            api_vip: "10.0.0.5".to_string(),
            ingress_vip: "10.0.0.7".to_string(),
            bootstrap_provisioning_ip: "172.22.0.2".to_string(),
            provisioning_network_cidr: "172.22.0.0/24".to_string(),
        });
        let (_temp, bootstrap) = generate(install_config);
        let config = bootstrap.config().unwrap();

        let keepalived = contents(find(config, "/etc/keepalived/keepalived.conf"));
        assert!(keepalived.contains("10.0.0.5"));
        assert!(keepalived.contains("10.0.0.7"));
        assert!(contents(find(config, "/usr/local/bin/startironic.sh")).contains("172.22.0.2"));

        for name in ["ironic.service", "keepalived.service"] {
            let unit = config
                .systemd
                .units
                .iter()
                .find(|u| u.name == name)
                .unwrap_or_else(|| panic!("{} missing", name));
            assert_eq!(unit.enabled, Some(true));
        }
    }

    #[test]
    #[serial]
    fn generate_write_load_round_trip() {
        std::env::remove_var(CLUSTER_PROFILE_ENV);
        let (temp, bootstrap) = generate(testing::none_config());

        let mut loaded = Bootstrap::default();
        assert!(loaded.load(&DiskFetcher::new(temp.path())).unwrap());
        assert_eq!(loaded.config(), bootstrap.config());
        assert_eq!(loaded.files()[0].data, bootstrap.files()[0].data);
    }

    #[test]
    #[serial]
    fn cluster_profile_override_reaches_templates() {
        std::env::set_var(CLUSTER_PROFILE_ENV, "single-node-developer");
        let (_temp, bootstrap) = generate(testing::none_config());
        std::env::remove_var(CLUSTER_PROFILE_ENV);

        let bootkube = contents(find(bootstrap.config().unwrap(), "/usr/local/bin/bootkube.sh"));
        assert!(bootkube.contains("single-node-developer"));
    }

    #[test]
    fn missing_and_corrupt_files() {
        let temp = TempDir::new().unwrap();
        let mut bootstrap = Bootstrap::default();
        assert!(!bootstrap.load(&DiskFetcher::new(temp.path())).unwrap());

        std::fs::write(temp.path().join(BOOTSTRAP_FILENAME), "{\"ignition\":").unwrap();
        assert!(bootstrap.load(&DiskFetcher::new(temp.path())).is_err());
        assert!(bootstrap.config().is_none());
        assert!(bootstrap.files().is_empty());
    }
}
