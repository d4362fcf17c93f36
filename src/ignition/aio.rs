//! Single-node ("all-in-one") Ignition config (`aio.ign`)
//!
//! One node runs the whole control plane with upstream kubelet, kubectl and
//! kube-proxy binaries fetched at first boot.

use crate::asset::{Asset, AssetFile, AssetKind, AssetType, FileFetcher, Parents};
use crate::error::{KvinstallError, KvinstallResult};
use crate::ignition::bootstrap::{KUBECONFIG_KINDS, ROOT_CA_PATH, ROOT_DIR, TLS_KINDS};
use crate::ignition::files::{add_parent_files, file_from_string, file_from_url, replace_or_append};
use crate::ignition::load_config;
use crate::ignition::render::{add_storage_files, add_systemd_units};
use crate::ignition::types::{Config, PasswdUser};
use crate::installconfig::cidr::Cidr;
use crate::installconfig::types::InstallConfig;
use crate::installconfig::{InstallConfigAsset, ReleaseImage};
use crate::kubeconfig::KubeconfigAsset;
use crate::manifests::{Manifests, Proxy};
use crate::tls::{self, TlsAsset};
use serde::Serialize;
use tracing::debug;

pub const AIO_FILENAME: &str = "aio.ign";

const KUBE_RELEASE_URL: &str = "https://storage.googleapis.com/kubernetes-release/release/v1.20.4/bin/linux/amd64";
const KUBE_BINARIES: &[&str] = &["kubelet", "kubectl", "kube-proxy"];

const ENABLED_UNITS: &[&str] = &[
    "kubelet.service",
    "kube-proxy.service",
    "aiokube.service",
    "approve-csr.service",
];

/// Variables visible to the all-in-one templates
#[derive(Debug, Clone, Serialize)]
pub struct TemplateData {
    pub release_image: String,
    pub cluster_domain: String,
    pub etcd_cluster: String,
    pub cluster_dns_ip: String,
    pub pull_secret: String,
    pub cluster_network: String,
}

/// Single control plane replica and no compute replicas
pub fn check_replicas(config: &InstallConfig) -> KvinstallResult<()> {
    if config.control_plane_replicas() != 1 {
        return Err(KvinstallError::ReplicaCount(
            "All-in-one configurations must use a single control plane replica".to_string(),
        ));
    }
    if config
        .compute
        .iter()
        .any(|pool| pool.replicas.is_some_and(|r| r != 0))
    {
        return Err(KvinstallError::ReplicaCount(
            "All-in-one configurations do not support compute replicas".to_string(),
        ));
    }
    Ok(())
}

/// Tenth address of the service network
pub fn cluster_dns_ip(service_network: &str) -> KvinstallResult<String> {
    Ok(Cidr::parse(service_network)?.host(10)?.to_string())
}

fn template_data(config: &InstallConfig, release_image: &str) -> KvinstallResult<TemplateData> {
    check_replicas(config)?;

    let service_network = config
        .networking
        .service_network
        .first()
        .ok_or_else(|| KvinstallError::Internal("no service network".to_string()))?;
    let cluster_network = config
        .networking
        .cluster_network
        .first()
        .ok_or_else(|| KvinstallError::Internal("no cluster network".to_string()))?;
    let domain = config.cluster_domain();

    Ok(TemplateData {
        release_image: release_image.to_string(),
        etcd_cluster: format!("https://etcd-0.{}:2379", domain),
        cluster_dns_ip: cluster_dns_ip(service_network)?,
        cluster_domain: domain,
        pull_secret: config.pull_secret.clone(),
        cluster_network: cluster_network.cidr.clone(),
    })
}

/// `aio.ign`
#[derive(Default)]
pub struct Aio {
    config: Option<Config>,
    file: Option<AssetFile>,
}

impl Aio {
    pub fn config(&self) -> Option<&Config> {
        self.config.as_ref()
    }
}

impl Asset for Aio {
    fn kind(&self) -> AssetKind {
        AssetKind::Aio
    }

    fn dependencies(&self) -> Vec<Box<dyn Asset>> {
        let mut deps: Vec<Box<dyn Asset>> = vec![
            Box::new(InstallConfigAsset::default()),
            Box::new(Manifests::default()),
            Box::new(Proxy::default()),
            Box::new(ReleaseImage::default()),
        ];
        deps.extend(KUBECONFIG_KINDS.iter().map(|k| KubeconfigAsset::boxed(*k)));
        deps.extend(TLS_KINDS.iter().map(|k| TlsAsset::boxed(*k)));
        deps
    }

    fn generate(&mut self, parents: &Parents) -> KvinstallResult<()> {
        let install_config = parents.get::<InstallConfigAsset>()?.config()?;
        let release_image = parents.get::<ReleaseImage>()?;
        let data = template_data(install_config, &release_image.pull_spec)?;
        let tree = parents.templates();

        let mut config = Config::new();
        add_storage_files(&mut config, tree, "/", "aio/files", &data)?;

        for binary in KUBE_BINARIES {
            replace_or_append(
                &mut config.storage.files,
                file_from_url(
                    &format!("/usr/local/bin/{}", binary),
                    "root",
                    0o755,
                    &format!("{}/{}", KUBE_RELEASE_URL, binary),
                ),
            );
        }

        add_systemd_units(&mut config, tree, "aio/systemd/units", &data, ENABLED_UNITS)?;

        add_parent_files(&mut config, parents, ROOT_DIR, "root", 0o644, &[AssetKind::Manifests])?;
        add_parent_files(&mut config, parents, ROOT_DIR, "root", 0o600, KUBECONFIG_KINDS)?;
        add_parent_files(&mut config, parents, ROOT_DIR, "root", 0o600, TLS_KINDS)?;

        let root_ca = tls::material(parents, AssetKind::RootCa)?;
        replace_or_append(
            &mut config.storage.files,
            file_from_string(ROOT_CA_PATH, "root", 0o644, &root_ca.cert_pem),
        );

        config
            .passwd
            .users
            .push(PasswdUser::with_keys("core", [install_config.ssh_key.as_str()]));

        debug!("All-in-one config has {} files", config.storage.files.len());
        self.file = Some(AssetFile::new(AIO_FILENAME, config.marshal()?));
        self.config = Some(config);
        Ok(())
    }

    fn files(&self) -> Vec<&AssetFile> {
        self.file.iter().collect()
    }

    fn load(&mut self, fetcher: &dyn FileFetcher) -> KvinstallResult<bool> {
        let Some((config, file)) = load_config(fetcher, AIO_FILENAME, self.name())? else {
            return Ok(false);
        };
        self.config = Some(config);
        self.file = Some(file);
        Ok(true)
    }
}

impl AssetType for Aio {
    const KIND: AssetKind = AssetKind::Aio;
}
