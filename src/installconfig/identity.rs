//! Leaf assets derived from the install config and the environment

use crate::asset::{Asset, AssetFile, AssetKind, AssetType, FileFetcher, Parents};
use crate::error::{KvinstallError, KvinstallResult};
use crate::installconfig::InstallConfigAsset;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

const INFRA_ID_MAX_LEN: usize = 27;
const INFRA_ID_RANDOM_LEN: usize = 5;
const INFRA_ID_ALPHABET: &[u8] = b"bcdfghjklmnpqrstvwxz2456789";

pub const DEFAULT_RELEASE_IMAGE: &str = "quay.io/openshift-release-dev/ocp-release:4.7.0-x86_64";
pub const RELEASE_IMAGE_OVERRIDE_ENV: &str = "OPENSHIFT_INSTALL_RELEASE_IMAGE_OVERRIDE";
pub const OS_IMAGE_OVERRIDE_ENV: &str = "OPENSHIFT_INSTALL_OS_IMAGE_OVERRIDE";

const RHCOS_BASE: &str =
    "https://releases-art-rhcos.svc.ci.openshift.org/art/storage/releases/rhcos-4.7/47.83.202102090044-0/x86_64";

pub const CLUSTER_ID_FILENAME: &str = ".kvinstall/cluster-id.json";

/// Cluster UUID and the infrastructure ID used to name and label resources
///
/// Stored in the asset directory so that manifests, Ignition configs and
/// `metadata.json` written by separate runs agree on the infra ID.
#[derive(Default)]
pub struct ClusterId {
    pub uuid: String,
    pub infra_id: String,
    file: Option<AssetFile>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredClusterId {
    uuid: String,
    #[serde(rename = "infraID")]
    infra_id: String,
}

impl ClusterId {
    pub fn new(uuid: impl Into<String>, infra_id: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            infra_id: infra_id.into(),
            file: None,
        }
    }
}

impl Asset for ClusterId {
    fn kind(&self) -> AssetKind {
        AssetKind::ClusterId
    }

    fn dependencies(&self) -> Vec<Box<dyn Asset>> {
        vec![Box::new(InstallConfigAsset::default())]
    }

    fn generate(&mut self, parents: &Parents) -> KvinstallResult<()> {
        let config = parents.get::<InstallConfigAsset>()?.config()?;
        self.infra_id = generate_infra_id(&config.metadata.name, &mut rand::thread_rng());
        self.uuid = Uuid::new_v4().to_string();

        let stored = StoredClusterId {
            uuid: self.uuid.clone(),
            infra_id: self.infra_id.clone(),
        };
        self.file = Some(AssetFile::new(
            CLUSTER_ID_FILENAME,
            serde_json::to_vec_pretty(&stored)?,
        ));
        Ok(())
    }

    fn files(&self) -> Vec<&AssetFile> {
        self.file.iter().collect()
    }

    fn load(&mut self, fetcher: &dyn FileFetcher) -> KvinstallResult<bool> {
        let Some(file) = fetcher.fetch_by_name(CLUSTER_ID_FILENAME)? else {
            return Ok(false);
        };

        let stored: StoredClusterId =
            serde_json::from_slice(&file.data).map_err(|e| KvinstallError::AssetLoad {
                asset: self.name().to_string(),
                filename: CLUSTER_ID_FILENAME.to_string(),
                reason: e.to_string(),
            })?;
        self.uuid = stored.uuid;
        self.infra_id = stored.infra_id;
        self.file = Some(file);
        Ok(true)
    }
}

impl AssetType for ClusterId {
    const KIND: AssetKind = AssetKind::ClusterId;
}

/// Cluster name sanitized and truncated, plus a random suffix
pub fn generate_infra_id(base: &str, rng: &mut impl Rng) -> String {
    let max_base_len = INFRA_ID_MAX_LEN - (INFRA_ID_RANDOM_LEN + 1);

    let sanitized: String = base
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let mut trimmed: String = sanitized.trim_matches('-').chars().take(max_base_len).collect();
    while trimmed.ends_with('-') {
        trimmed.pop();
    }

    let suffix: String = (0..INFRA_ID_RANDOM_LEN)
        .map(|_| INFRA_ID_ALPHABET[rng.gen_range(0..INFRA_ID_ALPHABET.len())] as char)
        .collect();

    format!("{}-{}", trimmed, suffix)
}

/// Release payload pull spec
#[derive(Default)]
pub struct ReleaseImage {
    pub pull_spec: String,
}

impl Asset for ReleaseImage {
    fn kind(&self) -> AssetKind {
        AssetKind::ReleaseImage
    }

    fn dependencies(&self) -> Vec<Box<dyn Asset>> {
        Vec::new()
    }

    fn generate(&mut self, _parents: &Parents) -> KvinstallResult<()> {
        self.pull_spec = match std::env::var(RELEASE_IMAGE_OVERRIDE_ENV) {
            Ok(spec) if !spec.is_empty() => {
                warn!("Found override for release image. Please be warned, this is not advised");
                spec
            }
            _ => DEFAULT_RELEASE_IMAGE.to_string(),
        };
        Ok(())
    }
}

impl AssetType for ReleaseImage {
    const KIND: AssetKind = AssetKind::ReleaseImage;
}

/// Boot image location for the configured platform
#[derive(Default)]
pub struct RhcosImage {
    pub location: String,
}

impl Asset for RhcosImage {
    fn kind(&self) -> AssetKind {
        AssetKind::RhcosImage
    }

    fn dependencies(&self) -> Vec<Box<dyn Asset>> {
        vec![Box::new(InstallConfigAsset::default())]
    }

    fn generate(&mut self, parents: &Parents) -> KvinstallResult<()> {
        if let Ok(location) = std::env::var(OS_IMAGE_OVERRIDE_ENV) {
            if !location.is_empty() {
                warn!("Found override for OS Image. Please be warned, this is not advised");
                self.location = location;
                return Ok(());
            }
        }

        let config = parents.get::<InstallConfigAsset>()?.config()?;
        self.location = match config.platform.name() {
            "kubevirt" => format!(
                "{}/rhcos-47.83.202102090044-0-openstack.x86_64.qcow2.gz",
                RHCOS_BASE
            ),
            "baremetal" => format!(
                "{}/rhcos-47.83.202102090044-0-qemu.x86_64.qcow2.gz",
                RHCOS_BASE
            ),
            _ => String::new(),
        };
        Ok(())
    }
}

impl AssetType for RhcosImage {
    const KIND: AssetKind = AssetKind::RhcosImage;
}

/// Basic-auth credentials for the bootstrap Ironic API
#[derive(Default)]
pub struct IronicCreds {
    pub username: String,
    pub password: String,
}

impl Asset for IronicCreds {
    fn kind(&self) -> AssetKind {
        AssetKind::IronicCreds
    }

    fn dependencies(&self) -> Vec<Box<dyn Asset>> {
        Vec::new()
    }

    fn generate(&mut self, _parents: &Parents) -> KvinstallResult<()> {
        let password: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        self.username = "bootstrap-user".to_string();
        self.password = password;
        Ok(())
    }
}

impl AssetType for IronicCreds {
    const KIND: AssetKind = AssetKind::IronicCreds;
}
