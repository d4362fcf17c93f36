//! Per-role MachineConfig manifests
//!
//! The machine config operator applies these on top of the rendered node
//! config. They are written under `openshift/` and copied to the bootstrap
//! node with the rest of the manifests.

use crate::asset::{Asset, AssetFile, AssetKind, AssetType, FileFetcher, Parents};
use crate::error::{KvinstallError, KvinstallResult};
use crate::ignition::types::{Config, PasswdUser};
use crate::installconfig::types::InstallConfig;
use crate::installconfig::InstallConfigAsset;
use crate::kubevirt::machineconfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const ROLE_LABEL: &str = "machineconfiguration.openshift.io/role";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineConfig {
    pub api_version: String,
    pub kind: String,
    pub metadata: MachineConfigMeta,
    pub spec: MachineConfigSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineConfigMeta {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineConfigSpec {
    pub config: Config,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fips: bool,
}

impl MachineConfig {
    /// A MachineConfig selected by the role label
    pub fn for_role(role: &str, name: &str, config: Config) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert(ROLE_LABEL.to_string(), role.to_string());

        Self {
            api_version: "machineconfiguration.openshift.io/v1".to_string(),
            kind: "MachineConfig".to_string(),
            metadata: MachineConfigMeta {
                name: name.to_string(),
                labels,
            },
            spec: MachineConfigSpec {
                config,
                fips: false,
            },
        }
    }

    /// Authorized keys for the `core` user
    pub fn for_authorized_keys(role: &str, ssh_key: &str) -> Self {
        let mut config = Config::new();
        config.passwd.users.push(PasswdUser::with_keys("core", [ssh_key]));
        Self::for_role(role, &format!("99-{}-ssh", role), config)
    }

    pub fn for_fips(role: &str) -> Self {
        let mut mc = Self::for_role(role, &format!("99-{}-fips", role), Config::new());
        mc.spec.fips = true;
        mc
    }

    /// `openshift/99_openshift-machineconfig_<name>.yaml`
    pub fn filename(&self) -> String {
        filename(&self.metadata.name)
    }
}

fn filename(name: &str) -> String {
    format!("openshift/99_openshift-machineconfig_{}.yaml", name)
}

/// MachineConfigs for one role
struct RoleConfigs {
    role: &'static str,
    configs: Vec<MachineConfig>,
    files: Vec<AssetFile>,
}

impl RoleConfigs {
    fn new(role: &'static str) -> Self {
        Self {
            role,
            configs: Vec::new(),
            files: Vec::new(),
        }
    }

    fn generate(&mut self, config: &InstallConfig) -> KvinstallResult<()> {
        let role = self.role;
        let mut configs = Vec::new();

        if config.fips {
            configs.push(MachineConfig::for_fips(role));
        }
        configs.push(MachineConfig::for_authorized_keys(role, &config.ssh_key));

        if let Some(kubevirt) = config.kubevirt() {
            if kubevirt.infra_cluster_api_url.is_empty() {
                warn!(
                    "No infra cluster API URL set, {} nodes will not refresh infra credentials",
                    role
                );
            } else {
                configs.push(machineconfig::for_infra_service_account(
                    role,
                    &kubevirt.infra_cluster_api_url,
                ));
            }
        }

        let mut files = Vec::with_capacity(configs.len());
        for mc in &configs {
            debug!("Adding MachineConfig {}", mc.metadata.name);
            files.push(AssetFile::new(mc.filename(), serde_yaml_ng::to_string(mc)?));
        }

        self.configs = configs;
        self.files = files;
        Ok(())
    }

    /// The SSH config must be present; the rest are picked up when found
    fn load(&mut self, fetcher: &dyn FileFetcher, asset: &str) -> KvinstallResult<bool> {
        let role = self.role;
        let required = filename(&format!("99-{}-ssh", role));
        let optional = [
            filename(&format!("99-{}-fips", role)),
            filename(&format!("99-{}-infra-service-account", role)),
        ];

        let Some(ssh) = fetcher.fetch_by_name(&required)? else {
            return Ok(false);
        };
        let mut files = vec![ssh];
        for name in &optional {
            if let Some(file) = fetcher.fetch_by_name(name)? {
                files.push(file);
            }
        }

        let mut configs = Vec::with_capacity(files.len());
        for file in &files {
            let mc: MachineConfig =
                serde_yaml_ng::from_slice(&file.data).map_err(|e| KvinstallError::AssetLoad {
                    asset: asset.to_string(),
                    filename: file.filename.clone(),
                    reason: e.to_string(),
                })?;
            configs.push(mc);
        }

        self.configs = configs;
        self.files = files;
        Ok(true)
    }
}

macro_rules! role_asset {
    ($name:ident, $kind:expr, $role:literal) => {
        #[doc = concat!("MachineConfig manifests for ", $role, " nodes")]
        pub struct $name {
            inner: RoleConfigs,
        }

        impl Default for $name {
            fn default() -> Self {
                Self {
                    inner: RoleConfigs::new($role),
                }
            }
        }

        impl $name {
            pub fn machine_configs(&self) -> &[MachineConfig] {
                &self.inner.configs
            }
        }

        impl Asset for $name {
            fn kind(&self) -> AssetKind {
                $kind
            }

            fn dependencies(&self) -> Vec<Box<dyn Asset>> {
                vec![Box::new(InstallConfigAsset::default())]
            }

            fn generate(&mut self, parents: &Parents) -> KvinstallResult<()> {
                let config = parents.get::<InstallConfigAsset>()?.config()?;
                self.inner.generate(config)
            }

            fn files(&self) -> Vec<&AssetFile> {
                self.inner.files.iter().collect()
            }

            fn load(&mut self, fetcher: &dyn FileFetcher) -> KvinstallResult<bool> {
                let name = self.name();
                self.inner.load(fetcher, name)
            }
        }

        impl AssetType for $name {
            const KIND: AssetKind = $kind;
        }
    };
}

role_asset!(Master, AssetKind::Master, "master");
role_asset!(Worker, AssetKind::Worker, "worker");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::DiskFetcher;
    use crate::installconfig::testing;
    use tempfile::TempDir;

    fn parents(config: InstallConfig) -> Parents {
        let mut parents = Parents::new();
        parents.insert(testing::asset(config)).unwrap();
        parents
    }

    fn names(files: Vec<&AssetFile>) -> Vec<String> {
        files.into_iter().map(|f| f.filename.clone()).collect()
    }

    #[test]
    fn ssh_config_for_every_platform() {
        let mut worker = Worker::default();
        worker.generate(&parents(testing::none_config())).unwrap();

        assert_eq!(
            names(worker.files()),
            vec!["openshift/99_openshift-machineconfig_99-worker-ssh.yaml"]
        );
        let mc = &worker.machine_configs()[0];
        assert_eq!(mc.metadata.labels[ROLE_LABEL], "worker");
        assert_eq!(
            mc.spec.config.passwd.users[0].ssh_authorized_keys,
            vec![testing::SSH_KEY.to_string()]
        );
    }

    #[test]
    fn kubevirt_adds_infra_service_account() {
        let mut master = Master::default();
        master.generate(&parents(testing::kubevirt_config())).unwrap();

        assert_eq!(
            names(master.files()),
            vec![
                "openshift/99_openshift-machineconfig_99-master-ssh.yaml",
                "openshift/99_openshift-machineconfig_99-master-infra-service-account.yaml",
            ]
        );
    }

    #[test]
    fn empty_infra_url_skips_service_account() {
        let mut config = testing::kubevirt_config();
        if let Some(kubevirt) = config.platform.kubevirt.as_mut() {
            kubevirt.infra_cluster_api_url.clear();
        }
        let mut master = Master::default();
        master.generate(&parents(config)).unwrap();
        assert_eq!(master.files().len(), 1);
    }

    #[test]
    fn fips_config_comes_first() {
        let mut config = testing::none_config();
        config.fips = true;
        let mut master = Master::default();
        master.generate(&parents(config)).unwrap();

        assert_eq!(master.machine_configs()[0].metadata.name, "99-master-fips");
        assert!(master.machine_configs()[0].spec.fips);
    }

    #[test]
    fn load_round_trip() {
        let temp = TempDir::new().unwrap();
        let mut generated = Master::default();
        generated.generate(&parents(testing::kubevirt_config())).unwrap();
        for file in generated.files() {
            let path = temp.path().join(&file.filename);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, &file.data).unwrap();
        }

        let mut loaded = Master::default();
        assert!(loaded.load(&DiskFetcher::new(temp.path())).unwrap());
        assert_eq!(loaded.machine_configs(), generated.machine_configs());

        let mut worker = Worker::default();
        assert!(!worker.load(&DiskFetcher::new(temp.path())).unwrap());
    }
}
