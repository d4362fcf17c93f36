//! Pointer Ignition configs for masters and workers
//!
//! These only tell the node where to fetch its real config: the machine
//! config server behind the internal API name, trusted through the root CA.

use crate::asset::{Asset, AssetFile, AssetKind, AssetType, FileFetcher, Parents};
use crate::error::KvinstallResult;
use crate::ignition::types::{Config, Resource};
use crate::ignition::{dataurl, load_config};
use crate::installconfig::types::InstallConfig;
use crate::installconfig::InstallConfigAsset;
use crate::tls::{self, TlsAsset};

const MACHINE_CONFIG_SERVER_PORT: u16 = 22623;

/// Config that merges `<role>` from the machine config server
pub fn pointer_config(install_config: &InstallConfig, root_ca_pem: &str, role: &str) -> Config {
    let mut config = Config::new();
    config.ignition.config.merge.push(Resource::from_source(format!(
        "https://api-int.{}:{}/config/{}",
        install_config.cluster_domain(),
        MACHINE_CONFIG_SERVER_PORT,
        role
    )));
    config
        .ignition
        .security
        .tls
        .certificate_authorities
        .push(Resource::from_source(dataurl::encode(root_ca_pem.as_bytes())));
    config
}

macro_rules! pointer_asset {
    ($name:ident, $kind:expr, $role:literal) => {
        #[doc = concat!("`", $role, ".ign`")]
        #[derive(Default)]
        pub struct $name {
            config: Option<Config>,
            file: Option<AssetFile>,
        }

        impl $name {
            const FILENAME: &'static str = concat!($role, ".ign");

            pub fn config(&self) -> Option<&Config> {
                self.config.as_ref()
            }
        }

        impl Asset for $name {
            fn kind(&self) -> AssetKind {
                $kind
            }

            fn dependencies(&self) -> Vec<Box<dyn Asset>> {
                vec![
                    Box::new(InstallConfigAsset::default()),
                    TlsAsset::boxed(AssetKind::RootCa),
                ]
            }

            fn generate(&mut self, parents: &Parents) -> KvinstallResult<()> {
                let install_config = parents.get::<InstallConfigAsset>()?.config()?;
                let root_ca = tls::material(parents, AssetKind::RootCa)?;

                let config = pointer_config(install_config, &root_ca.cert_pem, $role);
                self.file = Some(AssetFile::new(Self::FILENAME, config.marshal()?));
                self.config = Some(config);
                Ok(())
            }

            fn files(&self) -> Vec<&AssetFile> {
                self.file.iter().collect()
            }

            fn load(&mut self, fetcher: &dyn FileFetcher) -> KvinstallResult<bool> {
                let Some((config, file)) = load_config(fetcher, Self::FILENAME, self.name())? else {
                    return Ok(false);
                };
                self.config = Some(config);
                self.file = Some(file);
                Ok(true)
            }
        }

        impl AssetType for $name {
            const KIND: AssetKind = $kind;
        }
    };
}

pointer_asset!(MasterIgnition, AssetKind::MasterIgnition, "master");
pointer_asset!(WorkerIgnition, AssetKind::WorkerIgnition, "worker");
