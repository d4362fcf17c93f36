//! Install config: the user's cluster description and its derived inputs

pub mod cidr;
pub mod defaults;
pub mod types;
pub mod validation;

mod identity;

pub use identity::{ClusterId, IronicCreds, ReleaseImage, RhcosImage};
pub use types::InstallConfig;

use crate::asset::{Asset, AssetFile, AssetKind, AssetType, FileFetcher, Parents};
use crate::error::{KvinstallError, KvinstallResult};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const INSTALL_CONFIG_FILENAME: &str = "install-config.yaml";

/// Parse, default and validate an install config document
pub fn parse_install_config(data: &[u8]) -> KvinstallResult<InstallConfig> {
    let mut config: InstallConfig =
        serde_yaml_ng::from_slice(data).map_err(|e| KvinstallError::AssetLoad {
            asset: AssetKind::InstallConfig.name().to_string(),
            filename: INSTALL_CONFIG_FILENAME.to_string(),
            reason: e.to_string(),
        })?;

    defaults::set_install_config_defaults(&mut config);
    validation::validate_install_config(&config)
        .into_result()
        .map_err(KvinstallError::InstallConfigInvalid)?;

    Ok(config)
}

/// Read `install-config.yaml` from an asset directory
pub fn read_install_config(dir: &Path) -> KvinstallResult<InstallConfig> {
    let path = dir.join(INSTALL_CONFIG_FILENAME);
    match std::fs::read(&path) {
        Ok(data) => parse_install_config(&data),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(KvinstallError::InstallConfigMissing(dir.to_path_buf()))
        }
        Err(e) => Err(KvinstallError::io(format!("reading {}", path.display()), e)),
    }
}

/// The install config as an asset. It is only ever loaded; there is no
/// interactive fallback when the file is absent.
#[derive(Default)]
pub struct InstallConfigAsset {
    config: Option<InstallConfig>,
    file: Option<AssetFile>,
    searched: Option<PathBuf>,
}

impl InstallConfigAsset {
    /// Wrap an already validated config
    pub fn from_config(config: InstallConfig) -> KvinstallResult<Self> {
        let data = serde_yaml_ng::to_string(&config)?;
        Ok(Self {
            config: Some(config),
            file: Some(AssetFile::new(INSTALL_CONFIG_FILENAME, data)),
            searched: None,
        })
    }

    pub fn config(&self) -> KvinstallResult<&InstallConfig> {
        self.config
            .as_ref()
            .ok_or_else(|| KvinstallError::Internal("install config not loaded".to_string()))
    }
}

impl Asset for InstallConfigAsset {
    fn kind(&self) -> AssetKind {
        AssetKind::InstallConfig
    }

    fn dependencies(&self) -> Vec<Box<dyn Asset>> {
        Vec::new()
    }

    fn generate(&mut self, _parents: &Parents) -> KvinstallResult<()> {
        let dir = self
            .searched
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        Err(KvinstallError::InstallConfigMissing(dir))
    }

    fn files(&self) -> Vec<&AssetFile> {
        self.file.iter().collect()
    }

    fn load(&mut self, fetcher: &dyn FileFetcher) -> KvinstallResult<bool> {
        let Some(file) = fetcher.fetch_by_name(INSTALL_CONFIG_FILENAME)? else {
            self.searched = Some(fetcher.root().to_path_buf());
            return Ok(false);
        };

        let config = parse_install_config(&file.data)?;
        debug!(
            "Loaded install config for {} on platform {}",
            config.cluster_domain(),
            config.platform.name()
        );
        self.config = Some(config);
        self.file = Some(file);
        Ok(true)
    }
}

impl AssetType for InstallConfigAsset {
    const KIND: AssetKind = AssetKind::InstallConfig;
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::DiskFetcher;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_nothing_and_generate_names_dir() {
        let temp = TempDir::new().unwrap();
        let mut asset = InstallConfigAsset::default();

        assert!(!asset.load(&DiskFetcher::new(temp.path())).unwrap());
        let err = asset.generate(&Parents::new()).unwrap_err();
        assert!(matches!(err, KvinstallError::InstallConfigMissing(p) if p == temp.path()));
    }

    #[test]
    fn corrupt_file_is_an_error_and_leaves_asset_empty() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(INSTALL_CONFIG_FILENAME), "metadata: [unclosed").unwrap();

        let mut asset = InstallConfigAsset::default();
        let err = asset.load(&DiskFetcher::new(temp.path())).unwrap_err();
        assert!(matches!(err, KvinstallError::AssetLoad { .. }));
        assert!(asset.config().is_err());
        assert!(asset.files().is_empty());
    }

    #[test]
    fn invalid_file_reports_every_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(INSTALL_CONFIG_FILENAME),
            "metadata:\n  name: ok\npullSecret: nope\nplatform: {}\n",
        )
        .unwrap();

        let err = read_install_config(temp.path()).unwrap_err();
        let KvinstallError::InstallConfigInvalid(errors) = err else {
            panic!("expected validation errors");
        };
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn round_trips_through_from_config() {
        let config = testing::kubevirt_config();
        let asset = InstallConfigAsset::from_config(config.clone()).unwrap();
        let reparsed = parse_install_config(&asset.files()[0].data).unwrap();
        assert_eq!(reparsed, config);
    }
}
