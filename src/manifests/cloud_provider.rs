//! Cloud provider config map

use crate::asset::{Asset, AssetFile, AssetKind, AssetType, Parents};
use crate::error::KvinstallResult;
use crate::installconfig::{ClusterId, InstallConfigAsset};
use crate::kubevirt::CloudProviderConfig as KubevirtCloudConfig;
use crate::manifests::ConfigMap;

pub const CLOUD_PROVIDER_CONFIG_FILENAME: &str = "manifests/cloud-provider-config.yaml";
const CONFIG_KEY: &str = "config";

/// `openshift-config/cloud-provider-config`, only written on KubeVirt
#[derive(Default)]
pub struct CloudProviderConfig {
    file: Option<AssetFile>,
}

impl Asset for CloudProviderConfig {
    fn kind(&self) -> AssetKind {
        AssetKind::CloudProviderConfig
    }

    fn dependencies(&self) -> Vec<Box<dyn Asset>> {
        vec![
            Box::new(InstallConfigAsset::default()),
            Box::new(ClusterId::default()),
        ]
    }

    fn generate(&mut self, parents: &Parents) -> KvinstallResult<()> {
        let config = parents.get::<InstallConfigAsset>()?.config()?;
        let cluster_id = parents.get::<ClusterId>()?;

        let Some(kubevirt) = config.kubevirt() else {
            self.file = None;
            return Ok(());
        };

        let json = KubevirtCloudConfig {
            namespace: kubevirt.namespace.clone(),
            infra_id: cluster_id.infra_id.clone(),
        }
        .json()?;

        let map = ConfigMap::new("openshift-config", "cloud-provider-config")
            .with_data(CONFIG_KEY, json);
        self.file = Some(AssetFile::new(
            CLOUD_PROVIDER_CONFIG_FILENAME,
            serde_yaml_ng::to_string(&map)?,
        ));
        Ok(())
    }

    fn files(&self) -> Vec<&AssetFile> {
        self.file.iter().collect()
    }
}

impl AssetType for CloudProviderConfig {
    const KIND: AssetKind = AssetKind::CloudProviderConfig;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installconfig::testing;

    fn generate(config: crate::installconfig::InstallConfig) -> CloudProviderConfig {
        let mut parents = Parents::new();
        parents.insert(testing::asset(config)).unwrap();
        parents
            .insert(Box::new(ClusterId::new("uuid", "test-cluster-bx7k2")))
            .unwrap();

        let mut asset = CloudProviderConfig::default();
        asset.generate(&parents).unwrap();
        asset
    }

    #[test]
    fn kubevirt_writes_config_map() {
        let asset = generate(testing::kubevirt_config());
        let file = asset.files()[0];
        assert_eq!(file.filename, CLOUD_PROVIDER_CONFIG_FILENAME);

        let map: ConfigMap = serde_yaml_ng::from_slice(&file.data).unwrap();
        assert_eq!(map.metadata.namespace.as_deref(), Some("openshift-config"));
        assert_eq!(
            map.data[CONFIG_KEY],
            "{\n\t\"namespace\": \"valid-namespace\",\n\t\"infraID\": \"test-cluster-bx7k2\"\n}\n"
        );
    }

    #[test]
    fn other_platforms_write_nothing() {
        assert!(generate(testing::none_config()).files().is_empty());
    }
}
