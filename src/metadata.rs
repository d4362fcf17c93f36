//! `metadata.json`: what destroy needs to find a cluster's resources

use crate::asset::{Asset, AssetFile, AssetKind, AssetType, FileFetcher, Parents};
use crate::error::{KvinstallError, KvinstallResult};
use crate::installconfig::{ClusterId, InstallConfigAsset};
use crate::kubevirt::Labels;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const METADATA_FILENAME: &str = "metadata.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMetadata {
    #[serde(rename = "clusterName")]
    pub cluster_name: String,
    #[serde(rename = "clusterID")]
    pub cluster_id: String,
    #[serde(rename = "infraID")]
    pub infra_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubevirt: Option<KubevirtMetadata>,
}

/// Where the tenant cluster lives in the infra cluster and how its
/// resources are labelled
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubevirtMetadata {
    pub namespace: String,
    pub labels: Labels,
}

/// Ownership label every infra cluster resource of a tenant carries
pub fn owned_labels(infra_id: &str) -> Labels {
    let mut labels = Labels::new();
    labels.insert(
        format!("tenantcluster-{}-machine.openshift.io", infra_id),
        "owned".to_string(),
    );
    labels
}

/// Read `metadata.json` from an asset directory
pub fn read_metadata(dir: &Path) -> KvinstallResult<ClusterMetadata> {
    let path = dir.join(METADATA_FILENAME);
    match std::fs::read(&path) {
        Ok(data) => Ok(serde_json::from_slice(&data)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(KvinstallError::MetadataMissing(dir.to_path_buf()))
        }
        Err(e) => Err(KvinstallError::io(format!("reading {}", path.display()), e)),
    }
}

#[derive(Default)]
pub struct Metadata {
    pub metadata: ClusterMetadata,
    file: Option<AssetFile>,
}

impl Asset for Metadata {
    fn kind(&self) -> AssetKind {
        AssetKind::Metadata
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

        let metadata = ClusterMetadata {
            cluster_name: config.metadata.name.clone(),
            cluster_id: cluster_id.uuid.clone(),
            infra_id: cluster_id.infra_id.clone(),
            kubevirt: config.kubevirt().map(|kubevirt| KubevirtMetadata {
                namespace: kubevirt.namespace.clone(),
                labels: owned_labels(&cluster_id.infra_id),
            }),
        };

        self.file = Some(AssetFile::new(
            METADATA_FILENAME,
            serde_json::to_vec(&metadata)?,
        ));
        self.metadata = metadata;
        Ok(())
    }

    fn files(&self) -> Vec<&AssetFile> {
        self.file.iter().collect()
    }

    fn load(&mut self, fetcher: &dyn FileFetcher) -> KvinstallResult<bool> {
        let Some(file) = fetcher.fetch_by_name(METADATA_FILENAME)? else {
            return Ok(false);
        };
        let metadata = serde_json::from_slice(&file.data).map_err(|e| KvinstallError::AssetLoad {
            asset: self.name().to_string(),
            filename: METADATA_FILENAME.to_string(),
            reason: e.to_string(),
        })?;
        self.metadata = metadata;
        self.file = Some(file);
        Ok(true)
    }
}

impl AssetType for Metadata {
    const KIND: AssetKind = AssetKind::Metadata;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installconfig::testing;
    use tempfile::TempDir;

    fn generate(config: crate::installconfig::InstallConfig) -> Metadata {
        let mut parents = Parents::new();
        parents.insert(testing::asset(config)).unwrap();
        parents
            .insert(Box::new(ClusterId::new("3f0e5c1a", "test-cluster-bx7k2")))
            .unwrap();
        let mut metadata = Metadata::default();
        metadata.generate(&parents).unwrap();
        metadata
    }

    #[test]
    fn kubevirt_metadata_carries_namespace_and_labels() {
        let metadata = generate(testing::kubevirt_config());
        let json: serde_json::Value = serde_json::from_slice(&metadata.files()[0].data).unwrap();

        assert_eq!(json["clusterName"], "test-cluster");
        assert_eq!(json["infraID"], "test-cluster-bx7k2");
        assert_eq!(json["kubevirt"]["namespace"], "valid-namespace");
        assert_eq!(
            json["kubevirt"]["labels"]["tenantcluster-test-cluster-bx7k2-machine.openshift.io"],
            "owned"
        );
    }

    #[test]
    fn none_platform_has_no_kubevirt_section() {
        let metadata = generate(testing::none_config());
        assert!(metadata.metadata.kubevirt.is_none());
    }

    #[test]
    fn read_from_dir() {
        let temp = TempDir::new().unwrap();
        let err = read_metadata(temp.path()).unwrap_err();
        assert!(matches!(err, KvinstallError::MetadataMissing(_)));

        let metadata = generate(testing::kubevirt_config());
        std::fs::write(temp.path().join(METADATA_FILENAME), &metadata.files()[0].data).unwrap();
        assert_eq!(read_metadata(temp.path()).unwrap(), metadata.metadata);
    }
}
