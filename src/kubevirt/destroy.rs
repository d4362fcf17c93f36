//! Tenant cluster teardown in the infra cluster

use crate::error::{KvinstallError, KvinstallResult};
use crate::kubevirt::client::{InfraClient, Labels};
use crate::metadata::ClusterMetadata;
use tracing::info;

/// Deletes every VM, DataVolume and Secret labelled as owned by the cluster
pub struct ClusterUninstaller<C: InfraClient + ?Sized> {
    namespace: String,
    labels: Labels,
    client: Box<C>,
}

impl<C: InfraClient + ?Sized> ClusterUninstaller<C> {
    pub fn new(metadata: &ClusterMetadata, client: Box<C>) -> KvinstallResult<Self> {
        let kubevirt = metadata.kubevirt.as_ref().ok_or_else(|| {
            KvinstallError::User(format!(
                "cluster {} was not installed on KubeVirt",
                metadata.cluster_name
            ))
        })?;

        Ok(Self {
            namespace: kubevirt.namespace.clone(),
            labels: kubevirt.labels.clone(),
            client,
        })
    }

    /// Delete VMs, then DataVolumes, then Secrets. Stops at the first error.
    pub async fn run(&self) -> KvinstallResult<()> {
        self.delete_all_vms().await?;
        self.delete_all_dvs().await?;
        self.delete_all_secrets().await?;
        Ok(())
    }

    async fn delete_all_vms(&self) -> KvinstallResult<()> {
        let list = self
            .client
            .list_virtual_machine_names(&self.namespace, &self.labels)
            .await?;
        info!(
            "List tenant cluster's VMs (in namespace {}) return: {:?}",
            self.namespace, list
        );
        for name in &list {
            info!("Delete VM {}", name);
            self.client
                .delete_virtual_machine(&self.namespace, name, true)
                .await?;
        }
        Ok(())
    }

    async fn delete_all_dvs(&self) -> KvinstallResult<()> {
        let list = self
            .client
            .list_data_volume_names(&self.namespace, &self.labels)
            .await?;
        info!(
            "List tenant cluster's DVs (in namespace {}) return: {:?}",
            self.namespace, list
        );
        for name in &list {
            info!("Delete DV {}", name);
            self.client
                .delete_data_volume(&self.namespace, name, true)
                .await?;
        }
        Ok(())
    }

    async fn delete_all_secrets(&self) -> KvinstallResult<()> {
        let list = self
            .client
            .list_secret_names(&self.namespace, &self.labels)
            .await?;
        info!(
            "List tenant cluster's secrets (in namespace {}) return: {:?}",
            self.namespace, list
        );
        for name in &list {
            info!("Delete secret {}", name);
            self.client.delete_secret(&self.namespace, name, true).await?;
        }
        Ok(())
    }
}
