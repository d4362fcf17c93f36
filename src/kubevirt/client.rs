//! Infra cluster access used by validation and destroy

use crate::error::KvinstallResult;
use async_trait::async_trait;
use std::collections::BTreeMap;

#[cfg(test)]
use mockall::automock;

/// Label selector as key/value pairs
pub type Labels = BTreeMap<String, String>;

/// Operations the installer needs from the infra cluster
///
/// Getters return `Ok(())` when the object exists and an error otherwise.
/// Deletes with `wait` block until the object is gone.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InfraClient: Send + Sync {
    async fn list_namespaces(&self) -> KvinstallResult<Vec<String>>;

    async fn get_namespace(&self, name: &str) -> KvinstallResult<()>;

    async fn get_storage_class(&self, name: &str) -> KvinstallResult<()>;

    async fn get_network_attachment_definition(
        &self,
        name: &str,
        namespace: &str,
    ) -> KvinstallResult<()>;

    async fn list_virtual_machine_names(
        &self,
        namespace: &str,
        labels: &Labels,
    ) -> KvinstallResult<Vec<String>>;

    async fn delete_virtual_machine(
        &self,
        namespace: &str,
        name: &str,
        wait: bool,
    ) -> KvinstallResult<()>;

    async fn list_data_volume_names(
        &self,
        namespace: &str,
        labels: &Labels,
    ) -> KvinstallResult<Vec<String>>;

    async fn delete_data_volume(&self, namespace: &str, name: &str, wait: bool)
        -> KvinstallResult<()>;

    async fn list_secret_names(
        &self,
        namespace: &str,
        labels: &Labels,
    ) -> KvinstallResult<Vec<String>>;

    async fn delete_secret(&self, namespace: &str, name: &str, wait: bool) -> KvinstallResult<()>;
}
