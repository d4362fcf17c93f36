//! KubeVirt checks against the live infra cluster

use crate::error::{KvinstallError, KvinstallResult};
use crate::installconfig::cidr::Cidr;
use crate::installconfig::types::{InstallConfig, MachineNetworkEntry};
use crate::installconfig::validation::{ErrorList, FieldPath, InfraCheck, ValidationError};
use crate::kubevirt::client::InfraClient;
use crate::kubevirt::platform::{validate_platform, Platform};
use std::net::IpAddr;
use tracing::debug;

/// Validate the KubeVirt platform: structural checks first, then the infra
/// cluster checks. Every failure is collected.
///
/// A missing platform section is reported on its own.
pub async fn validate<F>(config: &InstallConfig, client_builder: F) -> Result<(), ErrorList>
where
    F: FnOnce() -> KvinstallResult<Box<dyn InfraClient>>,
{
    let path = FieldPath::new("platform").child("kubevirt");

    let Some(platform) = config.platform.kubevirt.as_ref() else {
        return Err(ValidationError::required(
            path,
            "validation requires a Engine platform configuration",
        )
        .into());
    };

    validate_with_client(platform, &config.networking.machine_network, client_builder, &path)
        .await
        .into_result()
}

async fn validate_with_client<F>(
    platform: &Platform,
    machine_network: &[MachineNetworkEntry],
    client_builder: F,
    path: &FieldPath,
) -> ErrorList
where
    F: FnOnce() -> KvinstallResult<Box<dyn InfraClient>>,
{
    let mut errors = validate_platform(platform, path);

    let (client, reach_errors) = infra_cluster_reachable(client_builder, path).await;
    errors.extend(reach_errors);

    if let Some(client) = client {
        let namespace_errors = namespace_exists(client.as_ref(), &platform.namespace, path).await;
        let namespace_ok = namespace_errors.is_empty();
        errors.extend(namespace_errors);

        errors.extend(storage_class_exists(client.as_ref(), &platform.storage_class, path).await);

        if namespace_ok {
            errors.extend(
                network_attachment_definition_exists(
                    client.as_ref(),
                    &platform.network_name,
                    &platform.namespace,
                    path,
                )
                .await,
            );
        }
    }

    errors.extend(ips_in_machine_network(
        machine_network,
        &platform.api_vip,
        &platform.ingress_vip,
        path,
    ));

    debug!("KubeVirt validation finished with {} error(s)", errors.len());
    errors
}

async fn infra_cluster_reachable<F>(
    client_builder: F,
    path: &FieldPath,
) -> (Option<Box<dyn InfraClient>>, ErrorList)
where
    F: FnOnce() -> KvinstallResult<Box<dyn InfraClient>>,
{
    let unreachable = |detail: String| {
        ErrorList::from(ValidationError::infra(
            path,
            InfraCheck::InfraClusterReachable,
            "InfraCluster",
            detail,
        ))
    };

    let client = match client_builder() {
        Ok(client) => client,
        Err(e) => {
            return (
                None,
                unreachable(format!("failed to create InfraCluster client with error: {}", e)),
            )
        }
    };

    if let Err(e) = client.list_namespaces().await {
        return (
            None,
            unreachable(format!("failed to access to InfraCluster with error: {}", e)),
        );
    }

    (Some(client), ErrorList::new())
}

async fn namespace_exists(client: &dyn InfraClient, name: &str, path: &FieldPath) -> ErrorList {
    match client.get_namespace(name).await {
        Ok(()) => ErrorList::new(),
        Err(e) => ValidationError::infra(
            path,
            InfraCheck::NamespaceExistsInInfraCluster,
            name,
            format!("failed to get namespace {} from InfraCluster, with error: {}", name, e),
        )
        .into(),
    }
}

async fn storage_class_exists(client: &dyn InfraClient, name: &str, path: &FieldPath) -> ErrorList {
    match client.get_storage_class(name).await {
        Ok(()) => ErrorList::new(),
        Err(e) => ValidationError::infra(
            path,
            InfraCheck::StorageClassExistsInInfraCluster,
            name,
            format!("failed to get storageClass {} from InfraCluster, with error: {}", name, e),
        )
        .into(),
    }
}

async fn network_attachment_definition_exists(
    client: &dyn InfraClient,
    name: &str,
    namespace: &str,
    path: &FieldPath,
) -> ErrorList {
    match client.get_network_attachment_definition(name, namespace).await {
        Ok(()) => ErrorList::new(),
        Err(e) => ValidationError::infra(
            path,
            InfraCheck::NetworkAttachmentDefinitionExistsInInfraCluster,
            name,
            format!(
                "failed to get network-attachment-definition {} from InfraCluster, with error: {}",
                name, e
            ),
        )
        .into(),
    }
}

fn ips_in_machine_network(
    machine_network: &[MachineNetworkEntry],
    api_vip: &str,
    ingress_vip: &str,
    path: &FieldPath,
) -> ErrorList {
    let mut errors = ErrorList::new();
    for (label, vip) in [("apiVIP", api_vip), ("ingressVIP", ingress_vip)] {
        if let Err(e) = assert_ip_in_machine_network(machine_network, vip) {
            let reason = match e {
                KvinstallError::Network { reason, .. } => reason,
                other => other.to_string(),
            };
            errors.push(ValidationError::infra(
                path,
                InfraCheck::IpsInCidr,
                vip,
                format!(
                    "validation of {} {} in cider {} failed, with error: {}",
                    label,
                    vip,
                    format_entries(machine_network),
                    reason
                ),
            ));
        }
    }
    errors
}

/// Check `ip` against the machine network.
///
/// Only the first entry is consulted: an IP outside it is rejected even
/// when a later entry contains it. An empty list accepts any valid IP.
pub fn assert_ip_in_machine_network(
    machine_network: &[MachineNetworkEntry],
    ip: &str,
) -> KvinstallResult<()> {
    let addr: IpAddr = ip.parse().map_err(|_| KvinstallError::Network {
        value: ip.to_string(),
        reason: format!("ip {} is not valid IP address", ip),
    })?;

    let Some(first) = machine_network.first() else {
        return Ok(());
    };

    let contains = first
        .cidr
        .parse::<Cidr>()
        .map(|cidr| cidr.contains(addr))
        .unwrap_or(false);
    if contains {
        Ok(())
    } else {
        Err(KvinstallError::Network {
            value: ip.to_string(),
            reason: format!(
                "ip {} not in machineNetworkEntryList {}",
                ip,
                format_entries(machine_network)
            ),
        })
    }
}

/// `[{10.0.0.0/16} {192.168.0.0/24}]`
fn format_entries(entries: &[MachineNetworkEntry]) -> String {
    let inner: Vec<String> = entries.iter().map(|e| format!("{{{}}}", e.cidr)).collect();
    format!("[{}]", inner.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installconfig::testing;
    use crate::kubevirt::client::MockInfraClient;
    use mockall::predicate::eq;

    fn test_error() -> KvinstallError {
        KvinstallError::User("test".to_string())
    }

    /// Mock that answers every check successfully unless overridden
    fn healthy() -> MockInfraClient {
        let mut client = MockInfraClient::new();
        client.expect_list_namespaces().returning(|| Ok(vec![]));
        client
    }

    fn boxed(client: MockInfraClient) -> impl FnOnce() -> KvinstallResult<Box<dyn InfraClient>> {
        move || Ok(Box::new(client) as Box<dyn InfraClient>)
    }

    fn message(result: Result<(), ErrorList>) -> String {
        result.unwrap_err().to_string()
    }

    #[tokio::test]
    async fn valid_config_passes() {
        let mut client = healthy();
        client
            .expect_get_namespace()
            .with(eq("valid-namespace"))
            .returning(|_| Ok(()));
        client
            .expect_get_storage_class()
            .with(eq("valid-storage-class"))
            .returning(|_| Ok(()));
        client
            .expect_get_network_attachment_definition()
            .with(eq("valid-network-name"), eq("valid-namespace"))
            .returning(|_, _| Ok(()));

        let result = validate(&testing::kubevirt_config(), boxed(client)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn missing_platform_is_a_single_error() {
        let config = testing::none_config();
        let result = validate(&config, || Err(test_error())).await;
        assert_eq!(
            message(result),
            "platform.kubevirt: Required value: validation requires a Engine platform configuration"
        );
    }

    #[tokio::test]
    async fn client_builder_error() {
        let result = validate(&testing::kubevirt_config(), || Err(test_error())).await;
        assert_eq!(
            message(result),
            "platform.kubevirt.InfraClusterReachable: Invalid value: \"InfraCluster\": failed to create InfraCluster client with error: test"
        );
    }

    #[tokio::test]
    async fn unreachable_cluster_skips_client_checks() {
        let mut client = MockInfraClient::new();
        client
            .expect_list_namespaces()
            .times(1)
            .returning(|| Err(KvinstallError::User("test".to_string())));
        client.expect_get_namespace().times(0);
        client.expect_get_storage_class().times(0);

        let result = validate(&testing::kubevirt_config(), boxed(client)).await;
        assert_eq!(
            message(result),
            "platform.kubevirt.InfraClusterReachable: Invalid value: \"InfraCluster\": failed to access to InfraCluster with error: test"
        );
    }

    #[tokio::test]
    async fn invalid_namespace_skips_network_attachment_check() {
        let mut config = testing::kubevirt_config();
        if let Some(kubevirt) = config.platform.kubevirt.as_mut() {
            kubevirt.namespace = "invalid-namespace".to_string();
        }

        let mut client = healthy();
        client
            .expect_get_namespace()
            .with(eq("invalid-namespace"))
            .returning(|_| Err(KvinstallError::User("test".to_string())));
        client.expect_get_storage_class().returning(|_| Ok(()));
        client.expect_get_network_attachment_definition().times(0);

        let result = validate(&config, boxed(client)).await;
        assert_eq!(
            message(result),
            "platform.kubevirt.NamespaceExistsInInfraCluster: Invalid value: \"invalid-namespace\": failed to get namespace invalid-namespace from InfraCluster, with error: test"
        );
    }

    #[tokio::test]
    async fn namespace_and_storage_class_errors_aggregate() {
        let mut config = testing::kubevirt_config();
        if let Some(kubevirt) = config.platform.kubevirt.as_mut() {
            kubevirt.namespace = "invalid-namespace".to_string();
            kubevirt.storage_class = "invalid-storage-class".to_string();
        }

        let mut client = healthy();
        client
            .expect_get_namespace()
            .returning(|_| Err(KvinstallError::User("test".to_string())));
        client
            .expect_get_storage_class()
            .returning(|_| Err(KvinstallError::User("test".to_string())));

        let errors = validate(&config, boxed(client)).await.unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.has_check(InfraCheck::NamespaceExistsInInfraCluster));
        assert!(errors.has_check(InfraCheck::StorageClassExistsInInfraCluster));
        let text = errors.to_string();
        assert!(text.starts_with('['));
        assert!(text.contains("failed to get storageClass invalid-storage-class from InfraCluster"));
    }

    #[tokio::test]
    async fn invalid_storage_class() {
        let mut config = testing::kubevirt_config();
        if let Some(kubevirt) = config.platform.kubevirt.as_mut() {
            kubevirt.storage_class = "invalid-storage-class".to_string();
        }

        let mut client = healthy();
        client.expect_get_namespace().returning(|_| Ok(()));
        client
            .expect_get_network_attachment_definition()
            .returning(|_, _| Ok(()));
        client
            .expect_get_storage_class()
            .with(eq("invalid-storage-class"))
            .returning(|_| Err(KvinstallError::User("test".to_string())));

        let result = validate(&config, boxed(client)).await;
        assert_eq!(
            message(result),
            "platform.kubevirt.StorageClassExistsInInfraCluster: Invalid value: \"invalid-storage-class\": failed to get storageClass invalid-storage-class from InfraCluster, with error: test"
        );
    }

    #[tokio::test]
    async fn invalid_network_name() {
        let mut config = testing::kubevirt_config();
        if let Some(kubevirt) = config.platform.kubevirt.as_mut() {
            kubevirt.network_name = "invalid-network-name".to_string();
        }

        let mut client = healthy();
        client.expect_get_namespace().returning(|_| Ok(()));
        client.expect_get_storage_class().returning(|_| Ok(()));
        client
            .expect_get_network_attachment_definition()
            .with(eq("invalid-network-name"), eq("valid-namespace"))
            .returning(|_, _| Err(KvinstallError::User("test".to_string())));

        let result = validate(&config, boxed(client)).await;
        assert_eq!(
            message(result),
            "platform.kubevirt.NetworkAttachmentDefinitionExistsInInfraCluster: Invalid value: \"invalid-network-name\": failed to get network-attachment-definition invalid-network-name from InfraCluster, with error: test"
        );
    }

    #[tokio::test]
    async fn invalid_api_vip_reports_structural_and_cidr_errors() {
        let mut config = testing::kubevirt_config();
        if let Some(kubevirt) = config.platform.kubevirt.as_mut() {
            kubevirt.api_vip = "invalid-api-vip".to_string();
        }

        let mut client = healthy();
        client.expect_get_namespace().returning(|_| Ok(()));
        client.expect_get_storage_class().returning(|_| Ok(()));
        client
            .expect_get_network_attachment_definition()
            .returning(|_, _| Ok(()));

        let text = message(validate(&config, boxed(client)).await);
        assert!(text.contains(
            "platform.kubevirt.APIVIP: Invalid value: \"invalid-api-vip\": \"invalid-api-vip\" is not a valid IP"
        ));
        assert!(text.contains("ip invalid-api-vip is not valid IP address"));
    }

    #[tokio::test]
    async fn vips_outside_machine_network() {
        let mut config = testing::kubevirt_config();
        config.networking.machine_network[0].cidr = "10.0.0.0/16".to_string();

        let mut client = healthy();
        client.expect_get_namespace().returning(|_| Ok(()));
        client.expect_get_storage_class().returning(|_| Ok(()));
        client
            .expect_get_network_attachment_definition()
            .returning(|_, _| Ok(()));

        let errors = validate(&config, boxed(client)).await.unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.has_check(InfraCheck::IpsInCidr));
        let text = errors.to_string();
        assert!(text.contains(
            "validation of apiVIP 192.168.123.15 in cider [{10.0.0.0/16}] failed, with error: ip 192.168.123.15 not in machineNetworkEntryList [{10.0.0.0/16}]"
        ));
    }

    fn entries(cidrs: &[&str]) -> Vec<MachineNetworkEntry> {
        cidrs
            .iter()
            .map(|c| MachineNetworkEntry {
                cidr: c.to_string(),
            })
            .collect()
    }

    #[test]
    fn ip_in_first_entry_is_accepted() {
        assert!(assert_ip_in_machine_network(&entries(&["192.168.123.0/24"]), "192.168.123.15").is_ok());
    }

    #[test]
    fn empty_machine_network_accepts_any_ip() {
        assert!(assert_ip_in_machine_network(&[], "192.168.123.15").is_ok());
    }

    #[test]
    fn invalid_ip_is_rejected() {
        let err = assert_ip_in_machine_network(&entries(&["192.168.123.0/24"]), "nope").unwrap_err();
        assert!(err.to_string().contains("ip nope is not valid IP address"));
    }

    #[test]
    fn only_first_entry_is_consulted() {
        let list = entries(&["10.0.0.0/16", "192.168.123.0/24"]);
        let err = assert_ip_in_machine_network(&list, "192.168.123.15").unwrap_err();
        assert!(err
            .to_string()
            .contains("not in machineNetworkEntryList [{10.0.0.0/16} {192.168.123.0/24}]"));
    }
}
