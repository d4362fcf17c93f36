//! Field-level validation errors and install config checks
//!
//! Errors render in the Kubernetes field error format so messages match
//! what cluster tooling prints, e.g.
//! `platform.kubevirt.APIVIP: Invalid value: "x": "x" is not a valid IP`.

use crate::installconfig::cidr::Cidr;
use crate::installconfig::types::InstallConfig;
use crate::kubevirt::platform::{validate_ip, validate_platform as validate_kubevirt};
use std::collections::HashSet;
use std::fmt;

/// Dotted path to the offending field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new(root: &str) -> Self {
        Self(vec![root.to_string()])
    }

    pub fn child(&self, name: &str) -> Self {
        let mut parts = self.0.clone();
        parts.push(name.to_string());
        Self(parts)
    }

    pub fn index(&self, i: usize) -> Self {
        let mut parts = self.0.clone();
        if let Some(last) = parts.last_mut() {
            last.push_str(&format!("[{}]", i));
        }
        Self(parts)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Required,
    Invalid,
    NotSupported,
}

/// Infra cluster check that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfraCheck {
    InfraClusterReachable,
    NamespaceExistsInInfraCluster,
    StorageClassExistsInInfraCluster,
    NetworkAttachmentDefinitionExistsInInfraCluster,
    IpsInCidr,
}

impl InfraCheck {
    /// Field path segment used for the check
    pub fn field(&self) -> &'static str {
        match self {
            Self::InfraClusterReachable => "InfraClusterReachable",
            Self::NamespaceExistsInInfraCluster => "NamespaceExistsInInfraCluster",
            Self::StorageClassExistsInInfraCluster => "StorageClassExistsInInfraCluster",
            Self::NetworkAttachmentDefinitionExistsInInfraCluster => {
                "NetworkAttachmentDefinitionExistsInInfraCluster"
            }
            Self::IpsInCidr => "IPsInCIDR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub path: FieldPath,
    pub kind: ErrorKind,
    pub value: Option<String>,
    pub detail: String,
    pub check: Option<InfraCheck>,
}

impl ValidationError {
    pub fn required(path: FieldPath, detail: impl Into<String>) -> Self {
        Self {
            path,
            kind: ErrorKind::Required,
            value: None,
            detail: detail.into(),
            check: None,
        }
    }

    pub fn invalid(path: FieldPath, value: &str, detail: impl Into<String>) -> Self {
        Self {
            path,
            kind: ErrorKind::Invalid,
            value: Some(value.to_string()),
            detail: detail.into(),
            check: None,
        }
    }

    pub fn not_supported(path: FieldPath, value: &str, supported: &[&str]) -> Self {
        let quoted: Vec<String> = supported.iter().map(|s| format!("{:?}", s)).collect();
        Self {
            path,
            kind: ErrorKind::NotSupported,
            value: Some(value.to_string()),
            detail: format!("supported values: {}", quoted.join(", ")),
            check: None,
        }
    }

    /// Failure of an infra cluster check, reported under `<path>.<check>`
    pub fn infra(path: &FieldPath, check: InfraCheck, value: &str, detail: impl Into<String>) -> Self {
        Self {
            check: Some(check),
            ..Self::invalid(path.child(check.field()), value, detail)
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, &self.value) {
            (ErrorKind::Required, _) => write!(f, "{}: Required value: {}", self.path, self.detail),
            (ErrorKind::Invalid, Some(value)) => write!(
                f,
                "{}: Invalid value: {:?}: {}",
                self.path, value, self.detail
            ),
            (ErrorKind::NotSupported, Some(value)) => write!(
                f,
                "{}: Unsupported value: {:?}: {}",
                self.path, value, self.detail
            ),
            (_, None) => write!(f, "{}: {}", self.path, self.detail),
        }
    }
}

/// Aggregated validation errors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorList(Vec<ValidationError>);

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.0.push(error);
    }

    pub fn extend(&mut self, other: ErrorList) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn has_check(&self, check: InfraCheck) -> bool {
        self.0.iter().any(|e| e.check == Some(check))
    }

    /// `Ok(())` when empty
    pub fn into_result(self) -> Result<(), ErrorList> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<ValidationError> for ErrorList {
    fn from(error: ValidationError) -> Self {
        Self(vec![error])
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut seen = HashSet::new();
        let messages: Vec<String> = self
            .0
            .iter()
            .map(ToString::to_string)
            .filter(|m| seen.insert(m.clone()))
            .collect();

        match messages.as_slice() {
            [] => Ok(()),
            [only] => f.write_str(only),
            many => write!(f, "[{}]", many.join(", ")),
        }
    }
}

impl std::error::Error for ErrorList {}

const SUPPORTED_NETWORK_TYPES: &[&str] = &["OpenShiftSDN", "OVNKubernetes"];

/// Structural validation of a defaulted install config
pub fn validate_install_config(config: &InstallConfig) -> ErrorList {
    let mut errors = ErrorList::new();

    if config.metadata.name.is_empty() {
        errors.push(ValidationError::required(
            FieldPath::new("metadata").child("name"),
            "cluster name required",
        ));
    } else if !is_dns_label(&config.metadata.name) {
        errors.push(ValidationError::invalid(
            FieldPath::new("metadata").child("name"),
            &config.metadata.name,
            "cluster name must consist of lower case alphanumeric characters or '-', start and end with an alphanumeric character",
        ));
    }

    if config.base_domain.is_empty() {
        errors.push(ValidationError::required(
            FieldPath::new("baseDomain"),
            "base domain required",
        ));
    }

    if let Err(detail) = validate_pull_secret(&config.pull_secret) {
        errors.push(ValidationError::invalid(
            FieldPath::new("pullSecret"),
            "<redacted>",
            detail,
        ));
    }

    if !config.ssh_key.is_empty() && !is_ssh_public_key(&config.ssh_key) {
        errors.push(ValidationError::invalid(
            FieldPath::new("sshKey"),
            &config.ssh_key,
            "invalid SSH public key",
        ));
    }

    errors.extend(validate_networking(config));

    if let Some(control_plane) = &config.control_plane {
        if control_plane.replicas.unwrap_or(0) < 1 {
            errors.push(ValidationError::invalid(
                FieldPath::new("controlPlane").child("replicas"),
                &control_plane.replicas.unwrap_or(0).to_string(),
                "number of control plane replicas must be positive",
            ));
        }
    }

    for (i, pool) in config.compute.iter().enumerate() {
        if pool.replicas.unwrap_or(0) < 0 {
            errors.push(ValidationError::invalid(
                FieldPath::new("compute").index(i).child("replicas"),
                &pool.replicas.unwrap_or(0).to_string(),
                "number of replicas must not be negative",
            ));
        }
    }

    if let Some(proxy) = &config.proxy {
        let path = FieldPath::new("proxy");
        for (field, value) in [("httpProxy", &proxy.http_proxy), ("httpsProxy", &proxy.https_proxy)] {
            if !value.is_empty() && !value.starts_with("http://") && !value.starts_with("https://") {
                errors.push(ValidationError::invalid(
                    path.child(field),
                    value,
                    "proxy URL must use the http or https scheme",
                ));
            }
        }
    }

    for (i, source) in config.image_content_sources.iter().enumerate() {
        if source.source.is_empty() {
            errors.push(ValidationError::required(
                FieldPath::new("imageContentSources").index(i).child("source"),
                "source is required",
            ));
        }
    }

    errors.extend(validate_platform(config));
    errors
}

fn validate_networking(config: &InstallConfig) -> ErrorList {
    let mut errors = ErrorList::new();
    let path = FieldPath::new("networking");
    let networking = &config.networking;

    if !networking.network_type.is_empty()
        && !SUPPORTED_NETWORK_TYPES.contains(&networking.network_type.as_str())
    {
        errors.push(ValidationError::not_supported(
            path.child("networkType"),
            &networking.network_type,
            SUPPORTED_NETWORK_TYPES,
        ));
    }

    for (i, entry) in networking.machine_network.iter().enumerate() {
        if let Err(e) = Cidr::parse(&entry.cidr) {
            errors.push(ValidationError::invalid(
                path.child("machineNetwork").index(i).child("cidr"),
                &entry.cidr,
                e.to_string(),
            ));
        }
    }

    for (i, entry) in networking.cluster_network.iter().enumerate() {
        let entry_path = path.child("clusterNetwork").index(i);
        match Cidr::parse(&entry.cidr) {
            Ok(cidr) if entry.host_prefix < cidr.prefix() => {
                errors.push(ValidationError::invalid(
                    entry_path.child("hostPrefix"),
                    &entry.host_prefix.to_string(),
                    "cluster network host subnetwork prefix must not be larger size than CIDR",
                ));
            }
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::invalid(
                entry_path.child("cidr"),
                &entry.cidr,
                e.to_string(),
            )),
        }
    }

    if networking.service_network.len() > 1 {
        errors.push(ValidationError::invalid(
            path.child("serviceNetwork"),
            &networking.service_network.join(","),
            "only one service network can be specified",
        ));
    }
    for (i, cidr) in networking.service_network.iter().enumerate() {
        if let Err(e) = Cidr::parse(cidr) {
            errors.push(ValidationError::invalid(
                path.child("serviceNetwork").index(i),
                cidr,
                e.to_string(),
            ));
        }
    }

    errors
}

fn validate_platform(config: &InstallConfig) -> ErrorList {
    let mut errors = ErrorList::new();
    let path = FieldPath::new("platform");

    match config.platform.configured().as_slice() {
        [] => errors.push(ValidationError::required(
            path.clone(),
            "must specify one of the platforms (baremetal, kubevirt, none)",
        )),
        [_] => {}
        [first, second, ..] => errors.push(ValidationError::invalid(
            path.clone(),
            first,
            format!(
                "must only specify a single type of platform; cannot use both {:?} and {:?}",
                first, second
            ),
        )),
    }

    if let Some(kubevirt) = &config.platform.kubevirt {
        errors.extend(validate_kubevirt(kubevirt, &path.child("kubevirt")));
    }

    if let Some(baremetal) = &config.platform.baremetal {
        let bm_path = path.child("baremetal");
        for (field, value) in [
            ("apiVIP", &baremetal.api_vip),
            ("ingressVIP", &baremetal.ingress_vip),
            ("bootstrapProvisioningIP", &baremetal.bootstrap_provisioning_ip),
        ] {
            if let Err(detail) = validate_ip(value) {
                errors.push(ValidationError::invalid(bm_path.child(field), value, detail));
            }
        }
    }

    errors
}

fn validate_pull_secret(secret: &str) -> Result<(), String> {
    let value: serde_json::Value =
        serde_json::from_str(secret).map_err(|e| format!("pull secret is not valid JSON: {}", e))?;
    if value.get("auths").map_or(false, |a| a.is_object()) {
        Ok(())
    } else {
        Err("auths required".to_string())
    }
}

fn is_ssh_public_key(key: &str) -> bool {
    key.lines().filter(|l| !l.trim().is_empty()).all(|line| {
        let mut parts = line.split_whitespace();
        matches!(
            (parts.next(), parts.next()),
            (Some(kind), Some(_)) if kind.starts_with("ssh-") || kind.starts_with("ecdsa-")
        )
    })
}

fn is_dns_label(name: &str) -> bool {
    let bytes = name.as_bytes();
    !bytes.is_empty()
        && bytes.len() <= 63
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        && bytes[0] != b'-'
        && bytes[bytes.len() - 1] != b'-'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installconfig::defaults::set_install_config_defaults;
    use crate::installconfig::types::{MachinePool, NonePlatform};
    use crate::kubevirt::platform::Platform as KubevirtPlatform;

    fn valid_config() -> InstallConfig {
        let mut config = InstallConfig {
            base_domain: "example.com".to_string(),
            pull_secret: r#"{"auths":{"quay.io":{"auth":"Zm9vOmJhcg=="}}}"#.to_string(),
            ssh_key: "ssh-ed25519 AAAAC3Nza user@host".to_string(),
            ..Default::default()
        };
        config.metadata.name = "tenant".to_string();
        config.platform.none = Some(NonePlatform {});
        set_install_config_defaults(&mut config);
        config
    }

    #[test]
    fn required_and_invalid_formats() {
        let required = ValidationError::required(
            FieldPath::new("platform").child("kubevirt"),
            "validation requires a Engine platform configuration",
        );
        assert_eq!(
            required.to_string(),
            "platform.kubevirt: Required value: validation requires a Engine platform configuration"
        );

        let infra = ValidationError::infra(
            &FieldPath::new("platform").child("kubevirt"),
            InfraCheck::InfraClusterReachable,
            "InfraCluster",
            "failed to access to InfraCluster with error: test",
        );
        assert_eq!(
            infra.to_string(),
            "platform.kubevirt.InfraClusterReachable: Invalid value: \"InfraCluster\": failed to access to InfraCluster with error: test"
        );
    }

    #[test]
    fn error_list_brackets_only_multiple() {
        let mut list = ErrorList::new();
        list.push(ValidationError::required(FieldPath::new("a"), "x"));
        assert_eq!(list.to_string(), "a: Required value: x");

        list.push(ValidationError::required(FieldPath::new("b"), "y"));
        list.push(ValidationError::required(FieldPath::new("a"), "x"));
        assert_eq!(list.to_string(), "[a: Required value: x, b: Required value: y]");
    }

    #[test]
    fn valid_config_passes() {
        assert!(validate_install_config(&valid_config()).is_empty());
    }

    #[test]
    fn errors_are_aggregated() {
        let mut config = valid_config();
        config.metadata.name = "Bad_Name".to_string();
        config.pull_secret = "not json".to_string();
        config.networking.machine_network[0].cidr = "10.0.0.0/40".to_string();
        config.control_plane = Some(MachinePool {
            name: "master".to_string(),
            replicas: Some(0),
            ..Default::default()
        });

        let errors = validate_install_config(&config);
        assert_eq!(errors.len(), 4);
        let message = errors.to_string();
        assert!(message.contains("metadata.name: Invalid value: \"Bad_Name\""));
        assert!(message.contains("pullSecret: Invalid value: \"<redacted>\""));
        assert!(message.contains("networking.machineNetwork[0].cidr"));
        assert!(message.contains("controlPlane.replicas"));
    }

    #[test]
    fn platform_must_be_unique() {
        let mut config = valid_config();
        config.platform.kubevirt = Some(KubevirtPlatform {
            namespace: "ns".to_string(),
            network_name: "net".to_string(),
            api_vip: "10.0.0.5".to_string(),
            ingress_vip: "10.0.0.6".to_string(),
            ..Default::default()
        });
        let message = validate_install_config(&config).to_string();
        assert!(message.contains("cannot use both \"kubevirt\" and \"none\""));

        config.platform = Default::default();
        let message = validate_install_config(&config).to_string();
        assert!(message.contains("platform: Required value"));
    }

    #[test]
    fn kubevirt_structural_errors_surface() {
        let mut config = valid_config();
        config.platform.none = None;
        config.platform.kubevirt = Some(KubevirtPlatform::default());

        let errors = validate_install_config(&config);
        assert_eq!(errors.len(), 4);
        assert!(errors
            .to_string()
            .contains("platform.kubevirt.Infra Cluster Namespace"));
    }
}
