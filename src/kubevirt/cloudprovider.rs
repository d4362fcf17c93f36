//! KubeVirt cloud provider configuration

use crate::error::KvinstallResult;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;

/// Cloud provider settings for a tenant cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudProviderConfig {
    /// Infra cluster namespace holding the tenant resources
    pub namespace: String,
    #[serde(rename = "infraID")]
    pub infra_id: String,
}

impl CloudProviderConfig {
    /// Tab-indented JSON with a trailing newline
    pub fn json(&self) -> KvinstallResult<String> {
        let mut buf = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"\t"));
        self.serialize(&mut ser)?;
        buf.push(b'\n');
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
