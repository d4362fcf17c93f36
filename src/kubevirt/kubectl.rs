//! [`InfraClient`] backed by the `kubectl` binary

use crate::config::InfraConfig;
use crate::error::{KvinstallError, KvinstallResult};
use crate::kubevirt::client::{InfraClient, Labels};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

const VIRTUAL_MACHINES: &str = "virtualmachines.kubevirt.io";
const DATA_VOLUMES: &str = "datavolumes.cdi.kubevirt.io";
const NETWORK_ATTACHMENT_DEFINITIONS: &str = "network-attachment-definitions.k8s.cni.cncf.io";

/// Talks to the infra cluster through `kubectl`
pub struct KubectlClient {
    kubectl: String,
    kubeconfig: Option<PathBuf>,
    timeout_secs: u64,
}

impl KubectlClient {
    pub fn new(config: &InfraConfig) -> Self {
        Self {
            kubectl: config.kubectl.clone(),
            kubeconfig: config.kubeconfig.clone(),
            timeout_secs: config.timeout_secs,
        }
    }

    /// Build a client after checking the binary runs
    pub async fn connect(config: &InfraConfig) -> KvinstallResult<Self> {
        let client = Self::new(config);
        let installed = Command::new(&client.kubectl)
            .args(["version", "--client"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false);

        if !installed {
            return Err(KvinstallError::KubectlNotFound(client.kubectl));
        }
        Ok(client)
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = vec![format!("--request-timeout={}s", self.timeout_secs)];
        if let Some(path) = &self.kubeconfig {
            args.push(format!("--kubeconfig={}", path.display()));
        }
        args
    }

    async fn exec(&self, args: &[&str]) -> KvinstallResult<std::process::Output> {
        debug!("Executing: {} {:?}", self.kubectl, args);

        Command::new(&self.kubectl)
            .args(self.base_args())
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| KvinstallError::command_failed(format!("{} {:?}", self.kubectl, args), e))
    }

    /// Run and fail on a non-zero exit, returning stdout
    async fn run(&self, args: &[&str]) -> KvinstallResult<String> {
        let output = self.exec(args).await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(KvinstallError::command_exec(
                format!("{} {}", self.kubectl, args.join(" ")),
                stderr.trim(),
            ))
        }
    }

    async fn list_names(
        &self,
        resource: &str,
        namespace: &str,
        labels: &Labels,
    ) -> KvinstallResult<Vec<String>> {
        let selector = label_selector(labels);
        let mut args = vec!["get", resource, "-n", namespace, "-o", "name"];
        if !selector.is_empty() {
            args.extend(["-l", selector.as_str()]);
        }
        Ok(parse_names(&self.run(&args).await?))
    }

    async fn delete(&self, resource: &str, namespace: &str, name: &str, wait: bool) -> KvinstallResult<()> {
        let wait = format!("--wait={}", wait);
        self.run(&["delete", resource, name, "-n", namespace, &wait])
            .await
            .map(|_| ())
    }
}

/// `k=v,k2=v2`, in key order
fn label_selector(labels: &Labels) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Names from `-o name` output (`kind/name` per line)
fn parse_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| l.rsplit_once('/').map_or(l, |(_, name)| name).to_string())
        .collect()
}

#[async_trait]
impl InfraClient for KubectlClient {
    async fn list_namespaces(&self) -> KvinstallResult<Vec<String>> {
        Ok(parse_names(&self.run(&["get", "namespaces", "-o", "name"]).await?))
    }

    async fn get_namespace(&self, name: &str) -> KvinstallResult<()> {
        self.run(&["get", "namespace", name, "-o", "name"]).await.map(|_| ())
    }

    async fn get_storage_class(&self, name: &str) -> KvinstallResult<()> {
        self.run(&["get", "storageclass", name, "-o", "name"]).await.map(|_| ())
    }

    async fn get_network_attachment_definition(
        &self,
        name: &str,
        namespace: &str,
    ) -> KvinstallResult<()> {
        self.run(&["get", NETWORK_ATTACHMENT_DEFINITIONS, name, "-n", namespace, "-o", "name"])
            .await
            .map(|_| ())
    }

    async fn list_virtual_machine_names(
        &self,
        namespace: &str,
        labels: &Labels,
    ) -> KvinstallResult<Vec<String>> {
        self.list_names(VIRTUAL_MACHINES, namespace, labels).await
    }

    async fn delete_virtual_machine(
        &self,
        namespace: &str,
        name: &str,
        wait: bool,
    ) -> KvinstallResult<()> {
        self.delete(VIRTUAL_MACHINES, namespace, name, wait).await
    }

    async fn list_data_volume_names(
        &self,
        namespace: &str,
        labels: &Labels,
    ) -> KvinstallResult<Vec<String>> {
        self.list_names(DATA_VOLUMES, namespace, labels).await
    }

    async fn delete_data_volume(
        &self,
        namespace: &str,
        name: &str,
        wait: bool,
    ) -> KvinstallResult<()> {
        self.delete(DATA_VOLUMES, namespace, name, wait).await
    }

    async fn list_secret_names(
        &self,
        namespace: &str,
        labels: &Labels,
    ) -> KvinstallResult<Vec<String>> {
        self.list_names("secrets", namespace, labels).await
    }

    async fn delete_secret(&self, namespace: &str, name: &str, wait: bool) -> KvinstallResult<()> {
        self.delete("secrets", namespace, name, wait).await
    }
}
