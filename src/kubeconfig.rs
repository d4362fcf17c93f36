//! Kubeconfig assets for the admin user, the kubelet and the loopback client

use crate::asset::{Asset, AssetFile, AssetKind, FileFetcher, Parents};
use crate::error::{KvinstallError, KvinstallResult};
use crate::installconfig::InstallConfigAsset;
use crate::tls::{self, TlsAsset};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Minimal kubeconfig document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Kubeconfig {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub clusters: Vec<NamedCluster>,
    pub contexts: Vec<NamedContext>,
    pub current_context: String,
    #[serde(default)]
    pub preferences: Preferences,
    pub users: Vec<NamedUser>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: Cluster,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Cluster {
    pub certificate_authority_data: String,
    pub server: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedContext {
    pub name: String,
    pub context: Context,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub cluster: String,
    pub user: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedUser {
    pub name: String,
    pub user: AuthInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AuthInfo {
    pub client_certificate_data: String,
    pub client_key_data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    External,
    Internal,
    Loopback,
}

struct KubeconfigSpec {
    filename: &'static str,
    user: &'static str,
    endpoint: Endpoint,
    client: AssetKind,
    ca: AssetKind,
}

fn spec_for(kind: AssetKind) -> Option<KubeconfigSpec> {
    let spec = match kind {
        AssetKind::KubeconfigAdminClient => KubeconfigSpec {
            filename: "auth/kubeconfig",
            user: "admin",
            endpoint: Endpoint::External,
            client: AssetKind::AdminKubeConfigClient,
            ca: AssetKind::KubeApiserverCompleteServerCaBundle,
        },
        AssetKind::KubeconfigAdminInternalClient => KubeconfigSpec {
            filename: "auth/kubeconfig-admin-internal",
            user: "admin",
            endpoint: Endpoint::Internal,
            client: AssetKind::AdminKubeConfigClient,
            ca: AssetKind::KubeApiserverCompleteServerCaBundle,
        },
        AssetKind::KubeconfigKubelet => KubeconfigSpec {
            filename: "auth/kubeconfig-kubelet",
            user: "kubelet",
            endpoint: Endpoint::Internal,
            client: AssetKind::KubeletClient,
            ca: AssetKind::KubeApiserverCompleteServerCaBundle,
        },
        AssetKind::KubeconfigLoopback => KubeconfigSpec {
            filename: "auth/kubeconfig-loopback",
            user: "loopback",
            endpoint: Endpoint::Loopback,
            client: AssetKind::AdminKubeConfigClient,
            ca: AssetKind::KubeApiserverLocalhostSigner,
        },
        _ => return None,
    };
    Some(spec)
}

/// Build a kubeconfig for one cluster, one user and one context
pub fn kubeconfig(
    cluster_name: &str,
    server: &str,
    user: &str,
    ca_pem: &str,
    cert_pem: &str,
    key_pem: &str,
) -> Kubeconfig {
    Kubeconfig {
        api_version: "v1".to_string(),
        kind: "Config".to_string(),
        clusters: vec![NamedCluster {
            name: cluster_name.to_string(),
            cluster: Cluster {
                certificate_authority_data: STANDARD.encode(ca_pem),
                server: server.to_string(),
            },
        }],
        contexts: vec![NamedContext {
            name: user.to_string(),
            context: Context {
                cluster: cluster_name.to_string(),
                user: user.to_string(),
            },
        }],
        current_context: user.to_string(),
        preferences: Preferences::default(),
        users: vec![NamedUser {
            name: user.to_string(),
            user: AuthInfo {
                client_certificate_data: STANDARD.encode(cert_pem),
                client_key_data: STANDARD.encode(key_pem),
            },
        }],
    }
}

/// One of the four kubeconfig kinds
pub struct KubeconfigAsset {
    kind: AssetKind,
    config: Option<Kubeconfig>,
    file: Option<AssetFile>,
}

impl KubeconfigAsset {
    pub fn new(kind: AssetKind) -> Self {
        Self {
            kind,
            config: None,
            file: None,
        }
    }

    pub fn boxed(kind: AssetKind) -> Box<dyn Asset> {
        Box::new(Self::new(kind))
    }

    pub fn config(&self) -> Option<&Kubeconfig> {
        self.config.as_ref()
    }

    fn spec(&self) -> KvinstallResult<KubeconfigSpec> {
        spec_for(self.kind)
            .ok_or_else(|| KvinstallError::Internal(format!("{} is not a kubeconfig", self.kind)))
    }
}

impl Asset for KubeconfigAsset {
    fn kind(&self) -> AssetKind {
        self.kind
    }

    fn dependencies(&self) -> Vec<Box<dyn Asset>> {
        match spec_for(self.kind) {
            Some(spec) => vec![
                TlsAsset::boxed(spec.client),
                TlsAsset::boxed(spec.ca),
                Box::new(InstallConfigAsset::default()),
            ],
            None => Vec::new(),
        }
    }

    fn generate(&mut self, parents: &Parents) -> KvinstallResult<()> {
        let spec = self.spec()?;
        let install_config = parents.get::<InstallConfigAsset>()?.config()?;
        let client = tls::material(parents, spec.client)?;
        let ca = tls::material(parents, spec.ca)?;

        let server = match spec.endpoint {
            Endpoint::External => format!("https://api.{}:6443", install_config.cluster_domain()),
            Endpoint::Internal => format!("https://api-int.{}:6443", install_config.cluster_domain()),
            Endpoint::Loopback => "https://localhost:6443".to_string(),
        };

        let config = kubeconfig(
            &install_config.metadata.name,
            &server,
            spec.user,
            &ca.cert_pem,
            &client.cert_pem,
            &client.key_pem,
        );
        let data = serde_yaml_ng::to_string(&config)?;

        self.file = Some(AssetFile::new(spec.filename, data));
        self.config = Some(config);
        Ok(())
    }

    fn files(&self) -> Vec<&AssetFile> {
        self.file.iter().collect()
    }

    fn load(&mut self, fetcher: &dyn FileFetcher) -> KvinstallResult<bool> {
        let spec = self.spec()?;
        let Some(file) = fetcher.fetch_by_name(spec.filename)? else {
            return Ok(false);
        };

        let config: Kubeconfig =
            serde_yaml_ng::from_slice(&file.data).map_err(|e| KvinstallError::AssetLoad {
                asset: self.kind.name().to_string(),
                filename: spec.filename.to_string(),
                reason: e.to_string(),
            })?;

        debug!("Loaded {} from {}", self.kind, spec.filename);
        self.config = Some(config);
        self.file = Some(file);
        Ok(true)
    }
}
