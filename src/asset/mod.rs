//! Asset graph
//!
//! Every artifact the installer produces (certificates, kubeconfigs,
//! manifests, Ignition configs) is an [`Asset`]. Assets declare the assets
//! they depend on; the [`store::AssetStore`] orders them with the resolver,
//! loads what already exists on disk, and generates the rest against a
//! [`Parents`] store holding every dependency generated so far.

pub mod fetch;
pub mod parents;
pub mod resolve;
pub mod store;

pub use fetch::{DiskFetcher, FileFetcher};
pub use parents::Parents;
pub use resolve::{resolve, resolve_all};
pub use store::AssetStore;

use crate::error::KvinstallResult;
use std::any::Any;
use std::fmt;

/// Stable identity of an asset type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetKind {
    // Inputs and identifiers
    InstallConfig,
    ClusterId,
    ReleaseImage,
    RhcosImage,
    IronicCreds,

    // Signers
    RootCa,
    AdminKubeConfigSigner,
    AggregatorSigner,
    EtcdSigner,
    EtcdMetricSigner,
    KubeApiserverLocalhostSigner,
    KubeApiserverServiceNetworkSigner,
    KubeApiserverLbSigner,
    KubeApiserverToKubeletSigner,
    KubeControlPlaneSigner,
    KubeletBootstrapKubeconfigSigner,
    KubeletCsrSigner,
    ServiceCaSigner,

    // Signed certificates
    AdminKubeConfigClient,
    AggregatorClient,
    EtcdClient,
    EtcdMetricClient,
    KubeApiserverLocalhostServer,
    KubeApiserverServiceNetworkServer,
    KubeApiserverExternalLbServer,
    KubeApiserverInternalLbServer,
    KubeApiserverToKubeletClient,
    KubeControllerManagerClient,
    KubeSchedulerClient,
    KubeletClient,
    JournalGatewayd,
    MachineConfigServer,

    // Bundles
    AdminKubeConfigCaBundle,
    EtcdCaBundle,
    EtcdMetricCaBundle,
    KubeApiserverCompleteServerCaBundle,
    KubeApiserverCompleteClientCaBundle,
    KubeletBootstrapCaBundle,
    KubeletClientCaBundle,
    ServiceCaBundle,

    // Key pairs
    ServiceAccountKeyPair,
    BoundSaSigningKey,
    BootstrapSshKeyPair,

    // Kubeconfigs
    KubeconfigAdminClient,
    KubeconfigAdminInternalClient,
    KubeconfigKubelet,
    KubeconfigLoopback,

    // Manifests
    Proxy,
    CloudProviderConfig,
    Manifests,
    Master,
    Worker,

    // Ignition configs and cluster metadata
    Bootstrap,
    Aio,
    MasterIgnition,
    WorkerIgnition,
    Metadata,
}

impl AssetKind {
    /// Human-friendly name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Self::InstallConfig => "Install Config",
            Self::ClusterId => "Cluster ID",
            Self::ReleaseImage => "Release Image Pull Spec",
            Self::RhcosImage => "Image",
            Self::IronicCreds => "Ironic Credentials",
            Self::RootCa => "Root CA",
            Self::AdminKubeConfigSigner => "Certificate (admin-kubeconfig-signer)",
            Self::AggregatorSigner => "Certificate (aggregator-signer)",
            Self::EtcdSigner => "Certificate (etcd-signer)",
            Self::EtcdMetricSigner => "Certificate (etcd-metric-signer)",
            Self::KubeApiserverLocalhostSigner => "Certificate (kube-apiserver-localhost-signer)",
            Self::KubeApiserverServiceNetworkSigner => {
                "Certificate (kube-apiserver-service-network-signer)"
            }
            Self::KubeApiserverLbSigner => "Certificate (kube-apiserver-lb-signer)",
            Self::KubeApiserverToKubeletSigner => "Certificate (kube-apiserver-to-kubelet-signer)",
            Self::KubeControlPlaneSigner => "Certificate (kube-control-plane-signer)",
            Self::KubeletBootstrapKubeconfigSigner => {
                "Certificate (kubelet-bootstrap-kubeconfig-signer)"
            }
            Self::KubeletCsrSigner => "Certificate (kubelet-signer)",
            Self::ServiceCaSigner => "Certificate (service-ca-signer)",
            Self::AdminKubeConfigClient => "Certificate (admin-kubeconfig-client)",
            Self::AggregatorClient => "Certificate (aggregator-client)",
            Self::EtcdClient => "Certificate (etcd-client)",
            Self::EtcdMetricClient => "Certificate (etcd-metric-client)",
            Self::KubeApiserverLocalhostServer => "Certificate (kube-apiserver-localhost-server)",
            Self::KubeApiserverServiceNetworkServer => {
                "Certificate (kube-apiserver-service-network-server)"
            }
            Self::KubeApiserverExternalLbServer => {
                "Certificate (kube-apiserver-external-lb-server)"
            }
            Self::KubeApiserverInternalLbServer => {
                "Certificate (kube-apiserver-internal-lb-server)"
            }
            Self::KubeApiserverToKubeletClient => "Certificate (kube-apiserver-to-kubelet-client)",
            Self::KubeControllerManagerClient => {
                "Certificate (kube-control-plane-kube-controller-manager-client)"
            }
            Self::KubeSchedulerClient => "Certificate (kube-control-plane-kube-scheduler-client)",
            Self::KubeletClient => "Certificate (kubelet-client)",
            Self::JournalGatewayd => "Certificate (journal-gatewayd)",
            Self::MachineConfigServer => "Certificate (machine-config-server)",
            Self::AdminKubeConfigCaBundle => "Certificate (admin-kubeconfig-ca-bundle)",
            Self::EtcdCaBundle => "Certificate (etcd-ca-bundle)",
            Self::EtcdMetricCaBundle => "Certificate (etcd-metric-ca-bundle)",
            Self::KubeApiserverCompleteServerCaBundle => {
                "Certificate (kube-apiserver-complete-server-ca-bundle)"
            }
            Self::KubeApiserverCompleteClientCaBundle => {
                "Certificate (kube-apiserver-complete-client-ca-bundle)"
            }
            Self::KubeletBootstrapCaBundle => "Certificate (kubelet-bootstrap-kubeconfig-ca-bundle)",
            Self::KubeletClientCaBundle => "Certificate (kubelet-client-ca-bundle)",
            Self::ServiceCaBundle => "Certificate (service-ca-bundle)",
            Self::ServiceAccountKeyPair => "Key Pair (service-account.pub)",
            Self::BoundSaSigningKey => "Key Pair (bound-service-account-signing-key)",
            Self::BootstrapSshKeyPair => "Bootstrap SSH Key Pair",
            Self::KubeconfigAdminClient => "Kubeconfig Admin Client",
            Self::KubeconfigAdminInternalClient => "Kubeconfig Admin Internal Client",
            Self::KubeconfigKubelet => "Kubeconfig Kubelet",
            Self::KubeconfigLoopback => "Kubeconfig Admin Client (Loopback)",
            Self::Proxy => "Proxy Config",
            Self::CloudProviderConfig => "Cloud Provider Config",
            Self::Manifests => "Common Manifests",
            Self::Master => "Master Machines",
            Self::Worker => "Worker Machines",
            Self::Bootstrap => "Bootstrap Ignition Config",
            Self::Aio => "All-in-one Ignition Config",
            Self::MasterIgnition => "Master Ignition Config",
            Self::WorkerIgnition => "Worker Ignition Config",
            Self::Metadata => "Metadata",
        }
    }

    /// Kinds that are never read back from the asset directory and are
    /// rebuilt from their parents on every run. Regenerating one of them
    /// does not invalidate dependents found on disk.
    pub fn is_derived(&self) -> bool {
        matches!(
            self,
            Self::ReleaseImage
                | Self::RhcosImage
                | Self::IronicCreds
                | Self::Proxy
                | Self::CloudProviderConfig
        )
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One output artifact of an asset, relative to the asset directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFile {
    pub filename: String,
    pub data: Vec<u8>,
}

impl AssetFile {
    pub fn new(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }
}

/// Upcast helper so stored assets can be downcast to their concrete type
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A unit of installer output
///
/// `dependencies` returns fresh, ungenerated instances in declaration order.
/// `generate` runs only after every dependency has been generated or loaded
/// and must leave the asset untouched when it fails.
pub trait Asset: AsAny {
    fn kind(&self) -> AssetKind;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    fn dependencies(&self) -> Vec<Box<dyn Asset>>;

    fn generate(&mut self, parents: &Parents) -> KvinstallResult<()>;

    /// Files this asset writes to the asset directory
    fn files(&self) -> Vec<&AssetFile> {
        Vec::new()
    }

    /// Rehydrate from a previous run. `Ok(false)` means nothing was found;
    /// a file that exists but cannot be parsed is an error.
    fn load(&mut self, _fetcher: &dyn FileFetcher) -> KvinstallResult<bool> {
        Ok(false)
    }
}

impl dyn Asset {
    pub fn downcast_ref<T: Asset>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Asset types with a single static kind, for typed lookups in [`Parents`]
pub trait AssetType: Asset + Sized {
    const KIND: AssetKind;
}

/// Collect the files of a set of parent assets, in order
pub fn parent_files<'a>(
    parents: &'a Parents,
    kinds: &[AssetKind],
) -> KvinstallResult<Vec<&'a AssetFile>> {
    let mut files = Vec::new();
    for kind in kinds {
        files.extend(parents.get_dyn(*kind)?.files());
    }
    Ok(files)
}
