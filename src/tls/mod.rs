//! TLS assets: signers, signed cert/keys, CA bundles and key pairs
//!
//! Every TLS asset is a [`TlsAsset`] whose behaviour comes from the table in
//! [`spec_for`]. Files land under `tls/` in the asset directory and are
//! reloaded from there, so a second run reuses the same CAs.

pub mod pki;

use crate::asset::{Asset, AssetFile, AssetKind, FileFetcher, Parents};
use crate::error::{KvinstallError, KvinstallResult};
use crate::installconfig::cidr::Cidr;
use crate::installconfig::InstallConfigAsset;
use pki::{AltName, CertCfg, CertKey, Usage};
use std::net::{IpAddr, Ipv4Addr};
use time::Duration;
use tracing::debug;

/// Where a signed certificate takes its subject alternative names from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sans {
    None,
    Localhost,
    ServiceNetwork,
    ApiExternal,
    ApiInternal,
}

#[derive(Debug, Clone, Copy)]
enum TlsSpec {
    Signer {
        base: &'static str,
        common_name: &'static str,
        unit: &'static str,
        validity: Duration,
    },
    Signed {
        base: &'static str,
        signer: AssetKind,
        common_name: &'static str,
        unit: Option<&'static str>,
        organization: Option<&'static str>,
        usage: Usage,
        validity: Duration,
        sans: Sans,
    },
    Bundle {
        base: &'static str,
        members: &'static [AssetKind],
    },
    KeyPair {
        base: &'static str,
    },
    SshKeyPair {
        base: &'static str,
    },
}

const fn signer(
    base: &'static str,
    common_name: &'static str,
    unit: &'static str,
    validity: Duration,
) -> TlsSpec {
    TlsSpec::Signer {
        base,
        common_name,
        unit,
        validity,
    }
}

const fn client(
    base: &'static str,
    signer: AssetKind,
    common_name: &'static str,
    organization: &'static str,
    validity: Duration,
) -> TlsSpec {
    TlsSpec::Signed {
        base,
        signer,
        common_name,
        unit: None,
        organization: Some(organization),
        usage: Usage::Client,
        validity,
        sans: Sans::None,
    }
}

const fn server(
    base: &'static str,
    signer: AssetKind,
    common_name: &'static str,
    organization: Option<&'static str>,
    validity: Duration,
    sans: Sans,
) -> TlsSpec {
    TlsSpec::Signed {
        base,
        signer,
        common_name,
        unit: None,
        organization,
        usage: Usage::Server,
        validity,
        sans,
    }
}

fn spec_for(kind: AssetKind) -> Option<TlsSpec> {
    use pki::{VALIDITY_ONE_DAY as DAY, VALIDITY_ONE_YEAR as YEAR, VALIDITY_TEN_YEARS as TEN};
    use AssetKind::*;

    let spec = match kind {
        RootCa => signer("root-ca", "root-ca", "openshift", TEN),
        AdminKubeConfigSigner => signer("admin-kubeconfig-signer", "admin-kubeconfig-signer", "openshift", TEN),
        AggregatorSigner => signer("aggregator-signer", "aggregator-signer", "bootkube", DAY),
        EtcdSigner => signer("etcd-signer", "etcd-signer", "openshift", TEN),
        EtcdMetricSigner => signer("etcd-metric-signer", "etcd-metric-signer", "openshift", TEN),
        KubeApiserverLocalhostSigner => signer(
            "kube-apiserver-localhost-signer",
            "kube-apiserver-localhost-signer",
            "openshift",
            TEN,
        ),
        KubeApiserverServiceNetworkSigner => signer(
            "kube-apiserver-service-network-signer",
            "kube-apiserver-service-network-signer",
            "openshift",
            TEN,
        ),
        KubeApiserverLbSigner => signer("kube-apiserver-lb-signer", "kube-apiserver-lb-signer", "openshift", TEN),
        KubeApiserverToKubeletSigner => signer(
            "kube-apiserver-to-kubelet-signer",
            "kube-apiserver-to-kubelet-signer",
            "openshift",
            YEAR,
        ),
        KubeControlPlaneSigner => signer("kube-control-plane-signer", "kube-control-plane-signer", "openshift", YEAR),
        KubeletBootstrapKubeconfigSigner => signer(
            "kubelet-bootstrap-kubeconfig-signer",
            "kubelet-bootstrap-kubeconfig-signer",
            "openshift",
            TEN,
        ),
        KubeletCsrSigner => signer("kubelet-signer", "kubelet-signer", "openshift", DAY),
        ServiceCaSigner => signer("service-ca-signer", "service-ca-signer", "openshift", TEN),

        AdminKubeConfigClient => client(
            "admin-kubeconfig-client",
            AdminKubeConfigSigner,
            "system:admin",
            "system:masters",
            TEN,
        ),
        AggregatorClient => client(
            "apiserver-proxy",
            AggregatorSigner,
            "system:kube-apiserver-proxy",
            "kube-master",
            DAY,
        ),
        EtcdClient => TlsSpec::Signed {
            base: "etcd-client",
            signer: EtcdSigner,
            common_name: "etcd",
            unit: Some("etcd"),
            organization: Some("etcd"),
            usage: Usage::Client,
            validity: TEN,
            sans: Sans::None,
        },
        EtcdMetricClient => TlsSpec::Signed {
            base: "etcd-metric-client",
            signer: EtcdMetricSigner,
            common_name: "etcd-metric",
            unit: Some("etcd-metric"),
            organization: Some("etcd-metric"),
            usage: Usage::Client,
            validity: TEN,
            sans: Sans::None,
        },
        KubeApiserverLocalhostServer => server(
            "kube-apiserver-localhost-server",
            KubeApiserverLocalhostSigner,
            "system:kube-apiserver",
            Some("kube-master"),
            DAY,
            Sans::Localhost,
        ),
        KubeApiserverServiceNetworkServer => server(
            "kube-apiserver-service-network-server",
            KubeApiserverServiceNetworkSigner,
            "system:kube-apiserver",
            Some("kube-master"),
            DAY,
            Sans::ServiceNetwork,
        ),
        KubeApiserverExternalLbServer => server(
            "kube-apiserver-lb-server",
            KubeApiserverLbSigner,
            "system:kube-apiserver",
            Some("kube-master"),
            DAY,
            Sans::ApiExternal,
        ),
        KubeApiserverInternalLbServer => server(
            "kube-apiserver-internal-lb-server",
            KubeApiserverLbSigner,
            "system:kube-apiserver",
            Some("kube-master"),
            DAY,
            Sans::ApiInternal,
        ),
        KubeApiserverToKubeletClient => client(
            "kube-apiserver-to-kubelet-client",
            KubeApiserverToKubeletSigner,
            "system:kube-apiserver",
            "kube-master",
            YEAR,
        ),
        KubeControllerManagerClient => client(
            "kube-control-plane-kube-controller-manager-client",
            KubeControlPlaneSigner,
            "system:admin",
            "system:masters",
            YEAR,
        ),
        KubeSchedulerClient => client(
            "kube-control-plane-kube-scheduler-client",
            KubeControlPlaneSigner,
            "system:admin",
            "system:masters",
            YEAR,
        ),
        KubeletClient => client(
            "kubelet-client",
            KubeletBootstrapKubeconfigSigner,
            "system:serviceaccount:openshift-machine-config-operator:node-bootstrapper",
            "system:serviceaccounts:openshift-machine-config-operator",
            TEN,
        ),
        JournalGatewayd => TlsSpec::Signed {
            base: "journal-gatewayd",
            signer: RootCa,
            common_name: "journal-gatewayd",
            unit: None,
            organization: Some("OpenShift Bootstrap"),
            usage: Usage::ClientServer,
            validity: DAY,
            sans: Sans::None,
        },
        MachineConfigServer => server(
            "machine-config-server",
            RootCa,
            "system:machine-config-server",
            None,
            TEN,
            Sans::ApiInternal,
        ),

        AdminKubeConfigCaBundle => TlsSpec::Bundle {
            base: "admin-kubeconfig-ca-bundle",
            members: &[AdminKubeConfigSigner],
        },
        EtcdCaBundle => TlsSpec::Bundle {
            base: "etcd-ca-bundle",
            members: &[EtcdSigner],
        },
        EtcdMetricCaBundle => TlsSpec::Bundle {
            base: "etcd-metric-ca-bundle",
            members: &[EtcdMetricSigner],
        },
        KubeApiserverCompleteServerCaBundle => TlsSpec::Bundle {
            base: "kube-apiserver-complete-server-ca-bundle",
            members: &[
                KubeApiserverLocalhostSigner,
                KubeApiserverServiceNetworkSigner,
                KubeApiserverLbSigner,
            ],
        },
        KubeApiserverCompleteClientCaBundle => TlsSpec::Bundle {
            base: "kube-apiserver-complete-client-ca-bundle",
            members: &[
                AdminKubeConfigSigner,
                KubeletCsrSigner,
                KubeControlPlaneSigner,
                KubeApiserverToKubeletSigner,
                KubeletBootstrapKubeconfigSigner,
            ],
        },
        KubeletBootstrapCaBundle => TlsSpec::Bundle {
            base: "kubelet-bootstrap-kubeconfig-ca-bundle",
            members: &[KubeletBootstrapKubeconfigSigner],
        },
        KubeletClientCaBundle => TlsSpec::Bundle {
            base: "kubelet-client-ca-bundle",
            members: &[KubeletCsrSigner],
        },
        ServiceCaBundle => TlsSpec::Bundle {
            base: "service-ca-bundle",
            members: &[ServiceCaSigner],
        },

        ServiceAccountKeyPair => TlsSpec::KeyPair {
            base: "service-account",
        },
        BoundSaSigningKey => TlsSpec::KeyPair {
            base: "bound-service-account-signing-key",
        },
        BootstrapSshKeyPair => TlsSpec::SshKeyPair {
            base: "bootstrap-ssh",
        },

        _ => return None,
    };
    Some(spec)
}

/// Every kind backed by a [`TlsAsset`]
pub fn is_tls(kind: AssetKind) -> bool {
    spec_for(kind).is_some()
}

/// Key material for one TLS asset kind
///
/// Signers and signed certs carry `cert_pem` and `key_pem`, bundles only
/// `cert_pem`, key pairs `key_pem` and `public_key`.
pub struct TlsAsset {
    kind: AssetKind,
    pub cert_pem: String,
    pub key_pem: String,
    pub public_key: String,
    files: Vec<AssetFile>,
}

impl TlsAsset {
    /// Ungenerated TLS asset. Non-TLS kinds are rejected when generated.
    pub fn new(kind: AssetKind) -> Self {
        Self {
            kind,
            cert_pem: String::new(),
            key_pem: String::new(),
            public_key: String::new(),
            files: Vec::new(),
        }
    }

    pub fn boxed(kind: AssetKind) -> Box<dyn Asset> {
        Box::new(Self::new(kind))
    }

    fn spec(&self) -> KvinstallResult<TlsSpec> {
        spec_for(self.kind)
            .ok_or_else(|| KvinstallError::Internal(format!("{} is not a TLS asset", self.kind)))
    }

    fn cert_key(&self) -> CertKey {
        CertKey {
            cert_pem: self.cert_pem.clone(),
            key_pem: self.key_pem.clone(),
        }
    }

    fn assign(&mut self, cert_pem: String, key_pem: String, public_key: String) -> KvinstallResult<()> {
        let base = match self.spec()? {
            TlsSpec::Signer { base, .. }
            | TlsSpec::Signed { base, .. }
            | TlsSpec::Bundle { base, .. }
            | TlsSpec::KeyPair { base }
            | TlsSpec::SshKeyPair { base } => base,
        };

        let mut files = Vec::new();
        if !key_pem.is_empty() {
            files.push(AssetFile::new(format!("tls/{}.key", base), key_pem.clone()));
        }
        if !cert_pem.is_empty() {
            files.push(AssetFile::new(format!("tls/{}.crt", base), cert_pem.clone()));
        }
        if !public_key.is_empty() {
            files.push(AssetFile::new(format!("tls/{}.pub", base), public_key.clone()));
        }

        self.cert_pem = cert_pem;
        self.key_pem = key_pem;
        self.public_key = public_key;
        self.files = files;
        Ok(())
    }
}

/// Typed access to TLS material stored in the parents
pub fn material(parents: &Parents, kind: AssetKind) -> KvinstallResult<&TlsAsset> {
    parents
        .get_dyn(kind)?
        .downcast_ref::<TlsAsset>()
        .ok_or_else(|| KvinstallError::Internal(format!("asset {} is not TLS material", kind)))
}

fn alt_names(sans: Sans, parents: &Parents) -> KvinstallResult<Vec<AltName>> {
    if sans == Sans::None {
        return Ok(Vec::new());
    }
    if sans == Sans::Localhost {
        return Ok(vec![
            AltName::Dns("localhost".to_string()),
            AltName::Ip(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        ]);
    }

    let config = parents.get::<InstallConfigAsset>()?.config()?;
    let domain = config.cluster_domain();
    let names = match sans {
        Sans::ServiceNetwork => {
            let service = config
                .networking
                .service_network
                .first()
                .ok_or_else(|| KvinstallError::Internal("no service network".to_string()))?;
            let ip = service.parse::<Cidr>()?.host(1)?;
            vec![
                AltName::Dns("kubernetes".to_string()),
                AltName::Dns("kubernetes.default".to_string()),
                AltName::Dns("kubernetes.default.svc".to_string()),
                AltName::Dns("kubernetes.default.svc.cluster.local".to_string()),
                AltName::Ip(ip),
            ]
        }
        Sans::ApiExternal => vec![AltName::Dns(format!("api.{}", domain))],
        Sans::ApiInternal => vec![AltName::Dns(format!("api-int.{}", domain))],
        Sans::None | Sans::Localhost => Vec::new(),
    };
    Ok(names)
}

impl Asset for TlsAsset {
    fn kind(&self) -> AssetKind {
        self.kind
    }

    fn dependencies(&self) -> Vec<Box<dyn Asset>> {
        match spec_for(self.kind) {
            Some(TlsSpec::Signed { signer, sans, .. }) => {
                let mut deps = vec![TlsAsset::boxed(signer)];
                if !matches!(sans, Sans::None | Sans::Localhost) {
                    deps.push(Box::new(InstallConfigAsset::default()));
                }
                deps
            }
            Some(TlsSpec::Bundle { members, .. }) => {
                members.iter().map(|k| TlsAsset::boxed(*k)).collect()
            }
            _ => Vec::new(),
        }
    }

    fn generate(&mut self, parents: &Parents) -> KvinstallResult<()> {
        match self.spec()? {
            TlsSpec::Signer {
                common_name,
                unit,
                validity,
                ..
            } => {
                let pair = pki::self_signed(&CertCfg::ca(common_name, unit, validity))?;
                self.assign(pair.cert_pem, pair.key_pem, String::new())
            }
            TlsSpec::Signed {
                signer,
                common_name,
                unit,
                organization,
                usage,
                validity,
                sans,
                ..
            } => {
                let cfg = CertCfg {
                    common_name: common_name.to_string(),
                    organizational_unit: unit,
                    organization,
                    validity,
                    is_ca: false,
                    usage: Some(usage),
                    alt_names: alt_names(sans, parents)?,
                };
                let pair = pki::signed(&cfg, &material(parents, signer)?.cert_key())?;
                self.assign(pair.cert_pem, pair.key_pem, String::new())
            }
            TlsSpec::Bundle { members, .. } => {
                let mut bundle = String::new();
                for member in members {
                    bundle.push_str(&material(parents, *member)?.cert_pem);
                }
                self.assign(bundle, String::new(), String::new())
            }
            TlsSpec::KeyPair { base } => {
                let (private, public) = pki::key_pair(base)?;
                self.assign(String::new(), private, public)
            }
            TlsSpec::SshKeyPair { base } => {
                let (private, public) = pki::ssh_key_pair(base)?;
                self.assign(String::new(), private, public)
            }
        }
    }

    fn files(&self) -> Vec<&AssetFile> {
        self.files.iter().collect()
    }

    fn load(&mut self, fetcher: &dyn FileFetcher) -> KvinstallResult<bool> {
        let spec = self.spec()?;
        let (base, wants_cert, wants_key, wants_pub) = match spec {
            TlsSpec::Signer { base, .. } | TlsSpec::Signed { base, .. } => (base, true, true, false),
            TlsSpec::Bundle { base, .. } => (base, true, false, false),
            TlsSpec::KeyPair { base } | TlsSpec::SshKeyPair { base } => (base, false, true, true),
        };

        let read = |ext: &str, wanted: bool| -> KvinstallResult<Option<String>> {
            if !wanted {
                return Ok(Some(String::new()));
            }
            let filename = format!("tls/{}.{}", base, ext);
            let Some(file) = fetcher.fetch_by_name(&filename)? else {
                return Ok(None);
            };
            String::from_utf8(file.data)
                .map(Some)
                .map_err(|e| KvinstallError::AssetLoad {
                    asset: self.kind.name().to_string(),
                    filename,
                    reason: e.to_string(),
                })
        };

        let (Some(cert), Some(key), Some(public)) =
            (read("crt", wants_cert)?, read("key", wants_key)?, read("pub", wants_pub)?)
        else {
            return Ok(false);
        };

        let corrupt = |filename: &str, e: KvinstallError| KvinstallError::AssetLoad {
            asset: self.kind.name().to_string(),
            filename: format!("tls/{}.{}", base, filename),
            reason: e.to_string(),
        };
        if wants_cert {
            pki::require_pem(base, cert.as_bytes(), "CERTIFICATE").map_err(|e| corrupt("crt", e))?;
        }
        if wants_key {
            pki::require_pem(base, key.as_bytes(), "PRIVATE KEY").map_err(|e| corrupt("key", e))?;
        }

        debug!("Loaded {} from tls/{}", self.kind, base);
        self.assign(cert, key, public)?;
        Ok(true)
    }
}
