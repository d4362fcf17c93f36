//! Key and certificate primitives

use crate::error::{KvinstallError, KvinstallResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose,
    IsCa, Issuer, KeyPair, KeyUsagePurpose, SanType,
};
use std::net::IpAddr;
use time::{Duration, OffsetDateTime};
use x509_parser::pem::Pem;

pub const VALIDITY_ONE_DAY: Duration = Duration::days(1);
pub const VALIDITY_ONE_YEAR: Duration = Duration::days(365);
pub const VALIDITY_TEN_YEARS: Duration = Duration::days(365 * 10);

/// Allowed use of a leaf certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    Client,
    Server,
    ClientServer,
}

/// Subject alternative name before conversion into rcgen's type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AltName {
    Dns(String),
    Ip(IpAddr),
}

/// Certificate request: subject, lifetime and extensions
#[derive(Debug, Clone)]
pub struct CertCfg {
    pub common_name: String,
    pub organizational_unit: Option<&'static str>,
    pub organization: Option<&'static str>,
    pub validity: Duration,
    pub is_ca: bool,
    pub usage: Option<Usage>,
    pub alt_names: Vec<AltName>,
}

impl CertCfg {
    pub fn ca(common_name: &str, organizational_unit: &'static str, validity: Duration) -> Self {
        Self {
            common_name: common_name.to_string(),
            organizational_unit: Some(organizational_unit),
            organization: None,
            validity,
            is_ca: true,
            usage: None,
            alt_names: Vec::new(),
        }
    }

    fn params(&self) -> KvinstallResult<CertificateParams> {
        let mut params = CertificateParams::default();

        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, self.common_name.as_str());
        if let Some(ou) = self.organizational_unit {
            dn.push(DnType::OrganizationalUnitName, ou);
        }
        if let Some(org) = self.organization {
            dn.push(DnType::OrganizationName, org);
        }
        params.distinguished_name = dn;

        let now = OffsetDateTime::now_utc();
        params.not_before = now - Duration::minutes(1);
        params.not_after = now + self.validity;

        if self.is_ca {
            params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
            params.key_usages = vec![
                KeyUsagePurpose::KeyEncipherment,
                KeyUsagePurpose::DigitalSignature,
                KeyUsagePurpose::KeyCertSign,
            ];
        } else {
            params.key_usages = vec![
                KeyUsagePurpose::KeyEncipherment,
                KeyUsagePurpose::DigitalSignature,
            ];
        }

        params.extended_key_usages = match self.usage {
            Some(Usage::Client) => vec![ExtendedKeyUsagePurpose::ClientAuth],
            Some(Usage::Server) => vec![ExtendedKeyUsagePurpose::ServerAuth],
            Some(Usage::ClientServer) => vec![
                ExtendedKeyUsagePurpose::ClientAuth,
                ExtendedKeyUsagePurpose::ServerAuth,
            ],
            None => Vec::new(),
        };

        for name in &self.alt_names {
            let san = match name {
                AltName::Dns(dns) => SanType::DnsName(
                    dns.as_str()
                        .try_into()
                        .map_err(|e| KvinstallError::certificate(&self.common_name, e))?,
                ),
                AltName::Ip(ip) => SanType::IpAddress(*ip),
            };
            params.subject_alt_names.push(san);
        }

        Ok(params)
    }
}

/// PEM-encoded certificate and private key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertKey {
    pub cert_pem: String,
    pub key_pem: String,
}

/// Generate a key and a self-signed certificate for it
pub fn self_signed(cfg: &CertCfg) -> KvinstallResult<CertKey> {
    let key = KeyPair::generate().map_err(|e| KvinstallError::certificate(&cfg.common_name, e))?;
    let cert = cfg
        .params()?
        .self_signed(&key)
        .map_err(|e| KvinstallError::certificate(&cfg.common_name, e))?;

    Ok(CertKey {
        cert_pem: cert.pem(),
        key_pem: key.serialize_pem(),
    })
}

/// Generate a key and a certificate signed by `signer`
pub fn signed(cfg: &CertCfg, signer: &CertKey) -> KvinstallResult<CertKey> {
    let err = |e: rcgen::Error| KvinstallError::certificate(&cfg.common_name, e);

    let signer_key = KeyPair::from_pem(&signer.key_pem).map_err(err)?;
    let issuer = Issuer::from_ca_cert_pem(&signer.cert_pem, signer_key).map_err(err)?;

    let key = KeyPair::generate().map_err(err)?;
    let cert = cfg.params()?.signed_by(&key, &issuer).map_err(err)?;

    Ok(CertKey {
        cert_pem: cert.pem(),
        key_pem: key.serialize_pem(),
    })
}

/// PEM private key and PEM public key
pub fn key_pair(name: &str) -> KvinstallResult<(String, String)> {
    let key = KeyPair::generate().map_err(|e| KvinstallError::certificate(name, e))?;
    Ok((key.serialize_pem(), key.public_key_pem()))
}

/// PEM private key and an OpenSSH `authorized_keys` line
pub fn ssh_key_pair(name: &str) -> KvinstallResult<(String, String)> {
    let key = KeyPair::generate_for(&rcgen::PKCS_ED25519)
        .map_err(|e| KvinstallError::certificate(name, e))?;

    let raw = key.public_key_raw();
    if raw.len() != 32 {
        return Err(KvinstallError::certificate(
            name,
            "unexpected ed25519 key length",
        ));
    }

    Ok((key.serialize_pem(), openssh_ed25519(raw)))
}

fn openssh_ed25519(raw: &[u8]) -> String {
    const ALGO: &[u8] = b"ssh-ed25519";
    let mut blob = Vec::with_capacity(4 + ALGO.len() + 4 + raw.len());
    blob.extend_from_slice(&(ALGO.len() as u32).to_be_bytes());
    blob.extend_from_slice(ALGO);
    blob.extend_from_slice(&(raw.len() as u32).to_be_bytes());
    blob.extend_from_slice(raw);
    format!("ssh-ed25519 {}", STANDARD.encode(blob))
}

/// Subject and expiry of one certificate in a PEM stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertInfo {
    pub subject: String,
    pub not_after: i64,
}

/// Inspect every `CERTIFICATE` block in `data`
pub fn inspect(name: &str, data: &[u8]) -> KvinstallResult<Vec<CertInfo>> {
    match inspect_leading(name, data) {
        (infos, None) => Ok(infos),
        (_, Some(err)) => Err(err),
    }
}

/// Inspect `CERTIFICATE` blocks up to the first one that fails to parse
///
/// Certificates before the bad block are returned together with the error.
pub fn inspect_leading(name: &str, data: &[u8]) -> (Vec<CertInfo>, Option<KvinstallError>) {
    let mut infos = Vec::new();
    for block in Pem::iter_from_buffer(data) {
        let block = match block {
            Ok(block) => block,
            Err(e) => return (infos, Some(KvinstallError::certificate(name, e))),
        };
        if block.label != "CERTIFICATE" {
            continue;
        }
        match block.parse_x509() {
            Ok(cert) => infos.push(CertInfo {
                subject: cert.subject().to_string(),
                not_after: cert.validity().not_after.timestamp(),
            }),
            Err(e) => return (infos, Some(KvinstallError::certificate(name, e))),
        }
    }
    (infos, None)
}

/// Fail unless `data` holds at least one PEM block with the given tag suffix
pub fn require_pem(name: &str, data: &[u8], tag_suffix: &str) -> KvinstallResult<()> {
    let blocks = pem::parse_many(data).map_err(|e| KvinstallError::certificate(name, e))?;
    if blocks.iter().any(|b| b.tag().ends_with(tag_suffix)) {
        Ok(())
    } else {
        Err(KvinstallError::certificate(
            name,
            format!("no {} PEM block", tag_suffix),
        ))
    }
}
