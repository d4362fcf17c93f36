//! Expired certificate scan of a stored Ignition config

use crate::ignition::dataurl;
use crate::ignition::types::Config;
use crate::tls::pki;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::Path;
use tracing::{debug, warn};

/// One expired certificate found in the config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredCert {
    /// Base name of the node file holding the certificate
    pub file: String,
    pub not_after: i64,
}

impl ExpiredCert {
    pub fn not_after_rfc3339(&self) -> String {
        DateTime::<Utc>::from_timestamp(self.not_after, 0)
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| self.not_after.to_string())
    }
}

/// Every certificate in a `*.crt` file whose `notAfter` is before `now`
///
/// Files that are not inline data URLs are skipped. A bundle is read up to
/// its first malformed block. This scan never fails.
pub fn expired_certificates(config: &Config, now: i64) -> Vec<ExpiredCert> {
    let mut expired = Vec::new();

    for file in &config.storage.files {
        let path = Path::new(&file.path);
        if path.extension().and_then(|e| e.to_str()) != Some("crt") {
            continue;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.path.clone());

        let Some(source) = file.contents.source.as_deref() else {
            continue;
        };
        let data = match dataurl::decode(source) {
            Ok(data) => data,
            Err(e) => {
                debug!("Skipping {}: {}", file.path, e);
                continue;
            }
        };
        let (certs, err) = pki::inspect_leading(&name, &data);
        if let Some(e) = err {
            debug!("Stopped reading {} after {} certificates: {}", file.path, certs.len(), e);
        }

        expired.extend(
            certs
                .into_iter()
                .filter(|c| c.not_after < now)
                .map(|c| ExpiredCert {
                    file: name.clone(),
                    not_after: c.not_after,
                }),
        );
    }

    expired
}

/// Log each expired certificate and a summary. Returns the count.
pub fn warn_expired(config: &Config) -> usize {
    let expired = expired_certificates(config, Utc::now().timestamp());

    for cert in &expired {
        warn!(
            "Bootstrap Ignition-Config Certificate {} expired at {}.",
            cert.file,
            cert.not_after_rfc3339()
        );
    }
    if !expired.is_empty() {
        warn!(
            "Bootstrap Ignition-Config: {} certificates expired. Installation attempts with the created Ignition-Configs will possibly fail.",
            expired.len()
        );
    }

    expired.len()
}
