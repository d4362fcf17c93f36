//! RFC 2397 data URLs for inline Ignition contents

use crate::error::{KvinstallError, KvinstallResult};
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;

const PREFIX: &str = "data:text/plain;charset=utf-8;base64,";

/// Inline `data` as a base64 data URL
pub fn encode(data: &[u8]) -> String {
    format!("{}{}", PREFIX, STANDARD.encode(data))
}

/// Decode an inline data URL, base64 or percent-encoded
pub fn decode(url: &str) -> KvinstallResult<Vec<u8>> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| KvinstallError::DataUrl(truncate(url)))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| KvinstallError::DataUrl(format!("missing ',' in {}", truncate(url))))?;

    if header.split(';').any(|part| part == "base64") {
        STANDARD
            .decode(payload)
            .or_else(|_| URL_SAFE.decode(payload))
            .map_err(|e| KvinstallError::DataUrl(e.to_string()))
    } else {
        Ok(urlencoding::decode_binary(payload.as_bytes()).into_owned())
    }
}

fn truncate(url: &str) -> String {
    url.chars().take(32).collect()
}
