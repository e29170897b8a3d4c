//! Signature Version 4 key derivation, used for POST policy signing.

use anyhow::{Result, anyhow};
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
pub const SERVICE: &str = "s3";

/// Derive the signing key: HMAC chain over date, region, service and
/// `aws4_request`, seeded with `"AWS4" + secret`.
pub fn derive_signing_key(
    secret_access_key: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>> {
    let date_key = hmac_sha256(
        format!("AWS4{secret_access_key}").as_bytes(),
        date_stamp.as_bytes(),
    )?;
    let date_region_key = hmac_sha256(&date_key, region.as_bytes())?;
    let date_region_service_key = hmac_sha256(&date_region_key, service.as_bytes())?;
    hmac_sha256(&date_region_service_key, b"aws4_request")
}

/// Hex-encoded HMAC-SHA256 of `data` under `signing_key`.
pub fn compute_signature(signing_key: &[u8], data: &str) -> Result<String> {
    Ok(hex::encode(hmac_sha256(signing_key, data.as_bytes())?))
}

/// `<access-key>/<yyyymmdd>/<region>/s3/aws4_request`
pub fn credential_scope(access_key: &str, date_stamp: &str, region: &str) -> String {
    format!("{access_key}/{date_stamp}/{region}/{SERVICE}/aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac =
        <HmacSha256 as KeyInit>::new_from_slice(key).map_err(|e| anyhow!("invalid HMAC key: {e}"))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}
