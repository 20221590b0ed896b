//! Signature codec for gateway payload authentication.
//!
//! Each gateway fixes its own canonicalization and hash scheme; verification
//! is pure string/hash equality against what the gateway's server computes,
//! so the construction here must match the wire format exactly. Verification
//! is total: missing signatures or malformed parameter sets verify as
//! `false`, never as an error.

use hmac::{Hmac, Mac};
use md5::Md5;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 as uppercase hex (JazzCash wire format).
pub fn hmac_sha256_hex_upper(key: &str, message: &str) -> String {
    let mut mac = match HmacSha256::new_from_slice(key.as_bytes()) {
        Ok(mac) => mac,
        // HMAC accepts keys of any length; unreachable in practice.
        Err(_) => return String::new(),
    };
    mac.update(message.as_bytes());
    hex::encode_upper(mac.finalize().into_bytes())
}

/// MD5 as lowercase hex. Mandated by the EasyPaisa protocol; not used by
/// any other gateway.
pub fn md5_hex(message: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(message.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time byte comparison for signature equality.
pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// JazzCash secure hash: parameters sorted by key (ASCII), their VALUES
/// joined with `&`, the integrity salt prepended (`salt&v1&v2…`), HMAC'd
/// with the salt as key, uppercase hex.
///
/// Empty-valued parameters are excluded, matching what the gateway signs.
pub fn jazzcash_secure_hash(integrity_salt: &str, params: &BTreeMap<String, String>) -> String {
    let values: Vec<&str> = params
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(_, v)| v.as_str())
        .collect();
    let hash_string = format!("{}&{}", integrity_salt, values.join("&"));
    hmac_sha256_hex_upper(integrity_salt, &hash_string)
}

/// Verify a JazzCash callback: extract `pp_SecureHash`, recompute over the
/// remaining non-empty parameters, compare in constant time.
pub fn verify_jazzcash_callback(integrity_salt: &str, params: &BTreeMap<String, String>) -> bool {
    let received = match params.get("pp_SecureHash") {
        Some(sig) if !sig.is_empty() => sig,
        _ => return false,
    };

    let mut filtered = params.clone();
    filtered.remove("pp_SecureHash");
    if filtered.is_empty() {
        return false;
    }

    let computed = jazzcash_secure_hash(integrity_salt, &filtered);
    secure_eq(computed.as_bytes(), received.as_bytes())
}

/// EasyPaisa callback hash: parameters sorted by key, `key=value` pairs
/// joined with `&`, hash key prepended, MD5 lowercase hex.
pub fn easypaisa_callback_hash(hash_key: &str, params: &BTreeMap<String, String>) -> String {
    let joined = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    md5_hex(&format!("{}{}", hash_key, joined))
}

/// Verify an EasyPaisa callback: extract `signature`, recompute over the
/// remaining parameters, compare in constant time.
pub fn verify_easypaisa_callback(hash_key: &str, params: &BTreeMap<String, String>) -> bool {
    let received = match params.get("signature") {
        Some(sig) if !sig.is_empty() => sig,
        _ => return false,
    };

    let mut filtered = params.clone();
    filtered.remove("signature");
    if filtered.is_empty() {
        return false;
    }

    let computed = easypaisa_callback_hash(hash_key, &filtered);
    secure_eq(computed.as_bytes(), received.as_bytes())
}
