//! HMAC-SHA256 computation and constant-time verification

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use super::keys::{Backend, DeviceIdentity};
use super::serializer::serialize_value;

type HmacSha256 = Hmac<Sha256>;

/// Byte length of a preference MAC digest (64 hex characters).
pub const DIGEST_LEN: usize = 32;

fn keyed_mac(backend: Backend, identity: &DeviceIdentity, path: &str, value: &Value) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(backend.seed().as_bytes())
        .expect("HMAC can take a key of any size");
    mac.update(identity.as_str().as_bytes());
    mac.update(path.as_bytes());
    mac.update(serialize_value(value).as_bytes());
    mac
}

/// Compute the MAC for a preference value.
///
/// `HMAC-SHA256(key = seed(backend), message = identity ++ path ++ serialize(value))`,
/// rendered as uppercase hex the way captured profiles store it. Deterministic
/// and stateless: identical inputs always produce the identical digest.
pub fn compute_mac(
    backend: Backend,
    identity: &DeviceIdentity,
    path: &str,
    value: &Value,
) -> String {
    let digest = keyed_mac(backend, identity, path, value).finalize();
    hex::encode_upper(digest.into_bytes())
}

/// Check a stored hex digest against the expected MAC for `value`.
///
/// The stored digest is hex-decoded first, which makes the check
/// case-insensitive; the comparison itself is constant-time. Digests that are
/// not valid 32-byte hex never verify.
pub fn verify_mac(
    backend: Backend,
    identity: &DeviceIdentity,
    path: &str,
    value: &Value,
    stored_hex: &str,
) -> bool {
    let stored = match hex::decode(stored_hex) {
        Ok(bytes) if bytes.len() == DIGEST_LEN => bytes,
        _ => return false,
    };

    keyed_mac(backend, identity, path, value)
        .verify_slice(&stored)
        .is_ok()
}
