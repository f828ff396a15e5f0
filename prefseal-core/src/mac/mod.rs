//! Preference MAC primitives - canonical serialization, keys, HMAC-SHA256
//!
//! A preference MAC is `HMAC-SHA256(key = backend seed,
//! message = device identity ++ path ++ canonical serialization of the value)`,
//! rendered as 64 hex characters. Each backend keeps its own seed; the device
//! identity binds the protection to one installation.

pub mod hasher;
pub mod keys;
pub mod serializer;

pub use hasher::{compute_mac, verify_mac, DIGEST_LEN};
pub use keys::{Backend, DeviceIdentity};
pub use serializer::serialize_value;
