//! Prefseal core - preference integrity MAC engine
//!
//! Chromium-family browsers bind sensitive preference values to a per-backend
//! secret seed and a per-device identity via HMAC-SHA256, so out-of-band edits
//! are detectable and reverted on next launch. This crate implements that
//! mechanism as a reusable engine: canonical value serialization, MAC
//! computation and verification across two independent storage backends, and
//! the bookkeeping that keeps MACs consistent after a deliberate value change.

pub mod error;
pub mod mac;
pub mod store;
pub mod verifier;

pub use error::{PrefsealError, Result};
pub use mac::{Backend, DeviceIdentity};
pub use store::{FilePreferenceStore, MacRecord, PreferenceStore, RegistryPreferenceStore};
pub use verifier::{ConsistencyVerifier, Verdict};
