//! Engine error types with clear, actionable messages

use std::path::PathBuf;
use thiserror::Error;

use crate::mac::Backend;

/// Preference integrity engine errors
#[derive(Error, Debug)]
pub enum PrefsealError {
    /// The host exposes no stable per-device identifier
    #[error("No stable device identity is available on this host.\n\nEvery preference MAC binds to a per-device identifier (a Windows SID or\nmachine id). Supply one explicitly when working with a captured profile.")]
    DeviceIdentityUnavailable,

    /// A backend selector that names no known backend
    #[error("Unknown preference backend: '{name}'\n\nSupported backends: file, registry")]
    UnknownBackend { name: String },

    /// A stored digest disagrees with the recomputed one
    #[error("MAC mismatch for {backend} preference '{path}'\n\nExpected: {expected}\nComputed: {computed}\n\nThe value was modified outside the engine's write path. Do not overwrite\nthe stored MAC without inspecting the change; doing so masks real tampering.")]
    MacMismatch {
        backend: Backend,
        path: String,
        expected: String,
        computed: String,
    },

    /// A write targeting the MAC bookkeeping namespace itself
    #[error("Refusing to write preference '{path}': the protection namespace holds MACs, not values")]
    ProtectedNamespace { path: String },

    /// Failed to read a backing store document
    #[error("Failed to read preference store at {path}")]
    StoreRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a backing store document
    #[error("Failed to parse preference store (corrupted or invalid JSON)")]
    StoreParse {
        #[source]
        source: serde_json::Error,
    },

    /// Failed to persist a backing store document
    #[error("Failed to write preference store at {path}")]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Another process holds the store's write lock
    #[error("Preference store at {path} is locked by another process")]
    StoreLocked { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, PrefsealError>;

/// Log security-critical errors
impl PrefsealError {
    pub fn log_if_security_critical(&self) {
        if let PrefsealError::MacMismatch { .. } = self {
            tracing::error!(target: "security", "TAMPER DETECTED: {}", self);
        }
    }
}
