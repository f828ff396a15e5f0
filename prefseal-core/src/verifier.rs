//! Consistency validation - the runtime tamper check over stored MACs
//!
//! The verifier owns one store and one device identity. It confirms that a
//! (path, value, MAC) triple is still valid for its backend, and re-derives
//! MACs when a caller deliberately changes a protected value. An `Invalid`
//! verdict only ever arises from mutations performed outside the engine's
//! own write path.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::mac::{compute_mac, verify_mac, Backend, DeviceIdentity};
use crate::store::{MacRecord, PreferenceStore};

/// Outcome of validating one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The stored MAC matches the current value, or the path is unprotected.
    Valid,
    /// The stored digest disagrees with the recomputed one.
    Invalid { expected: String, computed: String },
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }
}

pub struct ConsistencyVerifier<S: PreferenceStore> {
    store: S,
    identity: DeviceIdentity,
}

impl<S: PreferenceStore> ConsistencyVerifier<S> {
    pub fn new(store: S, identity: DeviceIdentity) -> Self {
        ConsistencyVerifier { store, identity }
    }

    pub fn backend(&self) -> Backend {
        self.store.backend()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Check one path's stored MAC against its current value.
    ///
    /// An absent MAC means the preference is unprotected and always valid.
    /// The digest comparison is case-insensitive and constant-time. A
    /// mismatch is reported, never repaired: overwriting the stored MAC here
    /// would mask real tamper detection.
    pub fn validate(&self, path: &str) -> Result<Verdict> {
        let (value, mac) = self.store.read(path)?;

        let Some(record) = mac else {
            debug!(path, "No stored MAC, preference is unprotected");
            return Ok(Verdict::Valid);
        };

        if verify_mac(self.backend(), &self.identity, path, &value, &record.hex_digest) {
            debug!(path, "Stored MAC is consistent");
            return Ok(Verdict::Valid);
        }

        let computed = compute_mac(self.backend(), &self.identity, path, &value);
        warn!(
            target: "security",
            path,
            backend = %self.backend(),
            expected = %record.hex_digest,
            computed = %computed,
            "Stored MAC does not match current value"
        );
        Ok(Verdict::Invalid {
            expected: record.hex_digest,
            computed,
        })
    }

    /// Derive the fresh MacRecord for a deliberately changed value.
    ///
    /// The result must be persisted through the store's atomic write before
    /// the change is considered committed. Idempotent: the same value always
    /// yields the same record.
    pub fn recompute(&self, path: &str, new_value: &Value) -> MacRecord {
        MacRecord {
            path: path.to_string(),
            backend: self.backend(),
            hex_digest: compute_mac(self.backend(), &self.identity, path, new_value),
        }
    }

    /// Current value for a path. An absent preference reads as null.
    pub fn get_value(&self, path: &str) -> Result<Value> {
        Ok(self.store.read(path)?.0)
    }

    /// Deliberately change a protected value: recompute its MAC and persist
    /// value and MAC in one atomic store write.
    pub fn set_protected_value(&mut self, path: &str, value: Value) -> Result<()> {
        let record = self.recompute(path, &value);
        self.store.write(path, value, record)?;
        info!(path, backend = %self.backend(), "Committed protected value with fresh MAC");
        Ok(())
    }

    /// Whether the path's stored MAC (if any) matches its current value.
    pub fn is_consistent(&self, path: &str) -> Result<bool> {
        Ok(self.validate(path)?.is_valid())
    }

    /// Validate every protected path in the store.
    pub fn verify_all(&self) -> Result<Vec<(String, Verdict)>> {
        let paths = self.store.list_protected_paths()?;
        debug!(count = paths.len(), backend = %self.backend(), "Validating all protected paths");

        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            let verdict = self.validate(&path)?;
            results.push((path, verdict));
        }
        Ok(results)
    }
}
