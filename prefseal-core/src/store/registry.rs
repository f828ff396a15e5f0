//! Registry-style hash store
//!
//! Preferences live as named value entries under a hierarchical key tree, and
//! their MACs occupy a separate parallel hierarchy mirroring it, keyed with
//! the fixed registry seed. The hive is persisted as a captured-hive JSON
//! document - the same shape the capture tooling exports registry state in -
//! with each dot-delimited path segment mapping to one subkey and the final
//! segment naming the value entry.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use crate::error::Result;
use crate::mac::Backend;

use super::{
    collect_mac_paths, get_by_path, load_document, persist_document, set_by_path, MacRecord,
    PreferenceStore, StoreLock,
};

/// Root key for preference value entries.
const PREFS_KEY: &str = "Preferences";
/// Root key of the parallel MAC hierarchy.
const MACS_KEY: &str = "PreferenceMACs";

pub struct RegistryPreferenceStore {
    path: PathBuf,
}

impl RegistryPreferenceStore {
    /// Open a store over a captured-hive document. A hive that does not
    /// exist yet reads as empty and is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        RegistryPreferenceStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Registry-idiom rendering of a preference's key path, for diagnostics.
    pub fn key_path(pref_path: &str) -> String {
        format!("{PREFS_KEY}\\{}", pref_path.replace('.', "\\"))
    }

    fn value_path(pref_path: &str) -> String {
        format!("{PREFS_KEY}.{pref_path}")
    }

    fn mac_path(pref_path: &str) -> String {
        format!("{MACS_KEY}.{pref_path}")
    }
}

impl PreferenceStore for RegistryPreferenceStore {
    fn backend(&self) -> Backend {
        Backend::Registry
    }

    fn read(&self, path: &str) -> Result<(Value, Option<MacRecord>)> {
        let hive = load_document(&self.path)?;

        let value = get_by_path(&hive, &Self::value_path(path))
            .cloned()
            .unwrap_or(Value::Null);
        let mac = get_by_path(&hive, &Self::mac_path(path))
            .and_then(Value::as_str)
            .map(|digest| MacRecord {
                path: path.to_string(),
                backend: Backend::Registry,
                hex_digest: digest.to_string(),
            });

        debug!(
            key = %Self::key_path(path),
            protected = mac.is_some(),
            "Read preference from registry store"
        );
        Ok((value, mac))
    }

    fn write(&mut self, path: &str, value: Value, mac: MacRecord) -> Result<()> {
        debug_assert_eq!(mac.path, path);
        debug_assert_eq!(mac.backend, Backend::Registry);

        let _lock = StoreLock::acquire(&self.path)?;
        let mut hive = load_document(&self.path)?;

        set_by_path(&mut hive, &Self::value_path(path), value);
        set_by_path(&mut hive, &Self::mac_path(path), Value::String(mac.hex_digest));

        persist_document(&self.path, &hive)?;
        info!(key = %Self::key_path(path), "Wrote preference and MAC to registry store");
        Ok(())
    }

    fn list_protected_paths(&self) -> Result<BTreeSet<String>> {
        let hive = load_document(&self.path)?;

        let mut out = BTreeSet::new();
        if let Some(macs) = get_by_path(&hive, MACS_KEY) {
            collect_mac_paths(macs, "", &mut out);
        }
        Ok(out)
    }
}
