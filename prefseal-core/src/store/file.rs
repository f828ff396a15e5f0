//! Secure-Preferences-style file store
//!
//! One JSON document holds both namespaces: preference values live at their
//! dotted paths, and every protected path has a mirrored digest under
//! `protection.macs`. The `account_values` sub-namespace needs no special
//! handling; it is an ordinary path prefix hashed with the same seed and
//! formula.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{PrefsealError, Result};
use crate::mac::Backend;

use super::{
    collect_mac_paths, get_by_path, load_document, persist_document, set_by_path, MacRecord,
    PreferenceStore, StoreLock,
};

/// Root of the MAC bookkeeping namespace inside the document.
const PROTECTION_KEY: &str = "protection";
const PROTECTION_PREFIX: &str = "protection.";
const MACS_PATH: &str = "protection.macs";

pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    /// Open a store over a Secure-Preferences-style document. A file that
    /// does not exist yet reads as empty and is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FilePreferenceStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mac_path(pref_path: &str) -> String {
        format!("{MACS_PATH}.{pref_path}")
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn backend(&self) -> Backend {
        Backend::File
    }

    fn read(&self, path: &str) -> Result<(Value, Option<MacRecord>)> {
        let doc = load_document(&self.path)?;

        let value = get_by_path(&doc, path).cloned().unwrap_or(Value::Null);
        let mac = get_by_path(&doc, &Self::mac_path(path))
            .and_then(Value::as_str)
            .map(|digest| MacRecord {
                path: path.to_string(),
                backend: Backend::File,
                hex_digest: digest.to_string(),
            });

        debug!(
            path,
            protected = mac.is_some(),
            "Read preference from file store"
        );
        Ok((value, mac))
    }

    fn write(&mut self, path: &str, value: Value, mac: MacRecord) -> Result<()> {
        if path == PROTECTION_KEY || path.starts_with(PROTECTION_PREFIX) {
            return Err(PrefsealError::ProtectedNamespace {
                path: path.to_string(),
            });
        }
        debug_assert_eq!(mac.path, path);
        debug_assert_eq!(mac.backend, Backend::File);

        let _lock = StoreLock::acquire(&self.path)?;
        let mut doc = load_document(&self.path)?;

        set_by_path(&mut doc, path, value);
        set_by_path(&mut doc, &Self::mac_path(path), Value::String(mac.hex_digest));

        persist_document(&self.path, &doc)?;
        info!(path, "Wrote preference and MAC to file store");
        Ok(())
    }

    fn list_protected_paths(&self) -> Result<BTreeSet<String>> {
        let doc = load_document(&self.path)?;

        let mut out = BTreeSet::new();
        if let Some(macs) = get_by_path(&doc, MACS_PATH) {
            collect_mac_paths(macs, "", &mut out);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(path: &str, digest: &str) -> MacRecord {
        MacRecord {
            path: path.to_string(),
            backend: Backend::File,
            hex_digest: digest.to_string(),
        }
    }

    #[test]
    fn test_missing_file_reads_as_null_unprotected() {
        let dir = TempDir::new().unwrap();
        let store = FilePreferenceStore::new(dir.path().join("Secure Preferences"));

        let (value, mac) = store.read("browser.show_home_button").unwrap();
        assert_eq!(value, Value::Null);
        assert!(mac.is_none());
        assert!(store.list_protected_paths().unwrap().is_empty());
    }

    #[test]
    fn test_write_lands_value_and_mac_together() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Secure Preferences");
        let mut store = FilePreferenceStore::new(&path);

        store
            .write("browser.show_home_button", json!(true), record("browser.show_home_button", "AB"))
            .unwrap();

        let doc: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["browser"]["show_home_button"], json!(true));
        assert_eq!(doc["protection"]["macs"]["browser"]["show_home_button"], json!("AB"));

        let (value, mac) = store.read("browser.show_home_button").unwrap();
        assert_eq!(value, json!(true));
        assert_eq!(mac.unwrap().hex_digest, "AB");
    }

    #[test]
    fn test_account_values_prefix_is_ordinary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Secure Preferences");
        let mut store = FilePreferenceStore::new(&path);

        store
            .write(
                "account_values.homepage",
                json!("https://account.example.com/"),
                record("account_values.homepage", "CD"),
            )
            .unwrap();

        let doc: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["account_values"]["homepage"], json!("https://account.example.com/"));
        assert_eq!(doc["protection"]["macs"]["account_values"]["homepage"], json!("CD"));
    }

    #[test]
    fn test_protection_namespace_rejected() {
        let dir = TempDir::new().unwrap();
        let mut store = FilePreferenceStore::new(dir.path().join("prefs.json"));

        let err = store
            .write("protection.macs.homepage", json!("x"), record("protection.macs.homepage", "EE"))
            .unwrap_err();
        assert!(matches!(err, PrefsealError::ProtectedNamespace { .. }));
    }

    #[test]
    fn test_list_protected_paths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        let mut store = FilePreferenceStore::new(&path);

        store.write("homepage", json!("https://a/"), record("homepage", "01")).unwrap();
        store
            .write("session.restore_on_startup", json!(4), record("session.restore_on_startup", "02"))
            .unwrap();

        let paths: Vec<String> = store.list_protected_paths().unwrap().into_iter().collect();
        assert_eq!(paths, vec!["homepage".to_string(), "session.restore_on_startup".to_string()]);
    }

    #[test]
    fn test_parse_error_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = FilePreferenceStore::new(&path);
        let err = store.read("homepage").unwrap_err();
        assert!(matches!(err, PrefsealError::StoreParse { .. }));
    }
}
