//! Preference store adapters
//!
//! Two backends share one contract: read a value together with its stored
//! MAC, write a value/MAC pair atomically, and enumerate the protected paths.
//! The on-disk documents are the single source of truth; adapters re-read
//! them on every operation and hold an exclusive lock for the duration of a
//! read-modify-write-persist cycle.

pub mod file;
pub mod registry;

pub use file::FilePreferenceStore;
pub use registry::RegistryPreferenceStore;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{PrefsealError, Result};
use crate::mac::Backend;

/// A stored digest bound to one path in one backend.
///
/// Valid iff the digest equals the MAC recomputed over the path's current
/// value; it becomes stale the instant the value changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacRecord {
    pub path: String,
    pub backend: Backend,
    pub hex_digest: String,
}

/// Common contract for the file and registry-style stores.
pub trait PreferenceStore {
    fn backend(&self) -> Backend;

    /// Current value and stored MAC for a path. An absent value reads as
    /// null, exactly as the hashing formula treats it.
    fn read(&self, path: &str) -> Result<(Value, Option<MacRecord>)>;

    /// Persist a value and its MAC together: both land or neither does.
    fn write(&mut self, path: &str, value: Value, mac: MacRecord) -> Result<()>;

    /// Every path that currently has a stored MAC.
    fn list_protected_paths(&self) -> Result<BTreeSet<String>>;
}

impl<S: PreferenceStore + ?Sized> PreferenceStore for Box<S> {
    fn backend(&self) -> Backend {
        (**self).backend()
    }

    fn read(&self, path: &str) -> Result<(Value, Option<MacRecord>)> {
        (**self).read(path)
    }

    fn write(&mut self, path: &str, value: Value, mac: MacRecord) -> Result<()> {
        (**self).write(path, value, mac)
    }

    fn list_protected_paths(&self) -> Result<BTreeSet<String>> {
        (**self).list_protected_paths()
    }
}

/// Navigate a dotted path through nested objects.
pub(crate) fn get_by_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Set a value at a dotted path, creating intermediate objects as needed.
/// A non-object intermediate is replaced; writes are deliberate.
pub(crate) fn set_by_path(doc: &mut Value, path: &str, value: Value) {
    let mut current = doc;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let map = current.as_object_mut().expect("just ensured an object");
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// Collect every dotted path under `value` whose leaf is a digest string.
pub(crate) fn collect_mac_paths(value: &Value, prefix: &str, out: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            for (key, item) in map {
                let child = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                collect_mac_paths(item, &child, out);
            }
        }
        Value::String(_) => {
            if !prefix.is_empty() {
                out.insert(prefix.to_string());
            }
        }
        _ => {}
    }
}

/// Load a JSON document from disk. A missing file reads as an empty document;
/// the store is created when the first protected preference is written.
pub(crate) fn load_document(path: &Path) -> Result<Value> {
    if !path.exists() {
        debug!("Store {} does not exist yet, reading as empty", path.display());
        return Ok(Value::Object(Map::new()));
    }

    let content = std::fs::read_to_string(path).map_err(|e| PrefsealError::StoreRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    serde_json::from_str(&content).map_err(|e| PrefsealError::StoreParse { source: e })
}

/// Persist a document atomically: serialize to a temp file in the target
/// directory, then rename over the destination. A failure anywhere leaves the
/// previous document intact.
pub(crate) fn persist_document(path: &Path, doc: &Value) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = dir {
        std::fs::create_dir_all(dir).map_err(|e| PrefsealError::StoreWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let tmp = tempfile::NamedTempFile::new_in(dir.unwrap_or_else(|| Path::new("."))).map_err(
        |e| PrefsealError::StoreWrite {
            path: path.to_path_buf(),
            source: e,
        },
    )?;

    serde_json::to_writer_pretty(&tmp, doc).map_err(|e| PrefsealError::StoreWrite {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })?;

    tmp.persist(path).map_err(|e| PrefsealError::StoreWrite {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    debug!("Persisted store document to {}", path.display());
    Ok(())
}

/// Exclusive advisory lock for a store's write cycle. Created with
/// `create_new`, removed on drop; release happens on every exit path.
pub(crate) struct StoreLock {
    lock_path: PathBuf,
}

impl StoreLock {
    pub(crate) fn acquire(store_path: &Path) -> Result<Self> {
        let mut name = store_path.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        let lock_path = store_path.with_file_name(name);

        if let Some(dir) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| PrefsealError::StoreWrite {
                path: store_path.to_path_buf(),
                source: e,
            })?;
        }

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(_) => Ok(StoreLock { lock_path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(PrefsealError::StoreLocked {
                    path: store_path.to_path_buf(),
                })
            }
            Err(e) => Err(PrefsealError::StoreWrite {
                path: store_path.to_path_buf(),
                source: e,
            }),
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            tracing::warn!("Failed to remove store lock {}: {}", self.lock_path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_get_by_path() {
        let doc = json!({"a": {"b": {"c": 1}}, "top": true});
        assert_eq!(get_by_path(&doc, "a.b.c"), Some(&json!(1)));
        assert_eq!(get_by_path(&doc, "top"), Some(&json!(true)));
        assert_eq!(get_by_path(&doc, "a.missing"), None);
        assert_eq!(get_by_path(&doc, "a.b.c.d"), None);
    }

    #[test]
    fn test_set_by_path_creates_intermediates() {
        let mut doc = json!({});
        set_by_path(&mut doc, "a.b.c", json!(5));
        assert_eq!(doc, json!({"a": {"b": {"c": 5}}}));

        set_by_path(&mut doc, "a.b.d", json!("x"));
        assert_eq!(doc, json!({"a": {"b": {"c": 5, "d": "x"}}}));
    }

    #[test]
    fn test_set_by_path_replaces_scalar_intermediate() {
        let mut doc = json!({"a": 1});
        set_by_path(&mut doc, "a.b", json!(true));
        assert_eq!(doc, json!({"a": {"b": true}}));
    }

    #[test]
    fn test_collect_mac_paths() {
        let macs = json!({
            "homepage": "AA",
            "browser": {"show_home_button": "BB"},
            "stray_number": 7
        });
        let mut out = BTreeSet::new();
        collect_mac_paths(&macs, "", &mut out);
        assert_eq!(
            out.into_iter().collect::<Vec<_>>(),
            vec!["browser.show_home_button".to_string(), "homepage".to_string()]
        );
    }

    #[test]
    fn test_lock_is_exclusive_and_released() {
        let dir = tempfile::TempDir::new().unwrap();
        let store_path = dir.path().join("prefs.json");

        let lock = StoreLock::acquire(&store_path).unwrap();
        let second = StoreLock::acquire(&store_path);
        assert!(matches!(second, Err(PrefsealError::StoreLocked { .. })));

        drop(lock);
        let third = StoreLock::acquire(&store_path);
        assert!(third.is_ok());
    }
}
