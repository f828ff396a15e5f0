//! Backend seeds and device identity resolution
//!
//! Each backend maps to exactly one seed constant. The device identity is a
//! stable per-machine/user string sourced once per process; captured profiles
//! carry a Windows SID, other hosts fall back to their machine identifier.

use std::fmt;
use std::str::FromStr;

use crate::error::{PrefsealError, Result};

/// Seed for the file-backed store. File MACs are keyed with an empty seed;
/// the device identity carries the installation binding.
const FILE_SEED: &str = "";

/// Fixed seed for the registry-style hash store.
const REGISTRY_SEED: &str = "ChromeRegistryHashStoreValidationSeed";

/// The closed set of storage backends that keep value/MAC pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Secure-Preferences-style JSON document
    File,
    /// Registry-style hierarchical hash store
    Registry,
}

impl Backend {
    /// The backend-specific HMAC key. One seed per backend, never per path.
    pub fn seed(&self) -> &'static str {
        match self {
            Backend::File => FILE_SEED,
            Backend::Registry => REGISTRY_SEED,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::File => write!(f, "file"),
            Backend::Registry => write!(f, "registry"),
        }
    }
}

impl FromStr for Backend {
    type Err = PrefsealError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(Backend::File),
            "registry" => Ok(Backend::Registry),
            other => Err(PrefsealError::UnknownBackend {
                name: other.to_string(),
            }),
        }
    }
}

/// Stable per-machine/user identifier mixed into every MAC.
///
/// Treated as configuration input: the engine never mutates it, and callers
/// working with captured profiles construct it from the captured string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity(String);

impl DeviceIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        DeviceIdentity(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve a stable identifier from the host environment.
    ///
    /// Windows profiles bind MACs to the current user's SID; on other hosts
    /// the machine id is the closest stable equivalent.
    pub fn resolve() -> Result<Self> {
        #[cfg(target_os = "windows")]
        {
            // `whoami /user` emits `"domain\user","S-1-5-..."` in CSV form.
            if let Ok(output) = std::process::Command::new("whoami")
                .args(["/user", "/fo", "csv", "/nh"])
                .output()
            {
                if output.status.success() {
                    if let Ok(text) = String::from_utf8(output.stdout) {
                        if let Some(field) = text.trim().rsplit(',').next() {
                            let sid = field.trim().trim_matches('"');
                            if sid.starts_with("S-") {
                                return Ok(DeviceIdentity(sid.to_string()));
                            }
                        }
                    }
                }
            }
        }

        #[cfg(target_os = "linux")]
        {
            if let Ok(machine_id) = std::fs::read_to_string("/etc/machine-id")
                .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))
            {
                let machine_id = machine_id.trim();
                if !machine_id.is_empty() {
                    return Ok(DeviceIdentity(machine_id.to_string()));
                }
            }
        }

        #[cfg(target_os = "macos")]
        {
            if let Ok(output) = std::process::Command::new("ioreg")
                .args(["-rd1", "-c", "IOPlatformExpertDevice"])
                .output()
            {
                if let Ok(text) = String::from_utf8(output.stdout) {
                    if let Some(line) = text.lines().find(|l| l.contains("IOPlatformUUID")) {
                        if let Some(uuid) = line.split('"').nth(3) {
                            return Ok(DeviceIdentity(uuid.to_string()));
                        }
                    }
                }
            }
        }

        Err(PrefsealError::DeviceIdentityUnavailable)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
