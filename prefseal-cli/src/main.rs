//! Prefseal - preference MAC inspection and repair for captured profiles
//!
//! Main entry point: every subcommand opens one backend store, resolves a
//! device identity, and drives the core engine's validate/recompute surface.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::Value;
use std::path::PathBuf;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use prefseal_core::{
    Backend, ConsistencyVerifier, DeviceIdentity, FilePreferenceStore, PrefsealError,
    PreferenceStore, RegistryPreferenceStore, Verdict,
};

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "prefseal",
    about = "Inspect and repair preference MACs in captured browser profiles",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Set log level
    #[clap(long, default_value = "warn", global = true)]
    log_level: LogLevel,
}

#[derive(Parser, Debug)]
struct StoreArgs {
    /// Path to the preference store document (Secure Preferences file or
    /// captured registry hive)
    #[clap(long)]
    prefs: PathBuf,

    /// Storage backend the document belongs to: file or registry
    #[clap(long, default_value = "file")]
    backend: String,

    /// Device identity the MACs are bound to (default: resolve from host)
    #[clap(long)]
    device_id: Option<String>,
}

#[derive(Parser, Debug)]
enum Command {
    /// Validate every protected path against its stored MAC
    Verify {
        #[clap(flatten)]
        store: StoreArgs,

        /// Show expected and computed digests for mismatches
        #[clap(long)]
        verbose: bool,
    },

    /// List protected paths and their consistency status
    List {
        #[clap(flatten)]
        store: StoreArgs,

        /// Include stored digests in the output
        #[clap(long)]
        hashes: bool,
    },

    /// Print a preference's current value and stored MAC
    Get {
        #[clap(flatten)]
        store: StoreArgs,

        /// Dot-delimited preference path
        path: String,
    },

    /// Deliberately change a protected value, recomputing its MAC
    Set {
        #[clap(flatten)]
        store: StoreArgs,

        /// Dot-delimited preference path
        path: String,

        /// New value as JSON; bare text is treated as a string
        value: String,
    },

    /// Print the canonical serialization and MAC for a value without
    /// touching any store
    Digest {
        /// Storage backend whose seed to use: file or registry
        #[clap(long, default_value = "file")]
        backend: String,

        /// Device identity to bind the digest to (default: resolve from host)
        #[clap(long)]
        device_id: Option<String>,

        /// Dot-delimited preference path
        path: String,

        /// Value as JSON; bare text is treated as a string
        value: String,
    },
}

#[derive(Tabled)]
struct PathRow {
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "MAC")]
    mac: String,
}

fn initialize_tracing(log_level: &LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_filter_directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_identity(flag: &Option<String>) -> Result<DeviceIdentity> {
    match flag {
        Some(id) => Ok(DeviceIdentity::new(id.clone())),
        None => {
            let identity = DeviceIdentity::resolve()?;
            debug!(identity = %identity, "Resolved device identity from host");
            Ok(identity)
        }
    }
}

fn open_verifier(args: &StoreArgs) -> Result<ConsistencyVerifier<Box<dyn PreferenceStore>>> {
    let backend: Backend = args.backend.parse()?;
    let store: Box<dyn PreferenceStore> = match backend {
        Backend::File => Box::new(FilePreferenceStore::new(&args.prefs)),
        Backend::Registry => Box::new(RegistryPreferenceStore::new(&args.prefs)),
    };
    Ok(ConsistencyVerifier::new(store, resolve_identity(&args.device_id)?))
}

/// Parse a CLI value argument: JSON when it parses, a plain string otherwise.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn print_table(rows: Vec<PathRow>) {
    let mut table = Table::new(rows);
    table
        .with(Style::sharp())
        .with(Modify::new(Rows::first()).with(Alignment::center()));
    println!("{table}");
}

fn run_verify(args: &StoreArgs, verbose: bool) -> Result<()> {
    let verifier = open_verifier(args)?;
    let results = verifier.verify_all()?;

    if results.is_empty() {
        println!("No protected paths in {}", args.prefs.display());
        return Ok(());
    }

    let mut invalid = 0;
    let mut rows = Vec::with_capacity(results.len());
    for (path, verdict) in &results {
        match verdict {
            Verdict::Valid => rows.push(PathRow {
                path: path.clone(),
                status: "valid".to_string(),
                mac: String::new(),
            }),
            Verdict::Invalid { expected, computed } => {
                invalid += 1;
                let err = PrefsealError::MacMismatch {
                    backend: verifier.backend(),
                    path: path.clone(),
                    expected: expected.clone(),
                    computed: computed.clone(),
                };
                err.log_if_security_critical();

                let detail = if verbose {
                    format!("stored {expected}, computed {computed}")
                } else {
                    String::new()
                };
                rows.push(PathRow {
                    path: path.clone(),
                    status: "INVALID".to_string(),
                    mac: detail,
                });
            }
        }
    }

    print_table(rows);
    println!();

    if invalid > 0 {
        bail!(
            "{invalid} of {} protected paths failed MAC verification",
            results.len()
        );
    }
    println!("All {} protected paths verified", results.len());
    Ok(())
}

fn run_list(args: &StoreArgs, hashes: bool) -> Result<()> {
    let verifier = open_verifier(args)?;

    let mut rows = Vec::new();
    for path in verifier.store().list_protected_paths()? {
        let (_, mac) = verifier.store().read(&path)?;
        let status = if verifier.is_consistent(&path)? {
            "valid"
        } else {
            "INVALID"
        };
        rows.push(PathRow {
            path,
            status: status.to_string(),
            mac: if hashes {
                mac.map(|m| m.hex_digest).unwrap_or_default()
            } else {
                String::new()
            },
        });
    }

    if rows.is_empty() {
        println!("No protected paths in {}", args.prefs.display());
    } else {
        print_table(rows);
    }
    Ok(())
}

fn run_get(args: &StoreArgs, path: &str) -> Result<()> {
    let verifier = open_verifier(args)?;
    let (value, mac) = verifier.store().read(path)?;

    println!("{}", serde_json::to_string_pretty(&value)?);
    match mac {
        Some(record) => {
            let status = if verifier.is_consistent(path)? {
                "valid"
            } else {
                "INVALID"
            };
            println!("MAC: {} ({status})", record.hex_digest);
        }
        None => println!("MAC: none (unprotected)"),
    }
    Ok(())
}

fn run_set(args: &StoreArgs, path: &str, raw_value: &str) -> Result<()> {
    let mut verifier = open_verifier(args)?;
    let value = parse_value(raw_value);

    verifier
        .set_protected_value(path, value)
        .with_context(|| format!("Failed to write protected value for '{path}'"))?;

    println!("Committed '{path}' with a fresh MAC");
    Ok(())
}

fn run_digest(backend: &str, device_id: &Option<String>, path: &str, raw_value: &str) -> Result<()> {
    let backend: Backend = backend.parse()?;
    let identity = resolve_identity(device_id)?;
    let value = parse_value(raw_value);

    let serialized = prefseal_core::mac::serialize_value(&value);
    let mac = prefseal_core::mac::compute_mac(backend, &identity, path, &value);

    println!("Backend:    {backend}");
    println!("Identity:   {identity}");
    println!("Serialized: {serialized}");
    println!("MAC:        {mac}");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    initialize_tracing(&cli.log_level);

    match &cli.command {
        Command::Verify { store, verbose } => run_verify(store, *verbose),
        Command::List { store, hashes } => run_list(store, *hashes),
        Command::Get { store, path } => run_get(store, path),
        Command::Set { store, path, value } => run_set(store, path, value),
        Command::Digest {
            backend,
            device_id,
            path,
            value,
        } => run_digest(backend, device_id, path, value),
    }
}
