//! rdp-known-hosts CLI — `rkh` command.
//!
//! Inspects and edits a trust-on-first-use certificate store: list trusted
//! endpoints, trust or forget a certificate, and check a certificate against
//! what was seen before.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use rdp_known_hosts::{
    compare_ex, CertificateData, CertificateStore, StoreOptions, TrustStatus,
};

// ── Exit codes ────────────────────────────────────────────────────────────────

const EXIT_ERROR: i32 = 1;
const EXIT_UNKNOWN: i32 = 2;
const EXIT_MISMATCH: i32 = 3;

// ── Directory helpers ─────────────────────────────────────────────────────────

fn default_store_dir() -> Result<PathBuf> {
    let home = std::env::var_os("HOME").ok_or_else(|| anyhow!("HOME not set; pass --store"))?;
    Ok(PathBuf::from(home).join(".rdp-known-hosts"))
}

fn open_store(cli: &Cli) -> Result<CertificateStore> {
    let root = match &cli.store {
        Some(dir) => dir.clone(),
        None => default_store_dir()?,
    };

    let options = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str::<StoreOptions>(&text)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => StoreOptions::default(),
    };

    log::debug!("using store at {}", root.display());
    Ok(CertificateStore::with_options(root, options))
}

fn read_cert(host: &str, port: u16, path: &Path) -> Result<CertificateData> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    CertificateData::from_pem(host, port, &bytes)
        .with_context(|| format!("failed to parse {}", path.display()))
}

// ── CLI structure ─────────────────────────────────────────────────────────────

/// rdp-known-hosts CLI — manage the certificates a remote-desktop client has
/// trusted on first use.
#[derive(Parser, Debug)]
#[command(
    name = "rkh",
    about = "rdp-known-hosts CLI",
    version,
    long_about = "rkh — rdp-known-hosts CLI\n\nList, trust, check and forget the certificates\nremembered per (host, port) endpoint."
)]
struct Cli {
    /// Store root directory (default: ~/.rdp-known-hosts)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// JSON file with store options
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List all trusted endpoints
    List,

    /// Show the record for one endpoint
    Show {
        #[arg(long)]
        host: String,
        #[arg(long)]
        port: u16,
        /// Also print the stored certificate text
        #[arg(long)]
        pem: bool,
    },

    /// Trust a PEM certificate for an endpoint, replacing any previous one
    Add {
        #[arg(long)]
        host: String,
        #[arg(long)]
        port: u16,
        /// PEM file holding exactly one certificate
        #[arg(long)]
        cert: PathBuf,
    },

    /// Check a PEM certificate against the stored record
    Check {
        #[arg(long)]
        host: String,
        #[arg(long)]
        port: u16,
        #[arg(long)]
        cert: PathBuf,
    },

    /// Forget an endpoint
    Remove {
        #[arg(long)]
        host: String,
        #[arg(long)]
        port: u16,
    },

    /// Print subject, issuer and fingerprint of a PEM certificate
    Fingerprint {
        #[arg(long)]
        cert: PathBuf,
    },
}

// ── Main entry point ──────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let result = match &cli.command {
        Commands::List => cmd_list(&cli),
        Commands::Show { host, port, pem } => cmd_show(&cli, host, *port, *pem),
        Commands::Add { host, port, cert } => cmd_add(&cli, host, *port, cert),
        Commands::Check { host, port, cert } => cmd_check(&cli, host, *port, cert),
        Commands::Remove { host, port } => cmd_remove(&cli, host, *port),
        Commands::Fingerprint { cert } => cmd_fingerprint(&cli, cert),
    };

    match result {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(EXIT_ERROR);
        }
    }
}

// ── Command implementations ───────────────────────────────────────────────────

/// `rkh list`
fn cmd_list(cli: &Cli) -> Result<i32> {
    let store = open_store(cli)?;
    let table = store.read_table().context("failed to read store")?;

    if cli.json {
        let entries: Vec<&CertificateData> = table.records().collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(0);
    }

    if table.is_empty() {
        println!("No trusted endpoints in {}", store.table_path().display());
    }
    for entry in table.records() {
        println!("{}:{}", entry.host(), entry.port());
        println!("  Subject:     {}", entry.subject());
        println!("  Issuer:      {}", entry.issuer());
        println!("  Fingerprint: {}", entry.fingerprint());
    }

    if cli.verbose {
        for warning in table.warnings() {
            eprintln!("warning: {}: {warning}", store.table_path().display());
        }
    }
    Ok(0)
}

/// `rkh show --host H --port P [--pem]`
fn cmd_show(cli: &Cli, host: &str, port: u16, with_pem: bool) -> Result<i32> {
    let store = open_store(cli)?;
    let Some(entry) = store.load(host, port).context("failed to read store")? else {
        return Err(anyhow!("no certificate stored for {host}:{port}"));
    };

    if cli.json {
        let entry = if with_pem { entry } else { entry.without_pem() };
        println!("{}", serde_json::to_string_pretty(&entry)?);
        return Ok(0);
    }

    println!("{}:{}", entry.host(), entry.port());
    println!("  Subject:     {}", entry.subject());
    println!("  Issuer:      {}", entry.issuer());
    println!("  Fingerprint: {}", entry.fingerprint());
    match entry.pem() {
        Some(pem) if with_pem => print!("{pem}"),
        Some(_) => {
            if cli.verbose {
                println!("  Side-file:   {}", store.cert_path(&entry).display());
            }
        }
        None => println!("  Certificate: not stored"),
    }
    Ok(0)
}

/// `rkh add --host H --port P --cert FILE`
fn cmd_add(cli: &Cli, host: &str, port: u16, cert: &Path) -> Result<i32> {
    let store = open_store(cli)?;
    let data = read_cert(host, port, cert)?;

    let previous = store.load(host, port).context("failed to read store")?;
    store.save(&data).context("failed to save certificate")?;

    match previous {
        Some(previous) if compare_ex(&previous, &data) => {
            println!("{host}:{port} already trusted this certificate");
        }
        Some(previous) => {
            println!("Replaced certificate for {host}:{port}");
            println!("  Old fingerprint: {}", previous.fingerprint());
            println!("  New fingerprint: {}", data.fingerprint());
        }
        None => {
            println!("Trusted certificate for {host}:{port}");
            println!("  Fingerprint: {}", data.fingerprint());
        }
    }
    Ok(0)
}

/// `rkh check --host H --port P --cert FILE`
fn cmd_check(cli: &Cli, host: &str, port: u16, cert: &Path) -> Result<i32> {
    let store = open_store(cli)?;
    let data = read_cert(host, port, cert)?;

    let status = store.contains(&data).context("failed to read store")?;
    let (label, code) = match &status {
        TrustStatus::Trusted => ("trusted", 0),
        TrustStatus::Unknown => ("unknown", EXIT_UNKNOWN),
        TrustStatus::Mismatch(_) => ("mismatch", EXIT_MISMATCH),
    };

    if cli.json {
        let stored = match &status {
            TrustStatus::Mismatch(stored) => Some(stored.fingerprint()),
            _ => None,
        };
        let value = serde_json::json!({
            "host": host,
            "port": port,
            "status": label,
            "fingerprint": data.fingerprint(),
            "stored_fingerprint": stored,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(code);
    }

    println!("{label}");
    if let TrustStatus::Mismatch(stored) = &status {
        println!("  Presented fingerprint: {}", data.fingerprint());
        println!("  Stored fingerprint:    {}", stored.fingerprint());
        if cli.verbose {
            println!("  Stored subject:        {}", stored.subject());
            println!("  Stored issuer:         {}", stored.issuer());
        }
    }
    Ok(code)
}

/// `rkh remove --host H --port P`
fn cmd_remove(cli: &Cli, host: &str, port: u16) -> Result<i32> {
    let store = open_store(cli)?;
    let existed = store.load(host, port).context("failed to read store")?.is_some();
    store
        .remove_key(host, port)
        .context("failed to remove certificate")?;

    if existed {
        println!("Removed {host}:{port}");
    } else if cli.verbose {
        println!("{host}:{port} was not stored");
    }
    Ok(0)
}

/// `rkh fingerprint --cert FILE`
fn cmd_fingerprint(cli: &Cli, cert: &Path) -> Result<i32> {
    // Host and port are irrelevant for inspection.
    let data = read_cert("-", 0, cert)?;

    if cli.json {
        let value = serde_json::json!({
            "subject": data.subject(),
            "issuer": data.issuer(),
            "fingerprint": data.fingerprint(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(0);
    }

    println!("Subject:     {}", data.subject());
    println!("Issuer:      {}", data.issuer());
    println!("Fingerprint: {}", data.fingerprint());
    Ok(0)
}
