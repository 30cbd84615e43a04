//! Admin tool for the TLS ignore registry

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ignore_proxy::ConfigLoader;
use ignore_registry::{transfer, DomainRecord, Origin, RegisterOutcome, RegistryStore};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(
    name = "tls-ignore",
    about = "Inspect and edit the TLS interception ignore registry",
    version
)]
struct Args {
    /// Registry database file (default: from config)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Config file path
    #[arg(long, short = 'c', global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List ignored domains
    List {
        /// Include deactivated domains and show full records
        #[arg(long)]
        all: bool,
    },
    /// Add a domain manually
    Add {
        domain: String,
        #[arg(long, default_value = "manual")]
        origin: String,
    },
    /// Stop ignoring a domain (history is kept)
    Remove { domain: String },
    /// Show a domain, or every domain containing the text
    Search { domain: String },
    /// Show registry statistics
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import domains from an ignore file
    Import {
        file: PathBuf,
        #[arg(long, default_value = "file_import")]
        origin: String,
    },
    /// Export active domains to an ignore file
    Export { file: PathBuf },
    /// Convert a legacy ignore file: import, back up, rewrite
    Migrate {
        file: PathBuf,
        #[arg(long, default_value = "migration")]
        origin: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(if args.verbose { "debug" } else { "warn" })
        .with_writer(io::stderr)
        .init();

    let config = ConfigLoader::load_or_default(args.config).context("Failed to load configuration")?;
    let database = args.db.unwrap_or(config.registry.database);
    debug!("Using registry database {:?}", database);
    ConfigLoader::ensure_parent_dir(&database)
        .with_context(|| format!("Failed to create directory for {:?}", database))?;
    let store = RegistryStore::open(&database)
        .with_context(|| format!("Failed to open registry {:?}", database))?;

    let stdout = io::stdout();
    run(
        args.command,
        &store,
        config.registry.compat_file.as_deref(),
        &mut stdout.lock(),
    )
}

/// Execute one subcommand
///
/// Commands that change the active set rewrite `compat_file` so the flat list
/// never advertises a host the registry no longer ignores.
fn run<W: Write>(
    command: Command,
    store: &RegistryStore,
    compat_file: Option<&Path>,
    out: &mut W,
) -> Result<()> {
    match command {
        Command::List { all: false } => {
            let domains = store.try_list_active()?;
            if domains.is_empty() {
                writeln!(out, "No ignored domains")?;
            }
            for domain in domains {
                writeln!(out, "{}", domain)?;
            }
        }
        Command::List { all: true } => {
            let records = store.try_list_all()?;
            if records.is_empty() {
                writeln!(out, "Registry is empty")?;
            } else {
                write_table(out, &records)?;
            }
        }
        Command::Add { domain, origin } => {
            match store.try_register(&domain, &Origin::parse(&origin))? {
                RegisterOutcome::Inserted => writeln!(out, "Added {}", domain)?,
                RegisterOutcome::Updated => writeln!(out, "{} already registered, updated", domain)?,
            }
            sync_compat_file(store, compat_file)?;
        }
        Command::Remove { domain } => {
            if !store.try_deactivate(&domain)? {
                bail!("Domain not found: {}", domain);
            }
            writeln!(out, "Deactivated {}", domain)?;
            sync_compat_file(store, compat_file)?;
        }
        Command::Search { domain } => {
            if let Some(record) = store.try_get(&domain)? {
                write_record(out, &record)?;
            } else {
                let matches = store.try_search(&domain)?;
                if matches.is_empty() {
                    bail!("No domain matching {:?}", domain);
                }
                write_table(out, &matches)?;
            }
        }
        Command::Stats { json: true } => {
            let stats = store.try_stats()?;
            writeln!(out, "{}", serde_json::to_string_pretty(&stats)?)?;
        }
        Command::Stats { json: false } => {
            let stats = store.try_stats()?;
            writeln!(out, "Total domains:    {}", stats.total)?;
            writeln!(out, "Active domains:   {}", stats.active)?;
            writeln!(out, "Inactive domains: {}", stats.inactive)?;
            if !stats.origins.is_empty() {
                writeln!(out, "By origin (active):")?;
                for (origin, count) in &stats.origins {
                    writeln!(out, "  {:<22} {}", origin, count)?;
                }
            }
        }
        Command::Import { file, origin } => {
            let imported = transfer::import_file(store, &file, &Origin::parse(&origin))
                .with_context(|| format!("Import from {:?} failed", file))?;
            writeln!(out, "Imported {} new domains from {}", imported, file.display())?;
            sync_compat_file(store, compat_file)?;
        }
        Command::Export { file } => {
            let exported = transfer::export_file(store, &file)
                .with_context(|| format!("Export to {:?} failed", file))?;
            writeln!(out, "Exported {} domains to {}", exported, file.display())?;
        }
        Command::Migrate { file, origin } => {
            let report = transfer::migrate_file(store, &file, &Origin::parse(&origin))
                .with_context(|| format!("Migration of {:?} failed", file))?;
            writeln!(out, "Migrated {} new domains from {}", report.imported, file.display())?;
            writeln!(out, "Backup saved to {}", report.backup_path.display())?;
        }
    }
    Ok(())
}

fn sync_compat_file(store: &RegistryStore, compat_file: Option<&Path>) -> Result<()> {
    if let Some(path) = compat_file {
        let exported = transfer::export_file(store, path)
            .with_context(|| format!("Failed to update ignore file {:?}", path))?;
        debug!("Rewrote {:?} with {} domains", path, exported);
    }
    Ok(())
}

fn write_record<W: Write>(out: &mut W, record: &DomainRecord) -> io::Result<()> {
    writeln!(out, "Domain:     {}", record.domain)?;
    writeln!(out, "Origin:     {}", record.origin)?;
    writeln!(out, "Added:      {}", record.date_added.format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(out, "Last seen:  {}", record.last_seen.format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(out, "Count:      {}", record.count)?;
    writeln!(out, "Status:     {}", status(record))
}

fn write_table<W: Write>(out: &mut W, records: &[DomainRecord]) -> io::Result<()> {
    let width = records
        .iter()
        .map(|r| r.domain.len())
        .max()
        .unwrap_or(0)
        .max("DOMAIN".len());

    writeln!(
        out,
        "{:<width$}  {:<20}  {:<19}  {:>5}  STATUS",
        "DOMAIN", "ORIGIN", "LAST SEEN", "COUNT"
    )?;
    for record in records {
        writeln!(
            out,
            "{:<width$}  {:<20}  {:<19}  {:>5}  {}",
            record.domain,
            record.origin.as_str(),
            record.last_seen.format("%Y-%m-%d %H:%M:%S").to_string(),
            record.count,
            status(record)
        )?;
    }
    Ok(())
}

fn status(record: &DomainRecord) -> &'static str {
    if record.active {
        "active"
    } else {
        "inactive"
    }
}
