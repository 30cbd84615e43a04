//! Flat-file import and export of the ignore list
//!
//! The file format is one host per line. Blank lines and `#` comments are
//! skipped. An exporting instance always ends the file with [`SENTINEL`] so
//! external tooling can tell the file came from a live registry.

use crate::error::{RegistryError, Result};
use crate::record::Origin;
use crate::store::RegistryStore;
use chrono::Utc;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Liveness marker written as the last line of every export
pub const SENTINEL: &str = "plugin-tls-loaded";

/// Return the host named by one line of an ignore file, if any
pub fn parse_line(line: &str) -> Option<&str> {
    let entry = line.trim();
    if entry.is_empty() || entry.starts_with('#') || entry == SENTINEL {
        return None;
    }
    Some(entry)
}

/// Hosts named by an ignore file's contents, in file order
pub fn parse_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().filter_map(parse_line)
}

/// Whether `text` is an export written by a registry
///
/// Exports end with the sentinel line; hand-maintained lists do not.
pub fn is_export(text: &str) -> bool {
    text.lines().map(str::trim).filter(|line| !line.is_empty()).last() == Some(SENTINEL)
}

/// Write hosts one per line followed by the sentinel line
pub fn write_export<W: Write>(sink: &mut W, domains: &[String]) -> io::Result<()> {
    for domain in domains {
        writeln!(sink, "{}", domain)?;
    }
    writeln!(sink, "{}", SENTINEL)?;
    sink.flush()
}

/// Import every host listed in `path`, returning how many were new
pub fn import_file(store: &RegistryStore, path: &Path, origin: &Origin) -> Result<usize> {
    let content = read_list(path)?;
    Ok(import_content(store, path, &content, origin))
}

/// Import `path` unless it is a registry export
///
/// Returns `None` for exports. Their hosts already live in a registry, and
/// importing them again would reactivate hosts removed since the export.
pub fn import_foreign_file(
    store: &RegistryStore,
    path: &Path,
    origin: &Origin,
) -> Result<Option<usize>> {
    let content = read_list(path)?;
    if is_export(&content) {
        debug!("Skipping import of registry export {:?}", path);
        return Ok(None);
    }
    Ok(Some(import_content(store, path, &content, origin)))
}

fn read_list(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(RegistryError::FileNotFound(path.to_path_buf()));
    }

    fs::read_to_string(path).map_err(|e| RegistryError::File {
        path: path.to_path_buf(),
        source: e,
    })
}

fn import_content(store: &RegistryStore, path: &Path, content: &str, origin: &Origin) -> usize {
    let imported = store.bulk_import(content.lines(), origin);
    info!("Imported {} domains from {:?}", imported, path);
    imported
}

/// Write the active set to `path`, replacing it atomically
///
/// Returns the number of hosts written (the sentinel is not counted).
pub fn export_file(store: &RegistryStore, path: &Path) -> Result<usize> {
    let domains = store.try_list_active()?;
    write_export_file(path, &domains)?;

    info!("Exported {} domains to {:?}", domains.len(), path);
    Ok(domains.len())
}

/// Write `domains` in export format to `path` via a uniquely named temp file
///
/// Concurrent writers each get their own temp file, so readers only ever see
/// one complete export.
pub fn write_export_file(path: &Path, domains: &[String]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_err = |source: io::Error| RegistryError::File {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(file_err)?;
    write_export(&mut BufWriter::new(tmp.as_file_mut()), domains).map_err(file_err)?;
    tmp.persist(path).map_err(|e| file_err(e.error))?;
    Ok(())
}

/// Result of converting a legacy ignore file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub imported: usize,
    pub backup_path: PathBuf,
}

/// Move a legacy ignore file into the registry
///
/// Imports the file, renames the original to `<file>.backup.<timestamp>` and
/// writes a fresh export in its place.
pub fn migrate_file(store: &RegistryStore, path: &Path, origin: &Origin) -> Result<MigrationReport> {
    let imported = import_file(store, path, origin)?;

    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let backup_path = sibling_path(path, &format!(".backup.{}", timestamp));
    if backup_path.exists() {
        warn!("Overwriting existing backup {:?}", backup_path);
    }
    fs::rename(path, &backup_path).map_err(|e| RegistryError::File {
        path: path.to_path_buf(),
        source: e,
    })?;
    info!("Original file backed up to {:?}", backup_path);

    export_file(store, path)?;

    Ok(MigrationReport {
        imported,
        backup_path,
    })
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
