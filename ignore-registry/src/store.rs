//! SQLite-backed ignore registry
//!
//! Every public operation catches storage faults at its boundary, logs them
//! and degrades to an empty or negative answer. Losing the ignore list must
//! never take the proxy down. Callers that have to report failures (the admin
//! CLI) use the `try_*` variants instead.

use crate::error::{RegistryError, Result};
use crate::record::{normalize_domain, DomainRecord, Origin, RegisterOutcome, RegistryStats};
use crate::transfer;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// Compatible with databases written by earlier releases.
const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS ignore_hosts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    domain TEXT UNIQUE NOT NULL,
    origin TEXT NOT NULL,
    date_added TEXT NOT NULL,
    last_seen TEXT NOT NULL,
    count INTEGER DEFAULT 1,
    active BOOLEAN DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_domain ON ignore_hosts(domain);
CREATE INDEX IF NOT EXISTS idx_active ON ignore_hosts(active);
";

const UPSERT: &str = "
INSERT INTO ignore_hosts (domain, origin, date_added, last_seen, count, active)
VALUES (?1, ?2, ?3, ?3, 1, 1)
ON CONFLICT(domain) DO UPDATE SET
    last_seen = excluded.last_seen,
    count = ignore_hosts.count + 1,
    active = 1
RETURNING count";

const RECORD_COLUMNS: &str = "domain, origin, date_added, last_seen, count, active";

/// Durable table of ignored domains
///
/// The connection sits behind a mutex, which is the single write
/// serialization point inside a process. Across processes SQLite's own
/// locking applies and the busy timeout absorbs short contention.
pub struct RegistryStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl RegistryStore {
    /// Open or create the registry database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening ignore registry at {:?}", path);

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Open a private in-memory registry
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(mut conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;

        let merged = canonicalize_domains(&mut conn)?;
        if merged > 0 {
            info!("Normalized {} stored domain names", merged);
        }

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Database file backing this store, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| RegistryError::LockPoisoned)
    }

    /// Insert `domain`, or bump and reactivate it if it already exists
    ///
    /// On update the stored origin is kept: it records why the domain was
    /// first flagged.
    pub fn try_register(&self, domain: &str, origin: &Origin) -> Result<RegisterOutcome> {
        let domain = normalize_domain(domain)?;
        let now = timestamp(Utc::now());

        let count: i64 = self
            .conn()?
            .query_row(UPSERT, params![domain, origin.as_str(), now], |row| row.get(0))?;

        if count == 1 {
            debug!("Added new domain: {} (origin: {})", domain, origin);
            Ok(RegisterOutcome::Inserted)
        } else {
            debug!("Updated existing domain: {} (count: {})", domain, count);
            Ok(RegisterOutcome::Updated)
        }
    }

    /// [`try_register`](Self::try_register) that logs failures and returns `None`
    pub fn register(&self, domain: &str, origin: &Origin) -> Option<RegisterOutcome> {
        match self.try_register(domain, origin) {
            Ok(outcome) => Some(outcome),
            Err(RegistryError::InvalidDomain(raw)) => {
                warn!("Refusing to register invalid domain {:?}", raw);
                None
            }
            Err(e) => {
                error!("Failed to register domain {}: {}", domain, e);
                None
            }
        }
    }

    /// Active domains in lexicographic order
    pub fn try_list_active(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare_cached("SELECT domain FROM ignore_hosts WHERE active = 1 ORDER BY domain")?;
        let domains = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        debug!("Retrieved {} active domains", domains.len());
        Ok(domains)
    }

    /// Active domains, or an empty list if the store is unreadable
    pub fn list_active(&self) -> Vec<String> {
        degrade("list active domains", self.try_list_active())
    }

    /// Look up one domain, active or not
    pub fn try_get(&self, domain: &str) -> Result<Option<DomainRecord>> {
        let domain = normalize_domain(domain)?;
        let raw = self
            .conn()?
            .query_row(
                &format!("SELECT {} FROM ignore_hosts WHERE domain = ?1", RECORD_COLUMNS),
                params![domain],
                RawRecord::from_row,
            )
            .optional()?;

        raw.map(RawRecord::into_record).transpose()
    }

    pub fn get(&self, domain: &str) -> Option<DomainRecord> {
        match self.try_get(domain) {
            Ok(record) => record,
            Err(RegistryError::InvalidDomain(_)) => None,
            Err(e) => {
                error!("Failed to get domain info for {}: {}", domain, e);
                None
            }
        }
    }

    /// Every record, newest first
    pub fn try_list_all(&self) -> Result<Vec<DomainRecord>> {
        self.query_records(
            &format!(
                "SELECT {} FROM ignore_hosts ORDER BY date_added DESC, id DESC",
                RECORD_COLUMNS
            ),
            [],
        )
    }

    pub fn list_all(&self) -> Vec<DomainRecord> {
        degrade("list all domains", self.try_list_all())
    }

    /// Records whose domain contains `fragment`, sorted by domain
    pub fn try_search(&self, fragment: &str) -> Result<Vec<DomainRecord>> {
        let needle = fragment.trim().to_ascii_lowercase();
        let pattern = format!(
            "%{}%",
            needle.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
        );
        self.query_records(
            &format!(
                "SELECT {} FROM ignore_hosts WHERE domain LIKE ?1 ESCAPE '\\' ORDER BY domain",
                RECORD_COLUMNS
            ),
            params![pattern],
        )
    }

    pub fn search(&self, fragment: &str) -> Vec<DomainRecord> {
        degrade("search domains", self.try_search(fragment))
    }

    fn query_records<P: Params>(&self, sql: &str, args: P) -> Result<Vec<DomainRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(args, RawRecord::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);
        drop(conn);

        rows.into_iter().map(RawRecord::into_record).collect()
    }

    /// Soft-delete `domain`; returns whether a row was found
    pub fn try_deactivate(&self, domain: &str) -> Result<bool> {
        let domain = normalize_domain(domain)?;
        let changed = self.conn()?.execute(
            "UPDATE ignore_hosts SET active = 0 WHERE domain = ?1",
            params![domain],
        )?;

        if changed > 0 {
            info!("Deactivated domain: {}", domain);
            Ok(true)
        } else {
            warn!("Domain not found for deactivation: {}", domain);
            Ok(false)
        }
    }

    pub fn deactivate(&self, domain: &str) -> bool {
        match self.try_deactivate(domain) {
            Ok(found) => found,
            Err(RegistryError::InvalidDomain(_)) => false,
            Err(e) => {
                error!("Failed to deactivate domain {}: {}", domain, e);
                false
            }
        }
    }

    pub fn try_stats(&self) -> Result<RegistryStats> {
        let conn = self.conn()?;
        let (total, active): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN active = 1 THEN 1 ELSE 0 END), 0) FROM ignore_hosts",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let mut stmt = conn.prepare_cached(
            "SELECT origin, COUNT(*) FROM ignore_hosts WHERE active = 1 GROUP BY origin",
        )?;
        let origins: BTreeMap<String, u64> = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, to_count(row.get(1)?))))?
            .collect::<rusqlite::Result<_>>()?;

        let total = to_count(total);
        let active = to_count(active);
        Ok(RegistryStats {
            total,
            active,
            inactive: total - active,
            origins,
        })
    }

    /// Registry totals, zeroed if the store is unreadable
    pub fn stats(&self) -> RegistryStats {
        degrade("compute statistics", self.try_stats())
    }

    /// Register every host named in `lines`, returning how many were new
    pub fn bulk_import<I, S>(&self, lines: I, origin: &Origin) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut imported = 0;
        for line in lines {
            let Some(domain) = transfer::parse_line(line.as_ref()) else {
                continue;
            };
            if self.register(domain, origin) == Some(RegisterOutcome::Inserted) {
                imported += 1;
            }
        }
        imported
    }

    /// Write the active set to `sink`, returning the number of hosts written
    pub fn try_export_active<W: Write>(&self, sink: &mut W) -> Result<usize> {
        let domains = self.try_list_active()?;
        transfer::write_export(sink, &domains)?;
        Ok(domains.len())
    }

    pub fn export_active<W: Write>(&self, sink: &mut W) -> bool {
        match self.try_export_active(sink) {
            Ok(_) => true,
            Err(e) => {
                error!("Failed to export active domains: {}", e);
                false
            }
        }
    }
}

/// Rewrite stored domains into canonical form
///
/// Databases from earlier releases kept hostnames byte-exact, so one host can
/// appear under several spellings. Rows sharing a canonical name collapse into
/// the earliest one: counts are summed, the latest `last_seen` wins and the
/// row is active if any spelling was. Returns the number of rows rewritten or
/// removed.
fn canonicalize_domains(conn: &mut Connection) -> Result<usize> {
    let tx = conn.transaction()?;

    let rows: Vec<(i64, RawRecord)> = {
        let mut stmt = tx.prepare(&format!("SELECT {}, id FROM ignore_hosts", RECORD_COLUMNS))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(6)?, RawRecord::from_row(row)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows
    };

    let mut groups: BTreeMap<String, Vec<(i64, RawRecord)>> = BTreeMap::new();
    for (id, raw) in rows {
        match normalize_domain(&raw.domain) {
            Ok(canonical) => groups.entry(canonical).or_default().push((id, raw)),
            Err(_) => warn!("Leaving unusable stored domain {:?} untouched", raw.domain),
        }
    }

    let mut changed = 0;
    for (canonical, mut group) in groups {
        if group.len() == 1 && group[0].1.domain == canonical {
            continue;
        }

        group.sort_by_key(|(id, raw)| (sort_time(raw, &raw.date_added), *id));
        let count: i64 = group.iter().map(|(_, raw)| raw.count).sum();
        let active = group.iter().any(|(_, raw)| raw.active);
        let last_seen = group
            .iter()
            .max_by_key(|(_, raw)| sort_time(raw, &raw.last_seen))
            .map(|(_, raw)| raw.last_seen.clone())
            .unwrap_or_default();

        let (keep, rest) = group.split_at(1);
        for (id, raw) in rest {
            debug!("Merging stored domain {:?} into {}", raw.domain, canonical);
            tx.execute("DELETE FROM ignore_hosts WHERE id = ?1", params![id])?;
            changed += 1;
        }
        tx.execute(
            "UPDATE ignore_hosts SET domain = ?1, count = ?2, last_seen = ?3, active = ?4 WHERE id = ?5",
            params![canonical, count, last_seen, active, keep[0].0],
        )?;
        changed += 1;
    }

    tx.commit()?;
    Ok(changed)
}

/// Parsed timestamp for ordering; unparseable values sort last
fn sort_time(raw: &RawRecord, value: &str) -> DateTime<Utc> {
    parse_timestamp(&raw.domain, value).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn degrade<T: Default>(operation: &str, result: Result<T>) -> T {
    result.unwrap_or_else(|e| {
        error!("Failed to {}: {}", operation, e);
        T::default()
    })
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(domain: &str, value: &str) -> Result<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }
    // Older databases hold naive ISO-8601 timestamps.
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|source| RegistryError::Timestamp {
            domain: domain.to_string(),
            value: value.to_string(),
            source,
        })
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Row as stored, before timestamp parsing
struct RawRecord {
    domain: String,
    origin: String,
    date_added: String,
    last_seen: String,
    count: i64,
    active: bool,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            domain: row.get(0)?,
            origin: row.get(1)?,
            date_added: row.get(2)?,
            last_seen: row.get(3)?,
            count: row.get::<_, Option<i64>>(4)?.unwrap_or(1),
            active: row.get::<_, Option<bool>>(5)?.unwrap_or(true),
        })
    }

    fn into_record(self) -> Result<DomainRecord> {
        Ok(DomainRecord {
            date_added: parse_timestamp(&self.domain, &self.date_added)?,
            last_seen: parse_timestamp(&self.domain, &self.last_seen)?,
            origin: Origin::from(self.origin),
            count: to_count(self.count),
            active: self.active,
            domain: self.domain,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn store() -> RegistryStore {
        RegistryStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_register_then_update() {
        let store = store();

        assert_eq!(
            store.register("bad.example.com", &Origin::ClientTlsError),
            Some(RegisterOutcome::Inserted)
        );
        let first = store.get("bad.example.com").unwrap();
        assert_eq!(first.count, 1);
        assert!(first.active);
        assert_eq!(first.date_added, first.last_seen);

        assert_eq!(
            store.register("bad.example.com", &Origin::Manual),
            Some(RegisterOutcome::Updated)
        );
        let second = store.get("bad.example.com").unwrap();
        assert_eq!(second.count, 2);
        assert_eq!(second.origin, Origin::ClientTlsError);
        assert_eq!(second.date_added, first.date_added);
        assert!(second.last_seen >= first.last_seen);
    }

    #[test]
    fn test_register_normalizes_case() {
        let store = store();
        store.register("Example.COM.", &Origin::Manual);
        assert_eq!(
            store.register("example.com", &Origin::Manual),
            Some(RegisterOutcome::Updated)
        );
        assert_eq!(store.list_active(), vec!["example.com"]);
        assert!(store.get("EXAMPLE.com").is_some());
    }

    #[test]
    fn test_register_rejects_empty_domain() {
        let store = store();
        assert_eq!(store.register("  ", &Origin::Manual), None);
        assert_eq!(store.stats().total, 0);
    }

    #[test]
    fn test_list_active_sorted() {
        let store = store();
        for domain in ["zeta.com", "alpha.com", "mid.com"] {
            store.register(domain, &Origin::Manual);
        }
        assert_eq!(store.list_active(), vec!["alpha.com", "mid.com", "zeta.com"]);
    }

    #[test]
    fn test_deactivate_unknown_domain() {
        let store = store();
        assert!(!store.deactivate("never.example.com"));
        assert!(store.get("never.example.com").is_none());
        assert_eq!(store.stats().total, 0);
    }

    #[test]
    fn test_deactivate_keeps_history() {
        let store = store();
        store.register("old.example.com", &Origin::Manual);
        store.register("old.example.com", &Origin::Manual);

        assert!(store.deactivate("old.example.com"));
        assert!(store.list_active().is_empty());

        let record = store.get("old.example.com").unwrap();
        assert!(!record.active);
        assert_eq!(record.count, 2);
        assert_eq!(record.origin, Origin::Manual);
    }

    #[test]
    fn test_reregister_reactivates() {
        let store = store();
        store.register("flaky.example.com", &Origin::TcpTlsError);
        let added = store.get("flaky.example.com").unwrap().date_added;
        store.deactivate("flaky.example.com");

        assert_eq!(
            store.register("flaky.example.com", &Origin::Manual),
            Some(RegisterOutcome::Updated)
        );
        let record = store.get("flaky.example.com").unwrap();
        assert!(record.active);
        assert_eq!(record.count, 2);
        assert_eq!(record.date_added, added);
        assert_eq!(record.origin, Origin::TcpTlsError);
        assert_eq!(store.list_active(), vec!["flaky.example.com"]);
    }

    #[test]
    fn test_stats_example() {
        let store = store();
        store.register("bad.example.com", &Origin::ClientTlsError);

        let stats = store.stats();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.inactive, 0);
        assert_eq!(stats.origins.len(), 1);
        assert_eq!(stats.origins.get("client_tls_error"), Some(&1));
    }

    #[test]
    fn test_stats_origins_only_count_active() {
        let store = store();
        store.register("a.com", &Origin::Manual);
        store.register("b.com", &Origin::Manual);
        store.register("c.com", &Origin::FileImport);
        store.deactivate("b.com");
        store.deactivate("c.com");

        let stats = store.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.inactive, 2);
        assert_eq!(stats.origins.get("manual"), Some(&1));
        assert_eq!(stats.origins.get("file_import"), None);
    }

    #[test]
    fn test_list_all_newest_first() {
        let store = store();
        store.register("first.com", &Origin::Manual);
        store.register("second.com", &Origin::Manual);
        store.register("third.com", &Origin::Manual);
        store.deactivate("second.com");

        let domains: Vec<_> = store.list_all().into_iter().map(|r| r.domain).collect();
        assert_eq!(domains, vec!["third.com", "second.com", "first.com"]);
    }

    #[test]
    fn test_search_matches_fragment() {
        let store = store();
        store.register("api.example.com", &Origin::Manual);
        store.register("cdn.example.com", &Origin::Manual);
        store.register("other.org", &Origin::Manual);
        store.register("a_b.net", &Origin::Manual);

        let found: Vec<_> = store.search("EXAMPLE").into_iter().map(|r| r.domain).collect();
        assert_eq!(found, vec!["api.example.com", "cdn.example.com"]);

        // LIKE wildcards in the fragment are literal
        let found: Vec<_> = store.search("_").into_iter().map(|r| r.domain).collect();
        assert_eq!(found, vec!["a_b.net"]);
    }

    #[test]
    fn test_bulk_import_skips_noise_and_counts_new() {
        let store = store();
        store.register("known.com", &Origin::Manual);

        let lines = ["# header", "", "known.com", "new.com", "plugin-tls-loaded", "  spaced.com  "];
        assert_eq!(store.bulk_import(lines, &Origin::FileImport), 2);
        assert_eq!(store.list_active(), vec!["known.com", "new.com", "spaced.com"]);
        assert!(store.get("plugin-tls-loaded").is_none());
        assert_eq!(store.get("known.com").unwrap().origin, Origin::Manual);
    }

    #[test]
    fn test_export_active() {
        let store = store();
        store.register("b.com", &Origin::Manual);
        store.register("a.com", &Origin::Manual);

        let mut out = Vec::new();
        assert!(store.export_active(&mut out));
        assert_eq!(String::from_utf8(out).unwrap(), "a.com\nb.com\nplugin-tls-loaded\n");
    }

    #[test]
    fn test_concurrent_register_same_domain() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RegistryStore::open(dir.path().join("registry.db")).unwrap());
        let threads = 16;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.register("race.example.com", &Origin::TransportTlsError))
            })
            .collect();

        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let inserted = outcomes
            .iter()
            .filter(|o| **o == Some(RegisterOutcome::Inserted))
            .count();
        let updated = outcomes
            .iter()
            .filter(|o| **o == Some(RegisterOutcome::Updated))
            .count();

        assert_eq!(inserted, 1);
        assert_eq!(updated, threads - 1);
        assert_eq!(store.get("race.example.com").unwrap().count, threads as u64);
        assert_eq!(store.stats().total, 1);
    }

    #[test]
    fn test_concurrent_register_across_connections() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shared.db");
        let first = Arc::new(RegistryStore::open(&path).unwrap());
        let second = Arc::new(RegistryStore::open(&path).unwrap());
        first.register("shared.example.com", &Origin::Manual);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = if i % 2 == 0 {
                    Arc::clone(&first)
                } else {
                    Arc::clone(&second)
                };
                thread::spawn(move || store.register("shared.example.com", &Origin::Manual))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), Some(RegisterOutcome::Updated));
        }

        assert_eq!(second.get("shared.example.com").unwrap().count, 9);
    }

    #[test]
    fn test_reopen_preserves_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.db");
        {
            let store = RegistryStore::open(&path).unwrap();
            store.register("persist.example.com", &Origin::Manual);
            store.deactivate("persist.example.com");
        }

        let store = RegistryStore::open(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        let record = store.get("persist.example.com").unwrap();
        assert!(!record.active);
        assert_eq!(store.register("persist.example.com", &Origin::Manual), Some(RegisterOutcome::Updated));
        assert_eq!(store.get("persist.example.com").unwrap().count, 2);
    }

    #[test]
    fn test_reads_legacy_timestamps() {
        let store = store();
        store
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO ignore_hosts (domain, origin, date_added, last_seen, count, active)
                 VALUES ('legacy.com', 'tcp_tls_error', '2024-03-01T10:15:30.123456', '2024-03-02T08:00:00', 3, 1)",
                [],
            )
            .unwrap();

        let record = store.get("legacy.com").unwrap();
        assert_eq!(record.count, 3);
        assert_eq!(record.origin, Origin::TcpTlsError);
        assert_eq!(timestamp(record.last_seen), "2024-03-02T08:00:00.000000Z");
    }

    #[test]
    fn test_open_merges_legacy_spellings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.db");
        drop(RegistryStore::open(&path).unwrap());

        let legacy = Connection::open(&path).unwrap();
        legacy
            .execute_batch(
                "INSERT INTO ignore_hosts (domain, origin, date_added, last_seen, count, active) VALUES
                 ('Bad.Example.com', 'tcp_tls_error', '2023-01-01T00:00:00', '2023-06-01T00:00:00', 3, 0),
                 ('bad.example.com', 'manual', '2024-01-01T00:00:00', '2024-02-01T00:00:00', 2, 1),
                 ('Solo.Example.org', 'manual', '2024-01-01T00:00:00', '2024-01-01T00:00:00', 1, 1);",
            )
            .unwrap();
        drop(legacy);

        let store = RegistryStore::open(&path).unwrap();
        assert_eq!(store.list_active(), vec!["bad.example.com", "solo.example.org"]);
        assert_eq!(store.stats().total, 2);

        let record = store.get("BAD.example.com").unwrap();
        assert_eq!(record.count, 5);
        assert_eq!(record.origin, Origin::TcpTlsError);
        assert!(record.active);
        assert_eq!(timestamp(record.date_added), "2023-01-01T00:00:00.000000Z");
        assert_eq!(timestamp(record.last_seen), "2024-02-01T00:00:00.000000Z");

        assert!(store.deactivate("Bad.Example.com"));
        assert_eq!(
            store.register("bad.example.com", &Origin::Manual),
            Some(RegisterOutcome::Updated)
        );
        assert_eq!(store.get("bad.example.com").unwrap().count, 6);
    }

    #[test]
    fn test_open_leaves_canonical_rows_alone() {
        let store = store();
        store.register("a.com", &Origin::Manual);
        let mut conn = store.conn().unwrap();
        assert_eq!(canonicalize_domains(&mut conn).unwrap(), 0);
    }

    #[test]
    fn test_storage_fault_degrades() {
        let store = store();
        store.register("a.com", &Origin::Manual);
        store
            .conn()
            .unwrap()
            .execute_batch("DROP TABLE ignore_hosts")
            .unwrap();

        assert!(store.list_active().is_empty());
        assert!(store.list_all().is_empty());
        assert_eq!(store.stats(), RegistryStats::default());
        assert_eq!(store.register("b.com", &Origin::Manual), None);
        assert!(!store.deactivate("a.com"));
        assert!(store.get("a.com").is_none());
        assert!(store.try_list_active().is_err());
    }
}
