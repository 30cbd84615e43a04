//! Registry row types

use crate::error::{RegistryError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Why a domain was first put on the ignore list
///
/// Stored as its tag string. Unknown tags survive a round trip through `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Origin {
    Manual,
    FileImport,
    Migration,
    TcpTlsError,
    ClientTlsError,
    TransportTlsError,
    HandshakeTlsError,
    Other(String),
}

impl Origin {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "manual" => Origin::Manual,
            "file_import" => Origin::FileImport,
            "migration" => Origin::Migration,
            "tcp_tls_error" => Origin::TcpTlsError,
            "client_tls_error" => Origin::ClientTlsError,
            "transport_tls_error" => Origin::TransportTlsError,
            "handshake_tls_error" => Origin::HandshakeTlsError,
            other => Origin::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Origin::Manual => "manual",
            Origin::FileImport => "file_import",
            Origin::Migration => "migration",
            Origin::TcpTlsError => "tcp_tls_error",
            Origin::ClientTlsError => "client_tls_error",
            Origin::TransportTlsError => "transport_tls_error",
            Origin::HandshakeTlsError => "handshake_tls_error",
            Origin::Other(tag) => tag,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Origin {
    fn from(tag: String) -> Self {
        Origin::parse(&tag)
    }
}

impl From<&str> for Origin {
    fn from(tag: &str) -> Self {
        Origin::parse(tag)
    }
}

impl From<Origin> for String {
    fn from(origin: Origin) -> Self {
        origin.as_str().to_string()
    }
}

/// Which branch of the upsert ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// No row existed; one was created with `count = 1`
    Inserted,
    /// A row existed (active or not); it was bumped and reactivated
    Updated,
}

/// One ignored domain with its audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub domain: String,
    pub origin: Origin,
    pub date_added: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub count: u64,
    pub active: bool,
}

/// Registry totals; `origins` only counts active rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
    pub origins: BTreeMap<String, u64>,
}

/// Canonical form of a hostname as stored in the registry
///
/// Trims whitespace, drops IPv6 brackets and one trailing dot, and lowercases
/// ASCII. Hostnames are case-insensitive on the wire, so `Example.COM.` and
/// `example.com` name the same row.
pub fn normalize_domain(raw: &str) -> Result<String> {
    let mut host = raw.trim();

    if let Some(inner) = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        host = inner;
    }
    if let Some(stripped) = host.strip_suffix('.') {
        host = stripped;
    }

    if host.is_empty() || host.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(RegistryError::InvalidDomain(raw.to_string()));
    }

    Ok(host.to_ascii_lowercase())
}
