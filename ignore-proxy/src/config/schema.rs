//! Configuration schema types

use super::loader::ConfigLoader;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete configuration for the collector and its listener
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
}

/// Where the registry lives and how it is seeded
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryConfig {
    /// SQLite database file
    #[serde(default = "default_database")]
    pub database: PathBuf,
    /// Flat ignore file kept in sync for external tooling
    #[serde(default)]
    pub compat_file: Option<PathBuf>,
    /// Import `compat_file` into the registry at startup
    #[serde(default = "default_true")]
    pub import_on_start: bool,
}

fn default_database() -> PathBuf {
    ConfigLoader::default_data_dir().join("ignore_hosts.db")
}

fn default_true() -> bool {
    true
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            compat_file: None,
            import_on_start: default_true(),
        }
    }
}

/// Proxy-facing settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfig {
    /// Unix domain socket the proxy engine reports failures to
    #[serde(default = "default_socket")]
    pub socket: PathBuf,
    /// Operator-supplied ignore patterns; always part of the effective set
    #[serde(default)]
    pub ignore_hosts: Vec<String>,
}

fn default_socket() -> PathBuf {
    PathBuf::from("/tmp/tls-ignore.sock")
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            socket: default_socket(),
            ignore_hosts: Vec::new(),
        }
    }
}
