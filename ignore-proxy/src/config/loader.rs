//! Configuration file loading

use super::schema::Config;
use super::validator::ConfigValidator;
use crate::error::{ProxyError, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        // Priority order:
        // 1. $TLS_IGNORE_CONFIG
        // 2. $XDG_CONFIG_HOME/tls-ignore/config.toml
        // 3. ~/.config/tls-ignore/config.toml

        if let Ok(path) = env::var("TLS_IGNORE_CONFIG") {
            return PathBuf::from(path);
        }

        if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("tls-ignore/config.toml");
        }

        if let Ok(home) = env::var("HOME") {
            return PathBuf::from(home).join(".config/tls-ignore/config.toml");
        }

        PathBuf::from("config.toml")
    }

    /// Directory holding the registry database by default
    pub fn default_data_dir() -> PathBuf {
        if let Ok(xdg) = env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("tls-ignore");
        }

        if let Ok(home) = env::var("HOME") {
            return PathBuf::from(home).join(".local/share/tls-ignore");
        }

        PathBuf::from(".")
    }

    /// Load config from a file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ProxyError::ConfigLoad {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&contents)
    }

    /// Parse and validate config text
    pub fn parse(contents: &str) -> Result<Config> {
        let mut config: Config = toml::from_str(contents)?;
        Self::expand_paths(&mut config);
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Load config with fallback to defaults
    pub fn load() -> Result<Config> {
        let path = Self::default_config_path();

        if path.exists() {
            Self::load_from_file(&path)
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Load config from optional path or the default location
    /// Priority: Explicit path > User config > Defaults
    pub fn load_or_default(path: Option<PathBuf>) -> Result<Config> {
        match path {
            Some(p) => Self::load_from_file(p),
            None => Self::load(),
        }
    }

    fn expand_paths(config: &mut Config) {
        config.registry.database = expand_home(&config.registry.database);
        config.registry.compat_file = config.registry.compat_file.as_deref().map(expand_home);
        config.proxy.socket = expand_home(&config.proxy.socket);
    }

    /// Ensure the directory holding `path` exists
    pub fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
            _ => Ok(()),
        }
    }
}

/// Replace a leading `~/` with `$HOME`
pub fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), env::var("HOME")) {
        (Ok(rest), Ok(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}
