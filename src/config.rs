//! Configuration file handling.
//!
//! This module provides loading and saving of govuln configuration from a
//! TOML file, and its resolution into the [`Settings`] every component
//! receives.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/govuln/config.toml`
//! - macOS: `~/Library/Application Support/govuln/config.toml`
//! - Windows: `%APPDATA%\govuln\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! internal_owner = "acme"
//! concurrency = 8
//! cache_ttl_hours = 24
//! scan_timeout_secs = 600
//! tidy_before_scan = true
//! default_format = "table"
//! log_level = "warn"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::platform::{self, GoEnv};

/// Application configuration, as written in the file.
///
/// Paths left unset are filled in from the environment by
/// [`resolve`](Self::resolve).
///
/// # Example
///
/// ```no_run
/// use govuln::Config;
///
/// // Load from file (or use defaults if file doesn't exist)
/// let config = Config::load().unwrap();
///
/// println!("Cache TTL: {} hours", config.cache_ttl_hours);
/// println!("Concurrency: {}", config.concurrency);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where per-project results are stored.
    ///
    /// Default: the platform data directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,

    /// Root of the Go module cache.
    ///
    /// Default: `$GOMODCACHE`, else `$GOPATH/pkg/mod`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_cache: Option<PathBuf>,

    /// Path of the govulncheck binary.
    ///
    /// Default: `$GOBIN/govulncheck`, else `$GOPATH/bin/govulncheck`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scanner_binary: Option<PathBuf>,

    /// The go command, used for `go mod tidy`.
    pub go_binary: String,

    /// Git owner whose modules are crawled as internal dependencies.
    ///
    /// Default: detected from the project's git remote
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_owner: Option<String>,

    /// Submodules scanned at the same time.
    pub concurrency: usize,

    /// How long a stored result stays fresh, in hours.
    pub cache_ttl_hours: u64,

    /// Deadline for one scanner run, in seconds.
    pub scan_timeout_secs: u64,

    /// Deadline for the whole submodule crawl, in seconds. 0 disables it.
    pub crawl_timeout_secs: u64,

    /// Run `go mod tidy` before scanning a top-level project.
    pub tidy_before_scan: bool,

    /// Valid values: "table", "markdown", "json"
    pub default_format: String,

    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: None,
            module_cache: None,
            scanner_binary: None,
            go_binary: "go".to_string(),
            internal_owner: None,
            concurrency: 8,
            cache_ttl_hours: 24,
            scan_timeout_secs: 600,
            crawl_timeout_secs: 0,
            tidy_before_scan: true,
            default_format: "table".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Fully resolved settings, built once at startup and passed by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub store_path: PathBuf,
    pub module_cache: PathBuf,
    pub scanner_binary: PathBuf,
    pub go_binary: String,
    pub internal_owner: Option<String>,
    pub concurrency: usize,
    pub cache_ttl_hours: u64,
    pub scan_timeout: Duration,
    pub crawl_timeout: Option<Duration>,
    pub tidy_before_scan: bool,
}

impl Config {
    /// Loads configuration from the config file.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        Self::parse(&content)
    }

    /// Parses configuration text.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Saves the configuration to the config file.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
        }

        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(&path, content).map_err(|e| Error::io(&path, e))?;
        Ok(())
    }

    /// Returns the path to the configuration file.
    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    /// Generates a string containing the default configuration.
    pub fn generate_default_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    /// Resolves the configuration against the current environment.
    pub fn resolve(&self) -> Settings {
        self.resolve_with(&GoEnv::from_env())
    }

    /// Resolves the configuration against an already captured environment.
    pub fn resolve_with(&self, env: &GoEnv) -> Settings {
        Settings {
            store_path: self.store_path.clone().unwrap_or_else(platform::store_dir),
            module_cache: self
                .module_cache
                .clone()
                .unwrap_or_else(|| env.module_cache_dir()),
            scanner_binary: self
                .scanner_binary
                .clone()
                .unwrap_or_else(|| env.scanner_binary()),
            go_binary: self.go_binary.clone(),
            internal_owner: self.internal_owner.clone().filter(|o| !o.is_empty()),
            concurrency: self.concurrency.max(1),
            cache_ttl_hours: self.cache_ttl_hours,
            scan_timeout: Duration::from_secs(self.scan_timeout_secs.max(1)),
            crawl_timeout: (self.crawl_timeout_secs > 0)
                .then(|| Duration::from_secs(self.crawl_timeout_secs)),
            tidy_before_scan: self.tidy_before_scan,
        }
    }
}
