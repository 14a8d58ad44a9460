//! Error types for govuln.
//!
//! Most of these are recoverable at some level: the crawler turns per-module
//! failures into [`CrawlFailure`](crate::crawler::CrawlFailure) rows, the cache
//! turns unreadable entries into cold starts and the resolver turns unparsable
//! versions into skipped entries. Only project-level failures reach the caller.

use std::path::PathBuf;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A version string is not a valid semantic version.
    #[error("version parse error: '{version}': {reason}")]
    VersionParse { version: String, reason: String },

    /// The folder to check has no `go.mod`.
    #[error("{} is not a go module (go.mod not found)", path.display())]
    NotAModule { path: PathBuf },

    /// The scanner ran but its output carried no bill of materials.
    #[error("scanner output for {} contains no SBOM record", path.display())]
    MissingSbom { path: PathBuf },

    /// The external scanner could not be started or exited unsuccessfully.
    #[error("scanner failed: {command}: {reason}")]
    Scanner { command: String, reason: String },

    /// The external scanner did not finish before its deadline.
    #[error("scanner timed out after {secs}s: {command}")]
    ScannerTimeout { command: String, secs: u64 },

    /// The module source is not present in the local module cache.
    #[error("module {module}@{version} not found in module cache: {}", path.display())]
    ModuleNotCached {
        module: String,
        version: String,
        path: PathBuf,
    },

    /// A cache entry could not be encoded or written.
    #[error("cache error: {}: {reason}", path.display())]
    Cache { path: PathBuf, reason: String },

    #[error("io error: {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
