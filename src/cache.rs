//! File-based store of per-project resolution results.
//!
//! Every checked project (top level or submodule) gets one pretty-printed
//! JSON file holding the last scanner output and the findings computed from
//! it. An entry is reused for 24 hours by default.
//!
//! # Store Location
//!
//! The store root defaults to a platform data directory:
//! - Linux: `~/.local/share/govuln/`
//! - macOS: `~/Library/Application Support/govuln/`
//! - Windows: `%APPDATA%\govuln\`
//!
//! Entries live under `<root>/projects/<key>.json`, where the key is the
//! project's absolute path with separators escaped (see [`project_key`]).
//!
//! # Example
//!
//! ```no_run
//! use govuln::cache::Store;
//! use std::path::Path;
//!
//! let store = Store::open("/tmp/govuln-store", 24).unwrap();
//! let entry = store.lookup(Path::new("/src/app"));
//!
//! if !store.is_fresh(&entry) {
//!     println!("needs a new scan");
//! }
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::model::{Advisory, Sbom, ScanConfig, VulnerabilityMap};

/// Default freshness window in hours.
pub const CACHE_TTL_HOURS: u64 = 24;

const PROJECTS_DIR: &str = "projects";

/// Longest key written verbatim. Longer keys are shortened and hashed so the
/// file name stays under the usual 255 byte limit.
const MAX_KEY_LEN: usize = 200;

/// Bytes of the escaped path kept in front of the hash of a long key.
const HASHED_KEY_PREFIX: usize = 136;

// Keeps the window inside what `chrono::Duration` can represent.
const MAX_TTL_HOURS: u64 = 24 * 365 * 100;

/// Everything remembered about one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheEntry {
    /// Absolute path the entry was stored for.
    pub project: PathBuf,
    pub package_name: String,
    pub package_version: String,
    pub last_update: Option<DateTime<Utc>>,
    pub checked: bool,
    pub has_vulnerabilities: bool,
    pub sbom: Sbom,
    pub osv: Vec<Advisory>,
    pub config: ScanConfig,
    pub vulnerabilities: VulnerabilityMap,
}

impl CacheEntry {
    /// Empty entry for a project that has never been checked.
    pub fn new(project: impl Into<PathBuf>) -> Self {
        Self {
            project: project.into(),
            ..Default::default()
        }
    }

    /// Fresh means: checked, updated less than `ttl` before `now`, and
    /// holding a module graph with a toolchain version.
    pub fn is_fresh_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let Some(last_update) = self.last_update else {
            return false;
        };
        self.checked && now.signed_duration_since(last_update) < ttl && self.sbom.has_runtime_version()
    }
}

/// One entry found on disk by [`Store::entries`].
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub file: PathBuf,
    pub size: u64,
    pub entry: CacheEntry,
}

/// Maps an absolute project path to a file name.
///
/// `%`, `/`, `\` and `:` are written as `%XX`, so distinct paths never share
/// a key and the mapping is stable. A key longer than [`MAX_KEY_LEN`] becomes
/// its first bytes, `~` and the SHA-256 of the whole escaped path. Hashed
/// keys are always one byte longer than the longest verbatim key.
pub fn project_key(project: &Path) -> String {
    let text = project.to_string_lossy();
    let mut key = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '%' | '/' | '\\' | ':' => key.push_str(&format!("%{:02X}", c as u32)),
            _ => key.push(c),
        }
    }
    if key.len() <= MAX_KEY_LEN {
        return key;
    }

    let digest = Sha256::digest(key.as_bytes());
    let mut cut = HASHED_KEY_PREFIX;
    while !key.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut hashed = format!("{}~{:x}", &key[..cut], digest);
    while hashed.len() <= MAX_KEY_LEN {
        hashed.insert(cut, '_');
    }
    hashed
}

/// The on-disk result store.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
    ttl: Duration,
}

impl Store {
    /// Opens (and creates if needed) the store at `root`.
    pub fn open(root: impl Into<PathBuf>, ttl_hours: u64) -> Result<Self> {
        let root = root.into();
        let projects = root.join(PROJECTS_DIR);
        fs::create_dir_all(&projects).map_err(|e| Error::io(&projects, e))?;
        Ok(Self {
            root,
            ttl: Duration::hours(ttl_hours.min(MAX_TTL_HOURS) as i64),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// File that holds the entry of `project`.
    pub fn entry_path(&self, project: &Path) -> PathBuf {
        self.root
            .join(PROJECTS_DIR)
            .join(format!("{}.json", project_key(project)))
    }

    /// Returns the stored entry of `project`, or an empty one when there is
    /// none or it cannot be read.
    pub fn lookup(&self, project: &Path) -> CacheEntry {
        let path = self.entry_path(project);

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "unreadable cache entry; starting cold");
                }
                return CacheEntry::new(project);
            }
        };

        match serde_json::from_str::<CacheEntry>(&content) {
            Ok(mut entry) => {
                entry.vulnerabilities.normalize();
                if entry.project.as_os_str().is_empty() {
                    entry.project = project.to_path_buf();
                }
                entry
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt cache entry; starting cold");
                CacheEntry::new(project)
            }
        }
    }

    pub fn is_fresh(&self, entry: &CacheEntry) -> bool {
        entry.is_fresh_at(Utc::now(), self.ttl)
    }

    /// Stamps, normalizes and writes `entry`.
    ///
    /// Derived fields are recomputed first: the package name comes from the
    /// main module of the stored SBOM when there is one, and
    /// `has_vulnerabilities` mirrors the stored findings.
    pub fn persist(&self, entry: &mut CacheEntry) -> Result<()> {
        entry.last_update = Some(Utc::now());
        entry.vulnerabilities.normalize();
        if let Some(module) = entry.sbom.main_module().filter(|m| !m.path.is_empty()) {
            entry.package_name = module.path.clone();
        }
        entry.has_vulnerabilities = !entry.vulnerabilities.is_empty();

        let path = self.entry_path(&entry.project);
        let content = serde_json::to_string_pretty(entry).map_err(|e| Error::Cache {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        fs::write(&path, content).map_err(|e| Error::io(&path, e))?;
        debug!(path = %path.display(), "cache entry written");
        Ok(())
    }

    /// Every readable entry in the store. Files that do not decode are skipped.
    pub fn entries(&self) -> Vec<StoredEntry> {
        let mut entries: Vec<StoredEntry> = WalkDir::new(self.root.join(PROJECTS_DIR))
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().map(|ext| ext == "json").unwrap_or(false))
            .filter_map(|e| {
                let content = fs::read_to_string(e.path()).ok()?;
                let entry: CacheEntry = serde_json::from_str(&content).ok()?;
                Some(StoredEntry {
                    file: e.path().to_path_buf(),
                    size: e.metadata().map(|m| m.len()).unwrap_or(0),
                    entry,
                })
            })
            .collect();
        entries.sort_by(|a, b| a.entry.package_name.cmp(&b.entry.package_name));
        entries
    }

    /// Removes every stored entry and returns how many files were deleted.
    ///
    /// Only the store's own `projects` directory is touched; anything else
    /// under the root is left alone.
    pub fn clear(&self) -> Result<usize> {
        let projects = self.root.join(PROJECTS_DIR);
        let removed = WalkDir::new(&projects)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .count();
        if projects.exists() {
            fs::remove_dir_all(&projects).map_err(|e| Error::io(&projects, e))?;
        }

        fs::create_dir_all(&projects).map_err(|e| Error::io(&projects, e))?;
        Ok(removed)
    }
}
