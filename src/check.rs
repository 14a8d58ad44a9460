//! Vulnerability check of a single Go module.
//!
//! A [`Check`] walks one project through
//! `Cold -> Decoded -> Resolved -> Cached`: the scanner runs, its output is
//! decoded and resolved, and the result is written to the [`Store`]. In
//! [`CheckMode::Submodule`] a fresh stored entry short-circuits straight to
//! `Cached` without running the scanner.
//!
//! # Example
//!
//! ```no_run
//! use govuln::cache::Store;
//! use govuln::check::{Check, CheckMode};
//! use govuln::scanner::Govulncheck;
//! use std::path::Path;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> govuln::Result<()> {
//!     let store = Store::open("/tmp/govuln-store", 24)?;
//!     let scanner = Govulncheck::new("govulncheck", Duration::from_secs(600));
//!
//!     let mut check = Check::new(Path::new("."), &store, &scanner)?;
//!     let report = check.run(CheckMode::Project).await?;
//!     println!("{}: {} affected packages", report.identity, report.vulnerabilities.len());
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, Store};
use crate::checker::{resolve, UnparsableVersion};
use crate::decoder::decode;
use crate::error::{Error, Result};
use crate::model::{PackageIdentity, Sbom, VulnerabilityMap};
use crate::platform::is_go_module;
use crate::scanner::VulnScanner;

/// How a project is being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    /// The project the user asked about. Always scanned, tidied first.
    Project,
    /// An internal dependency found by the crawler. Reuses a fresh entry.
    Submodule,
}

/// Progress of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Cold,
    Decoded,
    Resolved,
    Cached,
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckState::Cold => "cold",
            CheckState::Decoded => "decoded",
            CheckState::Resolved => "resolved",
            CheckState::Cached => "cached",
        };
        f.write_str(name)
    }
}

/// Result of a completed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectReport {
    pub folder: PathBuf,
    pub identity: PackageIdentity,
    /// Module version, known for submodules once annotated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip)]
    pub sbom: Sbom,
    pub vulnerabilities: VulnerabilityMap,
    /// Versions left out of matching. Empty when served from the store.
    pub unparsable: Vec<UnparsableVersion>,
    /// True when the stored entry was reused without scanning.
    pub from_cache: bool,
}

impl ProjectReport {
    pub fn has_vulnerabilities(&self) -> bool {
        !self.vulnerabilities.is_empty()
    }
}

pub struct Check<'a> {
    folder: PathBuf,
    store: &'a Store,
    scanner: &'a dyn VulnScanner,
    entry: CacheEntry,
    state: CheckState,
}

impl<'a> Check<'a> {
    /// Prepares a check of the module at `folder`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the folder cannot be resolved and
    /// [`Error::NotAModule`] if it has no `go.mod`.
    pub fn new(folder: &Path, store: &'a Store, scanner: &'a dyn VulnScanner) -> Result<Self> {
        let folder = folder.canonicalize().map_err(|e| Error::io(folder, e))?;
        if !is_go_module(&folder) {
            return Err(Error::NotAModule { path: folder });
        }

        let entry = store.lookup(&folder);
        Ok(Self {
            folder,
            store,
            scanner,
            entry,
            state: CheckState::Cold,
        })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn state(&self) -> CheckState {
        self.state
    }

    pub fn entry(&self) -> &CacheEntry {
        &self.entry
    }

    pub fn identity(&self) -> PackageIdentity {
        PackageIdentity::resolve(&self.entry.sbom, &self.entry.package_name, Some(&self.folder))
    }

    /// Runs the check to completion.
    ///
    /// On error the check returns to `Cold` and nothing is written; the next
    /// attempt starts over.
    pub async fn run(&mut self, mode: CheckMode) -> Result<ProjectReport> {
        if mode == CheckMode::Submodule && self.store.is_fresh(&self.entry) {
            debug!(folder = %self.folder.display(), "fresh stored result");
            self.state = CheckState::Cached;
            return Ok(self.report(Vec::new(), true));
        }

        match self.scan_and_resolve(mode).await {
            Ok(unparsable) => Ok(self.report(unparsable, false)),
            Err(e) => {
                self.state = CheckState::Cold;
                Err(e)
            }
        }
    }

    async fn scan_and_resolve(&mut self, mode: CheckMode) -> Result<Vec<UnparsableVersion>> {
        self.state = CheckState::Cold;

        if mode == CheckMode::Project {
            self.scanner.prepare(&self.folder).await?;
        }
        let output = self.scanner.scan(&self.folder).await?;

        let decoded = decode(&output);
        self.state = CheckState::Decoded;
        let sbom = decoded.sbom.ok_or_else(|| Error::MissingSbom {
            path: self.folder.clone(),
        })?;
        debug!(
            folder = %self.folder.display(),
            modules = sbom.modules.len(),
            advisories = decoded.advisories.len(),
            "scanner output decoded"
        );

        let resolution = resolve(&sbom, &decoded.advisories);
        self.state = CheckState::Resolved;
        info!(
            folder = %self.folder.display(),
            affected = resolution.vulnerabilities.len(),
            "resolved"
        );

        self.entry.sbom = sbom;
        self.entry.osv = decoded.advisories;
        self.entry.config = decoded.config.unwrap_or_default();
        self.entry.vulnerabilities = resolution.vulnerabilities;
        self.entry.checked = true;
        if let Err(e) = self.store.persist(&mut self.entry) {
            warn!(folder = %self.folder.display(), error = %e, "failed to store result");
        }
        self.state = CheckState::Cached;

        Ok(resolution.unparsable)
    }

    /// Records the module path and version this folder was checked as, and
    /// stores the entry again if either changed. Returns whether it did.
    pub fn annotate(&mut self, name: &str, version: &str) -> Result<bool> {
        if self.entry.package_name == name && self.entry.package_version == version {
            return Ok(false);
        }
        self.entry.package_name = name.to_string();
        self.entry.package_version = version.to_string();
        self.store.persist(&mut self.entry)?;
        Ok(true)
    }

    fn report(&self, unparsable: Vec<UnparsableVersion>, from_cache: bool) -> ProjectReport {
        ProjectReport {
            folder: self.folder.clone(),
            identity: self.identity(),
            version: Some(self.entry.package_version.clone()).filter(|v| !v.is_empty()),
            sbom: self.entry.sbom.clone(),
            vulnerabilities: self.entry.vulnerabilities.clone(),
            unparsable,
            from_cache,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const OUTPUT: &str = r#"{
  "config": {
    "scanner_name": "govulncheck",
    "go_version": "go1.23.1"
  }
}
{
  "SBOM": {
    "go_version": "go1.23.1",
    "modules": [
      {
        "path": "github.com/acme/app"
      },
      {
        "path": "example.org/lib",
        "version": "v1.2.0"
      }
    ]
  }
}
{
  "osv": {
    "id": "GO-2024-0001",
    "summary": "lib is broken",
    "affected": [
      {
        "package": {
          "name": "example.org/lib",
          "ecosystem": "Go"
        },
        "ranges": [
          {
            "type": "SEMVER",
            "events": [
              {
                "introduced": "1.0.0"
              },
              {
                "fixed": "1.3.0"
              }
            ]
          }
        ]
      }
    ]
  }
}
"#;

    struct FakeScanner {
        output: String,
        scans: AtomicUsize,
        prepares: AtomicUsize,
    }

    impl FakeScanner {
        fn new(output: &str) -> Self {
            Self {
                output: output.to_string(),
                scans: AtomicUsize::new(0),
                prepares: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl VulnScanner for FakeScanner {
        fn name(&self) -> &str {
            "fake"
        }

        async fn prepare(&self, _dir: &Path) -> Result<()> {
            self.prepares.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn scan(&self, _dir: &Path) -> Result<String> {
            self.scans.fetch_add(1, Ordering::SeqCst);
            Ok(self.output.clone())
        }
    }

    struct FailingScanner;

    #[async_trait]
    impl VulnScanner for FailingScanner {
        fn name(&self) -> &str {
            "failing"
        }

        async fn scan(&self, _dir: &Path) -> Result<String> {
            Err(Error::Scanner {
                command: "govulncheck".to_string(),
                reason: "exit status: 1".to_string(),
            })
        }
    }

    fn module_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("go.mod"), "module github.com/acme/app\n").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_project_check_scans_and_persists() {
        let project = module_dir();
        let store_dir = TempDir::new().unwrap();
        let store = Store::open(store_dir.path(), 24).unwrap();
        let scanner = FakeScanner::new(OUTPUT);

        let mut check = Check::new(project.path(), &store, &scanner).unwrap();
        assert_eq!(check.state(), CheckState::Cold);

        let report = check.run(CheckMode::Project).await.unwrap();
        assert_eq!(check.state(), CheckState::Cached);
        assert_eq!(scanner.prepares.load(Ordering::SeqCst), 1);
        assert_eq!(scanner.scans.load(Ordering::SeqCst), 1);
        assert!(!report.from_cache);
        assert_eq!(report.identity, PackageIdentity::Known("github.com/acme/app".to_string()));
        assert_eq!(report.vulnerabilities.get("example.org/lib").unwrap().len(), 1);

        let stored = store.lookup(check.folder());
        assert!(stored.checked);
        assert!(stored.has_vulnerabilities);
        assert_eq!(stored.config.scanner_name, "govulncheck");
        assert_eq!(stored.osv.len(), 1);
    }

    #[tokio::test]
    async fn test_submodule_check_reuses_fresh_entry() {
        let project = module_dir();
        let store_dir = TempDir::new().unwrap();
        let store = Store::open(store_dir.path(), 24).unwrap();
        let scanner = FakeScanner::new(OUTPUT);

        let first = Check::new(project.path(), &store, &scanner)
            .unwrap()
            .run(CheckMode::Submodule)
            .await
            .unwrap();
        assert!(!first.from_cache);
        assert_eq!(scanner.prepares.load(Ordering::SeqCst), 0);

        let mut second = Check::new(project.path(), &store, &scanner).unwrap();
        let report = second.run(CheckMode::Submodule).await.unwrap();
        assert!(report.from_cache);
        assert_eq!(second.state(), CheckState::Cached);
        assert_eq!(scanner.scans.load(Ordering::SeqCst), 1);
        assert_eq!(report.vulnerabilities, first.vulnerabilities);
    }

    #[tokio::test]
    async fn test_project_check_always_rescans() {
        let project = module_dir();
        let store_dir = TempDir::new().unwrap();
        let store = Store::open(store_dir.path(), 24).unwrap();
        let scanner = FakeScanner::new(OUTPUT);

        for _ in 0..2 {
            Check::new(project.path(), &store, &scanner)
                .unwrap()
                .run(CheckMode::Project)
                .await
                .unwrap();
        }
        assert_eq!(scanner.scans.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_sbom_is_an_error() {
        let project = module_dir();
        let store_dir = TempDir::new().unwrap();
        let store = Store::open(store_dir.path(), 24).unwrap();
        let scanner = FakeScanner::new("{\n  \"progress\": {}\n}\n");

        let mut check = Check::new(project.path(), &store, &scanner).unwrap();
        let err = check.run(CheckMode::Project).await.unwrap_err();
        assert!(matches!(err, Error::MissingSbom { .. }));
        assert_eq!(check.state(), CheckState::Cold);
        assert!(!store.entry_path(check.folder()).exists());
    }

    #[tokio::test]
    async fn test_scanner_failure_is_an_error() {
        let project = module_dir();
        let store_dir = TempDir::new().unwrap();
        let store = Store::open(store_dir.path(), 24).unwrap();

        let mut check = Check::new(project.path(), &store, &FailingScanner).unwrap();
        let err = check.run(CheckMode::Project).await.unwrap_err();
        assert!(matches!(err, Error::Scanner { .. }));
        assert_eq!(check.state(), CheckState::Cold);
    }

    #[tokio::test]
    async fn test_clean_project_is_distinct_from_failure() {
        let project = module_dir();
        let store_dir = TempDir::new().unwrap();
        let store = Store::open(store_dir.path(), 24).unwrap();
        let clean = OUTPUT.replace("v1.2.0", "v1.3.0");
        let scanner = FakeScanner::new(&clean);

        let report = Check::new(project.path(), &store, &scanner)
            .unwrap()
            .run(CheckMode::Project)
            .await
            .unwrap();
        assert!(!report.has_vulnerabilities());
    }

    #[test]
    fn test_new_rejects_folder_without_go_mod() {
        let dir = TempDir::new().unwrap();
        let store_dir = TempDir::new().unwrap();
        let store = Store::open(store_dir.path(), 24).unwrap();

        let err = Check::new(dir.path(), &store, &FailingScanner).err().unwrap();
        assert!(matches!(err, Error::NotAModule { .. }));

        let err = Check::new(&dir.path().join("missing"), &store, &FailingScanner)
            .err()
            .unwrap();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[tokio::test]
    async fn test_annotate_persists_only_on_change() {
        let project = module_dir();
        let store_dir = TempDir::new().unwrap();
        let store = Store::open(store_dir.path(), 24).unwrap();
        let scanner = FakeScanner::new(OUTPUT);

        let mut check = Check::new(project.path(), &store, &scanner).unwrap();
        check.run(CheckMode::Submodule).await.unwrap();

        assert!(check.annotate("github.com/acme/app", "v0.4.0").unwrap());
        assert!(!check.annotate("github.com/acme/app", "v0.4.0").unwrap());

        let stored = store.lookup(check.folder());
        assert_eq!(stored.package_version, "v0.4.0");
    }
}
