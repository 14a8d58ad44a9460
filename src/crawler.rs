//! Recursive check of a project's internal dependencies.
//!
//! Modules owned by the configured organization are located in the local
//! module cache and checked in [`CheckMode::Submodule`], up to
//! `concurrency` at a time. Results are folded into an [`AggregateReport`]
//! as they complete. A module that cannot be located or checked becomes a
//! [`CrawlFailure`] and the crawl moves on.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::Store;
use crate::check::{Check, CheckMode};
use crate::error::Result;
use crate::modcache::ModuleCache;
use crate::model::{ModuleRef, Sbom};
use crate::scanner::VulnScanner;
use crate::vcs::is_internal;

/// Default number of submodules checked at the same time.
pub const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlOptions {
    /// Git owner whose modules are internal.
    pub owner: String,
    pub concurrency: usize,
    /// Deadline for the whole crawl.
    pub timeout: Option<Duration>,
}

impl CrawlOptions {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            concurrency: DEFAULT_CONCURRENCY,
            timeout: None,
        }
    }
}

/// A module that could not be assessed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlFailure {
    pub module: String,
    pub version: String,
    pub reason: String,
}

/// Module path to version to advisory ids, for every module checked in one
/// crawl. A clean module has an empty id list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateReport {
    modules: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    failures: Vec<CrawlFailure>,
    /// Set once any recorded row carries an advisory.
    has_vulnerabilities: bool,
    cancelled: bool,
}

impl AggregateReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the advisories found for `module@version`. The row is created
    /// even when `ids` is empty.
    pub fn record(&mut self, module: &str, version: &str, ids: impl IntoIterator<Item = String>) {
        let row = self
            .modules
            .entry(module.to_string())
            .or_default()
            .entry(version.to_string())
            .or_default();
        for id in ids {
            if !row.contains(&id) {
                row.push(id);
            }
        }
        row.sort();
        self.has_vulnerabilities |= !row.is_empty();
    }

    pub fn record_failure(&mut self, module: &str, version: &str, reason: impl Into<String>) {
        self.failures.push(CrawlFailure {
            module: module.to_string(),
            version: version.to_string(),
            reason: reason.into(),
        });
    }

    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    /// True when the crawl stopped before every module finished.
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn get(&self, module: &str, version: &str) -> Option<&[String]> {
        self.modules.get(module)?.get(version).map(Vec::as_slice)
    }

    /// `(module, version, advisory ids)` rows, ordered by module then version.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &str, &[String])> {
        self.modules.iter().flat_map(|(module, versions)| {
            versions
                .iter()
                .map(move |(version, ids)| (module.as_str(), version.as_str(), ids.as_slice()))
        })
    }

    pub fn failures(&self) -> &[CrawlFailure] {
        &self.failures
    }

    /// Number of distinct modules with at least one row.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn has_vulnerabilities(&self) -> bool {
        self.has_vulnerabilities
    }
}

pub struct Crawler<'a> {
    store: &'a Store,
    scanner: &'a dyn VulnScanner,
    module_cache: &'a ModuleCache,
    options: CrawlOptions,
}

impl<'a> Crawler<'a> {
    pub fn new(
        store: &'a Store,
        scanner: &'a dyn VulnScanner,
        module_cache: &'a ModuleCache,
        options: CrawlOptions,
    ) -> Self {
        Self {
            store,
            scanner,
            module_cache,
            options,
        }
    }

    /// Versioned modules of `sbom` owned by the configured owner, each
    /// `path@version` once.
    pub fn internal_modules<'s>(&self, sbom: &'s Sbom) -> Vec<&'s ModuleRef> {
        let mut seen = HashSet::new();
        sbom.modules
            .iter()
            .filter(|m| m.version().is_some() && is_internal(&m.path, &self.options.owner))
            .filter(|m| seen.insert((m.path.clone(), m.version.clone())))
            .collect()
    }

    /// Checks every internal module of `sbom`.
    ///
    /// Cancelling `cancel` or passing the configured deadline stops the crawl;
    /// the report then holds whatever finished before that and is flagged
    /// [`cancelled`](AggregateReport::cancelled).
    pub async fn crawl(&self, sbom: &Sbom, cancel: &CancellationToken) -> AggregateReport {
        let mut report = AggregateReport::new();

        let mut located = Vec::new();
        for module in self.internal_modules(sbom) {
            let version = module.version().unwrap_or_default();
            match self.module_cache.resolve_local_path(&module.path, version) {
                Ok(dir) => located.push((module, dir)),
                Err(e) => {
                    warn!(module = %module.path, version = %version, error = %e, "module source not available");
                    report.record_failure(&module.path, version, e.to_string());
                }
            }
        }
        info!(modules = located.len(), concurrency = self.options.concurrency, "checking internal modules");

        let mut results = stream::iter(located.into_iter().map(|(module, dir)| async move {
            let outcome = self.check_module(module, &dir).await;
            (module, outcome)
        }))
        .buffer_unordered(self.options.concurrency.max(1));

        let timeout = self.options.timeout;
        let deadline = async move {
            match timeout {
                Some(after) => tokio::time::sleep(after).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("crawl cancelled; reporting partial results");
                    report.mark_cancelled();
                    break;
                }
                _ = &mut deadline => {
                    warn!("crawl deadline reached; reporting partial results");
                    report.mark_cancelled();
                    break;
                }
                next = results.next() => match next {
                    Some((module, Ok(ids))) => {
                        let version = module.version().unwrap_or_default();
                        debug!(module = %module.path, version = %version, advisories = ids.len(), "module checked");
                        report.record(&module.path, version, ids);
                    }
                    Some((module, Err(e))) => {
                        let version = module.version().unwrap_or_default();
                        warn!(module = %module.path, version = %version, error = %e, "module check failed");
                        report.record_failure(&module.path, version, e.to_string());
                    }
                    None => break,
                },
            }
        }

        report
    }

    async fn check_module(&self, module: &ModuleRef, dir: &Path) -> Result<Vec<String>> {
        let version = module.version().unwrap_or_default();
        let mut check = Check::new(dir, self.store, self.scanner)?;
        let report = check.run(CheckMode::Submodule).await?;

        if let Err(e) = check.annotate(&module.path, version) {
            warn!(module = %module.path, error = %e, "failed to record module identity");
        }

        Ok(report.vulnerabilities.advisory_ids())
    }
}

/// Resolves the owner to crawl for: the configured one, else the owner of
/// the project's git remote.
pub fn crawl_owner(configured: Option<&str>, project: &Path) -> Option<String> {
    configured
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .or_else(|| crate::vcs::detect_owner(project))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_keeps_clean_rows() {
        let mut report = AggregateReport::new();
        report.record("github.com/acme/clean", "v1.0.0", Vec::new());
        assert_eq!(report.get("github.com/acme/clean", "v1.0.0"), Some(&[][..]));
        assert!(!report.has_vulnerabilities());
        assert_eq!(report.len(), 1);
    }

    #[test]
    fn test_record_merges_and_dedups_ids() {
        let mut report = AggregateReport::new();
        report.record("github.com/acme/lib", "v1.2.0", vec!["GO-2".to_string()]);
        report.record(
            "github.com/acme/lib",
            "v1.2.0",
            vec!["GO-1".to_string(), "GO-2".to_string()],
        );
        report.record("github.com/acme/lib", "v1.3.0", Vec::new());

        assert_eq!(
            report.get("github.com/acme/lib", "v1.2.0").unwrap(),
            &["GO-1".to_string(), "GO-2".to_string()]
        );
        assert!(report.has_vulnerabilities());
        assert_eq!(report.rows().count(), 2);
    }

    #[test]
    fn test_serialized_report_carries_vulnerability_flag() {
        let mut report = AggregateReport::new();
        report.record("github.com/acme/clean", "v1.0.0", Vec::new());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["has_vulnerabilities"], false);

        report.record("github.com/acme/lib", "v1.2.0", vec!["GO-1".to_string()]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["has_vulnerabilities"], true);
        assert_eq!(json["modules"]["github.com/acme/lib"]["v1.2.0"][0], "GO-1");
    }

    #[test]
    fn test_failures_do_not_create_rows() {
        let mut report = AggregateReport::new();
        report.record_failure("github.com/acme/gone", "v0.1.0", "not in module cache");
        assert!(report.is_empty());
        assert_eq!(report.failures().len(), 1);
        assert!(!report.cancelled());
    }

    #[test]
    fn test_internal_modules_filters_owner_and_duplicates() {
        let store_dir = tempfile::TempDir::new().unwrap();
        let store = Store::open(store_dir.path(), 24).unwrap();
        let cache = ModuleCache::new(store_dir.path());
        let scanner = crate::scanner::Govulncheck::new("govulncheck", Duration::from_secs(1));
        let crawler = Crawler::new(&store, &scanner, &cache, CrawlOptions::new("acme"));

        let sbom = Sbom {
            go_version: "go1.23.1".to_string(),
            modules: vec![
                ModuleRef::root("github.com/acme/app"),
                ModuleRef::new("github.com/acme/lib", "v1.2.0"),
                ModuleRef::new("github.com/acme/lib", "v1.2.0"),
                ModuleRef::new("github.com/acme/lib", "v1.3.0"),
                ModuleRef::new("github.com/other/lib", "v1.0.0"),
                ModuleRef::new("golang.org/x/net", "v0.20.0"),
            ],
            roots: vec![],
        };

        let internal: Vec<String> = crawler
            .internal_modules(&sbom)
            .iter()
            .map(|m| format!("{}@{}", m.path, m.version().unwrap_or_default()))
            .collect();
        assert_eq!(internal, vec!["github.com/acme/lib@v1.2.0", "github.com/acme/lib@v1.3.0"]);
    }

    #[test]
    fn test_crawl_owner_prefers_configured() {
        let dir = tempfile::TempDir::new().unwrap();
        assert_eq!(crawl_owner(Some("acme"), dir.path()), Some("acme".to_string()));
        assert_eq!(crawl_owner(Some(""), dir.path()), None);
        assert_eq!(crawl_owner(None, dir.path()), None);
    }
}
