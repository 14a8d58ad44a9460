use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use super::Sbom;
use crate::checker::parse_version;

/// A version as both its original text and its parsed form.
///
/// Only the text is persisted. After a cache round trip the parsed form is
/// rebuilt by [`normalize`](Self::normalize); a finding built from parsed
/// versions gets its text the same way before it is written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionField {
    raw: String,
    #[serde(skip)]
    parsed: Option<semver::Version>,
}

impl VersionField {
    /// A field known only by its text. Call [`normalize`](Self::normalize) to parse it.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            parsed: None,
        }
    }

    /// A field known only by its parsed form.
    pub fn from_version(version: semver::Version) -> Self {
        Self {
            raw: String::new(),
            parsed: Some(version),
        }
    }

    /// A field for a version that may be absent (open range bound).
    pub fn from_optional(version: Option<&semver::Version>) -> Self {
        version.cloned().map(Self::from_version).unwrap_or_default()
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn version(&self) -> Option<&semver::Version> {
        self.parsed.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty() && self.parsed.is_none()
    }

    /// Fills whichever representation is missing from the other one.
    /// Text that does not parse stays text-only.
    pub fn normalize(&mut self) {
        match (&self.parsed, self.raw.is_empty()) {
            (None, false) => self.parsed = parse_version(&self.raw).ok(),
            (Some(version), true) => self.raw = version.to_string(),
            _ => {}
        }
    }
}

impl fmt::Display for VersionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.parsed, self.raw.is_empty()) {
            (_, false) => write!(f, "{}", self.raw),
            (Some(version), true) => write!(f, "{}", version),
            (None, true) => write!(f, "-"),
        }
    }
}

/// One advisory matched against one concrete version of one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub introduced: VersionField,
    #[serde(default)]
    pub fixed: VersionField,
    #[serde(default)]
    pub current: VersionField,
}

impl Finding {
    pub fn normalize(&mut self) {
        self.introduced.normalize();
        self.fixed.normalize();
        self.current.normalize();
    }
}

/// Package path to the findings against it. A package appears as a key only
/// when at least one finding exists for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VulnerabilityMap(BTreeMap<String, Vec<Finding>>);

impl VulnerabilityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, package: impl Into<String>, finding: Finding) {
        self.0.entry(package.into()).or_default().push(finding);
    }

    pub fn get(&self, package: &str) -> Option<&[Finding]> {
        self.0.get(package).map(Vec::as_slice)
    }

    /// Number of affected packages.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Finding])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn packages(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.0.values().flatten()
    }

    pub fn finding_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    /// Distinct advisory ids across all packages, sorted.
    pub fn advisory_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.findings().map(|f| f.id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn normalize(&mut self) {
        for finding in self.0.values_mut().flatten() {
            finding.normalize();
        }
    }
}

/// Who a cache entry or report belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PackageIdentity {
    /// Module path taken from the bill of materials or a previous run.
    Known(String),
    /// Nothing better than the folder that was scanned.
    Fallback(PathBuf),
    Unresolved,
}

impl PackageIdentity {
    /// Picks the best available name: the main module of the SBOM, then a
    /// previously stored package name, then the folder.
    pub fn resolve(sbom: &Sbom, stored_name: &str, folder: Option<&Path>) -> Self {
        if let Some(module) = sbom.main_module() {
            if !module.path.is_empty() {
                return PackageIdentity::Known(module.path.clone());
            }
        }
        if !stored_name.is_empty() {
            return PackageIdentity::Known(stored_name.to_string());
        }
        match folder {
            Some(folder) if !folder.as_os_str().is_empty() => {
                PackageIdentity::Fallback(folder.to_path_buf())
            }
            _ => PackageIdentity::Unresolved,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, PackageIdentity::Known(_))
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageIdentity::Known(path) => write!(f, "{}", path),
            PackageIdentity::Fallback(folder) => write!(f, "folder: {}", folder.display()),
            PackageIdentity::Unresolved => write!(f, "<unresolved>"),
        }
    }
}
