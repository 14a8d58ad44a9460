//! Semantic version parsing and range membership.
//!
//! Module versions are parsed strictly as semver after dropping a leading
//! `v`. Toolchain versions drop `go` and have Go's short release tags
//! completed first. Anything else, including
//! the bare `"0"` some advisories use as an open lower bound, does not parse
//! and is left out of range computations.

use std::cmp::Ordering;

use semver::Version;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::AffectedPackage;

/// Parses a module version such as `v1.2.3` or `1.24.0-0`.
pub fn parse_version(raw: &str) -> Result<Version> {
    let trimmed = raw.trim();
    let text = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(text).map_err(|e| Error::VersionParse {
        version: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Parses a toolchain version such as `go1.23.1`.
///
/// Go release tags are not always semver: `go1.20` names `1.20.0` and
/// `go1.21rc2` names `1.21.0-rc2`. Both are rewritten before parsing. Any
/// experiment suffix after whitespace (`go1.22.1 X:boringcrypto`) is dropped.
pub fn parse_runtime_version(raw: &str) -> Result<Version> {
    let trimmed = raw.trim();
    let tag = trimmed.split_whitespace().next().unwrap_or_default();
    let tag = tag.strip_prefix("go").unwrap_or(tag);
    Version::parse(&go_tag_to_semver(tag)).map_err(|e| Error::VersionParse {
        version: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Pads the numeric core of a Go tag to three parts and turns an attached
/// `rcN` or `betaN` into a pre-release.
fn go_tag_to_semver(tag: &str) -> String {
    let split = tag
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(tag.len());
    let (core, suffix) = tag.split_at(split);

    let mut parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return tag.to_string();
    }
    while parts.len() < 3 {
        parts.push("0");
    }

    let suffix = if suffix.starts_with("rc") || suffix.starts_with("beta") {
        format!("-{}", suffix)
    } else {
        suffix.to_string()
    };
    format!("{}{}", parts.join("."), suffix)
}

/// Semver precedence: pre-releases sort before their release, build metadata
/// is ignored.
pub fn compare(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch, &a.pre).cmp(&(b.major, b.minor, b.patch, &b.pre))
}

/// True iff `current` is at or above `introduced` and below `fixed`.
///
/// An absent `fixed` means no fix exists. An absent `introduced` never
/// matches: without a lower bound nothing is known to be affected.
pub fn is_vulnerable(current: &Version, introduced: Option<&Version>, fixed: Option<&Version>) -> bool {
    if let Some(fixed) = fixed {
        if compare(current, fixed) != Ordering::Less {
            return false;
        }
    }
    match introduced {
        Some(introduced) => compare(current, introduced) != Ordering::Less,
        None => false,
    }
}

/// Effective bounds of an affected package: the lowest `introduced` and the
/// highest `fixed` across all of its range events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionRange {
    pub introduced: Option<Version>,
    pub fixed: Option<Version>,
}

impl VersionRange {
    pub fn from_affected(affected: &AffectedPackage) -> Self {
        let mut range = VersionRange::default();

        for event in affected.events() {
            if let Some(raw) = event.introduced.as_deref() {
                match parse_version(raw) {
                    Ok(v) => {
                        if range.introduced.as_ref().map_or(true, |cur| compare(&v, cur) == Ordering::Less) {
                            range.introduced = Some(v);
                        }
                    }
                    Err(e) => debug!(package = %affected.package.name, error = %e, "skipping introduced event"),
                }
            }
            if let Some(raw) = event.fixed.as_deref() {
                match parse_version(raw) {
                    Ok(v) => {
                        if range.fixed.as_ref().map_or(true, |cur| compare(&v, cur) == Ordering::Greater) {
                            range.fixed = Some(v);
                        }
                    }
                    Err(e) => debug!(package = %affected.package.name, error = %e, "skipping fixed event"),
                }
            }
        }

        range
    }

    pub fn contains(&self, version: &Version) -> bool {
        is_vulnerable(version, self.introduced.as_ref(), self.fixed.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AffectedRange, PackageRef, RangeEvent};

    fn v(s: &str) -> Version {
        parse_version(s).unwrap()
    }

    fn affected(events: Vec<RangeEvent>) -> AffectedPackage {
        AffectedPackage {
            package: PackageRef {
                name: "example.org/lib".to_string(),
                ecosystem: "Go".to_string(),
            },
            ranges: vec![AffectedRange {
                range_type: "SEMVER".to_string(),
                events,
            }],
        }
    }

    #[test]
    fn test_parse_version_strips_v_prefix() {
        assert_eq!(v("v1.2.3"), Version::new(1, 2, 3));
        assert_eq!(v("1.2.3"), Version::new(1, 2, 3));
        assert_eq!(v(" v0.14.0 "), Version::new(0, 14, 0));
    }

    #[test]
    fn test_parse_runtime_version_strips_go_prefix() {
        assert_eq!(parse_runtime_version("go1.23.1").unwrap(), Version::new(1, 23, 1));
        assert_eq!(parse_runtime_version("1.24.6").unwrap(), Version::new(1, 24, 6));
    }

    #[test]
    fn test_parse_runtime_version_go_release_tags() {
        assert_eq!(parse_runtime_version("go1.20").unwrap(), Version::new(1, 20, 0));
        assert_eq!(parse_runtime_version("go1").unwrap(), Version::new(1, 0, 0));
        assert_eq!(
            parse_runtime_version("go1.21rc2").unwrap(),
            Version::parse("1.21.0-rc2").unwrap()
        );
        assert_eq!(
            parse_runtime_version("go1.22beta1").unwrap(),
            Version::parse("1.22.0-beta1").unwrap()
        );
        assert_eq!(
            parse_runtime_version("go1.22.1 X:boringcrypto").unwrap(),
            Version::new(1, 22, 1)
        );
        assert!(parse_runtime_version("devel go1.23-abcdef").is_err());
        assert!(parse_runtime_version("").is_err());
    }

    #[test]
    fn test_release_candidate_sorts_inside_go_prerelease_range() {
        let rc = parse_runtime_version("go1.21rc2").unwrap();
        assert!(is_vulnerable(&rc, Some(&v("1.21.0-0")), Some(&v("1.21.1"))));
        assert!(compare(&rc, &v("1.21.0")).is_lt());
    }

    #[test]
    fn test_parse_version_prerelease_and_pseudo_versions() {
        assert_eq!(v("1.24.0-0").pre.as_str(), "0");
        assert!(parse_version("v0.0.0-20230101120000-abcdef123456").is_ok());
        assert!(parse_version("v2.0.0+incompatible").is_ok());
    }

    #[test]
    fn test_parse_version_rejects_malformed() {
        for bad in ["0", "1.23", "", "latest", "v1.x.0"] {
            let err = parse_version(bad).unwrap_err();
            assert!(matches!(err, Error::VersionParse { .. }), "{bad} should not parse");
        }
    }

    #[test]
    fn test_compare_precedence() {
        assert_eq!(compare(&v("1.0.0-alpha"), &v("1.0.0")), Ordering::Less);
        assert_eq!(compare(&v("1.0.0-alpha"), &v("1.0.0-beta")), Ordering::Less);
        assert_eq!(compare(&v("1.10.0"), &v("1.9.0")), Ordering::Greater);
        assert_eq!(compare(&v("1.0.0+build.1"), &v("1.0.0+build.2")), Ordering::Equal);
    }

    #[test]
    fn test_is_vulnerable_inside_range() {
        let (intro, fixed) = (v("1.0.0"), v("1.3.0"));
        assert!(is_vulnerable(&v("1.0.0"), Some(&intro), Some(&fixed)));
        assert!(is_vulnerable(&v("1.2.9"), Some(&intro), Some(&fixed)));
        assert!(is_vulnerable(&v("1.3.0-rc.1"), Some(&intro), Some(&fixed)));
    }

    #[test]
    fn test_is_vulnerable_at_or_above_fixed() {
        let (intro, fixed) = (v("1.0.0"), v("1.3.0"));
        assert!(!is_vulnerable(&v("1.3.0"), Some(&intro), Some(&fixed)));
        assert!(!is_vulnerable(&v("2.0.0"), Some(&intro), Some(&fixed)));
        assert!(!is_vulnerable(&v("1.3.0"), None, Some(&fixed)));
    }

    #[test]
    fn test_is_vulnerable_below_introduced() {
        let (intro, fixed) = (v("1.0.0"), v("1.3.0"));
        assert!(!is_vulnerable(&v("0.9.9"), Some(&intro), Some(&fixed)));
        assert!(!is_vulnerable(&v("1.0.0-rc.1"), Some(&intro), Some(&fixed)));
    }

    #[test]
    fn test_is_vulnerable_open_bounds() {
        let intro = v("1.0.0");
        assert!(is_vulnerable(&v("99.0.0"), Some(&intro), None));
        assert!(!is_vulnerable(&v("0.5.0"), None, None));
        assert!(!is_vulnerable(&v("1.2.0"), None, Some(&v("1.3.0"))));
    }

    #[test]
    fn test_range_merges_min_introduced_max_fixed() {
        let range = VersionRange::from_affected(&affected(vec![
            RangeEvent::introduced("1.2.0"),
            RangeEvent::fixed("1.2.5"),
            RangeEvent::introduced("1.0.0"),
            RangeEvent::fixed("1.4.0"),
        ]));
        assert_eq!(range.introduced, Some(v("1.0.0")));
        assert_eq!(range.fixed, Some(v("1.4.0")));
        assert!(range.contains(&v("1.3.0")));
    }

    #[test]
    fn test_range_skips_unparsable_events() {
        let range = VersionRange::from_affected(&affected(vec![
            RangeEvent::introduced("0"),
            RangeEvent::fixed("1.23.8"),
            RangeEvent::introduced("1.24.0-0"),
            RangeEvent::fixed("1.24.2"),
        ]));
        assert_eq!(range.introduced, Some(v("1.24.0-0")));
        assert_eq!(range.fixed, Some(v("1.24.2")));
        assert!(!range.contains(&v("1.23.1")));
        assert!(range.contains(&v("1.24.1")));
    }

    #[test]
    fn test_range_without_events_matches_nothing() {
        let range = VersionRange::from_affected(&affected(vec![]));
        assert_eq!(range, VersionRange::default());
        assert!(!range.contains(&v("1.0.0")));
    }
}
