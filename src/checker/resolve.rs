use std::collections::BTreeMap;

use semver::Version;
use serde::Serialize;
use tracing::{debug, warn};

use super::version::{parse_runtime_version, parse_version, VersionRange};
use crate::model::{Advisory, Finding, Sbom, VersionField, VulnerabilityMap, STDLIB_PACKAGE};

/// A declared version that could not be parsed and was left out of matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnparsableVersion {
    pub package: String,
    pub version: String,
}

/// Output of [`resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub vulnerabilities: VulnerabilityMap,
    /// Versions excluded from matching, including the runtime version when it
    /// does not parse.
    pub unparsable: Vec<UnparsableVersion>,
}

/// Module path to every distinct parsed version declared for it.
fn module_index<'s>(
    sbom: &'s Sbom,
    unparsable: &mut Vec<UnparsableVersion>,
) -> BTreeMap<&'s str, Vec<Version>> {
    let mut index: BTreeMap<&'s str, Vec<Version>> = BTreeMap::new();

    for module in &sbom.modules {
        let Some(raw) = module.version() else {
            continue;
        };
        match parse_version(raw) {
            Ok(version) => {
                let versions = index.entry(module.path.as_str()).or_default();
                if !versions.contains(&version) {
                    versions.push(version);
                }
            }
            Err(e) => {
                debug!(module = %module.path, error = %e, "excluding module version");
                unparsable.push(UnparsableVersion {
                    package: module.path.clone(),
                    version: raw.to_string(),
                });
            }
        }
    }

    index
}

/// Matches every advisory against the module graph.
///
/// Standard library entries are tested against the toolchain version; every
/// other entry is tested against each version of the module it names.
pub fn resolve(sbom: &Sbom, advisories: &[Advisory]) -> Resolution {
    let mut unparsable = Vec::new();
    let index = module_index(sbom, &mut unparsable);

    let runtime = match parse_runtime_version(&sbom.go_version) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(go_version = %sbom.go_version, error = %e, "cannot parse toolchain version; skipping stdlib advisories");
            unparsable.push(UnparsableVersion {
                package: STDLIB_PACKAGE.to_string(),
                version: sbom.go_version.clone(),
            });
            None
        }
    };

    let mut vulnerabilities = VulnerabilityMap::new();

    for advisory in advisories {
        for affected in &advisory.affected {
            let range = VersionRange::from_affected(affected);

            let finding = |current: &Version| Finding {
                id: advisory.id.clone(),
                summary: advisory.summary.clone(),
                introduced: VersionField::from_optional(range.introduced.as_ref()),
                fixed: VersionField::from_optional(range.fixed.as_ref()),
                current: VersionField::from_version(current.clone()),
            };

            if affected.is_stdlib() {
                if let Some(current) = runtime.as_ref().filter(|v| range.contains(v)) {
                    debug!(advisory = %advisory.id, version = %current, "stdlib affected");
                    vulnerabilities.insert(STDLIB_PACKAGE, finding(current));
                }
                continue;
            }

            let Some(versions) = index.get(affected.package.name.as_str()) else {
                continue;
            };
            for current in versions.iter().filter(|v| range.contains(v)) {
                debug!(advisory = %advisory.id, module = %affected.package.name, version = %current, "module affected");
                vulnerabilities.insert(affected.package.name.clone(), finding(current));
            }
        }
    }

    Resolution {
        vulnerabilities,
        unparsable,
    }
}
