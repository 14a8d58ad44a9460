use serde::{Deserialize, Serialize};

/// Package name the vulnerability database uses for the Go standard library.
pub const STDLIB_PACKAGE: &str = "stdlib";

/// Ecosystem tag of every Go advisory.
pub const GO_ECOSYSTEM: &str = "Go";

/// A single OSV advisory as emitted by the scanner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub id: String,
    #[serde(default)]
    pub modified: String,
    #[serde(default)]
    pub published: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub affected: Vec<AffectedPackage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedPackage {
    pub package: PackageRef,
    #[serde(default)]
    pub ranges: Vec<AffectedRange>,
}

impl AffectedPackage {
    /// True when this entry targets the standard library rather than a module.
    pub fn is_stdlib(&self) -> bool {
        self.package.name == STDLIB_PACKAGE && self.package.ecosystem == GO_ECOSYSTEM
    }

    /// All range events of this entry, in declaration order.
    pub fn events(&self) -> impl Iterator<Item = &RangeEvent> {
        self.ranges.iter().flat_map(|range| range.events.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRef {
    pub name: String,
    #[serde(default)]
    pub ecosystem: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedRange {
    #[serde(rename = "type", default)]
    pub range_type: String,
    #[serde(default)]
    pub events: Vec<RangeEvent>,
}

/// One `introduced` or `fixed` event. OSV puts exactly one key per event, but
/// both are optional here so that unexpected shapes still decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introduced: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<String>,
}

impl RangeEvent {
    pub fn introduced(version: impl Into<String>) -> Self {
        Self {
            introduced: Some(version.into()),
            fixed: None,
        }
    }

    pub fn fixed(version: impl Into<String>) -> Self {
        Self {
            introduced: None,
            fixed: Some(version.into()),
        }
    }
}
