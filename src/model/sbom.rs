use serde::{Deserialize, Serialize};

/// The resolved module graph of a project, as reported by the scanner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sbom {
    /// Toolchain version string, e.g. `go1.23.1`.
    #[serde(default)]
    pub go_version: String,
    #[serde(default)]
    pub modules: Vec<ModuleRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roots: Vec<String>,
}

impl Sbom {
    /// The module being scanned. The scanner always lists it first.
    pub fn main_module(&self) -> Option<&ModuleRef> {
        self.modules.first()
    }

    /// True when the scanner reported a toolchain version.
    pub fn has_runtime_version(&self) -> bool {
        !self.go_version.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRef {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ModuleRef {
    pub fn new(path: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            version: Some(version.into()),
        }
    }

    pub fn root(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            version: None,
        }
    }

    /// The declared version, treating an empty string as absent.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref().filter(|v| !v.is_empty())
    }
}

/// Scanner and database identity. Carried through to the cache for provenance;
/// resolution never looks at it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub protocol_version: String,
    pub scanner_name: String,
    pub scanner_version: String,
    pub db: String,
    pub db_last_modified: String,
    pub go_version: String,
    pub scan_level: String,
    pub scan_mode: String,
}
