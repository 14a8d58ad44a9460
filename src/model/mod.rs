//! Core data types for scanner records and resolution results.
//!
//! - [`Advisory`] - An OSV advisory with its affected package ranges
//! - [`Sbom`] - The resolved module graph of a project
//! - [`ScanConfig`] - Scanner and database identity
//! - [`Finding`] - An advisory matched against one concrete version
//! - [`VulnerabilityMap`] - Findings grouped by package path
//! - [`PackageIdentity`] - Who a result belongs to
//!
//! # Example
//!
//! ```
//! use govuln::model::{Finding, VersionField, VulnerabilityMap};
//!
//! let mut map = VulnerabilityMap::new();
//! map.insert("example.org/lib", Finding {
//!     id: "GO-2024-0001".to_string(),
//!     summary: "example".to_string(),
//!     introduced: VersionField::from_raw("1.0.0"),
//!     fixed: VersionField::from_raw("1.3.0"),
//!     current: VersionField::from_raw("1.2.0"),
//! });
//!
//! assert_eq!(map.len(), 1);
//! ```

mod advisory;
mod finding;
mod sbom;

pub use advisory::*;
pub use finding::*;
pub use sbom::*;
