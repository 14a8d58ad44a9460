//! Version matching and advisory resolution.
//!
//! [`resolve`] cross-references the advisories of one scan against its module
//! graph and returns the affected packages. It has no side effects; caching
//! the result is the caller's job (see [`crate::check`]).

mod resolve;
mod version;

pub use resolve::{resolve, Resolution, UnparsableVersion};
pub use version::{compare, is_vulnerable, parse_runtime_version, parse_version, VersionRange};
