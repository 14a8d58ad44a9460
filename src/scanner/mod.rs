//! External vulnerability scanners.
//!
//! This module provides the [`VulnScanner`] trait used by [`crate::check`] to
//! obtain raw scanner output for a module directory, and the [`Govulncheck`]
//! implementation that runs the real tool.
//!
//! # Example
//!
//! ```no_run
//! use govuln::scanner::{Govulncheck, VulnScanner};
//! use std::path::Path;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> govuln::Result<()> {
//!     let scanner = Govulncheck::new("govulncheck", Duration::from_secs(600));
//!     let output = scanner.scan(Path::new("/src/app")).await?;
//!     let decoded = govuln::decoder::decode(&output);
//!     println!("{} advisories", decoded.advisories.len());
//!     Ok(())
//! }
//! ```

mod govulncheck;

pub use govulncheck::{run_command, Govulncheck};

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Produces multiplexed JSON scanner output for a module directory.
#[async_trait]
pub trait VulnScanner: Send + Sync {
    /// Human-readable name, used in logs.
    fn name(&self) -> &str;

    /// Brings a top-level project into a scannable state. Never called for
    /// submodules, whose sources in the module cache are read-only.
    async fn prepare(&self, _dir: &Path) -> Result<()> {
        Ok(())
    }

    /// Scans the module rooted at `dir` and returns the raw output.
    ///
    /// # Errors
    ///
    /// Returns an error if the scanner cannot be started, exits
    /// unsuccessfully, or misses its deadline.
    async fn scan(&self, dir: &Path) -> Result<String>;
}
