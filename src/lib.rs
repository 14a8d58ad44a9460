pub mod cache;
pub mod check;
pub mod checker;
pub mod config;
pub mod crawler;
pub mod decoder;
pub mod error;
pub mod logging;
pub mod modcache;
pub mod model;
pub mod output;
pub mod platform;
pub mod scanner;
pub mod vcs;

pub use cache::{CacheEntry, Store};
pub use check::{Check, CheckMode, ProjectReport};
pub use config::{Config, Settings};
pub use crawler::{AggregateReport, CrawlOptions, Crawler};
pub use error::{Error, Result};
pub use model::{Advisory, Finding, Sbom, VulnerabilityMap};
pub use scanner::{Govulncheck, VulnScanner};
