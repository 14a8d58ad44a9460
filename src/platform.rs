//! Go toolchain and store path resolution.
//!
//! This is the only module that reads the process environment. Everything it
//! finds is captured once in a [`GoEnv`] and turned into plain paths that the
//! rest of the crate receives through [`Settings`](crate::config::Settings).

use std::path::{Path, PathBuf};

/// Name of the scanner executable.
pub const SCANNER_BINARY: &str = "govulncheck";

/// Go-related environment, captured at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoEnv {
    pub gomodcache: Option<PathBuf>,
    pub gopath: Option<PathBuf>,
    pub gobin: Option<PathBuf>,
    pub home: Option<PathBuf>,
}

impl GoEnv {
    /// Reads `GOMODCACHE`, `GOPATH`, `GOBIN` and the home directory.
    pub fn from_env() -> Self {
        let var = |name: &str| {
            std::env::var_os(name)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };
        // GOPATH may be a list; the first entry holds the module cache.
        let gopath = std::env::var_os("GOPATH")
            .and_then(|v| std::env::split_paths(&v).next())
            .filter(|p| !p.as_os_str().is_empty());

        Self {
            gomodcache: var("GOMODCACHE"),
            gopath,
            gobin: var("GOBIN"),
            home: dirs::home_dir(),
        }
    }

    /// `$GOPATH`, defaulting to `~/go` like the go command does.
    pub fn gopath(&self) -> PathBuf {
        self.gopath
            .clone()
            .or_else(|| self.home.as_ref().map(|h| h.join("go")))
            .unwrap_or_else(|| PathBuf::from("go"))
    }

    /// `$GOMODCACHE`, defaulting to `$GOPATH/pkg/mod`.
    pub fn module_cache_dir(&self) -> PathBuf {
        self.gomodcache
            .clone()
            .unwrap_or_else(|| self.gopath().join("pkg").join("mod"))
    }

    /// The installed scanner: `$GOBIN/govulncheck`, then
    /// `$GOPATH/bin/govulncheck`. Falls back to a bare name resolved through
    /// `PATH` when neither exists.
    pub fn scanner_binary(&self) -> PathBuf {
        let exe = executable_name(SCANNER_BINARY);
        let candidates = [
            self.gobin.as_ref().map(|d| d.join(&exe)),
            Some(self.gopath().join("bin").join(&exe)),
        ];
        candidates
            .into_iter()
            .flatten()
            .find(|p| p.is_file())
            .unwrap_or_else(|| PathBuf::from(exe))
    }
}

fn executable_name(name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

/// Default store root.
///
/// Platform-specific locations:
/// - Linux: `~/.local/share/govuln/`
/// - macOS: `~/Library/Application Support/govuln/`
/// - Windows: `%APPDATA%\govuln\`
pub fn store_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("govuln")
}

/// Directory holding `config.toml`.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("govuln")
}

/// True when `dir` holds a `go.mod` file.
pub fn is_go_module(dir: &Path) -> bool {
    dir.join("go.mod").is_file()
}
