//! Lookup of module sources in the local Go module cache.
//!
//! The cache keeps each downloaded module at `<root>/<module>@<version>`.
//! Upper-case letters in either part are stored as `!` followed by the
//! lower-case letter so the layout survives case-insensitive filesystems.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Applies the module cache's case encoding: `Azure` becomes `!azure`.
pub fn escape_path(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_uppercase() {
            escaped.push('!');
            escaped.push(c.to_ascii_lowercase());
        } else {
            escaped.push(c);
        }
    }
    escaped
}

/// A local module cache rooted at `GOMODCACHE` (usually `$GOPATH/pkg/mod`).
#[derive(Debug, Clone)]
pub struct ModuleCache {
    root: PathBuf,
}

impl ModuleCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory where `module@version` would be extracted.
    pub fn module_dir(&self, module: &str, version: &str) -> PathBuf {
        let mut dir = self.root.clone();
        for segment in module.split('/').filter(|s| !s.is_empty()) {
            dir.push(escape_path(segment));
        }
        let leaf = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        dir.set_file_name(format!("{}@{}", leaf, escape_path(version)));
        dir
    }

    /// Returns the source directory of `module@version`, or
    /// [`Error::ModuleNotCached`] when it has not been downloaded.
    pub fn resolve_local_path(&self, module: &str, version: &str) -> Result<PathBuf> {
        let dir = self.module_dir(module, version);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(Error::ModuleNotCached {
                module: module.to_string(),
                version: version.to_string(),
                path: dir,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_escape_path() {
        assert_eq!(escape_path("github.com/acme/lib"), "github.com/acme/lib");
        assert_eq!(escape_path("github.com/Azure/go-autorest"), "github.com/!azure/go-autorest");
        assert_eq!(escape_path("v1.0.0-RC1"), "v1.0.0-!r!c1");
    }

    #[test]
    fn test_module_dir_layout() {
        let cache = ModuleCache::new("/go/pkg/mod");
        assert_eq!(
            cache.module_dir("github.com/acme/lib", "v1.2.0"),
            PathBuf::from("/go/pkg/mod/github.com/acme/lib@v1.2.0")
        );
        assert_eq!(
            cache.module_dir("github.com/BurntSushi/toml", "v1.3.2"),
            PathBuf::from("/go/pkg/mod/github.com/!burnt!sushi/toml@v1.3.2")
        );
    }

    #[test]
    fn test_resolve_local_path() {
        let dir = TempDir::new().unwrap();
        let cache = ModuleCache::new(dir.path());
        let module_dir = dir.path().join("github.com").join("acme").join("lib@v1.2.0");
        fs::create_dir_all(&module_dir).unwrap();

        assert_eq!(cache.resolve_local_path("github.com/acme/lib", "v1.2.0").unwrap(), module_dir);

        let err = cache.resolve_local_path("github.com/acme/lib", "v9.9.9").unwrap_err();
        match err {
            Error::ModuleNotCached { module, version, path } => {
                assert_eq!(module, "github.com/acme/lib");
                assert_eq!(version, "v9.9.9");
                assert!(path.ends_with("lib@v9.9.9"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
