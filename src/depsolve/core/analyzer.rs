//! The analyzer contract: how dependency metadata is read out of a
//! checked-out tree.
//!
//! The solver treats an analyzer as deterministic per revision: the same
//! tree at the same revision must always yield the same `(manifest, lock)`.
//! That determinism is what lets source caches key results by
//! `(revision, analyzer)`.

use std::fmt;
use std::path::Path;

use crate::core::lock::Lock;
use crate::core::manifest::Manifest;
use crate::core::project::ProjectRoot;
use crate::util::errors::DepsolveResult;

/// Identity of an analyzer, folded into cache keys and the lock's inputs
/// digest. Bump `version` whenever the analysis output format changes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct AnalyzerInfo {
    pub name: String,
    pub version: u32,
}

impl fmt::Display for AnalyzerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.v{}", self.name, self.version)
    }
}

/// Reads dependency metadata for a project rooted at `import_root` out of a
/// revision-stamped working tree at `dir`.
///
/// Implementations may parse the native manifest/lock pair or import a
/// foreign package manager's files; the solver only sees the result.
pub trait Analyzer: Send + Sync {
    /// Whether this analyzer recognizes metadata in `dir` at all.
    fn has_dep_metadata(&self, dir: &Path) -> bool;

    /// Returns the manifest and lock declared by the tree. Either half may
    /// be absent: plenty of projects declare nothing.
    fn derive(
        &self,
        dir: &Path,
        import_root: &ProjectRoot,
    ) -> DepsolveResult<(Option<Manifest>, Option<Lock>)>;

    fn info(&self) -> AnalyzerInfo;
}

/// The native analyzer: reads `depsolve.toml` / `depsolve.lock` from the tree
/// root.
pub struct NativeAnalyzer;

pub const MANIFEST_FILE_NAME: &str = "depsolve.toml";
pub const LOCK_FILE_NAME: &str = "depsolve.lock";

impl Analyzer for NativeAnalyzer {
    fn has_dep_metadata(&self, dir: &Path) -> bool {
        dir.join(MANIFEST_FILE_NAME).exists()
    }

    fn derive(
        &self,
        dir: &Path,
        _import_root: &ProjectRoot,
    ) -> DepsolveResult<(Option<Manifest>, Option<Lock>)> {
        let manifest_path = dir.join(MANIFEST_FILE_NAME);
        let manifest = if manifest_path.exists() {
            Some(crate::core::encode::manifest_from_toml_str(
                &std::fs::read_to_string(&manifest_path)?,
            )?)
        } else {
            None
        };
        let lock_path = dir.join(LOCK_FILE_NAME);
        let lock = if lock_path.exists() {
            Some(crate::core::encode::lock_from_toml_str(
                &std::fs::read_to_string(&lock_path)?,
            )?)
        } else {
            None
        };
        Ok((manifest, lock))
    }

    fn info(&self) -> AnalyzerInfo {
        AnalyzerInfo {
            name: "depsolve".to_string(),
            version: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_analyzer_reads_manifest_and_lock() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE_NAME),
            "[[constraint]]\nname = \"github.com/dep/one\"\nversion = \"^1\"\n",
        )
        .unwrap();

        let analyzer = NativeAnalyzer;
        assert!(analyzer.has_dep_metadata(dir.path()));
        let (manifest, lock) = analyzer
            .derive(dir.path(), &ProjectRoot::new("example.com/app"))
            .unwrap();
        assert_eq!(manifest.unwrap().constraints.len(), 1);
        assert!(lock.is_none());
    }

    #[test]
    fn missing_metadata_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = NativeAnalyzer;
        assert!(!analyzer.has_dep_metadata(dir.path()));
        let (manifest, lock) = analyzer
            .derive(dir.path(), &ProjectRoot::new("example.com/app"))
            .unwrap();
        assert!(manifest.is_none() && lock.is_none());
    }
}
