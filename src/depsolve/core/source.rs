//! The bridge between the solver and the source subsystem.
//!
//! The solver never fetches anything itself. Everything it needs from the
//! outside world (version lists, package trees, dependency metadata at a
//! revision) arrives through [`SourceBridge`]. Implementations are expected
//! to be cancel-aware, idempotent, and safe to call from multiple threads for
//! different projects; the solver itself is single-threaded and observes
//! results in a fixed order regardless.

use url::Url;

use crate::core::analyzer::AnalyzerInfo;
use crate::core::lock::Lock;
use crate::core::manifest::Manifest;
use crate::core::pkgtree::PackageTree;
use crate::core::project::{ProjectIdentifier, ProjectRoot};
use crate::core::version::{Revision, Version};

/// Errors produced by the source subsystem.
///
/// `MissingSource` and `NonexistentRevision` describe the *solve input* and
/// feed the failure taxonomy; everything else is infrastructure trouble that
/// aborts a solve as-is.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    #[error("no source could be set up for {id}")]
    MissingSource { id: ProjectIdentifier },
    #[error("revision {rev} does not exist in {id}")]
    NonexistentRevision { id: ProjectIdentifier, rev: Revision },
    #[error("version {version} of {id} is not paired with a revision")]
    UnpairedVersion { id: ProjectIdentifier, version: Version },
    #[error("cannot deduce a project root for import path {path}: {reason}")]
    CannotDeduceRoot { path: String, reason: String },
    #[error("{context}: {message}")]
    Io { context: String, message: String },
}

impl BridgeError {
    pub fn io(context: impl Into<String>, message: impl std::fmt::Display) -> BridgeError {
        BridgeError::Io {
            context: context.into(),
            message: message.to_string(),
        }
    }
}

/// The thin façade the resolver uses to reach a source manager.
///
/// Every method is idempotent: calling it twice with the same arguments must
/// return the same answer within one solve (caching layers depend on this).
pub trait SourceBridge: Send + Sync {
    /// Lists the versions the source for `id` offers, paired with the
    /// revisions the labels currently resolve to. Order is not significant;
    /// the solver sorts internally.
    fn list_versions(&self, id: &ProjectIdentifier) -> Result<Vec<Version>, BridgeError>;

    /// Whether `rev` exists in the source for `id`.
    fn revision_present_in(
        &self,
        id: &ProjectIdentifier,
        rev: &Revision,
    ) -> Result<bool, BridgeError>;

    /// The upstream URLs that could serve `import_path`, most preferred
    /// first.
    fn source_urls_for_path(&self, import_path: &str) -> Result<Vec<Url>, BridgeError>;

    /// Dependency metadata for `id` at `rev`, as reported by the configured
    /// analyzer. Deterministic per revision.
    fn analyze(
        &self,
        id: &ProjectIdentifier,
        rev: &Revision,
    ) -> Result<(Manifest, Lock), BridgeError>;

    /// The package tree of `id` at `rev`.
    fn list_packages(
        &self,
        id: &ProjectIdentifier,
        rev: &Revision,
    ) -> Result<PackageTree, BridgeError>;

    /// Maps a raw import path to the root of the project that owns it.
    fn deduce_project_root(&self, import_path: &str) -> Result<ProjectRoot, BridgeError>;

    /// Identity of the analyzer behind [`SourceBridge::analyze`], folded
    /// into cache keys and the lock's inputs digest.
    fn analyzer_info(&self) -> AnalyzerInfo;

    /// Hints that `rev` is known to exist, so caches can note it without a
    /// network round trip. Purely an optimization; the default does nothing.
    fn mark_revision_present(&self, _id: &ProjectIdentifier, _rev: &Revision) {}
}
