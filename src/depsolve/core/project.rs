//! Project identity: import-path roots, source-qualified identifiers, and
//! picked atoms.

use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use unicase::UniCase;

use crate::core::version::Version;

/// The one case mismatch the ecosystem agreed to forgive: the logrus project
/// renamed its account from `Sirupsen` to `sirupsen`, and half the world's
/// manifests still spell the old form. Both spellings fold to the canonical
/// lowercase root at intake.
pub const SIRUPSEN_LOGRUS_VARIANT: &str = "github.com/Sirupsen/logrus";
pub const SIRUPSEN_LOGRUS_CANONICAL: &str = "github.com/sirupsen/logrus";

/// The canonical import path of a project: the prefix under which all of its
/// packages live. Case is preserved, but collision detection uses a
/// case-folded form (see [`ProjectRoot::folded`]).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectRoot(String);

impl ProjectRoot {
    /// Creates a root, applying the single permitted case fold.
    pub fn new(s: impl Into<String>) -> ProjectRoot {
        let s = s.into();
        if s == SIRUPSEN_LOGRUS_VARIANT {
            return ProjectRoot(SIRUPSEN_LOGRUS_CANONICAL.to_string());
        }
        ProjectRoot(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The case-folded key used for collision detection.
    pub fn folded(&self) -> UniCase<String> {
        UniCase::new(self.0.clone())
    }

    /// Whether `import_path` names a package inside this project.
    pub fn contains_import(&self, import_path: &str) -> bool {
        import_path == self.0
            || (import_path.starts_with(&self.0)
                && import_path.as_bytes().get(self.0.len()) == Some(&b'/'))
    }
}

impl fmt::Display for ProjectRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectRoot {
    fn from(s: &str) -> ProjectRoot {
        ProjectRoot::new(s)
    }
}

impl From<String> for ProjectRoot {
    fn from(s: String) -> ProjectRoot {
        ProjectRoot::new(&s)
    }
}

impl Borrow<str> for ProjectRoot {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A project root plus an optional alternate upstream location. Two
/// identifiers with equal roots but different `source` values are illegal
/// within one solve; the solver fails such a pair with a source mismatch.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectIdentifier {
    pub root: ProjectRoot,
    pub source: Option<String>,
}

impl ProjectIdentifier {
    pub fn plain(root: impl Into<ProjectRoot>) -> ProjectIdentifier {
        ProjectIdentifier {
            root: root.into(),
            source: None,
        }
    }

    pub fn with_source(root: impl Into<ProjectRoot>, source: impl Into<String>) -> ProjectIdentifier {
        ProjectIdentifier {
            root: root.into(),
            source: Some(source.into()),
        }
    }

    /// The location versions are listed from: the alternate source if one was
    /// declared, the import path otherwise.
    pub fn effective_source(&self) -> &str {
        self.source.as_deref().unwrap_or(self.root.as_str())
    }
}

impl fmt::Display for ProjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) if src != self.root.as_str() => {
                write!(f, "{} (from {})", self.root, src)
            }
            _ => self.root.fmt(f),
        }
    }
}

impl From<ProjectRoot> for ProjectIdentifier {
    fn from(root: ProjectRoot) -> ProjectIdentifier {
        ProjectIdentifier { root, source: None }
    }
}

/// A fully-picked candidate: one project at one version.
#[derive(Clone, Debug, PartialEq)]
pub struct Atom {
    pub id: ProjectIdentifier,
    pub version: Version,
}

impl Atom {
    pub fn new(id: ProjectIdentifier, version: Version) -> Atom {
        Atom { id, version }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}

/// An atom plus the set of its packages the depending graph actually imports.
#[derive(Clone, Debug, PartialEq)]
pub struct AtomWithPackages {
    pub atom: Atom,
    pub packages: BTreeSet<String>,
}

/// The unit of outstanding work in the solver: a project to decide, plus the
/// packages of it that must be present and usable.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct BimodalIdentifier {
    pub id: ProjectIdentifier,
    pub required_packages: BTreeSet<String>,
}

impl fmt::Display for BimodalIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)?;
        if !self.required_packages.is_empty() {
            let pkgs: Vec<&str> = self.required_packages.iter().map(|s| s.as_str()).collect();
            write!(f, " [{}]", pkgs.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_contains_only_whole_path_segments() {
        let root = ProjectRoot::new("github.com/pkg/errors");
        assert!(root.contains_import("github.com/pkg/errors"));
        assert!(root.contains_import("github.com/pkg/errors/internal"));
        assert!(!root.contains_import("github.com/pkg/errorsx"));
        assert!(!root.contains_import("github.com/pkg"));
    }

    #[test]
    fn folded_keys_collide_across_case() {
        let a = ProjectRoot::new("github.com/Masterminds/semver");
        let b = ProjectRoot::new("github.com/masterminds/semver");
        assert_ne!(a, b);
        assert_eq!(a.folded(), b.folded());
    }

    #[test]
    fn sirupsen_fold_is_applied_at_intake() {
        let folded = ProjectRoot::new(SIRUPSEN_LOGRUS_VARIANT);
        assert_eq!(folded.as_str(), SIRUPSEN_LOGRUS_CANONICAL);
        // Every other case variant is preserved and must collide instead.
        let other = ProjectRoot::new("github.com/SIRUPSEN/logrus");
        assert_eq!(other.as_str(), "github.com/SIRUPSEN/logrus");
    }

    #[test]
    fn effective_source_prefers_the_declared_one() {
        let plain = ProjectIdentifier::plain("github.com/pkg/errors");
        assert_eq!(plain.effective_source(), "github.com/pkg/errors");
        let forked =
            ProjectIdentifier::with_source("github.com/pkg/errors", "github.com/fork/errors");
        assert_eq!(forked.effective_source(), "github.com/fork/errors");
    }
}
