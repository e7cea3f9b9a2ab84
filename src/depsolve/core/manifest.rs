//! The manifest: what a project declares about its dependencies.
//!
//! `constraints` bind only the project's *direct* dependencies. `overrides`
//! apply transitively and supersede any deeper constraint on the same root;
//! they are the only sanctioned way to admit a version that some transitive
//! constraint would reject, and they must be in place before a solve begins.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::constraint::Constraint;
use crate::core::project::ProjectRoot;

/// What a manifest says about one dependency: the versions it will accept
/// and, optionally, an alternate location to fetch it from.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectProperties {
    pub constraint: Constraint,
    pub source: Option<String>,
}

impl ProjectProperties {
    pub fn constrained(constraint: Constraint) -> ProjectProperties {
        ProjectProperties {
            constraint,
            source: None,
        }
    }
}

/// Options controlling what gets stripped from vendored trees. The resolver
/// carries these through untouched; only the lock writer and vendor logic
/// read them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PruneOptions {
    pub unused_packages: bool,
    pub non_source_files: bool,
    pub test_files: bool,
    pub nested_vendor: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("manifest names an empty project root")]
    EmptyRoot,
    #[error("package {0} is listed as both required and ignored")]
    RequiredAndIgnored(String),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Manifest {
    /// Constraints on direct dependencies only.
    pub constraints: BTreeMap<ProjectRoot, ProjectProperties>,
    /// Transitive constraints that supersede anything declared deeper in the
    /// graph, including this manifest's own `constraints`.
    pub overrides: BTreeMap<ProjectRoot, ProjectProperties>,
    /// Import paths (exact, or `prefix*` wildcards) excluded from analysis.
    pub ignored: BTreeSet<String>,
    /// Packages that must be solved for even if nothing imports them.
    pub required: BTreeSet<String>,
    pub prune: PruneOptions,
}

impl Manifest {
    pub fn new() -> Manifest {
        Manifest::default()
    }

    /// Rejects manifests whose declarations contradict each other.
    pub fn validate(&self) -> Result<(), ManifestError> {
        for root in self.constraints.keys().chain(self.overrides.keys()) {
            if root.is_empty() {
                return Err(ManifestError::EmptyRoot);
            }
        }
        for req in &self.required {
            if self.ignores_import(req) {
                return Err(ManifestError::RequiredAndIgnored(req.clone()));
            }
        }
        Ok(())
    }

    /// Whether an import path is excluded by the `ignored` set. Entries
    /// ending in `*` match by prefix.
    pub fn ignores_import(&self, import_path: &str) -> bool {
        if self.ignored.contains(import_path) {
            return true;
        }
        self.ignored
            .iter()
            .filter_map(|ig| ig.strip_suffix('*'))
            .any(|prefix| import_path.starts_with(prefix))
    }

    /// The properties in force for `root` as seen from this manifest.
    ///
    /// An override wins outright; the overridden constraint is never even
    /// intersected. Plain constraints only apply to direct dependencies.
    pub fn effective_props(&self, root: &ProjectRoot, direct: bool) -> Option<&ProjectProperties> {
        if let Some(over) = self.overrides.get(root) {
            return Some(over);
        }
        if direct { self.constraints.get(root) } else { None }
    }

    /// The constraint in force for `root`; `Any` when nothing applies.
    pub fn effective_constraint(&self, root: &ProjectRoot, direct: bool) -> Constraint {
        self.effective_props(root, direct)
            .map(|p| p.constraint.clone())
            .unwrap_or(Constraint::Any)
    }

    pub fn has_override(&self, root: &ProjectRoot) -> bool {
        self.overrides.contains_key(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constraint::SemverRange;

    fn props(range: &str) -> ProjectProperties {
        ProjectProperties::constrained(Constraint::Semver(SemverRange::parse(range).unwrap()))
    }

    #[test]
    fn overrides_supersede_constraints_entirely() {
        let mut m = Manifest::new();
        let root = ProjectRoot::new("github.com/dep/one");
        m.constraints.insert(root.clone(), props("^1"));
        m.overrides.insert(root.clone(), props("^2"));

        assert_eq!(m.effective_constraint(&root, true).to_string(), "^2");
        assert_eq!(m.effective_constraint(&root, false).to_string(), "^2");
    }

    #[test]
    fn plain_constraints_bind_direct_dependencies_only() {
        let mut m = Manifest::new();
        let root = ProjectRoot::new("github.com/dep/one");
        m.constraints.insert(root.clone(), props("^1"));

        assert_eq!(m.effective_constraint(&root, true).to_string(), "^1");
        assert!(m.effective_constraint(&root, false).is_any());
    }

    #[test]
    fn ignore_wildcards_match_by_prefix() {
        let mut m = Manifest::new();
        m.ignored.insert("github.com/gen/output*".to_string());
        m.ignored.insert("github.com/exact/pkg".to_string());

        assert!(m.ignores_import("github.com/gen/output"));
        assert!(m.ignores_import("github.com/gen/output/deep"));
        assert!(m.ignores_import("github.com/exact/pkg"));
        assert!(!m.ignores_import("github.com/exact/pkg/sub"));
    }

    #[test]
    fn required_and_ignored_overlap_is_rejected() {
        let mut m = Manifest::new();
        m.required.insert("github.com/gen/output".to_string());
        m.ignored.insert("github.com/gen/*".to_string());

        assert!(matches!(
            m.validate(),
            Err(ManifestError::RequiredAndIgnored(_))
        ));
    }
}
