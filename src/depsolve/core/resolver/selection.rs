//! The solver's partial assignment: a stack of chosen atoms plus the
//! inbound-dependency edges that justify each choice.
//!
//! Every transition keeps two side structures coherent: per-root edge stacks
//! (who depends on this project, under what constraint, needing which
//! packages) and a case-folded index of roots used for collision detection.

use std::collections::{BTreeSet, HashMap};

use unicase::UniCase;

use crate::core::constraint::Constraint;
use crate::core::project::{Atom, AtomWithPackages, ProjectIdentifier, ProjectRoot};
use crate::core::version::Version;

/// One inbound edge: `depender` needs `dep.packages` of `dep.id` under
/// `dep.constraint`. Plain structural equality is what edge de-duplication
/// relies on.
#[derive(Clone, Debug, PartialEq)]
pub struct Dependency {
    pub depender: Atom,
    pub dep: DependencyRequest,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DependencyRequest {
    pub id: ProjectIdentifier,
    pub constraint: Constraint,
    pub packages: BTreeSet<String>,
}

#[derive(Clone, Debug)]
struct SelectedProject {
    awp: AtomWithPackages,
    first: bool,
}

#[derive(Default)]
pub struct Selection {
    projects: Vec<SelectedProject>,
    deps: HashMap<ProjectRoot, Vec<Dependency>>,
    fold_roots: HashMap<UniCase<String>, ProjectRoot>,
}

impl Selection {
    pub fn new() -> Selection {
        Selection::default()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn is_selected(&self, root: &ProjectRoot) -> bool {
        self.projects.iter().any(|s| &s.awp.atom.id.root == root)
    }

    pub fn selected_atom(&self, root: &ProjectRoot) -> Option<&Atom> {
        self.projects
            .iter()
            .find(|s| &s.awp.atom.id.root == root)
            .map(|s| &s.awp.atom)
    }

    /// Pushes a selection. A package-only push keeps just the packages not
    /// already recorded under a prior selection of the same project; if none
    /// remain there is nothing to do and no frame is pushed.
    pub fn push(&mut self, mut awp: AtomWithPackages, pkg_only: bool) -> bool {
        if pkg_only {
            let already = self.packages_of(&awp.atom.id.root);
            awp.packages = &awp.packages - &already;
            if awp.packages.is_empty() {
                return false;
            }
        }
        self.projects.push(SelectedProject {
            awp,
            first: !pkg_only,
        });
        true
    }

    pub fn pop(&mut self) -> Option<(AtomWithPackages, bool)> {
        self.projects.pop().map(|s| (s.awp, s.first))
    }

    /// The union of packages recorded across every selection of `root`.
    pub fn packages_of(&self, root: &ProjectRoot) -> BTreeSet<String> {
        self.projects
            .iter()
            .filter(|s| &s.awp.atom.id.root == root)
            .flat_map(|s| s.awp.packages.iter().cloned())
            .collect()
    }

    /// Records an inbound edge. The first edge for a root claims its
    /// case-folded key.
    pub fn push_dep(&mut self, dep: Dependency) {
        let root = dep.dep.id.root.clone();
        self.fold_roots
            .entry(root.folded())
            .or_insert_with(|| root.clone());
        self.deps.entry(root).or_default().push(dep);
    }

    /// Removes the most recent edge equal to `dep`, releasing the root's
    /// case-folded key when its last edge goes away.
    pub fn remove_dep(&mut self, dep: &Dependency) {
        let root = &dep.dep.id.root;
        let Some(edges) = self.deps.get_mut(root) else {
            return;
        };
        if let Some(idx) = edges.iter().rposition(|e| e == dep) {
            edges.remove(idx);
        }
        if edges.is_empty() {
            self.deps.remove(root);
            if self.fold_roots.get(&root.folded()) == Some(root) {
                self.fold_roots.remove(&root.folded());
            }
        }
    }

    pub fn deps_on(&self, root: &ProjectRoot) -> &[Dependency] {
        self.deps.get(root).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The root already holding this root's case-folded key, when it is a
    /// *different* spelling.
    pub fn find_case_conflict(&self, root: &ProjectRoot) -> Option<ProjectRoot> {
        match self.fold_roots.get(&root.folded()) {
            Some(existing) if existing != root => Some(existing.clone()),
            _ => None,
        }
    }

    /// The identifier the graph currently uses for `root`, preferring the
    /// selected atom's over any edge's.
    pub fn id_for(&self, root: &ProjectRoot) -> Option<&ProjectIdentifier> {
        if let Some(atom) = self.selected_atom(root) {
            return Some(&atom.id);
        }
        self.deps_on(root).first().map(|d| &d.dep.id)
    }

    /// Intersection of every inbound constraint on `id`, starting from
    /// `Any`. This is what admitted the currently selected atom, so it is
    /// never `None` for a selected root.
    pub fn get_constraint(&self, id: &ProjectIdentifier) -> Constraint {
        self.deps_on(&id.root)
            .iter()
            .fold(Constraint::Any, |acc, d| acc.intersect(&d.dep.constraint))
    }

    /// A version some depender asked for exactly, to be tried ahead of the
    /// rest of the queue.
    pub fn preferred_version_of(&self, root: &ProjectRoot) -> Option<Version> {
        self.deps_on(root).iter().find_map(|d| match &d.dep.constraint {
            Constraint::Exact(v) => Some(v.clone()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constraint::SemverRange;
    use crate::core::version::Revision;

    fn atom(root: &str, tag: &str) -> Atom {
        Atom::new(
            ProjectIdentifier::plain(root),
            Version::from_tag(tag).pair(Revision::new(format!("{tag}-rev"))),
        )
    }

    fn awp(root: &str, tag: &str, pkgs: &[&str]) -> AtomWithPackages {
        AtomWithPackages {
            atom: atom(root, tag),
            packages: pkgs.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn edge(from: &str, to: &str, range: &str) -> Dependency {
        Dependency {
            depender: atom(from, "v1.0.0"),
            dep: DependencyRequest {
                id: ProjectIdentifier::plain(to),
                constraint: Constraint::Semver(SemverRange::parse(range).unwrap()),
                packages: [to.to_string()].into(),
            },
        }
    }

    #[test]
    fn package_only_pushes_keep_only_new_packages() {
        let mut sel = Selection::new();
        assert!(sel.push(awp("github.com/a/a", "v1.0.0", &["github.com/a/a"]), false));
        assert!(sel.push(
            awp(
                "github.com/a/a",
                "v1.0.0",
                &["github.com/a/a", "github.com/a/a/sub"]
            ),
            true
        ));
        // Nothing new the second time around.
        assert!(!sel.push(awp("github.com/a/a", "v1.0.0", &["github.com/a/a/sub"]), true));

        let pkgs = sel.packages_of(&ProjectRoot::new("github.com/a/a"));
        assert_eq!(pkgs.len(), 2);
    }

    #[test]
    fn constraint_composition_intersects_all_edges() {
        let mut sel = Selection::new();
        sel.push_dep(edge("github.com/a/a", "github.com/shared/dep", ">=2, <4"));
        sel.push_dep(edge("github.com/b/b", "github.com/shared/dep", ">=3, <5"));

        let c = sel.get_constraint(&ProjectIdentifier::plain("github.com/shared/dep"));
        assert!(c.matches(&Version::from_tag("v3.6.9")));
        assert!(!c.matches(&Version::from_tag("v2.0.0")));
    }

    #[test]
    fn case_folded_key_tracks_edge_lifetime() {
        let mut sel = Selection::new();
        let dep = edge("github.com/a/a", "github.com/Masterminds/semver", "^1");
        sel.push_dep(dep.clone());

        let other = ProjectRoot::new("github.com/masterminds/semver");
        assert_eq!(
            sel.find_case_conflict(&other).unwrap().as_str(),
            "github.com/Masterminds/semver"
        );

        sel.remove_dep(&dep);
        assert!(sel.find_case_conflict(&other).is_none());
    }

    #[test]
    fn remove_dep_pops_the_most_recent_matching_edge() {
        let mut sel = Selection::new();
        let e = edge("github.com/a/a", "github.com/shared/dep", "^1");
        sel.push_dep(e.clone());
        sel.push_dep(edge("github.com/b/b", "github.com/shared/dep", "^1"));

        sel.remove_dep(&e);
        let remaining = sel.deps_on(&ProjectRoot::new("github.com/shared/dep"));
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].depender.id.root.as_str(), "github.com/b/b");
    }
}
