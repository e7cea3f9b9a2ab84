//! The lock: the concrete outcome of a solve.

use std::collections::BTreeSet;
use std::fmt;

use crate::core::project::{ProjectIdentifier, ProjectRoot};
use crate::core::version::Version;

/// One pinned project. `version` is normally paired, so a checkout can
/// proceed straight to the recorded revision even if the label has moved.
#[derive(Clone, Debug, PartialEq)]
pub struct LockedProject {
    pub id: ProjectIdentifier,
    pub version: Version,
    /// The concrete sub-import-paths of this project the dependency graph
    /// actually imports.
    pub packages: BTreeSet<String>,
}

impl fmt::Display for LockedProject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}

/// Every project reachable from the root tree, pinned exactly once, in
/// project-root order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Lock {
    pub projects: Vec<LockedProject>,
    /// Digest of the solve inputs (effective constraints, root imports,
    /// analyzer identity). Lets a later run detect that its inputs changed
    /// without re-solving.
    pub inputs_digest: Vec<u8>,
}

impl Lock {
    pub fn new() -> Lock {
        Lock::default()
    }

    pub fn project_for(&self, root: &ProjectRoot) -> Option<&LockedProject> {
        self.projects.iter().find(|p| &p.id.root == root)
    }

    pub fn remove_project(&mut self, root: &ProjectRoot) -> Option<LockedProject> {
        let idx = self.projects.iter().position(|p| &p.id.root == root)?;
        Some(self.projects.remove(idx))
    }

    /// Inserts or replaces the entry for the project's root, keeping the
    /// project-root ordering intact.
    pub fn upsert_project(&mut self, project: LockedProject) {
        match self
            .projects
            .iter()
            .position(|p| p.id.root == project.id.root)
        {
            Some(idx) => self.projects[idx] = project,
            None => self.projects.push(project),
        }
        self.sort_projects();
    }

    pub fn sort_projects(&mut self) {
        self.projects.sort_by(|a, b| a.id.root.cmp(&b.id.root));
    }
}
