//! Declarative fixtures: describe a universe of projects, versions, and
//! dependency declarations; get back a [`SourceBridge`] the solver can run
//! against.
//!
//! Revisions are synthesized as `root@label`, so every fixture version is
//! paired and lockable. Version lists are returned in declaration order;
//! the solver is expected to normalize ordering itself.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use depsolve::core::analyzer::AnalyzerInfo;
use depsolve::core::constraint::Constraint;
use depsolve::core::lock::{Lock, LockedProject};
use depsolve::core::manifest::{Manifest, ProjectProperties};
use depsolve::core::pkgtree::{Package, PackageOrErr, PackageTree};
use depsolve::core::project::{ProjectIdentifier, ProjectRoot};
use depsolve::core::resolver::{RootProject, SolveFailure, SolveParameters};
use depsolve::core::source::{BridgeError, SourceBridge};
use depsolve::core::version::{Revision, Version};

/// Import root of the synthetic project under solve.
pub const ROOT: &str = "example.com/root";

/// A dependency declaration in a fixture: project root, requirement string
/// (`"*"` for any), optional alternate source.
#[derive(Clone, Debug)]
pub struct DepSpec {
    pub root: String,
    pub req: String,
    pub source: Option<String>,
}

pub fn dep(root: &str, req: &str) -> DepSpec {
    DepSpec {
        root: root.to_string(),
        req: req.to_string(),
        source: None,
    }
}

pub fn dep_src(root: &str, req: &str, source: &str) -> DepSpec {
    DepSpec {
        root: root.to_string(),
        req: req.to_string(),
        source: Some(source.to_string()),
    }
}

impl DepSpec {
    fn constraint(&self) -> Constraint {
        Constraint::from_version_str(&self.req)
    }
}

#[derive(Clone, Debug)]
pub struct FixtureVersion {
    pub version: Version,
    pub deps: Vec<DepSpec>,
}

/// A semver-tagged fixture version.
pub fn ver(tag: &str, deps: &[DepSpec]) -> FixtureVersion {
    FixtureVersion {
        version: Version::from_tag(tag),
        deps: deps.to_vec(),
    }
}

/// A branch fixture version.
pub fn branch(name: &str, default: bool, deps: &[DepSpec]) -> FixtureVersion {
    FixtureVersion {
        version: if default {
            Version::default_branch(name)
        } else {
            Version::branch(name)
        },
        deps: deps.to_vec(),
    }
}

#[derive(Clone, Debug)]
pub struct FixtureProject {
    pub root: String,
    pub versions: Vec<FixtureVersion>,
}

pub fn proj(root: &str, versions: Vec<FixtureVersion>) -> FixtureProject {
    FixtureProject {
        root: root.to_string(),
        versions,
    }
}

/// In-memory bridge over a fixture registry.
pub struct FixtureBridge {
    roots: Vec<ProjectRoot>,
    versions: HashMap<ProjectRoot, Vec<Version>>,
    by_rev: HashMap<String, (Manifest, PackageTree)>,
    pub analyze_calls: AtomicUsize,
}

fn single_package_tree(root: &ProjectRoot, imports: impl Iterator<Item = String>) -> PackageTree {
    let mut tree = PackageTree::new(root.clone());
    tree.packages.insert(
        root.as_str().to_string(),
        PackageOrErr::Package(Package {
            name: root.as_str().rsplit('/').next().unwrap().to_string(),
            import_path: root.as_str().to_string(),
            imports: imports.collect(),
            test_imports: BTreeSet::new(),
        }),
    );
    tree
}

fn manifest_of(deps: &[DepSpec]) -> Manifest {
    let mut manifest = Manifest::new();
    for d in deps {
        manifest.constraints.insert(
            ProjectRoot::new(d.root.clone()),
            ProjectProperties {
                constraint: d.constraint(),
                source: d.source.clone(),
            },
        );
    }
    manifest
}

/// Builds a bridge from fixture projects. Every version is paired with the
/// synthetic revision `root@label`.
pub fn registry(projects: Vec<FixtureProject>) -> FixtureBridge {
    let mut bridge = FixtureBridge {
        roots: Vec::new(),
        versions: HashMap::new(),
        by_rev: HashMap::new(),
        analyze_calls: AtomicUsize::new(0),
    };
    for project in projects {
        let root = ProjectRoot::new(project.root.clone());
        let mut versions = Vec::new();
        for fv in project.versions {
            let rev = Revision::new(format!("{}@{}", root, fv.version));
            let paired = fv.version.clone().pair(rev.clone());
            let manifest = manifest_of(&fv.deps);
            let tree = single_package_tree(&root, fv.deps.iter().map(|d| d.root.clone()));
            bridge.by_rev.insert(rev.to_string(), (manifest, tree));
            versions.push(paired);
        }
        bridge.roots.push(root.clone());
        bridge.versions.insert(root, versions);
    }
    bridge
}

impl SourceBridge for FixtureBridge {
    fn list_versions(&self, id: &ProjectIdentifier) -> Result<Vec<Version>, BridgeError> {
        self.versions
            .get(&id.root)
            .cloned()
            .ok_or_else(|| BridgeError::MissingSource { id: id.clone() })
    }

    fn revision_present_in(
        &self,
        _id: &ProjectIdentifier,
        rev: &Revision,
    ) -> Result<bool, BridgeError> {
        Ok(self.by_rev.contains_key(rev.as_str()))
    }

    fn source_urls_for_path(&self, _import_path: &str) -> Result<Vec<url::Url>, BridgeError> {
        Ok(Vec::new())
    }

    fn analyze(
        &self,
        id: &ProjectIdentifier,
        rev: &Revision,
    ) -> Result<(Manifest, Lock), BridgeError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        let (manifest, _) = self
            .by_rev
            .get(rev.as_str())
            .ok_or_else(|| BridgeError::NonexistentRevision {
                id: id.clone(),
                rev: rev.clone(),
            })?;
        Ok((manifest.clone(), Lock::new()))
    }

    fn list_packages(
        &self,
        id: &ProjectIdentifier,
        rev: &Revision,
    ) -> Result<PackageTree, BridgeError> {
        let (_, tree) = self
            .by_rev
            .get(rev.as_str())
            .ok_or_else(|| BridgeError::NonexistentRevision {
                id: id.clone(),
                rev: rev.clone(),
            })?;
        Ok(tree.clone())
    }

    fn deduce_project_root(&self, import_path: &str) -> Result<ProjectRoot, BridgeError> {
        let owner = self
            .roots
            .iter()
            .filter(|r| r.contains_import(import_path))
            .max_by_key(|r| r.as_str().len());
        Ok(owner
            .cloned()
            .unwrap_or_else(|| ProjectRoot::new(import_path)))
    }

    fn analyzer_info(&self) -> AnalyzerInfo {
        AnalyzerInfo {
            name: "fixture".to_string(),
            version: 1,
        }
    }
}

/// A root project whose single package imports each dependency's root and
/// whose manifest constrains them as declared.
pub fn root_project(deps: &[DepSpec]) -> RootProject {
    let root = ProjectRoot::new(ROOT);
    RootProject {
        import_root: root.clone(),
        tree: single_package_tree(&root, deps.iter().map(|d| d.root.clone())),
        manifest: manifest_of(deps),
        lock: None,
    }
}

pub fn params(root: RootProject) -> SolveParameters {
    SolveParameters::new(root)
}

/// A prior-lock entry pinned at a synthetic fixture revision.
pub fn locked(root: &str, tag: &str) -> LockedProject {
    let version = Version::from_tag(tag);
    let rev = Revision::new(format!("{root}@{version}"));
    LockedProject {
        id: ProjectIdentifier::plain(root),
        version: version.pair(rev),
        packages: [root.to_string()].into(),
    }
}

/// Asserts the lock holds exactly `expected` as `(root, version-label)`
/// pairs, in project-root order.
pub fn assert_lock(lock: &Lock, expected: &[(&str, &str)]) {
    let actual: Vec<(String, String)> = lock
        .projects
        .iter()
        .map(|p| (p.id.root.as_str().to_string(), p.version.to_string()))
        .collect();
    let expected: Vec<(String, String)> = expected
        .iter()
        .map(|(r, v)| (r.to_string(), v.to_string()))
        .collect();
    assert_eq!(actual, expected);
}

/// Whether `pred` holds for the failure or anything nested under it.
pub fn failure_chain_contains(
    failure: &SolveFailure,
    pred: &dyn Fn(&SolveFailure) -> bool,
) -> bool {
    if pred(failure) {
        return true;
    }
    match failure {
        SolveFailure::NoVersion(err) => err
            .fails
            .iter()
            .any(|fv| failure_chain_contains(&fv.failure, pred)),
        _ => false,
    }
}
