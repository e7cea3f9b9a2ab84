//! The backtracking solver.
//!
//! The search drains a priority queue of undecided projects. For each, a
//! version queue supplies candidates in preference order; the first candidate
//! that survives every check is pushed onto the selection, its dependencies
//! are enqueued, and the search moves on. A candidate that fails a check is
//! recorded and the queue advanced; an exhausted queue unwinds the most
//! recent selection that can still offer an alternative. Success projects
//! the selection into a [`Lock`]; exhaustion of the whole space surfaces the
//! accumulated per-version failures.
//!
//! Everything here is single-threaded and deterministic: given the same
//! inputs and the same version lists as multisets (ordering is normalized
//! internally), the solver produces bit-identical locks.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use sha2::{Digest as _, Sha256};
use tracing::debug;

use crate::core::constraint::Constraint;
use crate::core::lock::{Lock, LockedProject};
use crate::core::manifest::{Manifest, ProjectProperties};
use crate::core::pkgtree::PackageTree;
use crate::core::project::{
    Atom, AtomWithPackages, BimodalIdentifier, ProjectIdentifier, ProjectRoot,
};
use crate::core::source::{BridgeError, SourceBridge};
use crate::core::version::{Revision, Version};
use crate::util::cancel::CancelToken;

pub use self::errors::{
    FailedVersion, NoVersionError, OverridePackage, SolveError, SolveFailure,
};
pub use self::selection::{Dependency, DependencyRequest, Selection};
pub use self::trace::{NullTrace, TraceEvent, TraceSink, TreeTrace};
pub use self::unselected::Unselected;
pub use self::version_queue::{QueueOpts, VersionQueue};

pub mod errors;
pub mod selection;
pub mod trace;
pub mod unselected;
pub mod version_queue;

/// The root project being solved for: its import root, analyzed package
/// tree, manifest, and the lock of a previous solve, if any.
#[derive(Clone, Debug)]
pub struct RootProject {
    pub import_root: ProjectRoot,
    pub tree: PackageTree,
    pub manifest: Manifest,
    pub lock: Option<Lock>,
}

/// Everything a solve needs besides a source bridge.
#[derive(Clone, Debug)]
pub struct SolveParameters {
    pub root: RootProject,
    /// Prefer the oldest admissible semver instead of the newest.
    pub downgrade: bool,
    /// Ignore every prior-lock version hint.
    pub change_all: bool,
    /// Ignore the prior-lock version hint for just these roots.
    pub to_change: BTreeSet<ProjectRoot>,
    /// Let non-default branches through the candidate filter.
    pub allow_any_branch: bool,
    /// Cap on stable semver candidates kept per project beyond those the
    /// constraint names.
    pub semver_queue_cap: usize,
}

impl SolveParameters {
    pub fn new(root: RootProject) -> SolveParameters {
        SolveParameters {
            root,
            downgrade: false,
            change_all: false,
            to_change: BTreeSet::new(),
            allow_any_branch: false,
            semver_queue_cap: QueueOpts::default().semver_cap,
        }
    }

    fn queue_opts(&self) -> QueueOpts {
        QueueOpts {
            downgrade: self.downgrade,
            allow_any_branch: self.allow_any_branch,
            semver_cap: self.semver_queue_cap,
        }
    }

    /// Digest of everything that determines the outcome of a solve: the
    /// effective constraints, the root tree's external imports, and the
    /// analyzer identity. Stored in the lock so a later run can tell stale
    /// from current without re-solving.
    pub fn hash_inputs(&self, bridge: &dyn SourceBridge) -> Vec<u8> {
        let mut hasher = Sha256::new();
        for (root, props) in &self.root.manifest.constraints {
            hasher.update(root.as_str());
            hasher.update(props.constraint.to_string());
            hasher.update(props.source.as_deref().unwrap_or(""));
        }
        hasher.update(b"-overrides-");
        for (root, props) in &self.root.manifest.overrides {
            hasher.update(root.as_str());
            hasher.update(props.constraint.to_string());
            hasher.update(props.source.as_deref().unwrap_or(""));
        }
        hasher.update(b"-required-");
        for r in &self.root.manifest.required {
            hasher.update(r);
        }
        hasher.update(b"-ignored-");
        for i in &self.root.manifest.ignored {
            hasher.update(i);
        }
        hasher.update(b"-imports-");
        for import in self.root_reach().external {
            hasher.update(import);
        }
        hasher.update(b"-analyzer-");
        hasher.update(bridge.analyzer_info().to_string());
        hasher.finalize().to_vec()
    }

    fn root_reach(&self) -> crate::core::pkgtree::Reach {
        let starts: Vec<&str> = self
            .root
            .tree
            .clean_packages()
            .filter(|p| !self.root.manifest.ignores_import(p))
            .collect();
        self.root.tree.reach_from(starts, true)
    }
}

/// Solves for a lock. The trace sink observes every attempt; pass a
/// [`NullTrace`] to observe nothing.
pub fn resolve(
    params: &SolveParameters,
    bridge: &dyn SourceBridge,
    trace: &mut dyn TraceSink,
    cancel: &CancelToken,
) -> Result<Lock, SolveError> {
    let mut solver = Solver {
        params,
        bridge,
        trace,
        cancel,
        sel: Selection::new(),
        unsel: Unselected::new(),
        vqs: HashMap::new(),
        frames: Vec::new(),
        locked_hints: HashMap::new(),
        attempts: 0,
    };
    solver.validate()?;
    solver.seed()?;
    solver.run()
}

struct Frame {
    bmi: BimodalIdentifier,
    deps: Vec<Dependency>,
    first: bool,
}

struct Solver<'a> {
    params: &'a SolveParameters,
    bridge: &'a dyn SourceBridge,
    trace: &'a mut dyn TraceSink,
    cancel: &'a CancelToken,
    sel: Selection,
    unsel: Unselected,
    vqs: HashMap<ProjectIdentifier, VersionQueue>,
    /// One frame per selection push, recording the edges that push added so
    /// backtracking can remove exactly them.
    frames: Vec<Frame>,
    locked_hints: HashMap<ProjectRoot, Version>,
    attempts: u64,
}

/// Splits a bridge error into a per-candidate solve failure where it
/// describes the input, or passes infrastructure trouble through.
fn failure_from_bridge(e: BridgeError) -> Result<SolveFailure, BridgeError> {
    match e {
        BridgeError::MissingSource { id } => Ok(SolveFailure::MissingSource { id }),
        BridgeError::NonexistentRevision { id, rev } => {
            Ok(SolveFailure::NonexistentRevision { goal: id, rev })
        }
        other => Err(other),
    }
}

impl<'a> Solver<'a> {
    fn validate(&self) -> Result<(), SolveError> {
        let bad = |msg: String| SolveError::Failure(SolveFailure::BadOpts { msg });
        if self.params.root.import_root.is_empty() {
            return Err(bad("the root project has no import root".to_string()));
        }
        if self.params.root.tree.import_root != self.params.root.import_root {
            return Err(bad(format!(
                "package tree is rooted at {}, not at {}",
                self.params.root.tree.import_root, self.params.root.import_root
            )));
        }
        self.params
            .root
            .manifest
            .validate()
            .map_err(|e| bad(e.to_string()))?;
        Ok(())
    }

    /// Computes the root's direct dependencies and primes the queues.
    fn seed(&mut self) -> Result<(), SolveError> {
        // Prior-lock versions become try-first hints, except for roots the
        // caller asked to change.
        if let Some(lock) = &self.params.root.lock {
            if !self.params.change_all {
                for locked in &lock.projects {
                    if !self.params.to_change.contains(&locked.id.root) {
                        self.locked_hints
                            .insert(locked.id.root.clone(), locked.version.clone());
                    }
                }
            }
        }

        let reach = self.params.root_reach();
        let manifest = &self.params.root.manifest;
        let mut externals: BTreeSet<String> = reach
            .external
            .into_iter()
            .filter(|p| !manifest.ignores_import(p))
            .collect();
        for required in &manifest.required {
            if !self.params.root.import_root.contains_import(required)
                && !manifest.ignores_import(required)
            {
                externals.insert(required.clone());
            }
        }

        let root_atom = Atom::new(
            ProjectIdentifier::plain(self.params.root.import_root.clone()),
            Version::Revision(Revision::new("")),
        );
        for (dep_root, packages) in self.group_imports(externals)? {
            if dep_root == self.params.root.import_root {
                continue;
            }
            let props = manifest
                .effective_props(&dep_root, true)
                .cloned()
                .unwrap_or(ProjectProperties {
                    constraint: Constraint::Any,
                    source: None,
                });
            let id = ProjectIdentifier {
                root: dep_root,
                source: props.source,
            };
            let edge = Dependency {
                depender: root_atom.clone(),
                dep: DependencyRequest {
                    id: id.clone(),
                    constraint: props.constraint,
                    packages: packages.clone(),
                },
            };
            self.sel.push_dep(edge);
            self.unsel.push(BimodalIdentifier {
                id,
                required_packages: packages,
            });
        }
        Ok(())
    }

    /// Buckets external import paths by the project root that owns them.
    /// When deduction folded the root's spelling (the logrus rename), the
    /// import path's prefix is rewritten to match, so package names stay
    /// coherent with the tree they will be checked against.
    fn group_imports(
        &self,
        imports: BTreeSet<String>,
    ) -> Result<BTreeMap<ProjectRoot, BTreeSet<String>>, SolveError> {
        let mut grouped: BTreeMap<ProjectRoot, BTreeSet<String>> = BTreeMap::new();
        for import in imports {
            let root = self.bridge.deduce_project_root(&import)?;
            let import = if root.contains_import(&import) {
                import
            } else {
                let segments = root.as_str().split('/').count();
                let mut rewritten = root.as_str().to_string();
                for part in import.split('/').skip(segments) {
                    rewritten.push('/');
                    rewritten.push_str(part);
                }
                rewritten
            };
            grouped.entry(root).or_default().insert(import);
        }
        Ok(grouped)
    }

    fn run(&mut self) -> Result<Lock, SolveError> {
        loop {
            self.cancel.check()?;
            let Some(bmi) = self.unsel.pop() else {
                break;
            };
            self.trace.record(TraceEvent::Visit { id: bmi.id.clone() });

            if let Some(current) = self.sel.find_case_conflict(&bmi.id.root) {
                let failure = SolveFailure::CaseMismatch {
                    goal: bmi.id.root.clone(),
                    current,
                };
                self.backtrack(failure)?;
                continue;
            }

            if self.sel.is_selected(&bmi.id.root) {
                self.visit_selected(bmi)?;
            } else {
                self.visit_unselected(bmi)?;
            }
        }

        debug!("solve complete after {} attempts", self.attempts);
        Ok(self.project_lock())
    }

    /// Decides a version for a project seen for the first time (or seen
    /// again after backtracking).
    fn visit_unselected(&mut self, bmi: BimodalIdentifier) -> Result<(), SolveError> {
        if !self.vqs.contains_key(&bmi.id) {
            let constraint = self.sel.get_constraint(&bmi.id);
            let locked = self.locked_hints.get(&bmi.id.root).cloned();
            let preferred = self
                .sel
                .preferred_version_of(&bmi.id.root)
                .filter(|p| Some(p) != locked.as_ref());
            match VersionQueue::new(
                bmi.id.clone(),
                locked,
                preferred,
                self.bridge,
                &constraint,
                self.params.queue_opts(),
            ) {
                Ok(vq) => {
                    self.vqs.insert(bmi.id.clone(), vq);
                }
                Err(e) => {
                    let failure = failure_from_bridge(e)?;
                    return self.backtrack(failure);
                }
            }
            self.cancel.check()?;
        }

        loop {
            self.cancel.check()?;
            let current = self
                .vqs
                .get(&bmi.id)
                .and_then(|vq| vq.current())
                .cloned();
            let Some(version) = current else {
                // Queue exhausted: every candidate for this project has been
                // ruled out under the current selection. Unwind.
                let fails = self
                    .vqs
                    .get(&bmi.id)
                    .map(|vq| vq.fails().to_vec())
                    .unwrap_or_default();
                self.vqs.remove(&bmi.id);
                let failure = SolveFailure::NoVersion(NoVersionError {
                    id: bmi.id.clone(),
                    fails,
                });
                return self.backtrack(failure);
            };

            self.attempts += 1;
            let atom = Atom::new(bmi.id.clone(), version);
            self.trace.record(TraceEvent::TryVersion { atom: atom.clone() });

            match self.check(&atom, &bmi)? {
                Ok((paired, edges)) => {
                    let atom = Atom::new(atom.id, paired);
                    self.select(atom, bmi, edges, false);
                    return Ok(());
                }
                Err(failure) => {
                    self.trace.record(TraceEvent::Reject {
                        atom: atom.clone(),
                        reason: failure.to_string(),
                    });
                    self.trace.record(TraceEvent::Advance {
                        id: bmi.id.clone(),
                        from: atom.version.clone(),
                    });
                    let constraint = self.sel.get_constraint(&bmi.id);
                    let vq = self
                        .vqs
                        .get_mut(&bmi.id)
                        .expect("queue exists for the project being visited");
                    if let Err(e) = vq.advance(failure, self.bridge, &constraint) {
                        let failure = failure_from_bridge(e)?;
                        return self.backtrack(failure);
                    }
                }
            }
        }
    }

    /// Handles a project that is already selected: only new packages can be
    /// at stake.
    fn visit_selected(&mut self, bmi: BimodalIdentifier) -> Result<(), SolveError> {
        let selected = self
            .sel
            .selected_atom(&bmi.id.root)
            .cloned()
            .expect("visit_selected requires a selected atom");
        let already = self.sel.packages_of(&bmi.id.root);
        let new_packages: BTreeSet<String> = &bmi.required_packages - &already;
        if new_packages.is_empty() {
            return Ok(());
        }

        let rev = selected
            .version
            .revision()
            .expect("selected versions are always paired")
            .clone();
        let tree = match self.bridge.list_packages(&selected.id, &rev) {
            Ok(tree) => tree,
            Err(e) => {
                let failure = failure_from_bridge(e)?;
                return self.backtrack(failure);
            }
        };
        self.cancel.check()?;

        let reach = tree.reach_from(new_packages.iter().map(|s| s.as_str()), false);
        if !reach.is_clean() {
            let mut problems = reach.problems.clone();
            for missing in &reach.missing {
                problems.insert(missing.clone(), "package does not exist".to_string());
            }
            return self.backtrack(SolveFailure::CheckeeHasProblemPackages {
                goal: selected,
                problems,
            });
        }

        let manifest_v = match self.bridge.analyze(&selected.id, &rev) {
            Ok((m, _lock)) => m,
            Err(e) => {
                let failure = failure_from_bridge(e)?;
                return self.backtrack(failure);
            }
        };
        self.cancel.check()?;

        let edges = match self.dependency_edges(&selected, &manifest_v, reach.external)? {
            Ok(edges) => edges,
            Err(failure) => return self.backtrack(failure),
        };
        let atom = selected;
        self.select(
            atom,
            BimodalIdentifier {
                id: bmi.id,
                required_packages: new_packages,
            },
            edges,
            true,
        );
        Ok(())
    }

    /// Runs every check a candidate must pass, returning either the paired
    /// version plus outbound edges to install, or the failure that rules the
    /// candidate out.
    #[allow(clippy::type_complexity)]
    fn check(
        &self,
        atom: &Atom,
        bmi: &BimodalIdentifier,
    ) -> Result<Result<(Version, Vec<Dependency>), SolveFailure>, SolveError> {
        // Inbound constraints first; hints in particular can be arbitrary.
        let fail_parents: Vec<Dependency> = self
            .sel
            .deps_on(&atom.id.root)
            .iter()
            .filter(|d| !d.dep.constraint.matches(&atom.version))
            .cloned()
            .collect();
        if !fail_parents.is_empty() {
            return Ok(Err(SolveFailure::VersionNotAllowed {
                goal: atom.clone(),
                fail_parents,
                constraint: self.sel.get_constraint(&atom.id),
            }));
        }

        let version = match self.pair(&atom.id, atom.version.clone())? {
            Ok(v) => v,
            Err(failure) => return Ok(Err(failure)),
        };
        let rev = version
            .revision()
            .expect("pair() always returns a paired version")
            .clone();

        if let Version::Revision(_) = &version {
            match self.bridge.revision_present_in(&atom.id, &rev) {
                Ok(true) => {}
                Ok(false) => {
                    return Ok(Err(SolveFailure::NonexistentRevision {
                        goal: atom.id.clone(),
                        rev,
                    }));
                }
                Err(e) => return Ok(Err(failure_from_bridge(e)?)),
            }
        }

        let manifest_v = match self.bridge.analyze(&atom.id, &rev) {
            Ok((m, _lock)) => m,
            Err(e) => return Ok(Err(failure_from_bridge(e)?)),
        };
        self.cancel.check()?;
        let tree = match self.bridge.list_packages(&atom.id, &rev) {
            Ok(t) => t,
            Err(e) => return Ok(Err(failure_from_bridge(e)?)),
        };
        self.cancel.check()?;

        let required: BTreeSet<String> = if bmi.required_packages.is_empty() {
            [atom.id.root.as_str().to_string()].into()
        } else {
            bmi.required_packages.clone()
        };
        let reach = tree.reach_from(required.iter().map(|s| s.as_str()), false);
        if !reach.is_clean() {
            let mut problems = reach.problems.clone();
            for missing in &reach.missing {
                problems.insert(missing.clone(), "package does not exist".to_string());
            }
            return Ok(Err(SolveFailure::CheckeeHasProblemPackages {
                goal: Atom::new(atom.id.clone(), version),
                problems,
            }));
        }

        let edges = self.dependency_edges(
            &Atom::new(atom.id.clone(), version.clone()),
            &manifest_v,
            reach.external,
        )?;
        Ok(edges.map(|edges| (version, edges)))
    }

    /// Builds the outbound edges a candidate introduces, checking each
    /// against what the selection already holds.
    fn dependency_edges(
        &self,
        depender: &Atom,
        manifest_v: &Manifest,
        external_imports: BTreeSet<String>,
    ) -> Result<Result<Vec<Dependency>, SolveFailure>, SolveError> {
        let root_manifest = &self.params.root.manifest;
        let external: BTreeSet<String> = external_imports
            .into_iter()
            .filter(|p| !root_manifest.ignores_import(p))
            .collect();
        let mut edges = Vec::new();

        for (dep_root, packages) in self.group_imports(external)? {
            if dep_root == self.params.root.import_root {
                // Imports back into the root project are satisfied locally.
                continue;
            }
            // The root's overrides apply transitively and win outright; a
            // dependency's own overrides never escape it.
            let props = match root_manifest.overrides.get(&dep_root) {
                Some(o) => o.clone(),
                None => manifest_v
                    .constraints
                    .get(&dep_root)
                    .cloned()
                    .unwrap_or(ProjectProperties {
                        constraint: Constraint::Any,
                        source: None,
                    }),
            };
            let id = ProjectIdentifier {
                root: dep_root.clone(),
                source: props.source,
            };
            let edge = Dependency {
                depender: depender.clone(),
                dep: DependencyRequest {
                    id: id.clone(),
                    constraint: props.constraint.clone(),
                    packages,
                },
            };

            if let Some(in_use) = self.sel.id_for(&dep_root) {
                if in_use.effective_source() != id.effective_source() {
                    return Ok(Err(SolveFailure::SourceMismatch {
                        shared: dep_root.clone(),
                        current: in_use.effective_source().to_string(),
                        mismatch: id.effective_source().to_string(),
                        prob: depender.clone(),
                        selected: self
                            .sel
                            .selected_atom(&dep_root)
                            .cloned()
                            .into_iter()
                            .collect(),
                    }));
                }
            }

            if let Some(selected) = self.sel.selected_atom(&dep_root) {
                if !edge.dep.constraint.matches(&selected.version) {
                    return Ok(Err(SolveFailure::ConstraintNotAllowed {
                        goal: edge.clone(),
                        version: selected.version.clone(),
                    }));
                }
            }

            let existing = self.sel.get_constraint(&id);
            if !existing.is_none()
                && existing.intersect(&edge.dep.constraint).is_none()
                && !edge.dep.constraint.is_none()
            {
                let fail_siblings: Vec<Dependency> = self
                    .sel
                    .deps_on(&dep_root)
                    .iter()
                    .filter(|d| d.dep.constraint.intersect(&edge.dep.constraint).is_none())
                    .cloned()
                    .collect();
                return Ok(Err(SolveFailure::DisjointConstraint {
                    constraint: existing.intersect(&edge.dep.constraint),
                    goal: edge,
                    fail_siblings,
                }));
            }

            // A dependency on an already-selected project must find its
            // packages in the selected version.
            if let Some(selected) = self.sel.selected_atom(&dep_root).cloned() {
                let wanted: BTreeSet<String> = &edge.dep.packages - &self.sel.packages_of(&dep_root);
                if !wanted.is_empty() {
                    let rev = selected
                        .version
                        .revision()
                        .expect("selected versions are always paired")
                        .clone();
                    let tree = match self.bridge.list_packages(&selected.id, &rev) {
                        Ok(t) => t,
                        Err(e) => return Ok(Err(failure_from_bridge(e)?)),
                    };
                    self.cancel.check()?;
                    let missing: Vec<String> = wanted
                        .iter()
                        .filter(|p| !tree.packages.contains_key(*p))
                        .cloned()
                        .collect();
                    if !missing.is_empty() {
                        return Ok(Err(SolveFailure::DepHasMissingPackages {
                            goal: edge,
                            missing,
                        }));
                    }
                    let unusable: Vec<String> = wanted
                        .iter()
                        .filter(|p| tree.package(p).is_none())
                        .cloned()
                        .collect();
                    if !unusable.is_empty() {
                        return Ok(Err(SolveFailure::DepHasUnusableCode {
                            goal: edge,
                            unusable,
                        }));
                    }
                }
            }

            edges.push(edge);
        }

        Ok(Ok(edges))
    }

    /// Ensures a candidate carries the revision its label resolves to.
    fn pair(
        &self,
        id: &ProjectIdentifier,
        version: Version,
    ) -> Result<Result<Version, SolveFailure>, SolveError> {
        if version.is_paired() {
            return Ok(Ok(version));
        }
        let listed = match self.bridge.list_versions(id) {
            Ok(vs) => vs,
            Err(e) => return Ok(Err(failure_from_bridge(e)?)),
        };
        self.cancel.check()?;
        match listed.into_iter().find(|v| v.labels_match(&version)) {
            Some(paired) if paired.is_paired() => Ok(Ok(paired)),
            _ => Ok(Err(SolveFailure::VersionNotAllowed {
                goal: Atom::new(id.clone(), version),
                fail_parents: Vec::new(),
                constraint: self.sel.get_constraint(id),
            })),
        }
    }

    /// Installs a candidate: edges into the selection, dependencies onto the
    /// unselected queue, the atom onto the stack.
    fn select(
        &mut self,
        atom: Atom,
        bmi: BimodalIdentifier,
        edges: Vec<Dependency>,
        pkg_only: bool,
    ) {
        for edge in &edges {
            self.sel.push_dep(edge.clone());
            self.unsel.push(BimodalIdentifier {
                id: edge.dep.id.clone(),
                required_packages: edge.dep.packages.clone(),
            });
        }
        let awp = AtomWithPackages {
            atom: atom.clone(),
            packages: bmi.required_packages.clone(),
        };
        let pushed = self.sel.push(awp, pkg_only);
        debug_assert!(pushed, "new packages were checked before selecting");
        self.frames.push(Frame {
            bmi,
            deps: edges,
            first: !pkg_only,
        });
        if let Some(rev) = atom.version.revision() {
            self.bridge.mark_revision_present(&atom.id, rev);
        }
        self.trace.record(TraceEvent::Select { atom, pkg_only });
    }

    /// Unwinds to the most recent selection that can still offer another
    /// candidate. Package-only selections on the way out are re-enqueued
    /// as-is; the first selection that advances is re-enqueued for a fresh
    /// decision. Runs out of stack: the accumulated failure is final.
    fn backtrack(&mut self, mut failure: SolveFailure) -> Result<(), SolveError> {
        loop {
            self.cancel.check()?;
            let Some(frame) = self.frames.pop() else {
                return Err(SolveError::Failure(failure));
            };
            let (awp, _first) = self
                .sel
                .pop()
                .expect("selection stack stays aligned with frames");
            self.trace.record(TraceEvent::Unselect {
                atom: awp.atom.clone(),
            });
            for dep in frame.deps.iter().rev() {
                self.sel.remove_dep(dep);
                self.unsel.remove(&BimodalIdentifier {
                    id: dep.dep.id.clone(),
                    required_packages: dep.dep.packages.clone(),
                });
            }

            if !frame.first {
                self.unsel.push(frame.bmi);
                continue;
            }

            self.trace.record(TraceEvent::Backtrack {
                id: frame.bmi.id.clone(),
            });
            let constraint = self.sel.get_constraint(&frame.bmi.id);
            let vq = self
                .vqs
                .get_mut(&frame.bmi.id)
                .expect("a first selection always has a version queue");
            if let Err(e) = vq.advance(failure, self.bridge, &constraint) {
                let f = failure_from_bridge(e)?;
                failure = f;
                self.vqs.remove(&frame.bmi.id);
                continue;
            }
            if vq.current().is_none() {
                failure = SolveFailure::NoVersion(NoVersionError {
                    id: frame.bmi.id.clone(),
                    fails: vq.fails().to_vec(),
                });
                self.vqs.remove(&frame.bmi.id);
                continue;
            }
            self.unsel.push(frame.bmi);
            return Ok(());
        }
    }

    /// Projects the final selection into a lock. Frames hold the same atoms
    /// as the selection, in push order; package-only pushes fold into their
    /// first selection's entry.
    fn project_lock(&self) -> Lock {
        let mut by_root: BTreeMap<ProjectRoot, LockedProject> = BTreeMap::new();
        for frame in &self.frames {
            let atom = self
                .sel
                .selected_atom(&frame.bmi.id.root)
                .expect("every frame's project is selected")
                .clone();
            let entry = by_root
                .entry(frame.bmi.id.root.clone())
                .or_insert_with(|| LockedProject {
                    id: atom.id.clone(),
                    version: atom.version.clone(),
                    packages: BTreeSet::new(),
                });
            entry
                .packages
                .extend(frame.bmi.required_packages.iter().cloned());
        }
        let mut lock = Lock {
            projects: by_root.into_values().collect(),
            inputs_digest: self.params.hash_inputs(self.bridge),
        };
        lock.sort_projects();
        lock
    }
}
