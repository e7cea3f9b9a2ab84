//! Merging a solved subtree's manifest and lock into a parent project.
//!
//! When a repository absorbs a project it previously depended on (the
//! monorepo flow), the absorbed project's pins and constraints have to be
//! reconciled with what the parent already locks. The rules are
//! deliberately conservative: an existing pin only moves when the parent's
//! own constraint allows the incoming version, with a single carve-out for
//! target constraints whose textual form is exactly `"master"`, which may
//! be dropped in favour of the concrete incoming version. Everything else
//! is an error, reported per root.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::core::lock::Lock;
use crate::core::manifest::Manifest;
use crate::core::project::ProjectRoot;
use crate::core::version::Version;

/// The manifest/lock pair of one project.
#[derive(Clone, Debug, Default)]
pub struct ProjectMetadata {
    pub manifest: Manifest,
    pub lock: Lock,
}

/// One irreconcilable lock entry: the target pins a version the incoming
/// subtree disagrees with, and the target's constraint does not allow the
/// incoming one.
#[derive(Clone, Debug)]
pub struct MergeConflict {
    pub target_version: Version,
    pub source_version: Version,
    pub target_constraint: String,
}

#[derive(Clone, Debug, Default)]
pub struct FailedToMergeMetadata {
    pub failures: BTreeMap<ProjectRoot, MergeConflict>,
}

impl fmt::Display for FailedToMergeMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "failed to merge metadata for {} project(s):", self.failures.len())?;
        for (root, c) in &self.failures {
            writeln!(
                f,
                "  {root}: locked at {}, incoming {} is not allowed by constraint {}",
                c.target_version, c.source_version, c.target_constraint
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for FailedToMergeMetadata {}

/// The one permitted constraint relaxation: a target constraint written as
/// exactly this string may be dropped in favour of a concrete source pin.
const DROPPABLE_CONSTRAINT: &str = "master";

/// Merges `source`'s lock into `target`'s lock and `source`'s manifest
/// constraints into `target`'s manifest. On conflict, every irreconcilable
/// root is reported at once.
pub fn merge_metadata(
    source: &ProjectMetadata,
    target: &mut ProjectMetadata,
) -> Result<(), FailedToMergeMetadata> {
    let mut failures: BTreeMap<ProjectRoot, MergeConflict> = BTreeMap::new();

    for incoming in &source.lock.projects {
        let root = &incoming.id.root;
        let target_constraint = target.manifest.constraints.get(root).cloned();
        let mut master_dropped = false;

        match target.lock.project_for(root).cloned() {
            None => {
                debug!("merge: adopting {incoming}, new to the target");
                target.lock.upsert_project(incoming.clone());
            }
            Some(existing) if existing.version == incoming.version => {
                let mut merged = incoming.clone();
                merged.packages.extend(existing.packages.iter().cloned());
                target.lock.upsert_project(merged);
            }
            Some(existing) => match &target_constraint {
                Some(props) if props.constraint.matches(&incoming.version) => {
                    target.lock.upsert_project(incoming.clone());
                }
                Some(props) if props.constraint.to_string() == DROPPABLE_CONSTRAINT => {
                    debug!(
                        "merge: dropping target constraint {DROPPABLE_CONSTRAINT} on {root} for {}",
                        incoming.version
                    );
                    master_dropped = true;
                    target.lock.upsert_project(incoming.clone());
                }
                Some(props) => {
                    failures.insert(
                        root.clone(),
                        MergeConflict {
                            target_version: existing.version.clone(),
                            source_version: incoming.version.clone(),
                            target_constraint: props.constraint.to_string(),
                        },
                    );
                    continue;
                }
                None => {
                    target.lock.upsert_project(incoming.clone());
                }
            },
        }

        // Fold the manifest constraints for this root.
        let source_constraint = source.manifest.constraints.get(root);
        match (source_constraint, target_constraint) {
            (Some(cs), Some(_)) if master_dropped => {
                // The dropped "master" gives way on the manifest side too.
                target.manifest.constraints.insert(root.clone(), cs.clone());
            }
            (Some(cs), Some(ct)) => {
                let mut merged = ct.clone();
                merged.constraint = ct.constraint.intersect(&cs.constraint);
                target.manifest.constraints.insert(root.clone(), merged);
            }
            (Some(cs), None) => {
                target.manifest.constraints.insert(root.clone(), cs.clone());
            }
            (None, _) => {}
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(FailedToMergeMetadata { failures })
    }
}

/// Removes `root`, and its `.git`-suffixed spelling, from the target's
/// manifest and lock. Runs after a subtree is merged in, since its code now
/// lives in the parent and must not also be fetched as a dependency.
pub fn delete_from_root(target: &mut ProjectMetadata, root: &ProjectRoot) {
    let variants = [
        root.clone(),
        ProjectRoot::new(format!("{}.git", root.as_str())),
    ];
    for variant in &variants {
        target.manifest.constraints.remove(variant);
        target.manifest.overrides.remove(variant);
        target.lock.remove_project(variant);
    }
}
