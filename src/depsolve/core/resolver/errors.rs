//! The failure taxonomy: every way a candidate, a project, or a whole solve
//! can be ruled out.
//!
//! Failures are data first. During the search they drive backtracking; at
//! the top they explain the outcome; and each knows how to propose manifest
//! overrides (`suggest_overrides`) that would have let the rejected thing
//! through. Failure values are detached from the live selection by cloning,
//! so they stay valid after the solver has unwound.

use std::collections::BTreeMap;
use std::fmt;

use crate::core::constraint::Constraint;
use crate::core::project::{Atom, ProjectIdentifier, ProjectRoot};
use crate::core::resolver::selection::Dependency;
use crate::core::source::BridgeError;
use crate::core::version::{Revision, Version};
use crate::util::cancel::Cancelled;

/// A candidate version and the reason it was ruled out, as recorded by a
/// version queue.
#[derive(Clone, Debug)]
pub struct FailedVersion {
    pub version: Version,
    pub failure: SolveFailure,
}

/// Every candidate for a project was ruled out. This is the terminal shape
/// of an exhausted search: the per-version reasons are carried along for
/// reporting and suggestion generation.
#[derive(Clone, Debug)]
pub struct NoVersionError {
    pub id: ProjectIdentifier,
    pub fails: Vec<FailedVersion>,
}

impl fmt::Display for NoVersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "no version of {} could satisfy all constraints:",
            self.id
        )?;
        for fv in &self.fails {
            writeln!(f, "  {}: {}", fv.version, fv.failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for NoVersionError {}

/// A solve failure: recoverable within the solver as a driver of
/// backtracking, surfaced at the top only when the search space is
/// exhausted.
#[derive(Clone, Debug)]
pub enum SolveFailure {
    /// Every candidate for a project was ruled out.
    NoVersion(NoVersionError),
    /// A candidate was rejected by specific inbound constraints.
    VersionNotAllowed {
        goal: Atom,
        fail_parents: Vec<Dependency>,
        constraint: Constraint,
    },
    /// A new edge's constraint has an empty intersection with the edges
    /// already in place.
    DisjointConstraint {
        goal: Dependency,
        fail_siblings: Vec<Dependency>,
        constraint: Constraint,
    },
    /// A dependency's constraint rejects the version its project is already
    /// selected at.
    ConstraintNotAllowed { goal: Dependency, version: Version },
    /// Two edges disagree on the source for the same root.
    SourceMismatch {
        shared: ProjectRoot,
        current: String,
        mismatch: String,
        prob: Atom,
        selected: Vec<Atom>,
    },
    /// Two distinct spellings of the same case-folded root.
    CaseMismatch {
        goal: ProjectRoot,
        current: ProjectRoot,
    },
    /// The candidate's own tree is missing, or fails to analyze, packages
    /// the graph requires of it.
    CheckeeHasProblemPackages {
        goal: Atom,
        problems: BTreeMap<String, String>,
    },
    /// A dependency asks for packages its selected project does not have.
    DepHasMissingPackages { goal: Dependency, missing: Vec<String> },
    /// A dependency asks for packages that exist but failed analysis.
    DepHasUnusableCode { goal: Dependency, unusable: Vec<String> },
    /// A revision pin names a revision the source does not contain.
    NonexistentRevision { goal: ProjectIdentifier, rev: Revision },
    /// No source could be set up for the project at all.
    MissingSource { id: ProjectIdentifier },
    /// The solve was invoked with contradictory parameters.
    BadOpts { msg: String },
}

/// An override a caller can offer the user to unblock a failed solve. The
/// first suggestion in a generated list is the recommended one.
#[derive(Clone, Debug, PartialEq)]
pub struct OverridePackage {
    pub name: ProjectRoot,
    pub source: Option<String>,
    pub constraint: Constraint,
}

impl SolveFailure {
    /// De-duplicated override proposals for this failure: for each party to
    /// a conflict, the constraint the *other* side would have accepted.
    pub fn suggest_overrides(&self) -> Vec<OverridePackage> {
        let mut out: Vec<OverridePackage> = Vec::new();
        let mut push = |name: &ProjectRoot, source: &Option<String>, constraint: Constraint| {
            let candidate = OverridePackage {
                name: name.clone(),
                source: source.clone(),
                constraint,
            };
            let dup = out.iter().any(|o| {
                o.name == candidate.name
                    && o.source == candidate.source
                    && o.constraint.to_string() == candidate.constraint.to_string()
            });
            if !dup {
                out.push(candidate);
            }
        };

        match self {
            SolveFailure::NoVersion(err) => {
                let mut all = Vec::new();
                for fv in &err.fails {
                    all.extend(fv.failure.suggest_overrides());
                }
                for o in all {
                    push(&o.name, &o.source, o.constraint);
                }
            }
            SolveFailure::VersionNotAllowed {
                goal, fail_parents, ..
            } => {
                push(
                    &goal.id.root,
                    &goal.id.source,
                    Constraint::Exact(goal.version.clone()),
                );
                for parent in fail_parents {
                    push(
                        &goal.id.root,
                        &goal.id.source,
                        parent.dep.constraint.clone(),
                    );
                }
            }
            SolveFailure::DisjointConstraint {
                goal, fail_siblings, ..
            } => {
                push(
                    &goal.dep.id.root,
                    &goal.dep.id.source,
                    goal.dep.constraint.clone(),
                );
                for sib in fail_siblings {
                    push(
                        &sib.dep.id.root,
                        &sib.dep.id.source,
                        sib.dep.constraint.clone(),
                    );
                }
            }
            SolveFailure::ConstraintNotAllowed { goal, version } => {
                push(
                    &goal.dep.id.root,
                    &goal.dep.id.source,
                    Constraint::Exact(version.clone()),
                );
                push(
                    &goal.dep.id.root,
                    &goal.dep.id.source,
                    goal.dep.constraint.clone(),
                );
            }
            SolveFailure::SourceMismatch {
                shared,
                current,
                mismatch,
                ..
            } => {
                push(shared, &Some(current.clone()), Constraint::Any);
                push(shared, &Some(mismatch.clone()), Constraint::Any);
            }
            // Package-level and input-level failures have no constraint to
            // relax; an override cannot help.
            SolveFailure::CaseMismatch { .. }
            | SolveFailure::CheckeeHasProblemPackages { .. }
            | SolveFailure::DepHasMissingPackages { .. }
            | SolveFailure::DepHasUnusableCode { .. }
            | SolveFailure::NonexistentRevision { .. }
            | SolveFailure::MissingSource { .. }
            | SolveFailure::BadOpts { .. } => {}
        }
        out
    }
}

impl fmt::Display for SolveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveFailure::NoVersion(err) => err.fmt(f),
            SolveFailure::VersionNotAllowed {
                goal, fail_parents, ..
            } => {
                write!(
                    f,
                    "could not introduce {}, as it is not allowed by constraint",
                    goal
                )?;
                if fail_parents.len() > 1 {
                    write!(f, "s")?;
                }
                for parent in fail_parents {
                    write!(
                        f,
                        " {} from {}",
                        parent.dep.constraint, parent.depender.id
                    )?;
                }
                Ok(())
            }
            SolveFailure::DisjointConstraint {
                goal, fail_siblings, ..
            } => {
                write!(
                    f,
                    "constraint {} on {} from {} has no overlap with",
                    goal.dep.constraint, goal.dep.id, goal.depender.id
                )?;
                for sib in fail_siblings {
                    write!(f, " {} from {}", sib.dep.constraint, sib.depender.id)?;
                }
                Ok(())
            }
            SolveFailure::ConstraintNotAllowed { goal, version } => write!(
                f,
                "{} from {} does not allow the currently selected {}@{}",
                goal.dep.constraint, goal.depender.id, goal.dep.id, version
            ),
            SolveFailure::SourceMismatch {
                shared,
                current,
                mismatch,
                prob,
                ..
            } => write!(
                f,
                "{} requires {} from {}, but it is already marked as coming from {}",
                prob.id, shared, mismatch, current
            ),
            SolveFailure::CaseMismatch { goal, current } => write!(
                f,
                "{} differs only by case from {}, which is already in use",
                goal, current
            ),
            SolveFailure::CheckeeHasProblemPackages { goal, problems } => {
                write!(f, "{} has problem packages:", goal)?;
                for (pkg, err) in problems {
                    write!(f, " {pkg} ({err});")?;
                }
                Ok(())
            }
            SolveFailure::DepHasMissingPackages { goal, missing } => write!(
                f,
                "{} requires packages of {} that do not exist: {}",
                goal.depender.id,
                goal.dep.id,
                missing.join(", ")
            ),
            SolveFailure::DepHasUnusableCode { goal, unusable } => write!(
                f,
                "{} requires packages of {} with unusable code: {}",
                goal.depender.id,
                goal.dep.id,
                unusable.join(", ")
            ),
            SolveFailure::NonexistentRevision { goal, rev } => {
                write!(f, "requested revision {rev} does not exist in {goal}")
            }
            SolveFailure::MissingSource { id } => {
                write!(f, "no source could be set up for {id}")
            }
            SolveFailure::BadOpts { msg } => write!(f, "invalid solve parameters: {msg}"),
        }
    }
}

impl std::error::Error for SolveFailure {}

/// The top-level outcome of a failed solve. Solve failures are the searched
/// outcome; cancellation and bridge trouble abort the search and pass
/// through untouched.
#[derive(Debug, thiserror::Error)]
pub enum SolveError {
    #[error(transparent)]
    Failure(#[from] SolveFailure),
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constraint::SemverRange;
    use crate::core::resolver::selection::DependencyRequest;

    fn atom(root: &str, tag: &str) -> Atom {
        Atom::new(
            ProjectIdentifier::plain(root),
            Version::from_tag(tag).pair(Revision::new("aaaa")),
        )
    }

    fn dep(from: &str, to: &str, range: &str) -> Dependency {
        Dependency {
            depender: atom(from, "v1.0.0"),
            dep: DependencyRequest {
                id: ProjectIdentifier::plain(to),
                constraint: Constraint::Semver(SemverRange::parse(range).unwrap()),
                packages: Default::default(),
            },
        }
    }

    #[test]
    fn source_mismatch_suggests_both_sources_under_any() {
        let failure = SolveFailure::SourceMismatch {
            shared: ProjectRoot::new("github.com/shared/dep"),
            current: "github.com/fork/dep".to_string(),
            mismatch: "github.com/other/dep".to_string(),
            prob: atom("github.com/b/b", "v1.0.0"),
            selected: vec![],
        };
        let suggestions = failure.suggest_overrides();
        assert_eq!(suggestions.len(), 2);
        assert!(suggestions.iter().all(|o| o.constraint.is_any()));
        assert_eq!(suggestions[0].source.as_deref(), Some("github.com/fork/dep"));
        assert_eq!(
            suggestions[1].source.as_deref(),
            Some("github.com/other/dep")
        );
    }

    #[test]
    fn duplicate_suggestions_are_suppressed() {
        let failure = SolveFailure::DisjointConstraint {
            goal: dep("github.com/a/a", "github.com/shared/dep", "^1"),
            fail_siblings: vec![
                dep("github.com/b/b", "github.com/shared/dep", "^2"),
                dep("github.com/c/c", "github.com/shared/dep", "^2"),
            ],
            constraint: Constraint::None,
        };
        let suggestions = failure.suggest_overrides();
        // ^1 (recommended) and ^2 once.
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].constraint.to_string(), "^1");
        assert_eq!(suggestions[1].constraint.to_string(), "^2");
    }

    #[test]
    fn no_version_unions_per_version_suggestions() {
        let goal = atom("github.com/shared/dep", "v2.0.0");
        let failure = SolveFailure::NoVersion(NoVersionError {
            id: goal.id.clone(),
            fails: vec![FailedVersion {
                version: goal.version.clone(),
                failure: SolveFailure::VersionNotAllowed {
                    goal: goal.clone(),
                    fail_parents: vec![dep("github.com/a/a", "github.com/shared/dep", "^1")],
                    constraint: Constraint::Semver(SemverRange::parse("^1").unwrap()),
                },
            }],
        });
        let suggestions = failure.suggest_overrides();
        assert_eq!(suggestions.len(), 2);
        // The rejected version itself is the recommended override.
        assert_eq!(suggestions[0].constraint.to_string(), "v2.0.0");
    }
}
