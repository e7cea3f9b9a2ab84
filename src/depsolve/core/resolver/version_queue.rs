//! The per-project candidate list: ordered, lazily loaded, and filtered.
//!
//! A queue starts from hints when it can (the prior lock's version, then a
//! version some depender asked for exactly) and only asks the source for
//! the full list once the hints are spent. The filter keeps the candidate
//! space from exploding on branch-heavy repositories: stable semver tags up
//! to a cap, the default branch, and anything the inbound constraint
//! explicitly names.

use std::collections::VecDeque;

use tracing::trace;

use crate::core::constraint::Constraint;
use crate::core::project::ProjectIdentifier;
use crate::core::resolver::errors::{FailedVersion, SolveFailure};
use crate::core::source::{BridgeError, SourceBridge};
use crate::core::version::{self, Version};

/// Tunables for queue construction and filtering.
#[derive(Clone, Copy, Debug)]
pub struct QueueOpts {
    /// Try oldest semver first instead of newest.
    pub downgrade: bool,
    /// Pass non-default branches through the filter unconditionally.
    pub allow_any_branch: bool,
    /// How many stable semver tags to keep beyond what the constraint
    /// explicitly names.
    pub semver_cap: usize,
}

impl Default for QueueOpts {
    fn default() -> QueueOpts {
        QueueOpts {
            downgrade: false,
            allow_any_branch: false,
            semver_cap: 5,
        }
    }
}

pub struct VersionQueue {
    id: ProjectIdentifier,
    versions: VecDeque<Version>,
    locked_hint: Option<Version>,
    preferred_hint: Option<Version>,
    fails: Vec<FailedVersion>,
    all_loaded: bool,
    /// A list error is sticky: once the source refuses to enumerate, every
    /// later advance reports the same refusal.
    adv_err: Option<BridgeError>,
    opts: QueueOpts,
}

impl VersionQueue {
    pub fn new(
        id: ProjectIdentifier,
        locked_hint: Option<Version>,
        preferred_hint: Option<Version>,
        bridge: &dyn SourceBridge,
        constraint: &Constraint,
        opts: QueueOpts,
    ) -> Result<VersionQueue, BridgeError> {
        let mut vq = VersionQueue {
            id,
            versions: VecDeque::new(),
            locked_hint: locked_hint.clone(),
            preferred_hint: preferred_hint.clone(),
            fails: Vec::new(),
            all_loaded: false,
            adv_err: None,
            opts,
        };
        if locked_hint.is_some() || preferred_hint.is_some() {
            if let Some(lv) = locked_hint {
                vq.versions.push_back(lv);
            }
            if let Some(pv) = preferred_hint {
                if !vq.versions.iter().any(|v| v == &pv) {
                    vq.versions.push_back(pv);
                }
            }
        } else {
            vq.versions = vq.load(bridge, constraint)?;
            vq.all_loaded = true;
        }
        trace!("queue for {} holds {} candidates", vq.id, vq.versions.len());
        Ok(vq)
    }

    fn load(
        &self,
        bridge: &dyn SourceBridge,
        constraint: &Constraint,
    ) -> Result<VecDeque<Version>, BridgeError> {
        let mut all = bridge.list_versions(&self.id)?;
        if self.opts.downgrade {
            version::sort_for_downgrade(&mut all);
        } else {
            version::sort_for_upgrade(&mut all);
        }
        Ok(filter_versions(all, constraint, &self.opts))
    }

    pub fn current(&self) -> Option<&Version> {
        self.versions.front()
    }

    pub fn is_exhausted(&self) -> bool {
        self.all_loaded && self.versions.is_empty()
    }

    pub fn fails(&self) -> &[FailedVersion] {
        &self.fails
    }

    /// Records why the current candidate was rejected and moves to the next,
    /// loading and filtering the full version list once the hints are spent.
    pub fn advance(
        &mut self,
        failure: SolveFailure,
        bridge: &dyn SourceBridge,
        constraint: &Constraint,
    ) -> Result<(), BridgeError> {
        if let Some(err) = &self.adv_err {
            return Err(err.clone());
        }
        if let Some(current) = self.versions.pop_front() {
            trace!("advancing queue for {} past {}", self.id, current);
            self.fails.push(FailedVersion {
                version: current,
                failure,
            });
        }
        if self.versions.is_empty() && !self.all_loaded {
            let loaded = match self.load(bridge, constraint) {
                Ok(vs) => vs,
                Err(e) => {
                    self.adv_err = Some(e.clone());
                    return Err(e);
                }
            };
            // The hints were already tried; don't offer them again.
            self.versions = loaded
                .into_iter()
                .filter(|v| {
                    self.locked_hint.as_ref() != Some(v) && self.preferred_hint.as_ref() != Some(v)
                })
                .collect();
            self.all_loaded = true;
        }
        Ok(())
    }
}

/// Applies the candidate filter to an already-sorted list. The result is a
/// subsequence of the input: filtering never reorders.
fn filter_versions(all: Vec<Version>, constraint: &Constraint, opts: &QueueOpts) -> VecDeque<Version> {
    if opts.allow_any_branch {
        return all.into();
    }
    let explicitly_matched = |v: &Version| !constraint.is_any() && constraint.matches(v);
    let mut kept_semvers = 0;
    let mut out = VecDeque::new();
    for v in all {
        let keep = match &v {
            Version::Branch { default, .. } => *default || explicitly_matched(&v),
            Version::Semver { sv, .. } => {
                if explicitly_matched(&v) {
                    true
                } else if sv.pre.is_empty() && kept_semvers < opts.semver_cap {
                    kept_semvers += 1;
                    true
                } else {
                    false
                }
            }
            _ => explicitly_matched(&v),
        };
        if keep {
            out.push_back(v);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constraint::SemverRange;
    use crate::core::lock::Lock;
    use crate::core::manifest::Manifest;
    use crate::core::pkgtree::PackageTree;
    use crate::core::project::ProjectRoot;
    use crate::core::version::Revision;

    struct ListBridge {
        versions: Vec<Version>,
    }

    impl SourceBridge for ListBridge {
        fn list_versions(&self, _id: &ProjectIdentifier) -> Result<Vec<Version>, BridgeError> {
            Ok(self.versions.clone())
        }
        fn revision_present_in(
            &self,
            _id: &ProjectIdentifier,
            _rev: &Revision,
        ) -> Result<bool, BridgeError> {
            Ok(true)
        }
        fn source_urls_for_path(&self, _path: &str) -> Result<Vec<url::Url>, BridgeError> {
            Ok(vec![])
        }
        fn analyze(
            &self,
            id: &ProjectIdentifier,
            _rev: &Revision,
        ) -> Result<(Manifest, Lock), BridgeError> {
            Err(BridgeError::MissingSource { id: id.clone() })
        }
        fn list_packages(
            &self,
            id: &ProjectIdentifier,
            _rev: &Revision,
        ) -> Result<PackageTree, BridgeError> {
            Err(BridgeError::MissingSource { id: id.clone() })
        }
        fn deduce_project_root(&self, path: &str) -> Result<ProjectRoot, BridgeError> {
            Ok(ProjectRoot::new(path))
        }
        fn analyzer_info(&self) -> crate::core::analyzer::AnalyzerInfo {
            crate::core::analyzer::AnalyzerInfo {
                name: "test".into(),
                version: 1,
            }
        }
    }

    struct FailingBridge;

    impl SourceBridge for FailingBridge {
        fn list_versions(&self, id: &ProjectIdentifier) -> Result<Vec<Version>, BridgeError> {
            Err(BridgeError::MissingSource { id: id.clone() })
        }
        fn revision_present_in(
            &self,
            _id: &ProjectIdentifier,
            _rev: &Revision,
        ) -> Result<bool, BridgeError> {
            Ok(false)
        }
        fn source_urls_for_path(&self, _path: &str) -> Result<Vec<url::Url>, BridgeError> {
            Ok(vec![])
        }
        fn analyze(
            &self,
            id: &ProjectIdentifier,
            _rev: &Revision,
        ) -> Result<(Manifest, Lock), BridgeError> {
            Err(BridgeError::MissingSource { id: id.clone() })
        }
        fn list_packages(
            &self,
            id: &ProjectIdentifier,
            _rev: &Revision,
        ) -> Result<PackageTree, BridgeError> {
            Err(BridgeError::MissingSource { id: id.clone() })
        }
        fn deduce_project_root(&self, path: &str) -> Result<ProjectRoot, BridgeError> {
            Ok(ProjectRoot::new(path))
        }
        fn analyzer_info(&self) -> crate::core::analyzer::AnalyzerInfo {
            crate::core::analyzer::AnalyzerInfo {
                name: "test".into(),
                version: 1,
            }
        }
    }

    fn id() -> ProjectIdentifier {
        ProjectIdentifier::plain("github.com/dep/one")
    }

    fn tag(s: &str) -> Version {
        Version::from_tag(s).pair(Revision::new(format!("{s}-rev")))
    }

    fn reject() -> SolveFailure {
        SolveFailure::BadOpts {
            msg: "rejected in test".to_string(),
        }
    }

    #[test]
    fn hints_are_tried_before_the_full_list() {
        let bridge = ListBridge {
            versions: vec![tag("v1.0.0"), tag("v2.0.0")],
        };
        let mut vq = VersionQueue::new(
            id(),
            Some(tag("v1.0.0")),
            Some(tag("v1.5.0")),
            &bridge,
            &Constraint::Any,
            QueueOpts::default(),
        )
        .unwrap();

        assert_eq!(vq.current().unwrap().to_string(), "v1.0.0");
        vq.advance(reject(), &bridge, &Constraint::Any).unwrap();
        assert_eq!(vq.current().unwrap().to_string(), "v1.5.0");
        // Hints spent; the full list is loaded minus the already-tried ones.
        vq.advance(reject(), &bridge, &Constraint::Any).unwrap();
        assert_eq!(vq.current().unwrap().to_string(), "v2.0.0");
        vq.advance(reject(), &bridge, &Constraint::Any).unwrap();
        assert!(vq.current().is_none());
        assert!(vq.is_exhausted());
        // Advancing past the end stays exhausted without erroring.
        vq.advance(reject(), &bridge, &Constraint::Any).unwrap();
        assert!(vq.is_exhausted());
        assert_eq!(vq.fails().len(), 3);
    }

    #[test]
    fn stable_semvers_are_capped_but_matched_ones_survive() {
        let mut versions: Vec<Version> = (0..8).map(|i| tag(&format!("v1.{i}.0"))).collect();
        versions.push(tag("v0.1.0"));
        let bridge = ListBridge { versions };

        let constraint = Constraint::Semver(SemverRange::parse("=0.1.0").unwrap());
        let vq = VersionQueue::new(
            id(),
            None,
            None,
            &bridge,
            &constraint,
            QueueOpts::default(),
        )
        .unwrap();

        // Five newest stable tags, plus v0.1.0 which the constraint names.
        let mut remaining: Vec<String> = Vec::new();
        let mut q = vq;
        while let Some(v) = q.current() {
            remaining.push(v.to_string());
            q.advance(reject(), &bridge, &Constraint::Any).unwrap();
        }
        assert_eq!(
            remaining,
            vec!["v1.7.0", "v1.6.0", "v1.5.0", "v1.4.0", "v1.3.0", "v0.1.0"]
        );
    }

    #[test]
    fn prereleases_need_an_explicit_constraint() {
        let bridge = ListBridge {
            versions: vec![tag("v1.0.0"), tag("v2.0.0-beta.1")],
        };
        let vq = VersionQueue::new(id(), None, None, &bridge, &Constraint::Any, QueueOpts::default())
            .unwrap();
        assert_eq!(vq.current().unwrap().to_string(), "v1.0.0");

        let c = Constraint::Semver(SemverRange::parse("=2.0.0-beta.1").unwrap());
        let vq = VersionQueue::new(id(), None, None, &bridge, &c, QueueOpts::default()).unwrap();
        assert_eq!(vq.current().unwrap().to_string(), "v2.0.0-beta.1");
    }

    #[test]
    fn non_default_branches_are_filtered_unless_allowed() {
        let bridge = ListBridge {
            versions: vec![
                Version::default_branch("master").pair(Revision::new("m")),
                Version::branch("devel").pair(Revision::new("d")),
            ],
        };
        let vq = VersionQueue::new(id(), None, None, &bridge, &Constraint::Any, QueueOpts::default())
            .unwrap();
        assert_eq!(vq.current().unwrap().to_string(), "master");

        let mut opts = QueueOpts::default();
        opts.allow_any_branch = true;
        let mut vq = VersionQueue::new(id(), None, None, &bridge, &Constraint::Any, opts).unwrap();
        vq.advance(reject(), &bridge, &Constraint::Any).unwrap();
        assert_eq!(vq.current().unwrap().to_string(), "devel");
    }

    #[test]
    fn list_errors_are_sticky() {
        let good = ListBridge {
            versions: vec![tag("v1.0.0")],
        };
        let mut vq = VersionQueue::new(
            id(),
            Some(tag("v9.0.0")),
            None,
            &good,
            &Constraint::Any,
            QueueOpts::default(),
        )
        .unwrap();
        // The lazy load goes to a bridge that refuses.
        assert!(vq.advance(reject(), &FailingBridge, &Constraint::Any).is_err());
        assert!(vq.advance(reject(), &good, &Constraint::Any).is_err());
    }
}
