//! Composable version constraints.
//!
//! A [`Constraint`] answers two questions: does a given [`Version`] satisfy
//! it (`matches`), and what do two constraints admit together (`intersect`)?
//! `Any` and `None` are the identity and absorbing elements of intersection.
//! Every constraint has a stable textual form used for de-duplicating
//! override suggestions, so `Display` output must not change gratuitously.

use std::fmt;
use std::ops::Bound;

use semver::{Comparator, Op, Prerelease, VersionReq};

use crate::core::version::{Revision, Version};

/// A semver range such as `^1.2` or `>=2, <3`.
///
/// Matching delegates to [`semver::VersionReq`]. Intersection concatenates
/// comparator lists (a `VersionReq` is already a conjunction) and then decides
/// emptiness by interval analysis, so that disjoint requirements like
/// `^1` and `^2` collapse to the empty constraint instead of surviving as an
/// unsatisfiable conjunction.
#[derive(Clone, Debug, PartialEq)]
pub struct SemverRange(pub VersionReq);

impl SemverRange {
    pub fn parse(s: &str) -> Result<SemverRange, semver::Error> {
        VersionReq::parse(s).map(SemverRange)
    }

    pub fn matches(&self, v: &semver::Version) -> bool {
        self.0.matches(v)
    }

    /// Intersects two ranges, returning `None` when no version can satisfy
    /// both.
    pub fn intersect(&self, other: &SemverRange) -> Option<SemverRange> {
        let mut comparators = self.0.comparators.clone();
        for c in &other.0.comparators {
            if !comparators.contains(c) {
                comparators.push(c.clone());
            }
        }
        let req = VersionReq { comparators };
        if req_is_empty(&req) {
            None
        } else {
            Some(SemverRange(req))
        }
    }
}

impl fmt::Display for SemverRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

fn ver(major: u64, minor: u64, patch: u64, pre: Prerelease) -> semver::Version {
    semver::Version {
        major,
        minor,
        patch,
        pre,
        build: Default::default(),
    }
}

/// The release interval a single comparator admits, ignoring prerelease
/// opt-in subtleties. Bounds compare with [`semver::Version`]'s total order,
/// which is exactly semver precedence.
fn comparator_interval(c: &Comparator) -> (Bound<semver::Version>, Bound<semver::Version>) {
    use Bound::*;
    let full = |pre: &Prerelease| {
        ver(
            c.major,
            c.minor.unwrap_or(0),
            c.patch.unwrap_or(0),
            pre.clone(),
        )
    };
    let next_minor = || match c.minor {
        Some(m) => ver(c.major, m + 1, 0, Prerelease::EMPTY),
        None => ver(c.major + 1, 0, 0, Prerelease::EMPTY),
    };
    let next_major = || ver(c.major + 1, 0, 0, Prerelease::EMPTY);

    match c.op {
        Op::Exact | Op::Wildcard => match (c.minor, c.patch) {
            (Some(_), Some(_)) => (Included(full(&c.pre)), Included(full(&c.pre))),
            (Some(_), None) => (Included(full(&Prerelease::EMPTY)), Excluded(next_minor())),
            (None, _) => (Included(full(&Prerelease::EMPTY)), Excluded(next_major())),
        },
        Op::Greater => match (c.minor, c.patch) {
            (Some(_), Some(_)) => (Excluded(full(&c.pre)), Unbounded),
            _ => (Included(next_minor()), Unbounded),
        },
        Op::GreaterEq => (Included(full(&c.pre)), Unbounded),
        Op::Less => (Unbounded, Excluded(full(&c.pre))),
        Op::LessEq => match (c.minor, c.patch) {
            (Some(_), Some(_)) => (Unbounded, Included(full(&c.pre))),
            _ => (Unbounded, Excluded(next_minor())),
        },
        Op::Tilde => match (c.minor, c.patch) {
            (Some(_), _) => (Included(full(&c.pre)), Excluded(next_minor())),
            (None, _) => (Included(full(&Prerelease::EMPTY)), Excluded(next_major())),
        },
        Op::Caret => {
            let lower = Included(full(&c.pre));
            let upper = if c.major > 0 {
                Excluded(next_major())
            } else {
                match (c.minor, c.patch) {
                    (Some(0), Some(p)) => Excluded(ver(0, 0, p + 1, Prerelease::EMPTY)),
                    (Some(0), None) => Excluded(ver(0, 1, 0, Prerelease::EMPTY)),
                    (Some(m), _) => Excluded(ver(0, m + 1, 0, Prerelease::EMPTY)),
                    (None, _) => Excluded(ver(1, 0, 0, Prerelease::EMPTY)),
                }
            };
            (lower, upper)
        }
        // Op is non_exhaustive; treat unknown operators as unbounded so a new
        // operator can never make us report a spurious conflict.
        _ => (Unbounded, Unbounded),
    }
}

fn req_is_empty(req: &VersionReq) -> bool {
    use Bound::*;
    let mut lower: Bound<semver::Version> = Unbounded;
    let mut upper: Bound<semver::Version> = Unbounded;

    for c in &req.comparators {
        let (lo, hi) = comparator_interval(c);
        lower = match (lower, lo) {
            (Unbounded, b) | (b, Unbounded) => b,
            (Included(a), Included(b)) => Included(a.max(b)),
            (Excluded(a), Excluded(b)) => Excluded(a.max(b)),
            (Included(a), Excluded(b)) | (Excluded(b), Included(a)) => {
                if b >= a {
                    Excluded(b)
                } else {
                    Included(a)
                }
            }
        };
        upper = match (upper, hi) {
            (Unbounded, b) | (b, Unbounded) => b,
            (Included(a), Included(b)) => Included(a.min(b)),
            (Excluded(a), Excluded(b)) => Excluded(a.min(b)),
            (Included(a), Excluded(b)) | (Excluded(b), Included(a)) => {
                if b <= a {
                    Excluded(b)
                } else {
                    Included(a)
                }
            }
        };
    }

    match (&lower, &upper) {
        (_, Unbounded) | (Unbounded, _) => false,
        (Included(lo), Included(hi)) => lo > hi,
        (Included(lo), Excluded(hi)) | (Excluded(lo), Included(hi)) => lo >= hi,
        (Excluded(lo), Excluded(hi)) => lo >= hi,
    }
}

/// A constraint over the versions of one project.
#[derive(Clone, Debug, PartialEq)]
pub enum Constraint {
    /// Matches every version; the identity of intersection.
    Any,
    /// Matches nothing; the absorbing element of intersection.
    None,
    /// A semver range over semver-tagged versions.
    Semver(SemverRange),
    /// Matches exactly the one labeled version, under the pairing equality
    /// rules of [`Version`].
    Exact(Version),
    /// Matches any head of the named branch. `default` records that the name
    /// was taken from the source's default branch rather than written out.
    Branch { name: String, default: bool },
    /// Matches any version bound to the given revision.
    Revision(Revision),
}

impl Constraint {
    pub fn branch(name: impl Into<String>) -> Constraint {
        Constraint::Branch {
            name: name.into(),
            default: false,
        }
    }

    /// Parses the loosest sensible constraint from a bare string: a semver
    /// range when it parses as one, a revision pin for something shaped like
    /// a hash, otherwise a branch reference.
    pub fn from_version_str(s: &str) -> Constraint {
        if s == "*" {
            return Constraint::Any;
        }
        if let Ok(range) = SemverRange::parse(s) {
            return Constraint::Semver(range);
        }
        if s.len() == 40 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Constraint::Revision(Revision::new(s));
        }
        Constraint::branch(s)
    }

    pub fn matches(&self, v: &Version) -> bool {
        match self {
            Constraint::Any => true,
            Constraint::None => false,
            Constraint::Semver(range) => v.semver().is_some_and(|sv| range.matches(sv)),
            Constraint::Exact(ev) => {
                ev == v
                    || match (ev.revision(), v) {
                        // An exact paired label also admits its bare revision.
                        (Some(r), Version::Revision(vr)) => r == vr,
                        _ => false,
                    }
            }
            Constraint::Branch { name, .. } => {
                matches!(v, Version::Branch { name: n, .. } if n == name)
            }
            Constraint::Revision(r) => v.revision() == Some(r),
        }
    }

    /// The largest constraint admitted by both `self` and `other`.
    /// Returns [`Constraint::None`] when they are disjoint.
    pub fn intersect(&self, other: &Constraint) -> Constraint {
        use Constraint::*;
        match (self, other) {
            (Any, c) | (c, Any) => c.clone(),
            (None, _) | (_, None) => None,
            (Semver(a), Semver(b)) => match a.intersect(b) {
                Some(range) => Semver(range),
                Option::None => None,
            },
            (Exact(a), Exact(b)) => {
                if a == b {
                    // Prefer whichever side is already pinned to a revision.
                    if a.is_paired() {
                        Exact(a.clone())
                    } else {
                        Exact(b.clone())
                    }
                } else {
                    None
                }
            }
            (c, Exact(v)) | (Exact(v), c) => {
                if c.matches(v) {
                    Exact(v.clone())
                } else {
                    None
                }
            }
            (
                Branch {
                    name: a,
                    default: da,
                },
                Branch {
                    name: b,
                    default: db,
                },
            ) => {
                if a == b {
                    Branch {
                        name: a.clone(),
                        default: *da || *db,
                    }
                } else {
                    None
                }
            }
            (Revision(a), Revision(b)) => {
                if a == b {
                    Revision(a.clone())
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Constraint::Any)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Constraint::None)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Any => f.write_str("*"),
            Constraint::None => f.write_str("none"),
            Constraint::Semver(range) => range.fmt(f),
            Constraint::Exact(v) => v.fmt(f),
            Constraint::Branch { name, .. } => f.write_str(name),
            Constraint::Revision(r) => r.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(s: &str) -> Constraint {
        Constraint::Semver(SemverRange::parse(s).unwrap())
    }

    fn sv(s: &str) -> Version {
        Version::from_tag(s)
    }

    #[test]
    fn any_and_none_are_identity_and_absorber() {
        let c = range("^1.2");
        assert_eq!(Constraint::Any.intersect(&c), c);
        assert_eq!(c.intersect(&Constraint::Any), c);
        assert!(Constraint::None.intersect(&c).is_none());
        assert!(c.intersect(&Constraint::None).is_none());
    }

    #[test]
    fn overlapping_ranges_intersect() {
        let c = range(">=2, <4").intersect(&range(">=3, <5"));
        assert!(c.matches(&sv("v3.6.9")));
        assert!(!c.matches(&sv("v2.5.0")));
        assert!(!c.matches(&sv("v4.0.0")));
    }

    #[test]
    fn disjoint_ranges_collapse_to_none() {
        assert!(range("^1").intersect(&range("^2")).is_none());
        assert!(range("<1.0.0").intersect(&range(">=1.0.0")).is_none());
        assert!(range("~1.2").intersect(&range(">=1.3, <1.4")).is_none());
    }

    #[test]
    fn touching_bounds_are_only_satisfiable_when_inclusive() {
        assert!(!range(">=1.0.0").intersect(&range("<=1.0.0")).is_none());
        assert!(range(">1.0.0").intersect(&range("<=1.0.0")).is_none());
    }

    #[test]
    fn caret_zero_versions_pin_tightly() {
        assert!(range("^0.0.3").intersect(&range("^0.0.4")).is_none());
        assert!(!range("^0.2").intersect(&range("^0.2.3")).is_none());
    }

    #[test]
    fn range_vs_exact_narrows_to_the_exact_version() {
        let c = range("^1").intersect(&Constraint::Exact(sv("v1.4.0")));
        assert_eq!(c, Constraint::Exact(sv("v1.4.0")));
        let c = range("^2").intersect(&Constraint::Exact(sv("v1.4.0")));
        assert!(c.is_none());
    }

    #[test]
    fn branch_constraints_intersect_by_name() {
        let a = Constraint::branch("master");
        let b = Constraint::Branch {
            name: "master".into(),
            default: true,
        };
        assert_eq!(
            a.intersect(&b),
            Constraint::Branch {
                name: "master".into(),
                default: true
            }
        );
        assert!(a.intersect(&Constraint::branch("devel")).is_none());
    }

    #[test]
    fn revision_pin_matches_paired_labels() {
        let pin = Constraint::Revision(Revision::new("deadbeef"));
        assert!(pin.matches(&sv("v1.0.0").pair(Revision::new("deadbeef"))));
        assert!(pin.matches(&Version::Revision(Revision::new("deadbeef"))));
        assert!(!pin.matches(&sv("v1.0.0")));
    }

    #[test]
    fn version_str_parsing_guesses_shape() {
        assert!(matches!(
            Constraint::from_version_str("^1.2"),
            Constraint::Semver(_)
        ));
        assert!(matches!(
            Constraint::from_version_str("master"),
            Constraint::Branch { .. }
        ));
        assert!(matches!(
            Constraint::from_version_str("0123456789abcdef0123456789abcdef01234567"),
            Constraint::Revision(_)
        ));
        assert!(matches!(Constraint::from_version_str("*"), Constraint::Any));
    }

    #[test]
    fn textual_forms_are_stable() {
        assert_eq!(Constraint::Any.to_string(), "*");
        assert_eq!(Constraint::None.to_string(), "none");
        assert_eq!(range("^1.2").to_string(), "^1.2");
        assert_eq!(Constraint::branch("master").to_string(), "master");
    }
}
