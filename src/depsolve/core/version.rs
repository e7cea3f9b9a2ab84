//! Typed versions and their pairing rules.
//!
//! A version is one of four things: a semver tag, a plain (non-semver) tag, a
//! branch, or a bare revision. The first three are *labels*, names a source
//! hands out that resolve to some concrete commit. A label may be **paired**
//! with the revision it currently resolves to; a lock always records paired
//! versions so that checkouts are reproducible even after a tag moves.
//!
//! Equality follows the pairing rules rather than plain structural equality:
//! two paired versions are equal iff their revisions are equal, while an
//! unpaired label and a paired one compare equal iff the labels match. This
//! is deliberately not transitive (`v1.0@abc != v1.0@def`, yet both equal the
//! bare label `v1.0`), which is why [`Version`] implements [`PartialEq`] but
//! not `Eq` or `Hash`.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An opaque identifier for a concrete state of a source (for Git sources, a
/// commit hash). Revisions are compared byte-for-byte and never ordered by
/// recency.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Revision(String);

impl Revision {
    pub fn new(s: impl Into<String>) -> Revision {
        Revision(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Revision {
    fn from(s: &str) -> Revision {
        Revision::new(s)
    }
}

/// A version of a project, possibly paired with the revision its label
/// resolves to.
#[derive(Clone, Debug)]
pub enum Version {
    /// A tag parseable as semver, e.g. `v1.2.3`.
    Semver {
        sv: semver::Version,
        rev: Option<Revision>,
    },
    /// A tag that is not valid semver, ordered lexicographically.
    Tag { name: String, rev: Option<Revision> },
    /// A branch head. `default` marks the source's default branch, which the
    /// candidate filter treats preferentially.
    Branch {
        name: String,
        default: bool,
        rev: Option<Revision>,
    },
    /// A bare revision, already as concrete as a version can get.
    Revision(Revision),
}

impl Version {
    /// Parses a tag name into either a semver or plain-tag version. A single
    /// leading `v` is tolerated, matching common tagging practice.
    pub fn from_tag(name: &str) -> Version {
        let trimmed = name.strip_prefix('v').unwrap_or(name);
        match semver::Version::parse(trimmed) {
            Ok(sv) => Version::Semver { sv, rev: None },
            Err(_) => Version::Tag {
                name: name.to_string(),
                rev: None,
            },
        }
    }

    pub fn branch(name: impl Into<String>) -> Version {
        Version::Branch {
            name: name.into(),
            default: false,
            rev: None,
        }
    }

    pub fn default_branch(name: impl Into<String>) -> Version {
        Version::Branch {
            name: name.into(),
            default: true,
            rev: None,
        }
    }

    /// The revision this version is bound to, if any.
    pub fn revision(&self) -> Option<&Revision> {
        match self {
            Version::Semver { rev, .. } | Version::Tag { rev, .. } | Version::Branch { rev, .. } => {
                rev.as_ref()
            }
            Version::Revision(r) => Some(r),
        }
    }

    pub fn is_paired(&self) -> bool {
        self.revision().is_some()
    }

    /// Binds a label to the revision it resolves to. Pairing a bare revision
    /// replaces it.
    pub fn pair(self, rev: Revision) -> Version {
        match self {
            Version::Semver { sv, .. } => Version::Semver { sv, rev: Some(rev) },
            Version::Tag { name, .. } => Version::Tag {
                name,
                rev: Some(rev),
            },
            Version::Branch { name, default, .. } => Version::Branch {
                name,
                default,
                rev: Some(rev),
            },
            Version::Revision(_) => Version::Revision(rev),
        }
    }

    /// Drops the paired revision, leaving the plain label. Bare revisions are
    /// returned unchanged.
    pub fn unpair(self) -> Version {
        match self {
            Version::Semver { sv, .. } => Version::Semver { sv, rev: None },
            Version::Tag { name, .. } => Version::Tag { name, rev: None },
            Version::Branch { name, default, .. } => Version::Branch {
                name,
                default,
                rev: None,
            },
            v @ Version::Revision(_) => v,
        }
    }

    pub fn is_default_branch(&self) -> bool {
        matches!(self, Version::Branch { default: true, .. })
    }

    pub fn semver(&self) -> Option<&semver::Version> {
        match self {
            Version::Semver { sv, .. } => Some(sv),
            _ => None,
        }
    }

    /// True when the two versions carry the same label, ignoring pairing.
    /// Bare revisions have no label and never label-match anything.
    pub fn labels_match(&self, other: &Version) -> bool {
        match (self, other) {
            (Version::Semver { sv: a, .. }, Version::Semver { sv: b, .. }) => a == b,
            (Version::Tag { name: a, .. }, Version::Tag { name: b, .. }) => a == b,
            (Version::Branch { name: a, .. }, Version::Branch { name: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Version) -> bool {
        match (self.revision(), other.revision()) {
            (Some(a), Some(b)) => match (self, other) {
                // Bare revisions only ever equal other bare revisions.
                (Version::Revision(_), Version::Revision(_)) => a == b,
                (Version::Revision(_), _) | (_, Version::Revision(_)) => false,
                _ => a == b,
            },
            _ => self.labels_match(other),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Semver { sv, .. } => write!(f, "v{}", sv),
            Version::Tag { name, .. } => f.write_str(name),
            Version::Branch { name, .. } => f.write_str(name),
            Version::Revision(r) => f.write_str(r.as_str()),
        }
    }
}

/// Rank used by the candidate orderings: semver tags are tried before default
/// branches, then other branches, then plain tags, then bare revisions.
fn type_rank(v: &Version) -> u8 {
    match v {
        Version::Semver { .. } => 0,
        Version::Branch { default: true, .. } => 1,
        Version::Branch { default: false, .. } => 2,
        Version::Tag { .. } => 3,
        Version::Revision(_) => 4,
    }
}

fn cmp_within_type(a: &Version, b: &Version, newest_first: bool) -> Ordering {
    match (a, b) {
        (Version::Semver { sv: x, .. }, Version::Semver { sv: y, .. }) => {
            if newest_first {
                y.cmp(x)
            } else {
                x.cmp(y)
            }
        }
        (Version::Branch { name: x, .. }, Version::Branch { name: y, .. }) => x.cmp(y),
        (Version::Tag { name: x, .. }, Version::Tag { name: y, .. }) => x.cmp(y),
        (Version::Revision(x), Version::Revision(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// Sorts candidates into the solver's preferred try-order: semver descending,
/// then default branches, other branches, and plain tags, each
/// lexicographically.
pub fn sort_for_upgrade(versions: &mut [Version]) {
    versions.sort_by(|a, b| {
        type_rank(a)
            .cmp(&type_rank(b))
            .then_with(|| cmp_within_type(a, b, true))
    });
}

/// Like [`sort_for_upgrade`] but with semver ascending, for downgrade solves.
pub fn sort_for_downgrade(versions: &mut [Version]) {
    versions.sort_by(|a, b| {
        type_rank(a)
            .cmp(&type_rank(b))
            .then_with(|| cmp_within_type(a, b, false))
    });
}
