//! Static deduction of project roots from raw import paths.
//!
//! Given `github.com/user/repo/deep/package`, the project root is
//! `github.com/user/repo`: the prefix a source can actually be cloned from.
//! Well-known hosts have fixed shapes; anything else is handled by the
//! `.git`-style VCS suffix convention. Deduction is purely syntactic, never
//! touching the network, so it is cheap enough to run on every import the
//! solver walks.

use crate::core::project::ProjectRoot;
use crate::core::source::BridgeError;

fn segment_count_root(path: &str, host: &str, segments: usize, reason: &str) -> Result<ProjectRoot, BridgeError> {
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() < segments {
        return Err(BridgeError::CannotDeduceRoot {
            path: path.to_string(),
            reason: format!("{host} import paths need {reason}"),
        });
    }
    Ok(ProjectRoot::new(parts[..segments].join("/")))
}

/// Deduces the project root for an import path, or explains why it cannot be
/// done without asking a source.
pub fn deduce_root_from_path(path: &str) -> Result<ProjectRoot, BridgeError> {
    let host = path.split('/').next().unwrap_or("");
    match host {
        "github.com" | "bitbucket.org" | "gitlab.com" => {
            segment_count_root(path, host, 3, "a user and a repository")
        }
        "golang.org" => {
            // golang.org/x/<name>
            segment_count_root(path, host, 3, "an x/<name> repository")
        }
        "gopkg.in" => deduce_gopkg_in(path),
        _ => {
            // The general convention: a path segment carrying an explicit
            // VCS suffix marks the repository boundary.
            for (i, segment) in path.split('/').enumerate() {
                if segment.ends_with(".git") || segment.ends_with(".hg") || segment.ends_with(".bzr")
                {
                    let root: Vec<&str> = path.split('/').take(i + 1).collect();
                    return Ok(ProjectRoot::new(root.join("/")));
                }
            }
            Err(BridgeError::CannotDeduceRoot {
                path: path.to_string(),
                reason: "unknown host and no VCS suffix in the path".to_string(),
            })
        }
    }
}

/// gopkg.in paths carry the major version in the final root segment:
/// `gopkg.in/yaml.v2` and `gopkg.in/user/pkg.v3` are both roots.
fn deduce_gopkg_in(path: &str) -> Result<ProjectRoot, BridgeError> {
    let parts: Vec<&str> = path.split('/').collect();
    let versioned = |s: &str| {
        s.rsplit_once(".v")
            .is_some_and(|(name, v)| !name.is_empty() && v.parse::<u64>().is_ok())
    };
    match parts.as_slice() {
        [_, pkg, ..] if versioned(pkg) => Ok(ProjectRoot::new(parts[..2].join("/"))),
        [_, _user, pkg, ..] if versioned(pkg) => Ok(ProjectRoot::new(parts[..3].join("/"))),
        _ => Err(BridgeError::CannotDeduceRoot {
            path: path.to_string(),
            reason: "gopkg.in import paths end their root in a .vN segment".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(path: &str) -> String {
        deduce_root_from_path(path).unwrap().as_str().to_string()
    }

    #[test]
    fn known_hosts_take_fixed_segment_counts() {
        assert_eq!(root("github.com/pkg/errors"), "github.com/pkg/errors");
        assert_eq!(
            root("github.com/pkg/errors/internal/deep"),
            "github.com/pkg/errors"
        );
        assert_eq!(root("bitbucket.org/ww/goautoneg"), "bitbucket.org/ww/goautoneg");
        assert_eq!(root("golang.org/x/net/context"), "golang.org/x/net");
    }

    #[test]
    fn gopkg_in_roots_end_at_the_version_segment() {
        assert_eq!(root("gopkg.in/yaml.v2"), "gopkg.in/yaml.v2");
        assert_eq!(root("gopkg.in/yaml.v2/sub"), "gopkg.in/yaml.v2");
        assert_eq!(root("gopkg.in/user/pkg.v3/deep"), "gopkg.in/user/pkg.v3");
        assert!(deduce_root_from_path("gopkg.in/noversion").is_err());
    }

    #[test]
    fn vcs_suffix_marks_the_boundary_on_unknown_hosts() {
        assert_eq!(
            root("git.example.com/infra/tools.git/cmd/run"),
            "git.example.com/infra/tools.git"
        );
        assert!(deduce_root_from_path("example.com/no/markers").is_err());
    }

    #[test]
    fn truncated_known_host_paths_are_errors() {
        assert!(deduce_root_from_path("github.com/onlyuser").is_err());
        assert!(deduce_root_from_path("github.com").is_err());
    }
}
