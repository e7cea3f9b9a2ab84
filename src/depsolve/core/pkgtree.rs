//! Static analysis results for one checked-out project: the packages under
//! its import root and the raw import paths each declares.
//!
//! A [`PackageTree`] is what the source side hands the solver for a project
//! at a concrete revision. The solver never looks at source text; everything
//! it knows about a project's dependency surface comes from walking import
//! edges through this structure.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::core::project::ProjectRoot;

/// One analyzable package inside a project.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub import_path: String,
    pub imports: BTreeSet<String>,
    pub test_imports: BTreeSet<String>,
}

/// A package slot that either analyzed cleanly or failed with a recorded
/// error (syntax errors, build-constraint mismatches, and the like).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageOrErr {
    Package(Package),
    Err(String),
}

/// The packages of one project, keyed by import path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageTree {
    pub import_root: ProjectRoot,
    pub packages: BTreeMap<String, PackageOrErr>,
}

/// The result of walking import edges out from a set of required packages.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reach {
    /// Reachable packages inside the tree, including the starting set.
    pub internal: BTreeSet<String>,
    /// Import paths that leave the project.
    pub external: BTreeSet<String>,
    /// Required packages with no entry in the tree at all.
    pub missing: BTreeSet<String>,
    /// Reachable packages whose analysis failed, with the recorded error.
    pub problems: BTreeMap<String, String>,
}

impl Reach {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.problems.is_empty()
    }
}

/// Standard-library imports have a single-segment, dot-free first element
/// (`fmt`, `net/http`); anything addressable over the network does not.
pub fn is_standard_import(path: &str) -> bool {
    match path.split('/').next() {
        Some(first) => !first.contains('.'),
        None => true,
    }
}

impl PackageTree {
    pub fn new(import_root: impl Into<ProjectRoot>) -> PackageTree {
        PackageTree {
            import_root: import_root.into(),
            packages: BTreeMap::new(),
        }
    }

    pub fn package(&self, import_path: &str) -> Option<&Package> {
        match self.packages.get(import_path) {
            Some(PackageOrErr::Package(p)) => Some(p),
            _ => None,
        }
    }

    /// Walks import edges breadth-first from `required`, partitioning what it
    /// finds into internal packages, external imports, missing packages, and
    /// analysis problems. Relative imports are skipped: they cannot name a
    /// project and the analyzer records them as package errors already.
    pub fn reach_from<'a>(
        &self,
        required: impl IntoIterator<Item = &'a str>,
        include_tests: bool,
    ) -> Reach {
        let mut reach = Reach::default();
        let mut queue: VecDeque<String> = VecDeque::new();

        for path in required {
            if !self.packages.contains_key(path) {
                reach.missing.insert(path.to_string());
            } else {
                queue.push_back(path.to_string());
            }
        }

        while let Some(path) = queue.pop_front() {
            if !reach.internal.insert(path.clone()) {
                continue;
            }
            let pkg = match self.packages.get(&path) {
                Some(PackageOrErr::Package(p)) => p,
                Some(PackageOrErr::Err(e)) => {
                    reach.problems.insert(path, e.clone());
                    continue;
                }
                None => continue,
            };
            let imports = pkg.imports.iter().chain(if include_tests {
                itertools::Either::Left(pkg.test_imports.iter())
            } else {
                itertools::Either::Right(std::iter::empty())
            });
            for import in imports {
                if is_standard_import(import) || import.starts_with('.') {
                    continue;
                }
                if self.import_root.contains_import(import) {
                    if self.packages.contains_key(import) && !reach.internal.contains(import) {
                        queue.push_back(import.clone());
                    }
                } else {
                    reach.external.insert(import.clone());
                }
            }
        }

        reach
    }

    /// All package paths in the tree that analyzed cleanly.
    pub fn clean_packages(&self) -> impl Iterator<Item = &str> {
        self.packages.iter().filter_map(|(path, p)| match p {
            PackageOrErr::Package(_) => Some(path.as_str()),
            PackageOrErr::Err(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(tree: &mut PackageTree, path: &str, imports: &[&str]) {
        tree.packages.insert(
            path.to_string(),
            PackageOrErr::Package(Package {
                name: path.rsplit('/').next().unwrap().to_string(),
                import_path: path.to_string(),
                imports: imports.iter().map(|s| s.to_string()).collect(),
                test_imports: BTreeSet::new(),
            }),
        );
    }

    #[test]
    fn standard_imports_are_recognized_by_dotless_hosts() {
        assert!(is_standard_import("fmt"));
        assert!(is_standard_import("net/http"));
        assert!(!is_standard_import("github.com/pkg/errors"));
    }

    #[test]
    fn reach_partitions_internal_and_external() {
        let mut tree = PackageTree::new("example.com/app");
        pkg(
            &mut tree,
            "example.com/app",
            &["example.com/app/inner", "github.com/dep/one", "fmt"],
        );
        pkg(&mut tree, "example.com/app/inner", &["github.com/dep/two"]);
        pkg(&mut tree, "example.com/app/unused", &["github.com/dep/three"]);

        let reach = tree.reach_from(["example.com/app"], false);
        assert!(reach.is_clean());
        assert!(reach.internal.contains("example.com/app/inner"));
        assert!(!reach.internal.contains("example.com/app/unused"));
        assert!(reach.external.contains("github.com/dep/one"));
        assert!(reach.external.contains("github.com/dep/two"));
        assert!(!reach.external.contains("github.com/dep/three"));
    }

    #[test]
    fn reach_reports_missing_and_problem_packages() {
        let mut tree = PackageTree::new("example.com/app");
        pkg(&mut tree, "example.com/app", &["example.com/app/broken"]);
        tree.packages.insert(
            "example.com/app/broken".to_string(),
            PackageOrErr::Err("expected package, found ident".to_string()),
        );

        let reach = tree.reach_from(["example.com/app", "example.com/app/gone"], false);
        assert!(reach.missing.contains("example.com/app/gone"));
        assert!(reach.problems.contains_key("example.com/app/broken"));
        assert!(!reach.is_clean());
    }

    #[test]
    fn test_imports_are_walked_only_on_request() {
        let mut tree = PackageTree::new("example.com/app");
        tree.packages.insert(
            "example.com/app".to_string(),
            PackageOrErr::Package(Package {
                name: "app".to_string(),
                import_path: "example.com/app".to_string(),
                imports: BTreeSet::new(),
                test_imports: ["github.com/test/helper".to_string()].into(),
            }),
        );

        assert!(
            tree.reach_from(["example.com/app"], false)
                .external
                .is_empty()
        );
        assert!(
            tree.reach_from(["example.com/app"], true)
                .external
                .contains("github.com/test/helper")
        );
    }
}
