//! TOML codecs for the manifest and lock.
//!
//! The resolver core never depends on the byte format; these conversions sit
//! beside the model so that callers, caches, and the merge operation can
//! round-trip the logical schemas. A constraint is written as exactly one of
//! `version`, `branch`, or `revision`; a table carrying more than one is
//! rejected rather than guessed at.

use std::collections::BTreeSet;

use anyhow::{Context as _, bail};
use serde::{Deserialize, Serialize};

use crate::core::constraint::{Constraint, SemverRange};
use crate::core::lock::{Lock, LockedProject};
use crate::core::manifest::{Manifest, ProjectProperties, PruneOptions};
use crate::core::project::{ProjectIdentifier, ProjectRoot};
use crate::core::version::{Revision, Version};
use crate::util::errors::DepsolveResult;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlManifest {
    #[serde(skip_serializing_if = "Option::is_none")]
    required: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ignored: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    constraint: Option<Vec<TomlProject>>,
    #[serde(rename = "override", skip_serializing_if = "Option::is_none")]
    override_: Option<Vec<TomlProject>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prune: Option<TomlPrune>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlProject {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    revision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct TomlPrune {
    #[serde(skip_serializing_if = "Option::is_none")]
    unused_packages: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    non_source_files: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    test_files: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nested_vendor: Option<bool>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct TomlLock {
    #[serde(skip_serializing_if = "Option::is_none")]
    inputs_digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    projects: Option<Vec<TomlLockedProject>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlLockedProject {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<String>,
    revision: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    packages: Vec<String>,
}

fn props_from_toml(t: &TomlProject) -> DepsolveResult<(ProjectRoot, ProjectProperties)> {
    let declared = [
        t.version.is_some(),
        t.branch.is_some(),
        t.revision.is_some(),
    ]
    .iter()
    .filter(|b| **b)
    .count();
    if declared > 1 {
        bail!(
            "{}: declare at most one of version, branch, or revision",
            t.name
        );
    }
    let constraint = if let Some(v) = &t.version {
        match SemverRange::parse(v) {
            Ok(range) => Constraint::Semver(range),
            // A non-semver version names one specific tag.
            Err(_) => Constraint::Exact(Version::from_tag(v)),
        }
    } else if let Some(b) = &t.branch {
        Constraint::branch(b.clone())
    } else if let Some(r) = &t.revision {
        Constraint::Revision(Revision::new(r.clone()))
    } else {
        Constraint::Any
    };
    Ok((
        ProjectRoot::new(t.name.clone()),
        ProjectProperties {
            constraint,
            source: t.source.clone(),
        },
    ))
}

fn props_to_toml(root: &ProjectRoot, props: &ProjectProperties) -> DepsolveResult<TomlProject> {
    let mut t = TomlProject {
        name: root.as_str().to_string(),
        version: None,
        branch: None,
        revision: None,
        source: props.source.clone(),
    };
    match &props.constraint {
        Constraint::Any => {}
        Constraint::None => bail!("{root}: cannot write an unsatisfiable constraint"),
        Constraint::Semver(range) => t.version = Some(range.to_string()),
        Constraint::Exact(v) => match v {
            Version::Branch { name, .. } => t.branch = Some(name.clone()),
            Version::Revision(r) => t.revision = Some(r.to_string()),
            other => t.version = Some(other.to_string()),
        },
        Constraint::Branch { name, .. } => t.branch = Some(name.clone()),
        Constraint::Revision(r) => t.revision = Some(r.to_string()),
    }
    Ok(t)
}

pub fn manifest_from_toml_str(s: &str) -> DepsolveResult<Manifest> {
    let raw: TomlManifest = toml::from_str(s).context("invalid manifest")?;
    let mut m = Manifest::new();
    for t in raw.constraint.iter().flatten() {
        let (root, props) = props_from_toml(t)?;
        if m.constraints.insert(root.clone(), props).is_some() {
            bail!("duplicate constraint on {root}");
        }
    }
    for t in raw.override_.iter().flatten() {
        let (root, props) = props_from_toml(t)?;
        if m.overrides.insert(root.clone(), props).is_some() {
            bail!("duplicate override on {root}");
        }
    }
    m.required = raw.required.unwrap_or_default().into_iter().collect();
    m.ignored = raw.ignored.unwrap_or_default().into_iter().collect();
    if let Some(p) = raw.prune {
        m.prune = PruneOptions {
            unused_packages: p.unused_packages.unwrap_or(false),
            non_source_files: p.non_source_files.unwrap_or(false),
            test_files: p.test_files.unwrap_or(false),
            nested_vendor: p.nested_vendor.unwrap_or(false),
        };
    }
    m.validate()?;
    Ok(m)
}

pub fn manifest_to_toml_string(m: &Manifest) -> DepsolveResult<String> {
    let constraint: Vec<TomlProject> = m
        .constraints
        .iter()
        .map(|(root, props)| props_to_toml(root, props))
        .collect::<DepsolveResult<_>>()?;
    let override_: Vec<TomlProject> = m
        .overrides
        .iter()
        .map(|(root, props)| props_to_toml(root, props))
        .collect::<DepsolveResult<_>>()?;
    let raw = TomlManifest {
        required: (!m.required.is_empty()).then(|| m.required.iter().cloned().collect()),
        ignored: (!m.ignored.is_empty()).then(|| m.ignored.iter().cloned().collect()),
        constraint: (!constraint.is_empty()).then_some(constraint),
        override_: (!override_.is_empty()).then_some(override_),
        prune: (m.prune != PruneOptions::default()).then(|| TomlPrune {
            unused_packages: m.prune.unused_packages.then_some(true),
            non_source_files: m.prune.non_source_files.then_some(true),
            test_files: m.prune.test_files.then_some(true),
            nested_vendor: m.prune.nested_vendor.then_some(true),
        }),
    };
    Ok(toml::to_string(&raw)?)
}

pub fn lock_from_toml_str(s: &str) -> DepsolveResult<Lock> {
    let raw: TomlLock = toml::from_str(s).context("invalid lock")?;
    let mut lock = Lock::new();
    if let Some(digest) = &raw.inputs_digest {
        lock.inputs_digest = hex::decode(digest).context("invalid inputs-digest")?;
    }
    for t in raw.projects.iter().flatten() {
        if t.version.is_some() && t.branch.is_some() {
            bail!("{}: a locked project is either a version or a branch", t.name);
        }
        let rev = Revision::new(t.revision.clone());
        let version = if let Some(v) = &t.version {
            Version::from_tag(v).pair(rev)
        } else if let Some(b) = &t.branch {
            Version::branch(b.clone()).pair(rev)
        } else {
            Version::Revision(rev)
        };
        let id = match &t.source {
            Some(src) => ProjectIdentifier::with_source(t.name.clone(), src.clone()),
            None => ProjectIdentifier::plain(t.name.clone()),
        };
        lock.projects.push(LockedProject {
            id,
            version,
            packages: t.packages.iter().cloned().collect::<BTreeSet<_>>(),
        });
    }
    lock.sort_projects();
    Ok(lock)
}

pub fn lock_to_toml_string(lock: &Lock) -> DepsolveResult<String> {
    let projects: Vec<TomlLockedProject> = lock
        .projects
        .iter()
        .map(|p| {
            let revision = p
                .version
                .revision()
                .with_context(|| format!("{}: locked version carries no revision", p.id))?
                .to_string();
            let (version, branch) = match &p.version {
                Version::Branch { name, .. } => (None, Some(name.clone())),
                Version::Revision(_) => (None, None),
                labeled => (Some(labeled.to_string()), None),
            };
            Ok(TomlLockedProject {
                name: p.id.root.as_str().to_string(),
                version,
                branch,
                revision,
                source: p.id.source.clone(),
                packages: p.packages.iter().cloned().collect(),
            })
        })
        .collect::<DepsolveResult<_>>()?;
    let raw = TomlLock {
        inputs_digest: (!lock.inputs_digest.is_empty()).then(|| hex::encode(&lock.inputs_digest)),
        projects: (!projects.is_empty()).then_some(projects),
    };
    Ok(toml::to_string(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
required = ["github.com/gen/tool"]
ignored = ["github.com/big/unused*"]

[[constraint]]
  name = "github.com/dep/one"
  version = "^1.2.0"

[[constraint]]
  name = "github.com/dep/two"
  branch = "master"
  source = "github.com/fork/two"

[[override]]
  name = "github.com/deep/three"
  revision = "0123456789abcdef0123456789abcdef01234567"

[prune]
  unused-packages = true
  nested-vendor = true
"#;

    #[test]
    fn manifest_round_trips() {
        let m = manifest_from_toml_str(MANIFEST).unwrap();
        assert_eq!(m.constraints.len(), 2);
        assert_eq!(m.overrides.len(), 1);
        assert!(m.prune.unused_packages && m.prune.nested_vendor);
        assert_eq!(
            m.effective_constraint(&ProjectRoot::new("github.com/dep/two"), true)
                .to_string(),
            "master"
        );

        let rendered = manifest_to_toml_string(&m).unwrap();
        let again = manifest_from_toml_str(&rendered).unwrap();
        assert_eq!(m, again);
    }

    #[test]
    fn manifest_rejects_conflicting_fields() {
        let err = manifest_from_toml_str(
            r#"
[[constraint]]
  name = "github.com/dep/one"
  version = "^1"
  branch = "master"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("at most one"));
    }

    #[test]
    fn lock_round_trips() {
        let mut lock = Lock::new();
        lock.inputs_digest = vec![0xde, 0xad, 0xbe, 0xef];
        lock.upsert_project(LockedProject {
            id: ProjectIdentifier::plain("github.com/dep/one"),
            version: Version::from_tag("v1.2.3").pair(Revision::new("aaaa")),
            packages: ["github.com/dep/one".to_string()].into(),
        });
        lock.upsert_project(LockedProject {
            id: ProjectIdentifier::with_source("github.com/dep/two", "github.com/fork/two"),
            version: Version::branch("master").pair(Revision::new("bbbb")),
            packages: ["github.com/dep/two/sub".to_string()].into(),
        });

        let rendered = lock_to_toml_string(&lock).unwrap();
        let again = lock_from_toml_str(&rendered).unwrap();
        assert_eq!(lock, again);
    }

    #[test]
    fn unpaired_lock_versions_refuse_to_serialize() {
        let mut lock = Lock::new();
        lock.upsert_project(LockedProject {
            id: ProjectIdentifier::plain("github.com/dep/one"),
            version: Version::from_tag("v1.2.3"),
            packages: BTreeSet::new(),
        });
        assert!(lock_to_toml_string(&lock).is_err());
    }
}
