//! Overlay configuration: per-checkout overrides folded into the manifest
//! before a solve.
//!
//! An overlay is a small document kept beside a project (not committed to
//! the dependency manifest itself) pinning specific packages to versions or
//! alternate sources. Callers may also append a set of well-known *basic*
//! overrides for standard ecosystem forks; a basic override colliding with
//! one the overlay already declares is a typed error rather than a silent
//! overwrite.

use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::core::constraint::Constraint;
use crate::core::manifest::{Manifest, ProjectProperties};
use crate::core::project::ProjectRoot;
use crate::util::errors::DepsolveResult;

pub const OVERLAY_FILE_NAME: &str = "overlay.toml";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverlayEntry {
    pub package: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Overlay {
    #[serde(default)]
    pub overrides: Vec<OverlayEntry>,
    #[serde(rename = "excludeDirs", default)]
    pub exclude_dirs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OverlayError {
    #[error("the overlay already pins a version for {package}; remove it to use the basic override")]
    ReferenceOverrideAlreadyExistsForBasic { package: String },
    #[error("the overlay already declares a source for {package}; remove it to use the basic override")]
    SourceOverrideAlreadyExistsForBasic { package: String },
}

impl Overlay {
    /// Reads the overlay document from a project directory. A missing file
    /// is not an error; a malformed one is.
    pub fn read_from_dir(dir: &Path) -> DepsolveResult<Option<Overlay>> {
        let path = dir.join(OVERLAY_FILE_NAME);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let overlay: Overlay = toml::from_str(&raw)
            .with_context(|| format!("invalid overlay at {}", path.display()))?;
        Ok(Some(overlay))
    }

    /// Appends well-known ecosystem overrides, refusing any that collide
    /// with what the overlay already declares.
    pub fn append_basic_overrides(&mut self, basics: &[OverlayEntry]) -> Result<(), OverlayError> {
        for basic in basics {
            match self.overrides.iter().find(|e| e.package == basic.package) {
                Some(existing) if existing.version.is_some() => {
                    return Err(OverlayError::ReferenceOverrideAlreadyExistsForBasic {
                        package: basic.package.clone(),
                    });
                }
                Some(_) => {
                    return Err(OverlayError::SourceOverrideAlreadyExistsForBasic {
                        package: basic.package.clone(),
                    });
                }
                None => self.overrides.push(basic.clone()),
            }
        }
        Ok(())
    }

    /// Folds the overlay's entries into the manifest's override table, where
    /// they apply transitively like any other override.
    pub fn fold_into(&self, manifest: &mut Manifest) {
        for entry in &self.overrides {
            let constraint = entry
                .version
                .as_deref()
                .map(Constraint::from_version_str)
                .unwrap_or(Constraint::Any);
            manifest.overrides.insert(
                ProjectRoot::new(entry.package.clone()),
                ProjectProperties {
                    constraint,
                    source: entry.source.clone(),
                },
            );
        }
    }
}
