//! depsolve: a source-package dependency resolver and manifest/lock writer.
//!
//! Projects are identified by an import-path root, fetched from
//! version-controlled sources, and pinned at precise versions satisfying a
//! mixture of semver, branch, and revision constraints declared by a root
//! project and everything transitively reachable from it.
//!
//! The heart of the crate is [`core::resolver`]: a backtracking solver that,
//! given a root package tree, a manifest of constraints, an optional prior
//! lock, and a [`core::source::SourceBridge`], produces a [`core::Lock`]
//! pinning every reachable dependency, or a typed failure explaining why no
//! assignment exists, with override suggestions a caller can surface.

pub mod core;
pub mod ops;
pub mod sources;
pub mod util;

pub use crate::core::constraint::Constraint;
pub use crate::core::lock::{Lock, LockedProject};
pub use crate::core::manifest::{Manifest, ProjectProperties};
pub use crate::core::project::{Atom, ProjectIdentifier, ProjectRoot};
pub use crate::core::resolver::errors::{SolveError, SolveFailure};
pub use crate::core::resolver::{SolveParameters, resolve};
pub use crate::core::version::{Revision, Version};
pub use crate::util::errors::DepsolveResult;
