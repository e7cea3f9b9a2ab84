//! Error plumbing shared across the crate.
//!
//! The resolver proper reports typed failures (see
//! [`crate::core::resolver::errors`]); everything above it (overlay loading,
//! metadata merging, cache maintenance) flows through [`anyhow`] the way the
//! rest of the codebase expects.

use std::fmt;

pub type DepsolveResult<T> = anyhow::Result<T>;

/// An error that carries no user-actionable context. These indicate bugs in
/// depsolve itself and are rendered with a bug-report plea at the top level.
#[derive(Debug)]
pub struct InternalError {
    inner: anyhow::Error,
}

impl InternalError {
    pub fn new(inner: anyhow::Error) -> InternalError {
        InternalError { inner }
    }
}

impl std::error::Error for InternalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

/// Wraps an error as internal, hiding it from user-facing summaries.
pub fn internal<S: fmt::Display>(error: S) -> anyhow::Error {
    InternalError::new(anyhow::format_err!("{}", error)).into()
}
