//! High-level operations over solved projects: merging a freshly solved
//! subtree's metadata into a parent project, and folding overlay
//! configuration into a manifest before a solve.

pub use self::merge_metadata::{
    FailedToMergeMetadata, MergeConflict, ProjectMetadata, delete_from_root, merge_metadata,
};
pub use self::overlay::{Overlay, OverlayEntry, OverlayError};

pub mod merge_metadata;
pub mod overlay;
