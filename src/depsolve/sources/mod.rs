//! Source-side building blocks: import-path root deduction and the shared
//! result cache that backs [`crate::core::source::SourceBridge`]
//! implementations.

pub use self::cache::{DiskCache, MemoryCache, SourceCache, TieredCache};
pub use self::deduce::deduce_root_from_path;

pub mod cache;
pub mod deduce;
