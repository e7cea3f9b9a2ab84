pub use self::analyzer::{Analyzer, AnalyzerInfo};
pub use self::constraint::Constraint;
pub use self::lock::{Lock, LockedProject};
pub use self::manifest::{Manifest, ProjectProperties};
pub use self::pkgtree::{Package, PackageOrErr, PackageTree};
pub use self::project::{Atom, AtomWithPackages, BimodalIdentifier, ProjectIdentifier, ProjectRoot};
pub use self::source::{BridgeError, SourceBridge};
pub use self::version::{Revision, Version};

pub mod analyzer;
pub mod constraint;
pub mod encode;
pub mod lock;
pub mod manifest;
pub mod pkgtree;
pub mod project;
pub mod resolver;
pub mod source;
pub mod version;
