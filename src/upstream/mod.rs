pub mod mirror;
pub mod version;

pub use mirror::GnomeMirror;
pub use version::{VersionCandidate, VersionComparator};
