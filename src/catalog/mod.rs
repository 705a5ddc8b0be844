pub mod branches;
pub mod modules;

pub use branches::{Branch, BranchName, BranchRegistry};
pub use modules::{Ceiling, CeilingOrigin, Module, ModuleCatalog, ResolvedCeiling};
