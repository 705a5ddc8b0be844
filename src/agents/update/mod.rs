// Update module - decides and applies upstream version updates
//
// - UpdateDecider: picks the release a package should move to
// - UpdateOrchestrator: runs each module through lock, checkout, decide, rewrite and build
// - RunSummary: per-module outcomes and errors of one run
pub mod decider;
pub mod orchestrator;
pub mod report;

pub use decider::{NoUpdateReason, UpdateDecision};
pub use orchestrator::{Collaborators, PlannedModule, RunOptions, UpdateOrchestrator};
pub use report::{ModuleStatus, RunSummary};
