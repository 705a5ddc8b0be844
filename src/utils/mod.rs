pub mod lock;
pub mod path_validator;

pub use lock::{LivenessProbe, ProcessLock, ProcfsProbe};
pub use path_validator::PathValidator;
