//! Stable exit codes for sortie CLI commands.

/// Command succeeded or a task was selected.
pub const OK: i32 = 0;
/// Invalid manifest, strategy, config, or any other error.
pub const INVALID: i32 = 1;
/// `sortie select` found no available task.
pub const COMPLETE: i32 = 2;
/// `sortie select` found incomplete tasks, none of them available.
pub const STUCK: i32 = 3;
