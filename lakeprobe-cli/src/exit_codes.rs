//! Process exit codes.
//!
//! Only setup failures exit non-zero. Dataset and query failures are
//! reported inline and the run still exits with [`SUCCESS`].

pub const SUCCESS: i32 = 0;

/// Anything not classified below (for example a closed stdout).
pub const GENERAL_ERROR: i32 = 1;

/// Invalid arguments. clap exits with this code on its own.
#[allow(dead_code)]
pub const USAGE_ERROR: i32 = 2;

/// Config file unreadable or invalid.
pub const CONFIG_ERROR: i32 = 3;

/// Object storage unreachable or unhealthy.
pub const STORAGE_ERROR: i32 = 4;

/// The query engine could not be brought up.
pub const ENGINE_ERROR: i32 = 5;
