//! Process exit codes
//!
//! Each terminal outcome of a wait or upgrade gets its own code so scripts
//! can branch on it; 64 is borrowed from sysexits.h.

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Configuration error - the scenario failed to parse or validate
pub const CONFIG_ERROR: i32 = 2;

/// Timeout - the budget ran out while the entity was still pending
pub const TIMEOUT: i32 = 3;

/// Failure state - the entity reached a declared failure status
pub const FAILURE_STATE: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Cancelled - interrupted or deadline reached
pub const CANCELLED: i32 = 6;

/// Convergence exceeded - the upgrade gave up after its last minor pass
pub const CONVERGENCE_EXCEEDED: i32 = 7;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
