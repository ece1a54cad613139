//! exit codes for smart-sections commands
//!
//! these follow Unix conventions where 0 = success and non-zero = error
//! specific codes help scripts distinguish between failure types

/// command completed successfully
pub const SUCCESS: i32 = 0;

/// general or unknown error
pub const ERROR: i32 = 1;

/// section is hidden (only with `eval --exit-status`)
pub const HIDDEN: i32 = 2;

/// invalid command-line arguments or context values
pub const INVALID_ARGS: i32 = 4;

/// configuration file error
pub const CONFIG_ERROR: i32 = 5;

/// rule document unreadable, not a rule tree, or failing checks
pub const RULES_ERROR: i32 = 6;
