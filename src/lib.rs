// library crate for smart-sections
// the binary in main.rs is a thin CLI over these modules

pub mod cli;
pub mod conditions;
pub mod config;
pub mod context;
pub mod logging;
