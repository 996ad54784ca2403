//! CLI command handlers.

pub mod config;
pub mod eval;
pub mod run;
