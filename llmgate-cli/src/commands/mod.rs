//! CLI command implementations.

pub mod config;
pub mod providers;
pub mod secrets;
pub mod serve;
pub mod usage;
