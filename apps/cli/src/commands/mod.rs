//! Command implementations for the Glosa CLI.

pub mod ask;
pub mod cache;
pub mod serve;
pub mod setup_cache;
pub mod setup_rules;
