//! CLI subcommands.

pub mod common;
pub mod config;
pub mod layout;
pub mod probe;
pub mod simulate;
