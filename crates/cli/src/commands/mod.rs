//! CLI subcommand implementations

pub mod connectivity;
pub mod metric;
pub mod raw;
pub mod snapshot;
