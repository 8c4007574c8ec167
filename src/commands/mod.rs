//! CLI command implementations.
//!
//! Each command is implemented in its own module.
//! Commands orchestrate the various library components to perform user tasks.

pub mod export;
pub mod models;
pub mod utils;

// Re-export main command functions
pub use export::{execute_export, validate_args, ExportSummary};
pub use models::ExportArgs;
pub use utils::{display_version, validate_shard_file};
