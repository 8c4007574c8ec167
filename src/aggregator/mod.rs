//! Session-wide bookkeeping owned by the exporter.
//!
//! This module keeps:
//! - The deduplicated stack-frame table and sample list
//! - The last value of every counter, for replay at session end
//! - Memory breakdown summaries

pub mod counters;
pub mod memory;
pub mod stack_builder;

// Re-export main types and functions
pub use counters::CounterTable;
pub use memory::summarize_memory;
pub use stack_builder::{EmbeddedStacks, FrameId, Sample, StackFrameEntry, StackResolver, StackTable};
