//! Rendering of events into Chrome trace-event records.
//!
//! This module converts decoded instrumentation events into the records
//! that make up a shard's `traceEvents` array.

pub mod formatter;
pub mod record;

// Re-export main types
pub use formatter::{phase_for, process_metadata, synthesize_name, thread_names, EventFormatter};
pub use record::{render_time, Phase, RecordId, TraceRecord};
