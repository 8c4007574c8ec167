//! Clock correlation between the instrumentation and kernel trace clocks.
//!
//! This module handles:
//! - Computing the affine source -> output time mapping
//! - Extracting sync markers from kernel text traces

pub mod correlator;
pub mod ftrace;

// Re-export main types
pub use correlator::{ClockMapping, SyncPair};
pub use ftrace::extract_sync;
