//! Input data model and trace-tree loading.
//!
//! This module handles:
//! - The decoded event model handed to the exporter
//! - Loading the JSON trace-tree document
//! - Walking its records into a `TraceSink`

pub mod schema;
pub mod tree;

// Re-export main types
pub use schema::{
    classify_number, ArgValue, Event, EventData, EventType, Frame, MarkerScope, MemoryBreakdown,
    NumberClass,
};
pub use tree::{load_tree, walk, TraceTree, TreeRecord};
