//! Trace export session.
//!
//! The trace-tree walker drives an exporter through [`TraceSink`], one
//! decoded record at a time. Each call completes fully before returning.

pub mod chrome;

pub use chrome::TraceExporter;

use crate::parser::{Event, EventType};
use crate::utils::error::ExportError;

/// Contract between the trace-tree walker and an exporter
pub trait TraceSink {
    /// Process-level metadata (`__process__` records)
    fn global_metadata(&mut self, event: &Event) -> Result<(), ExportError>;

    /// A finished record: a task begin/end pair, a counter, a marker, ...
    fn complete_task(
        &mut self,
        kind: EventType,
        begin: &Event,
        end: Option<&Event>,
    ) -> Result<(), ExportError>;

    /// A flow arrow between two events
    fn relation(
        &mut self,
        data: &Event,
        head: Option<&Event>,
        tail: Option<&Event>,
    ) -> Result<(), ExportError>;
}
