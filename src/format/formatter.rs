//! Rendering of instrumentation events into trace records.
//!
//! The formatter is pure: it maps an event (or a begin/end pair) onto zero
//! or more [`TraceRecord`]s using the active clock mapping. Bookkeeping such
//! as counter replay and stack samples stays with the exporter.

use super::record::{render_time, Phase, RecordId, TraceRecord};
use crate::aggregator::summarize_memory;
use crate::clock::ClockMapping;
use crate::parser::{ArgValue, Event, EventData, EventType, MarkerScope};
use crate::utils::config::{ExportConfig, MEMORY_ARG_KEY, PROCESS_SENTINEL};
use crate::utils::error::FormatError;
use log::{debug, warn};
use std::collections::BTreeMap;

/// Output phase for an event type
///
/// **Public** - `frame_end` and `relation` have no phase of their own: the
/// former is consumed as the end half of `frame_begin`, the latter goes
/// through [`EventFormatter::relation`].
pub fn phase_for(kind: EventType) -> Result<Phase, FormatError> {
    match kind {
        EventType::Task | EventType::Overlapped => Ok(Phase::Complete),
        EventType::Counter => Ok(Phase::Counter),
        EventType::Marker => Ok(Phase::Instant),
        EventType::ObjectNew => Ok(Phase::ObjectNew),
        EventType::ObjectSnapshot => Ok(Phase::ObjectSnapshot),
        EventType::ObjectDelete => Ok(Phase::ObjectDelete),
        EventType::FrameBegin => Ok(Phase::AsyncBegin),
        EventType::FrameEnd | EventType::Relation => Err(FormatError::UnexpectedEventType(kind)),
    }
}

fn to_hex(value: u64) -> String {
    format!("0x{:x}", value)
}

/// Build the record name for an event
///
/// Markers use the raw name, object events the name or nothing, frames the
/// name or domain. Tasks, counters and overlapped events compose
/// `parent->name:func<pointer>:(id)`, dropping the trailing separator when
/// there is no id.
pub fn synthesize_name(kind: EventType, event: &Event) -> Result<String, FormatError> {
    let name = match kind {
        EventType::Marker => event.name.clone().unwrap_or_default(),
        EventType::ObjectNew | EventType::ObjectSnapshot | EventType::ObjectDelete => {
            event.name.clone().unwrap_or_default()
        }
        EventType::FrameBegin | EventType::FrameEnd => event
            .name
            .clone()
            .unwrap_or_else(|| event.domain.clone()),
        EventType::Task | EventType::Counter | EventType::Overlapped | EventType::Relation => {
            let mut name = String::new();
            if let Some(parent) = event.parent {
                name.push_str(&to_hex(parent));
                name.push_str("->");
            }
            if let Some(text) = &event.name {
                name.push_str(text);
                name.push(':');
            }
            if let Some(pointer) = event.pointer {
                name.push_str(&format!("func<{}>:", to_hex(pointer)));
            }
            match event.id {
                Some(id) if kind != EventType::Overlapped => {
                    name.push_str(&format!("({})", to_hex(id)));
                }
                _ => {
                    let trimmed = name.trim_end_matches(':').len();
                    name.truncate(trimmed);
                }
            }
            name
        }
    };

    if name.is_empty() && !kind.is_object() {
        return Err(FormatError::UnnamedEvent(kind));
    }
    Ok(name)
}

/// Renders events with a fixed clock mapping and config
#[derive(Debug, Clone)]
pub struct EventFormatter {
    mapping: ClockMapping,
    float_time: bool,
    min_dur: f64,
}

impl EventFormatter {
    pub fn new(mapping: ClockMapping, config: &ExportConfig) -> Self {
        Self {
            mapping,
            float_time: config.float_time,
            min_dur: config.min_dur,
        }
    }

    pub fn mapping(&self) -> &ClockMapping {
        &self.mapping
    }

    /// Source nanoseconds to a rendered output timestamp
    pub fn timestamp(&self, source_time: i64) -> f64 {
        render_time(self.mapping.convert(source_time), self.float_time)
    }

    /// Render one event, or a begin/end pair
    ///
    /// **Public** - main entry point for record rendering
    ///
    /// # Returns
    /// The rendered records; empty when the record is suppressed
    ///
    /// # Errors
    /// * `FormatError::UnexpectedEventType` - type has no phase
    /// * `FormatError::UnnamedEvent` - nothing to name a non-object event by
    pub fn format(
        &self,
        kind: EventType,
        begin: &Event,
        end: Option<&Event>,
    ) -> Result<Vec<TraceRecord>, FormatError> {
        let phase = phase_for(kind)?;
        let name = synthesize_name(kind, begin)?;

        if kind == EventType::FrameBegin {
            return Ok(self.format_frame(name, begin, end));
        }

        let mut record = TraceRecord::new(phase, begin.pid, begin.tid);
        record.ts = Some(self.timestamp(begin.time));
        record.cat = Some(begin.domain.clone());
        record.id = begin.id.map(RecordId::Event);

        if kind == EventType::Marker {
            let scope = match begin.data {
                Some(EventData::Scope(scope)) => scope,
                _ => MarkerScope::Unknown,
            };
            record.s = Some(scope.code());
        }

        if matches!(kind, EventType::Task | EventType::Overlapped) {
            let end_time = end.map_or(begin.time, |e| e.time);
            let dur = self.mapping.convert(end_time) - self.mapping.convert(begin.time);
            match self.duration(dur) {
                Some(dur) => record.dur = Some(dur),
                None => {
                    debug!("Dropping '{}': duration {} below minimum", name, dur);
                    return Ok(Vec::new());
                }
            }
        }

        record.args = merged_args(begin, end);
        if kind == EventType::Counter {
            if let Some(delta) = begin.delta {
                record.args.insert(name.clone(), ArgValue::Number(delta));
            }
        }
        if let Some(memory) = &begin.memory {
            record
                .args
                .insert(MEMORY_ARG_KEY.to_string(), summarize_memory(memory));
        }

        record.name = Some(name);
        Ok(vec![record])
    }

    /// Rendered duration, or `None` when the task must be dropped
    fn duration(&self, dur: f64) -> Option<f64> {
        if self.float_time {
            (dur >= 0.0).then(|| render_time(dur, true))
        } else if dur < self.min_dur || dur.trunc() <= 0.0 {
            None
        } else {
            Some(dur.trunc())
        }
    }

    /// Frames become an async begin/end pair grouped by thread
    fn format_frame(&self, name: String, begin: &Event, end: Option<&Event>) -> Vec<TraceRecord> {
        let end_time = end.map_or(begin.time, |e| e.time);
        let args = merged_args(begin, None);

        [(Phase::AsyncBegin, begin.time), (Phase::AsyncEnd, end_time)]
            .into_iter()
            .map(|(phase, time)| {
                let mut record = TraceRecord::new(phase, begin.pid, begin.tid);
                record.name = Some(name.clone());
                record.ts = Some(self.timestamp(time));
                record.cat = Some(begin.domain.clone());
                record.id = begin.tid.map(RecordId::Thread);
                record.args = args.clone();
                record
            })
            .collect()
    }

    /// Render a flow arrow between two events
    ///
    /// **Public** - both endpoints are required; they are ordered by time so
    /// the arrow never points backward.
    pub fn relation(&self, data: &Event, head: Option<&Event>, tail: Option<&Event>) -> Vec<TraceRecord> {
        let (Some(head), Some(tail)) = (head, tail) else {
            debug!("Skipping relation in '{}': missing endpoint", data.domain);
            return Vec::new();
        };

        let (first, second) = if tail.time < head.time {
            (tail, head)
        } else {
            (head, tail)
        };
        let label = data.name.clone().unwrap_or_else(|| "unknown".to_string());

        [(Phase::FlowStart, first), (Phase::FlowFinish, second)]
            .into_iter()
            .map(|(phase, endpoint)| {
                let mut record = TraceRecord::new(phase, endpoint.pid, endpoint.tid);
                record.name = Some("relation".to_string());
                record.ts = Some(self.timestamp(endpoint.time));
                record.cat = Some(data.domain.clone());
                record.id = data.parent.or(data.id).map(RecordId::Event);
                record.args.insert("name".to_string(), ArgValue::from(label.as_str()));
                record
            })
            .collect()
    }
}

/// Begin args overlaid by end args, plus the source location
fn merged_args(begin: &Event, end: Option<&Event>) -> BTreeMap<String, ArgValue> {
    let mut args = begin.args.clone();
    if let Some(end) = end {
        args.extend(end.args.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    if let (Some(file), Some(line)) = (&begin.file, begin.line) {
        args.insert("__file__".to_string(), ArgValue::from(file.as_str()));
        args.insert("__line__".to_string(), ArgValue::Number(line as f64));
    }
    args
}

/// `thread_name` records for every registry entry
///
/// Keys are `"pid,tid"`; malformed keys are skipped.
pub fn thread_names(threads: &BTreeMap<String, String>) -> Vec<TraceRecord> {
    threads
        .iter()
        .filter_map(|(key, name)| match parse_thread_key(key) {
            Some((pid, tid)) => Some(TraceRecord::metadata(
                "thread_name",
                pid,
                Some(tid),
                "name",
                ArgValue::String(format!("{}({})", name, tid)),
            )),
            None => {
                warn!("Ignoring malformed thread key '{}'", key);
                None
            }
        })
        .collect()
}

fn parse_thread_key(key: &str) -> Option<(i64, i64)> {
    let (pid, tid) = key.split_once(',')?;
    Some((pid.trim().parse().ok()?, tid.trim().parse().ok()?))
}

/// Process-level metadata carried by a `__process__` event
///
/// **Public** - emits the process name, sort index, and a `<main>` thread
/// name when the registry does not already name that thread.
pub fn process_metadata(event: &Event, threads: &BTreeMap<String, String>) -> Vec<TraceRecord> {
    if event.name.as_deref() != Some(PROCESS_SENTINEL) {
        return Vec::new();
    }

    let mut records = Vec::new();
    if let Some(label) = event.data.as_ref().and_then(EventData::as_label) {
        records.push(TraceRecord::metadata(
            "process_name",
            event.pid,
            event.tid,
            "name",
            ArgValue::from(label),
        ));
    }
    if let Some(delta) = event.delta {
        records.push(TraceRecord::metadata(
            "process_sort_index",
            event.pid,
            event.tid,
            "sort_index",
            ArgValue::Number(delta),
        ));
    }
    if let Some(tid) = event.tid.filter(|tid| *tid >= 0) {
        if !threads.contains_key(&format!("{},{}", event.pid, tid)) {
            records.push(TraceRecord::metadata(
                "thread_name",
                event.pid,
                Some(tid),
                "name",
                ArgValue::from("<main>"),
            ));
        }
    }
    records
}
