//! Input data model handed to the exporter by the trace-tree walker.
//!
//! Events arrive already decoded. Argument values are explicitly tagged
//! upstream; the formatter renders them but never coerces them.

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of instrumentation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Task,
    Counter,
    Marker,
    ObjectNew,
    ObjectSnapshot,
    ObjectDelete,
    FrameBegin,
    FrameEnd,
    Overlapped,
    Relation,
}

impl EventType {
    /// Name used as a prefix when composing record names
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Task => "task",
            EventType::Counter => "counter",
            EventType::Marker => "marker",
            EventType::ObjectNew => "object_new",
            EventType::ObjectSnapshot => "object_snapshot",
            EventType::ObjectDelete => "object_delete",
            EventType::FrameBegin => "frame_begin",
            EventType::FrameEnd => "frame_end",
            EventType::Overlapped => "overlapped",
            EventType::Relation => "relation",
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(
            self,
            EventType::ObjectNew | EventType::ObjectSnapshot | EventType::ObjectDelete
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scope of a marker, rendered as the instant-event `s` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerScope {
    #[default]
    Unknown,
    Global,
    TrackGroup,
    Track,
    Task,
    Marker,
}

impl MarkerScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerScope::Unknown => "unknown",
            MarkerScope::Global => "global",
            MarkerScope::TrackGroup => "track_group",
            MarkerScope::Track => "track",
            MarkerScope::Task => "task",
            MarkerScope::Marker => "marker",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            MarkerScope::Global => "g",
            MarkerScope::TrackGroup => "p",
            MarkerScope::Unknown | MarkerScope::Track | MarkerScope::Task | MarkerScope::Marker => {
                "t"
            }
        }
    }
}

/// One resolved stack frame, as delivered by the symbol resolver
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Frame {
    /// Instruction pointer
    pub ptr: u64,

    /// Full path of the module the pointer belongs to
    #[serde(default)]
    pub module: String,

    /// Symbol name
    #[serde(default, alias = "str")]
    pub name: String,
}

/// Payload attached to an event
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum EventData {
    /// Marker scope
    Scope(MarkerScope),

    /// Label, e.g. a process name on `__process__` records
    Label(String),

    /// Sampled call stack, innermost frame first
    Stack(Vec<Frame>),
}

impl EventData {
    /// The payload as plain text
    ///
    /// A label that happens to spell a scope name parses as [`EventData::Scope`];
    /// it is turned back into its text here.
    pub fn as_label(&self) -> Option<&str> {
        match self {
            EventData::Label(label) => Some(label),
            EventData::Scope(scope) => Some(scope.as_str()),
            EventData::Stack(_) => None,
        }
    }
}

/// Tagged argument value
///
/// Numbers render through [`classify_number`]: whole values lose their
/// decimal point and non-finite values become string sentinels.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Number(f64),
    String(String),
    Map(BTreeMap<String, ArgValue>),
}

impl From<f64> for ArgValue {
    fn from(v: f64) -> Self {
        ArgValue::Number(v)
    }
}

impl From<u64> for ArgValue {
    fn from(v: u64) -> Self {
        ArgValue::Number(v as f64)
    }
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        ArgValue::String(v.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(v: String) -> Self {
        ArgValue::String(v)
    }
}

impl Serialize for ArgValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ArgValue::Number(v) => classify_number(*v).serialize(serializer),
            ArgValue::String(s) => serializer.serialize_str(s),
            ArgValue::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}

/// Rendering class of a numeric value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberClass {
    /// Whole number, rendered without a decimal point
    Integer(i64),
    /// Finite fractional number
    Float(f64),
    /// Infinity or NaN, rendered as a string
    NonFinite(&'static str),
}

/// Classify a number for rendering
///
/// **Public** - shared by args, timestamps and durations
pub fn classify_number(v: f64) -> NumberClass {
    if v.is_nan() {
        NumberClass::NonFinite("NaN")
    } else if v.is_infinite() {
        NumberClass::NonFinite(if v > 0.0 { "inf" } else { "-inf" })
    } else if v.fract() == 0.0 && v.abs() < 9.2e18 {
        NumberClass::Integer(v as i64)
    } else {
        NumberClass::Float(v)
    }
}

impl Serialize for NumberClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            NumberClass::Integer(v) => serializer.serialize_i64(*v),
            NumberClass::Float(v) => serializer.serialize_f64(*v),
            NumberClass::NonFinite(s) => serializer.serialize_str(s),
        }
    }
}

/// `serialize_with` adapter for plain `f64` fields
pub fn serialize_number<S: Serializer>(v: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    classify_number(*v).serialize(serializer)
}

/// Allocation-size breakdown attached to an event
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MemoryBreakdown {
    /// Allocation size -> per-call-site counts
    #[serde(default)]
    pub buckets: BTreeMap<u64, Vec<u64>>,

    /// Counts attributed to children
    #[serde(default)]
    pub children: Vec<u64>,
}

/// One instrumentation record
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Event {
    /// Namespace, rendered as the record category
    pub domain: String,

    #[serde(rename = "type")]
    pub kind: EventType,

    pub pid: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tid: Option<i64>,

    /// Source-clock nanoseconds
    pub time: i64,

    #[serde(default, rename = "str", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    /// Function pointer, when the event was attributed to one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer: Option<u64>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, ArgValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryBreakdown>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<EventData>,

    /// Counter value, or process sort index on `__process__` records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Event {
    /// Minimal event; remaining fields start empty
    pub fn new(domain: impl Into<String>, kind: EventType, pid: i64, tid: Option<i64>, time: i64) -> Self {
        Self {
            domain: domain.into(),
            kind,
            pid,
            tid,
            time,
            name: None,
            parent: None,
            id: None,
            pointer: None,
            args: BTreeMap::new(),
            memory: None,
            data: None,
            delta: None,
            file: None,
            line: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_parent(mut self, parent: u64) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_pointer(mut self, pointer: u64) -> Self {
        self.pointer = Some(pointer);
        self
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    pub fn with_data(mut self, data: EventData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = Some(delta);
        self
    }

    pub fn with_memory(mut self, memory: MemoryBreakdown) -> Self {
        self.memory = Some(memory);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_number() {
        assert_eq!(classify_number(4.0), NumberClass::Integer(4));
        assert_eq!(classify_number(-3.0), NumberClass::Integer(-3));
        assert_eq!(classify_number(1.5), NumberClass::Float(1.5));
        assert_eq!(classify_number(f64::INFINITY), NumberClass::NonFinite("inf"));
        assert_eq!(classify_number(f64::NEG_INFINITY), NumberClass::NonFinite("-inf"));
        assert_eq!(classify_number(f64::NAN), NumberClass::NonFinite("NaN"));
    }

    #[test]
    fn test_arg_value_rendering() {
        let mut nested = BTreeMap::new();
        nested.insert("inner".to_string(), ArgValue::Number(2.0));
        let mut args = BTreeMap::new();
        args.insert("count".to_string(), ArgValue::Number(10.0));
        args.insert("ratio".to_string(), ArgValue::Number(0.25));
        args.insert("label".to_string(), ArgValue::from("a\"b"));
        args.insert("nested".to_string(), ArgValue::Map(nested));
        args.insert("overflow".to_string(), ArgValue::Number(f64::INFINITY));

        let text = serde_json::to_string(&args).unwrap();

        assert_eq!(
            text,
            r#"{"count":10,"label":"a\"b","nested":{"inner":2},"overflow":"inf","ratio":0.25}"#
        );
    }

    #[test]
    fn test_event_deserialization() {
        let raw = json!({
            "domain": "d",
            "type": "counter",
            "pid": 100,
            "tid": 1,
            "time": 1000,
            "str": "bytes",
            "delta": 42,
            "args": {"size": 16, "kind": "heap"}
        });

        let event: Event = serde_json::from_value(raw).unwrap();

        assert_eq!(event.kind, EventType::Counter);
        assert_eq!(event.name.as_deref(), Some("bytes"));
        assert_eq!(event.delta, Some(42.0));
        assert_eq!(event.args["size"], ArgValue::Number(16.0));
        assert_eq!(event.args["kind"], ArgValue::from("heap"));
    }

    #[test]
    fn test_scope_named_label_reads_back() {
        let data: EventData = serde_json::from_value(json!("task")).unwrap();
        assert_eq!(data.as_label(), Some("task"));

        let data: EventData = serde_json::from_value(json!("track_group")).unwrap();
        assert_eq!(data.as_label(), Some("track_group"));

        assert_eq!(EventData::Label("app".to_string()).as_label(), Some("app"));
        assert_eq!(EventData::Stack(Vec::new()).as_label(), None);
    }

    #[test]
    fn test_event_data_variants() {
        let label: EventData = serde_json::from_value(json!("proc")).unwrap();
        assert_eq!(label, EventData::Label("proc".to_string()));

        let scope: EventData = serde_json::from_value(json!("track_group")).unwrap();
        assert_eq!(scope, EventData::Scope(MarkerScope::TrackGroup));

        let stack: EventData =
            serde_json::from_value(json!([{"ptr": 16, "module": "/lib/a.so", "name": "f"}])).unwrap();
        assert!(matches!(stack, EventData::Stack(frames) if frames.len() == 1));
    }

    #[test]
    fn test_marker_scope_codes() {
        assert_eq!(MarkerScope::Global.code(), "g");
        assert_eq!(MarkerScope::TrackGroup.code(), "p");
        assert_eq!(MarkerScope::Task.code(), "t");
        assert_eq!(MarkerScope::default().code(), "t");
    }
}
