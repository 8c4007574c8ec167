//! Output record types for the Chrome trace-event format.
//!
//! A record is one element of the `traceEvents` array. Fields that do not
//! apply to a phase are left out of the rendered JSON.

use crate::parser::schema::{serialize_number, ArgValue};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Event phase, rendered as the single-character `ph` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    #[serde(rename = "X")]
    Complete,
    #[serde(rename = "C")]
    Counter,
    #[serde(rename = "i")]
    Instant,
    #[serde(rename = "N")]
    ObjectNew,
    #[serde(rename = "O")]
    ObjectSnapshot,
    #[serde(rename = "D")]
    ObjectDelete,
    #[serde(rename = "b")]
    AsyncBegin,
    #[serde(rename = "e")]
    AsyncEnd,
    #[serde(rename = "s")]
    FlowStart,
    #[serde(rename = "f")]
    FlowFinish,
    #[serde(rename = "M")]
    Metadata,
}

/// Record `id`: event and flow ids are unsigned, frame groups use the thread id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RecordId {
    Event(u64),
    Thread(i64),
}

/// One rendered trace event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceRecord {
    pub ph: Phase,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub pid: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tid: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_opt_number")]
    pub ts: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_opt_number")]
    pub dur: Option<f64>,

    /// Instant-event scope
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<&'static str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cat: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, ArgValue>,
}

impl TraceRecord {
    pub fn new(ph: Phase, pid: i64, tid: Option<i64>) -> Self {
        Self {
            ph,
            name: None,
            pid,
            tid,
            ts: None,
            dur: None,
            s: None,
            cat: None,
            id: None,
            args: BTreeMap::new(),
        }
    }

    /// `M` record naming a process or thread
    pub fn metadata(name: &str, pid: i64, tid: Option<i64>, key: &str, value: ArgValue) -> Self {
        let mut record = Self::new(Phase::Metadata, pid, tid);
        record.name = Some(name.to_string());
        record.args.insert(key.to_string(), value);
        record
    }
}

fn serialize_opt_number<S: Serializer>(v: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match v {
        Some(v) => serialize_number(v, serializer),
        None => serializer.serialize_none(),
    }
}

/// Round an output time for rendering
///
/// Integer mode truncates toward zero; fixed-point mode keeps three decimals.
pub fn render_time(t: f64, float_time: bool) -> f64 {
    if float_time {
        (t * 1000.0).round() / 1000.0
    } else {
        t.trunc()
    }
}
