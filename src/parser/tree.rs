//! JSON trace-tree document consumed by the CLI.
//!
//! The document is the already-decoded output of the instrumentation
//! reader: the thread registry, optional sync pairs, and the records in the
//! order the exporter should receive them.

use super::schema::{Event, EventType};
use crate::clock::SyncPair;
use crate::exporter::TraceSink;
use crate::utils::error::{ExportError, ParseError};
use log::debug;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// One record of the walk, keyed by its kind: `{"complete": {...}}`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeRecord {
    Complete {
        #[serde(rename = "type")]
        kind: EventType,
        begin: Event,
        #[serde(default)]
        end: Option<Event>,
    },
    Relation {
        data: Event,
        #[serde(default)]
        head: Option<Event>,
        #[serde(default)]
        tail: Option<Event>,
    },
    Metadata {
        event: Event,
    },
}

/// Decoded trace tree
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TraceTree {
    /// `"pid,tid"` -> display name
    #[serde(default)]
    pub threads: BTreeMap<String, String>,

    /// `(target seconds, source nanoseconds)` pairs
    #[serde(default)]
    pub sync: Vec<(f64, i64)>,

    #[serde(default)]
    pub records: Vec<TreeRecord>,
}

impl TraceTree {
    pub fn sync_pairs(&self) -> Vec<SyncPair> {
        self.sync
            .iter()
            .map(|(target, source)| SyncPair::new(*target, *source))
            .collect()
    }
}

/// Load a trace tree from a JSON file
///
/// # Errors
/// * `ParseError::IoError` - file cannot be read
/// * `ParseError::JsonError` - document does not match the schema
pub fn load_tree(path: impl AsRef<Path>) -> Result<TraceTree, ParseError> {
    let path = path.as_ref();
    debug!("Loading trace tree from: {}", path.display());

    let file = File::open(path)?;
    let tree: TraceTree = serde_json::from_reader(BufReader::new(file))?;

    debug!(
        "Trace tree: {} threads, {} sync pairs, {} records",
        tree.threads.len(),
        tree.sync.len(),
        tree.records.len()
    );
    Ok(tree)
}

/// Feed every record to `sink`, in order
///
/// # Returns
/// Number of records delivered
pub fn walk<S: TraceSink + ?Sized>(records: &[TreeRecord], sink: &mut S) -> Result<usize, ExportError> {
    for record in records {
        match record {
            TreeRecord::Complete { kind, begin, end } => {
                sink.complete_task(*kind, begin, end.as_ref())?
            }
            TreeRecord::Relation { data, head, tail } => {
                sink.relation(data, head.as_ref(), tail.as_ref())?
            }
            TreeRecord::Metadata { event } => sink.global_metadata(event)?,
        }
    }
    Ok(records.len())
}
