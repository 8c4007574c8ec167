//! Chrome trace exporter: the session orchestrator.
//!
//! The exporter owns the active shard, the counter table and the stack
//! table for the whole session. Records are rendered by the formatter and
//! streamed into the current shard; once a write pushes the shard past the
//! configured size it is closed and the next one opened, so rotation only
//! ever happens between records.

use super::TraceSink;
use crate::aggregator::{CounterTable, EmbeddedStacks, StackResolver, StackTable};
use crate::clock::{extract_sync, ClockMapping, SyncPair};
use crate::format::{process_metadata, thread_names, EventFormatter, TraceRecord};
use crate::output::{shard_path, ShardWriter};
use crate::parser::{Event, EventType};
use crate::utils::config::{ExportConfig, CUT_AUX_SUFFIX};
use crate::utils::error::{ExportError, FormatError, OutputError};
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Identity of the last task, for duplicate suppression
type TaskKey = (EventType, Event, Option<Event>);

/// Streams events into size-bounded Chrome trace shards
pub struct TraceExporter {
    config: ExportConfig,
    output_base: PathBuf,
    threads: BTreeMap<String, String>,
    formatter: EventFormatter,
    resolver: Box<dyn StackResolver>,
    shard: Option<ShardWriter>,
    next_index: usize,
    targets: Vec<PathBuf>,
    counters: CounterTable,
    stacks: StackTable,
    last_task: Option<TaskKey>,
}

impl TraceExporter {
    /// Start a session and open the first shard
    ///
    /// **Public** - main entry point for exporting
    ///
    /// # Arguments
    /// * `config` - Export configuration
    /// * `output_base` - Shards are written as `<output_base>-<N>.json`
    /// * `threads` - `"pid,tid"` -> display name, written at the top of every shard
    /// * `sync` - Clock sync pairs; fewer than two keeps the default scale
    pub fn new(
        config: ExportConfig,
        output_base: impl Into<PathBuf>,
        threads: BTreeMap<String, String>,
        sync: &[SyncPair],
    ) -> Result<Self, ExportError> {
        Self::start(config, output_base.into(), threads, sync, Vec::new())
    }

    /// Start a session correlated against a kernel text trace
    ///
    /// The cut kernel trace is written next to the shards and registered as
    /// the first output target.
    pub fn from_kernel_trace(
        config: ExportConfig,
        output_base: impl Into<PathBuf>,
        threads: BTreeMap<String, String>,
        trace: &Path,
    ) -> Result<Self, ExportError> {
        let output_base = output_base.into();
        let mut cut_name = OsString::from(output_base.as_os_str());
        cut_name.push(CUT_AUX_SUFFIX);
        let cut_path = PathBuf::from(cut_name);

        let sync = extract_sync(trace, &cut_path)?;
        Self::start(config, output_base, threads, &sync, vec![cut_path])
    }

    fn start(
        config: ExportConfig,
        output_base: PathBuf,
        threads: BTreeMap<String, String>,
        sync: &[SyncPair],
        side_files: Vec<PathBuf>,
    ) -> Result<Self, ExportError> {
        let mapping = ClockMapping::compute(sync);
        let formatter = EventFormatter::new(mapping, &config);

        let mut exporter = Self {
            config,
            output_base,
            threads,
            formatter,
            resolver: Box::new(EmbeddedStacks),
            shard: None,
            next_index: 0,
            targets: side_files,
            counters: CounterTable::new(),
            stacks: StackTable::new(),
            last_task: None,
        };
        exporter.open_shard()?;
        Ok(exporter)
    }

    /// Replace the stack resolver used for task and counter samples
    pub fn with_resolver(mut self, resolver: impl StackResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn mapping(&self) -> &ClockMapping {
        self.formatter.mapping()
    }

    /// Files produced so far, side files first, then shards in creation order
    pub fn targets(&self) -> &[PathBuf] {
        &self.targets
    }

    fn open_shard(&mut self) -> Result<(), ExportError> {
        let index = self.next_index;
        let path = shard_path(&self.output_base, index);
        let mut shard = ShardWriter::open(&path, index)?;

        for record in thread_names(&self.threads) {
            shard.write_record(&serde_json::to_string(&record).map_err(FormatError::from)?)?;
        }

        self.targets.push(path);
        self.next_index += 1;
        self.shard = Some(shard);
        Ok(())
    }

    fn close_shard(&mut self) -> Result<(), ExportError> {
        if let Some(shard) = self.shard.take() {
            let (frames, samples) = self.stacks.take_shard();
            shard.close(&frames, &samples)?;
        }
        Ok(())
    }

    /// Write rendered records, then rotate if the shard grew too large
    fn emit(&mut self, records: Vec<TraceRecord>) -> Result<(), ExportError> {
        if records.is_empty() {
            return Ok(());
        }

        let shard = self.shard.as_mut().ok_or(OutputError::NoOpenShard)?;
        for record in &records {
            let text = serde_json::to_string(record).map_err(FormatError::from)?;
            if self.config.debug {
                if let Err(message) = check_record(&text) {
                    warn!("{}:\n{}", message, text);
                }
            }
            shard.write_record(&text)?;
        }

        // The stack trailer is written on close, so it counts against the limit
        let projected = shard.size() + self.stacks.pending_bytes();
        if projected > self.config.max_shard_size {
            debug!(
                "Shard {} reached {} bytes, rotating",
                shard.index(),
                projected
            );
            self.close_shard()?;
            self.open_shard()?;
        }
        Ok(())
    }

    /// Replay counters, close the last shard and hand back every target
    ///
    /// **Public** - ends the session
    pub fn finish(mut self) -> Result<Vec<PathBuf>, ExportError> {
        let replays = self.counters.take_replays();
        debug!("Replaying {} counters at end of trace", replays.len());
        for counter in &replays {
            self.complete_task(EventType::Counter, counter, Some(counter))?;
        }

        self.close_shard()?;
        info!(
            "Export finished: {} shards, {} files",
            self.next_index,
            self.targets.len()
        );
        Ok(std::mem::take(&mut self.targets))
    }
}

impl TraceSink for TraceExporter {
    fn global_metadata(&mut self, event: &Event) -> Result<(), ExportError> {
        let records = process_metadata(event, &self.threads);
        self.emit(records)
    }

    fn complete_task(
        &mut self,
        kind: EventType,
        begin: &Event,
        end: Option<&Event>,
    ) -> Result<(), ExportError> {
        if self.config.distinct {
            let key = (kind, begin.clone(), end.cloned());
            if self.last_task.as_ref() == Some(&key) {
                debug!("Skipping duplicate {} record", kind);
                return Ok(());
            }
            self.last_task = Some(key);
        }

        let records = self.formatter.format(kind, begin, end)?;
        if records.is_empty() {
            return Ok(());
        }

        if kind == EventType::Counter {
            self.counters.record(begin);
        }

        if matches!(kind, EventType::Task | EventType::Counter) && begin.data.is_some() {
            if let Some(name) = &begin.name {
                let stack = self.resolver.resolve(begin);
                let ts = self.formatter.timestamp(begin.time);
                self.stacks.add_sample(begin.tid, ts, &stack, name);
            }
        }

        self.emit(records)
    }

    fn relation(
        &mut self,
        data: &Event,
        head: Option<&Event>,
        tail: Option<&Event>,
    ) -> Result<(), ExportError> {
        let records = self.formatter.relation(data, head, tail);
        self.emit(records)
    }
}

impl Drop for TraceExporter {
    fn drop(&mut self) {
        if self.shard.is_some() {
            warn!("Export session dropped before finish, closing open shard");
            if let Err(e) = self.close_shard() {
                warn!("Failed to close shard: {}", e);
            }
        }
    }
}

/// Structural self-check of a rendered record
fn check_record(text: &str) -> Result<(), String> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| format!("Malformed record: {}", e))?;
    let object = value
        .as_object()
        .ok_or_else(|| "Record is not an object".to_string())?;
    for key in ["ph", "pid"] {
        if !object.contains_key(key) {
            return Err(format!("Record lacks '{}'", key));
        }
    }
    Ok(())
}
