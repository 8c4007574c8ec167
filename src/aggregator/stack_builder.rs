//! Deduplicated stack-frame table for sampled-stack attribution.
//!
//! Each frame is keyed by its instruction pointer and the id of its caller
//! chain, so two samples that share an identical outer call chain share
//! the same frame entries. The table is emitted as `stackFrames` and the
//! samples referencing it as `samples`.
//!
//! Example: stacks `main;parse;lex` and `main;parse;emit` produce four frame
//! entries, with `main` and `main;parse` shared.

use crate::parser::{Event, EventData, Frame};
use crate::parser::schema::serialize_number;
use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// Stable id of a frame entry
pub type FrameId = u64;

/// Resolves the call stack attached to an event
///
/// Frames are returned innermost first.
pub trait StackResolver {
    fn resolve(&self, event: &Event) -> Vec<Frame>;
}

/// Resolver for events whose payload already carries resolved frames
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedStacks;

impl StackResolver for EmbeddedStacks {
    fn resolve(&self, event: &Event) -> Vec<Frame> {
        match &event.data {
            Some(EventData::Stack(frames)) => frames.clone(),
            _ => Vec::new(),
        }
    }
}

/// One entry in the `stackFrames` table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackFrameEntry {
    /// Module basename
    pub category: String,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<FrameId>,
}

/// One entry in the `samples` list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tid: Option<i64>,

    #[serde(serialize_with = "serialize_number")]
    pub ts: f64,

    /// Leaf frame of the sampled stack
    pub sf: FrameId,

    pub name: String,
}

// `,\n"stackFrames": ` and `,\n"samples": ` plus the brackets of both values
const TRAILER_KEYS_LEN: u64 = 34;

/// Frame table plus the samples collected since the last drain
///
/// Frame ids are stable for the whole session. Each shard only carries the
/// frames reachable from its own samples, so the pending trailer size stays
/// proportional to what the shard references.
#[derive(Debug, Default)]
pub struct StackTable {
    index: HashMap<(u64, Option<FrameId>), FrameId>,
    frames: BTreeMap<FrameId, StackFrameEntry>,
    samples: Vec<Sample>,
    shard_frames: BTreeSet<FrameId>,
    pending: u64,
}

impl StackTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sampled stack
    ///
    /// **Public** - called by the exporter for task and counter records
    ///
    /// # Arguments
    /// * `tid` - Thread the sample belongs to
    /// * `ts` - Sample time, already in output units
    /// * `stack` - Frames, innermost first
    /// * `label` - Sample name
    ///
    /// # Returns
    /// Leaf frame id, or `None` for an empty stack
    pub fn add_sample(
        &mut self,
        tid: Option<i64>,
        ts: f64,
        stack: &[Frame],
        label: &str,
    ) -> Option<FrameId> {
        let mut parent: Option<FrameId> = None;

        // Outermost caller first
        for frame in stack.iter().rev() {
            let key = (frame.ptr, parent);
            let id = match self.index.get(&key) {
                Some(id) => *id,
                None => {
                    let id = self.frames.len() as FrameId;
                    self.frames.insert(
                        id,
                        StackFrameEntry {
                            category: module_basename(&frame.module),
                            name: frame.name.clone(),
                            parent,
                        },
                    );
                    self.index.insert(key, id);
                    id
                }
            };
            parent = Some(id);
        }

        let leaf = parent?;
        let sample = Sample {
            tid,
            ts,
            sf: leaf,
            name: label.to_string(),
        };
        self.pending += json_len(&sample) + 1;
        self.samples.push(sample);

        // Ancestors of a frame already in this shard are there too
        let mut current = Some(leaf);
        while let Some(id) = current {
            if !self.shard_frames.insert(id) {
                break;
            }
            let Some(entry) = self.frames.get(&id) else {
                break;
            };
            self.pending += json_len(&id.to_string()) + 1 + json_len(entry) + 1;
            current = entry.parent;
        }

        Some(leaf)
    }

    pub fn frames(&self) -> &BTreeMap<FrameId, StackFrameEntry> {
        &self.frames
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn has_samples(&self) -> bool {
        !self.samples.is_empty()
    }

    /// Serialized size of the trailer the current shard would be closed with
    pub fn pending_bytes(&self) -> u64 {
        if self.samples.is_empty() {
            0
        } else {
            TRAILER_KEYS_LEN + self.pending
        }
    }

    /// Hand over the current shard's samples and the frames they reach
    ///
    /// The session-wide table and its ids are kept.
    pub fn take_shard(&mut self) -> (BTreeMap<FrameId, StackFrameEntry>, Vec<Sample>) {
        let frames: BTreeMap<FrameId, StackFrameEntry> = std::mem::take(&mut self.shard_frames)
            .into_iter()
            .filter_map(|id| self.frames.get(&id).map(|entry| (id, entry.clone())))
            .collect();
        debug!(
            "Draining {} samples over {} of {} frames",
            self.samples.len(),
            frames.len(),
            self.frames.len()
        );
        self.pending = 0;
        (frames, std::mem::take(&mut self.samples))
    }
}

fn json_len<T: Serialize + ?Sized>(value: &T) -> u64 {
    serde_json::to_string(value).map_or(0, |text| text.len() as u64)
}

fn module_basename(module: &str) -> String {
    Path::new(module)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::EventType;

    fn frame(ptr: u64, name: &str) -> Frame {
        Frame {
            ptr,
            module: "/usr/lib/libapp.so".to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_add_sample_builds_chain() {
        let mut table = StackTable::new();
        // innermost first: lex <- parse <- main
        let stack = vec![frame(3, "lex"), frame(2, "parse"), frame(1, "main")];

        let leaf = table.add_sample(Some(7), 12.0, &stack, "work").unwrap();

        assert_eq!(table.frames().len(), 3);
        let main = &table.frames()[&0];
        assert_eq!(main.name, "main");
        assert_eq!(main.category, "libapp.so");
        assert_eq!(main.parent, None);
        assert_eq!(table.frames()[&leaf].name, "lex");
        assert_eq!(table.frames()[&leaf].parent, Some(1));
        assert_eq!(table.samples()[0].sf, leaf);
        assert_eq!(table.samples()[0].tid, Some(7));
    }

    #[test]
    fn test_identical_stack_is_deduplicated() {
        let mut table = StackTable::new();
        let stack = vec![frame(3, "lex"), frame(2, "parse"), frame(1, "main")];

        let first = table.add_sample(Some(1), 1.0, &stack, "a");
        let size = table.frames().len();
        let second = table.add_sample(Some(1), 2.0, &stack, "a");

        assert_eq!(first, second);
        assert_eq!(table.frames().len(), size);
        assert_eq!(table.samples().len(), 2);
    }

    #[test]
    fn test_shared_prefix_reuses_frames() {
        let mut table = StackTable::new();
        table.add_sample(None, 1.0, &[frame(3, "lex"), frame(2, "parse"), frame(1, "main")], "a");
        table.add_sample(None, 2.0, &[frame(4, "emit"), frame(2, "parse"), frame(1, "main")], "b");

        assert_eq!(table.frames().len(), 4);
    }

    #[test]
    fn test_same_pointer_under_different_parent() {
        let mut table = StackTable::new();
        let a = table.add_sample(None, 1.0, &[frame(9, "leaf"), frame(1, "main")], "a");
        let b = table.add_sample(None, 1.0, &[frame(9, "leaf"), frame(2, "other")], "b");

        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_stack_is_noop() {
        let mut table = StackTable::new();
        assert_eq!(table.add_sample(Some(1), 1.0, &[], "a"), None);
        assert!(!table.has_samples());
        assert!(table.frames().is_empty());
    }

    #[test]
    fn test_take_shard_keeps_session_frames() {
        let mut table = StackTable::new();
        table.add_sample(None, 1.0, &[frame(1, "main")], "a");

        let (frames, samples) = table.take_shard();

        assert_eq!(frames.len(), 1);
        assert_eq!(samples.len(), 1);
        assert!(!table.has_samples());
        assert_eq!(table.pending_bytes(), 0);
        assert_eq!(table.frames().len(), 1);
    }

    #[test]
    fn test_take_shard_only_reachable_frames() {
        let mut table = StackTable::new();
        table.add_sample(None, 1.0, &[frame(3, "lex"), frame(2, "parse"), frame(1, "main")], "a");
        table.take_shard();

        let leaf = table
            .add_sample(None, 2.0, &[frame(4, "emit"), frame(1, "main")], "b")
            .unwrap();
        let (frames, samples) = table.take_shard();

        // emit and main, but not parse or lex
        assert_eq!(frames.keys().copied().collect::<Vec<_>>(), vec![0, leaf]);
        assert_eq!(samples[0].sf, leaf);
        assert_eq!(frames[&leaf].parent, Some(0));
    }

    #[test]
    fn test_pending_bytes_covers_trailer() {
        let mut table = StackTable::new();
        assert_eq!(table.pending_bytes(), 0);

        table.add_sample(Some(1), 1.0, &[frame(2, "parse"), frame(1, "main")], "a");
        table.add_sample(Some(1), 2.0, &[frame(3, "lex"), frame(1, "main")], "b");
        let pending = table.pending_bytes();

        let (frames, samples) = table.take_shard();
        let written = serde_json::to_string(&frames).unwrap().len()
            + serde_json::to_string(&samples).unwrap().len()
            + ",\n\"stackFrames\": ".len()
            + ",\n\"samples\": ".len();
        assert!(pending as usize >= written);
        assert!(pending as usize <= written + 8);
    }

    #[test]
    fn test_embedded_resolver() {
        let event = Event::new("d", EventType::Task, 1, Some(1), 0)
            .with_data(EventData::Stack(vec![frame(1, "main")]));
        assert_eq!(EmbeddedStacks.resolve(&event).len(), 1);

        let bare = Event::new("d", EventType::Task, 1, Some(1), 0);
        assert!(EmbeddedStacks.resolve(&bare).is_empty());
    }
}
