//! Streaming writer for one trace shard.
//!
//! A shard is written as an open `traceEvents` array, one record at a time,
//! and finalized on close with the stack-frame table and samples (when any
//! samples were collected). Byte size is tracked as records are written so
//! the exporter can rotate once the configured maximum is exceeded.

use super::validate_path;
use crate::aggregator::{FrameId, Sample, StackFrameEntry};
use crate::utils::error::OutputError;
use log::{debug, info};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const HEADER: &str = "{\n\"traceEvents\": [\n";
const SEPARATOR: &str = ",\n";

/// Path of shard `index` for an output base: `<base>-<index>.json`
pub fn shard_path(base: &Path, index: usize) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(format!("-{}.json", index));
    PathBuf::from(name)
}

/// An open shard accepting records
#[derive(Debug)]
pub struct ShardWriter {
    path: PathBuf,
    index: usize,
    writer: BufWriter<File>,
    bytes: u64,
    records: usize,
}

impl ShardWriter {
    /// Create the shard file and write the opening structure
    ///
    /// # Errors
    /// * `OutputError::InvalidPath` - path is empty, a directory, or its parent cannot be created
    /// * `OutputError::WriteFailed` - I/O error
    pub fn open(path: impl Into<PathBuf>, index: usize) -> Result<Self, OutputError> {
        let path = path.into();
        validate_path(&path)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating parent directories: {}", parent.display());
                std::fs::create_dir_all(parent).map_err(|e| {
                    OutputError::InvalidPath(format!(
                        "Cannot create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let file = File::create(&path)?;
        let mut shard = Self {
            path,
            index,
            writer: BufWriter::new(file),
            bytes: 0,
            records: 0,
        };
        shard.write_raw(HEADER)?;

        info!("Opened trace shard {}: {}", index, shard.path.display());
        Ok(shard)
    }

    fn write_raw(&mut self, text: &str) -> Result<(), OutputError> {
        self.writer.write_all(text.as_bytes())?;
        self.bytes += text.len() as u64;
        Ok(())
    }

    /// Append one rendered record to the array
    pub fn write_record(&mut self, text: &str) -> Result<(), OutputError> {
        if self.records > 0 {
            self.write_raw(SEPARATOR)?;
        }
        self.write_raw(text)?;
        self.records += 1;
        Ok(())
    }

    /// Bytes written so far
    pub fn size(&self) -> u64 {
        self.bytes
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn record_count(&self) -> usize {
        self.records
    }

    /// Close the array, write the trailer and release the file
    ///
    /// `stackFrames` and `samples` are only written when samples exist.
    pub fn close(
        mut self,
        frames: &BTreeMap<FrameId, StackFrameEntry>,
        samples: &[Sample],
    ) -> Result<PathBuf, OutputError> {
        self.write_raw("\n]")?;
        if !samples.is_empty() {
            let frames = serde_json::to_string(frames)?;
            let samples_text = serde_json::to_string(samples)?;
            self.write_raw(",\n\"stackFrames\": ")?;
            self.write_raw(&frames)?;
            self.write_raw(",\n\"samples\": ")?;
            self.write_raw(&samples_text)?;
        }
        self.write_raw("\n}\n")?;
        self.writer.flush()?;

        info!(
            "Closed trace shard {} ({} records, {} bytes, {} samples)",
            self.index,
            self.records,
            self.bytes,
            samples.len()
        );
        Ok(self.path)
    }
}

/// A finished shard, as read back from disk
#[derive(Debug, Clone, Deserialize)]
pub struct ShardDocument {
    #[serde(rename = "traceEvents")]
    pub trace_events: Vec<Value>,

    #[serde(rename = "stackFrames", default)]
    pub stack_frames: Option<BTreeMap<String, Value>>,

    #[serde(default)]
    pub samples: Option<Vec<Value>>,
}

/// Read a finished shard
///
/// **Public** - useful for validation and testing
pub fn read_shard(input_path: impl AsRef<Path>) -> Result<ShardDocument, OutputError> {
    let input_path = input_path.as_ref();

    debug!("Reading shard from: {}", input_path.display());

    let file = File::open(input_path)?;
    let shard: ShardDocument = serde_json::from_reader(std::io::BufReader::new(file))?;
    Ok(shard)
}
