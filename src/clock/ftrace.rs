//! Sync marker extraction from a kernel text trace.
//!
//! The kernel trace is cut down to its comment header plus the lines around
//! the first sync markers, and written as an auxiliary side file that ends up
//! in the final bundle. The first marker is rewritten into the viewer's own
//! clock-sync line so both timelines line up when loaded together.

use super::correlator::SyncPair;
use crate::utils::config::{MAX_SYNC_LINES, SYNC_MARKER};
use crate::utils::error::ClockError;
use log::{debug, info};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Extract sync pairs from a kernel trace and write the cut side file
///
/// **Public** - main entry point for side-channel sync input
///
/// # Errors
/// * `ClockError::Unsupported` - ETW captures are not handled
/// * `ClockError::MalformedMarker` - a marker line lacks its timestamps
/// * `ClockError::IoError` - reading the trace or writing the cut file failed
pub fn extract_sync(
    trace_path: impl AsRef<Path>,
    cut_path: impl AsRef<Path>,
) -> Result<Vec<SyncPair>, ClockError> {
    let trace_path = trace_path.as_ref();
    let cut_path = cut_path.as_ref();

    if trace_path.extension().is_some_and(|ext| ext == "etl") {
        return Err(ClockError::Unsupported(format!(
            "ETW capture {}",
            trace_path.display()
        )));
    }

    info!("Loading kernel trace: {}", trace_path.display());

    let reader = BufReader::new(File::open(trace_path)?);
    let mut writer = BufWriter::new(File::create(cut_path)?);
    let mut pairs = Vec::new();
    let mut clock_sync_written = false;

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let out = if line.contains(SYNC_MARKER) {
            pairs.push(parse_marker(&line, number + 1)?);
            if clock_sync_written {
                continue;
            }
            clock_sync_written = true;
            clock_sync_line(&line)
        } else {
            line
        };

        if out.starts_with('#') || (!pairs.is_empty() && pairs.len() < MAX_SYNC_LINES) {
            writeln!(writer, "{}", out)?;
        }
    }

    writer.flush()?;
    debug!(
        "Found {} sync markers, cut trace written to {}",
        pairs.len(),
        cut_path.display()
    );

    Ok(pairs)
}

/// Parse `... <seconds>: <event>: <marker>: <nanoseconds>`
fn parse_marker(line: &str, number: usize) -> Result<SyncPair, ClockError> {
    let malformed = || ClockError::MalformedMarker {
        line: number,
        text: line.to_string(),
    };

    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 4 {
        return Err(malformed());
    }

    let target = parts[parts.len() - 4]
        .trim_end_matches(':')
        .parse::<f64>()
        .map_err(|_| malformed())?;
    let source = parts[parts.len() - 1]
        .parse::<i64>()
        .map_err(|_| malformed())?;

    Ok(SyncPair::new(target, source))
}

/// Rewrite a marker line into the viewer's clock-sync record
fn clock_sync_line(line: &str) -> String {
    let prefix = line.split(SYNC_MARKER).next().unwrap_or_default();
    let timestamp = line
        .rsplit(':')
        .nth(3)
        .and_then(|field| field.split_whitespace().last())
        .unwrap_or_default();
    format!("{}trace_event_clock_sync: parent_ts={}", prefix, timestamp)
}
