//! Export command implementation.
//!
//! The export command:
//! 1. Loads the decoded trace tree
//! 2. Correlates clocks (from the tree or a kernel trace)
//! 3. Streams every record into rotating shards
//! 4. Bundles shards and side files into one archive

use super::models::ExportArgs;
use crate::exporter::TraceExporter;
use crate::output::bundle;
use crate::parser::{load_tree, walk};
use anyhow::{Context, Result};
use log::{debug, info};
use std::path::PathBuf;
use std::time::Instant;

/// What an export produced
#[derive(Debug, Clone)]
pub struct ExportSummary {
    /// Shards and side files, in creation order
    pub targets: Vec<PathBuf>,

    /// Final archive, unless bundling was disabled
    pub archive: Option<PathBuf>,

    /// Records delivered to the exporter
    pub records: usize,
}

/// Execute the export command
///
/// **Public** - main entry point called from main.rs
///
/// # Errors
/// * Trace tree cannot be read or parsed
/// * Kernel trace is unsupported or malformed
/// * Any record violates the formatter contract
/// * File write or archive errors
pub fn execute_export(args: ExportArgs) -> Result<ExportSummary> {
    let start_time = Instant::now();

    info!("Starting export of {}", args.input.display());

    info!("Step 1/3: Loading trace tree...");
    let tree = load_tree(&args.input).context("Failed to load trace tree")?;

    info!("Step 2/3: Exporting {} records...", tree.records.len());
    let mut exporter = match &args.kernel_trace {
        Some(trace) => TraceExporter::from_kernel_trace(
            args.config.clone(),
            &args.output,
            tree.threads.clone(),
            trace,
        )
        .with_context(|| format!("Failed to correlate with {}", trace.display()))?,
        None => TraceExporter::new(
            args.config.clone(),
            &args.output,
            tree.threads.clone(),
            &tree.sync_pairs(),
        )
        .context("Failed to start export")?,
    };

    debug!("Clock mapping: {:?}", exporter.mapping());

    let records = walk(&tree.records, &mut exporter).context("Failed to export records")?;
    let targets = exporter.finish().context("Failed to finish export")?;

    let archive = if args.bundle {
        info!("Step 3/3: Bundling {} files...", targets.len());
        Some(bundle(&targets, &args.output).context("Failed to bundle trace shards")?)
    } else {
        info!("Step 3/3: Skipping bundle (not requested)");
        None
    };

    let elapsed = start_time.elapsed();
    info!("Export completed in {:.2}s", elapsed.as_secs_f64());

    Ok(ExportSummary {
        targets,
        archive,
        records,
    })
}

/// Validate export arguments
///
/// **Public** - can be called before execute_export for early validation
pub fn validate_args(args: &ExportArgs) -> Result<()> {
    if args.input.as_os_str().is_empty() {
        anyhow::bail!("Input path cannot be empty");
    }

    if !args.input.exists() {
        anyhow::bail!("Input file does not exist: {}", args.input.display());
    }

    if args.output.as_os_str().is_empty() {
        anyhow::bail!("Output base cannot be empty");
    }

    if args.config.max_shard_size == 0 {
        anyhow::bail!("max_shard_size must be greater than 0");
    }

    if args.config.min_dur < 0.0 {
        anyhow::bail!("min_dur cannot be negative");
    }

    if let Some(trace) = &args.kernel_trace {
        if !trace.exists() {
            anyhow::bail!("Kernel trace does not exist: {}", trace.display());
        }
    }

    Ok(())
}
