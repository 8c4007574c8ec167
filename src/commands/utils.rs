use crate::output::read_shard;
use anyhow::Result;
use std::path::PathBuf;

/// Validate a trace shard file
pub fn validate_shard_file(file_path: PathBuf) -> Result<()> {
    println!("Validating shard: {}", file_path.display());

    let shard = read_shard(&file_path)?;

    println!("✓ Valid trace shard");
    println!("  Events: {}", shard.trace_events.len());
    println!(
        "  Stack Frames: {}",
        shard.stack_frames.as_ref().map_or(0, |f| f.len())
    );
    println!("  Samples: {}", shard.samples.as_ref().map_or(0, |s| s.len()));

    Ok(())
}

/// Display version information
pub fn display_version() {
    println!("seatrace v{}", env!("CARGO_PKG_VERSION"));
    println!("Output format: Chrome trace-event JSON");
    println!();
    println!("Clock-correlated, size-bounded trace export for trace viewers.");
}
