//! seatrace CLI
//!
//! Exports decoded instrumentation traces into Chrome trace-event shards,
//! correlated with an optional kernel trace and bundled into one archive.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

use seatrace_export::commands::{
    display_version, execute_export, validate_args, validate_shard_file, ExportArgs,
};
use seatrace_export::utils::config::ExportConfig;

/// seatrace - trace export for Chrome-compatible viewers
#[derive(Parser, Debug)]
#[command(name = "seatrace")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Export a decoded trace tree
    Export {
        /// Trace-tree JSON document
        #[arg(short, long)]
        input: PathBuf,

        /// Output base path (shards are <output>-<N>.json)
        #[arg(short, long, default_value = "trace")]
        output: PathBuf,

        /// Kernel text trace carrying clock sync markers
        #[arg(long)]
        ftrace: Option<PathBuf>,

        /// TOML file with export settings
        #[arg(long, env = "SEATRACE_CONFIG")]
        config: Option<PathBuf>,

        /// Rotate shards after this many bytes
        #[arg(long)]
        max_shard_size: Option<u64>,

        /// Drop tasks shorter than this (microseconds)
        #[arg(long)]
        min_dur: Option<f64>,

        /// Collapse consecutive duplicate records
        #[arg(long)]
        distinct: bool,

        /// Self-check every rendered record
        #[arg(long)]
        debug: bool,

        /// Render fixed-point timestamps
        #[arg(long)]
        float_time: bool,

        /// Leave shards unbundled
        #[arg(long)]
        no_zip: bool,
    },

    /// Validate a trace shard file
    Validate {
        /// Path to shard JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // Execute command
    match cli.command {
        Commands::Export {
            input,
            output,
            ftrace,
            config,
            max_shard_size,
            min_dur,
            distinct,
            debug,
            float_time,
            no_zip,
        } => {
            let mut export_config = match config {
                Some(path) => ExportConfig::load(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => ExportConfig::default(),
            };

            // Flags override the config file
            if let Some(bytes) = max_shard_size {
                export_config = export_config.with_max_shard_size(bytes);
            }
            if let Some(min_dur) = min_dur {
                export_config = export_config.with_min_dur(min_dur);
            }
            export_config.distinct |= distinct;
            export_config.debug |= debug;
            export_config.float_time |= float_time;

            let args = ExportArgs {
                input,
                output,
                kernel_trace: ftrace,
                config: export_config,
                bundle: !no_zip,
            };

            // Validate args first
            validate_args(&args)?;

            let summary = execute_export(args)?;

            for target in &summary.targets {
                println!("{}", target.display());
            }
            if let Some(archive) = &summary.archive {
                println!("✓ Archive written to: {}", archive.display());
            }
        }

        Commands::Validate { file } => {
            validate_shard_file(file)?;
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}
