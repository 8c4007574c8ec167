use crate::utils::config::ExportConfig;
use std::path::PathBuf;

/// Arguments for the export command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct ExportArgs {
    /// Decoded trace-tree document
    pub input: PathBuf,

    /// Output base; shards become `<output>-<N>.json`
    pub output: PathBuf,

    /// Kernel text trace to correlate against (optional)
    pub kernel_trace: Option<PathBuf>,

    /// Exporter configuration
    pub config: ExportConfig,

    /// Bundle everything into `<output>.zip`
    pub bundle: bool,
}

impl Default for ExportArgs {
    fn default() -> Self {
        Self {
            input: PathBuf::from("trace.json"),
            output: PathBuf::from("trace"),
            kernel_trace: None,
            config: ExportConfig::default(),
            bundle: true,
        }
    }
}
