//! Correlation of the instrumentation clock with the kernel trace clock.
//!
//! Each sync marker is observed on both clocks: the source (nanosecond)
//! timestamp is taken first and the kernel (seconds) timestamp trails it.
//! From a list of such pairs we derive an affine mapping:
//!
//! `output = (source - source_origin) * ratio + target_origin`
//!
//! The origin comes from the tightest pair of consecutive markers, the ratio
//! from the first and last markers.

use crate::utils::config::{DEFAULT_RATIO, SECONDS_TO_MICROS};
use log::{info, warn};

/// One correlation point observed on both clocks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncPair {
    /// Kernel trace clock, seconds
    pub target: f64,

    /// Instrumentation clock, nanoseconds
    pub source: i64,
}

impl SyncPair {
    pub fn new(target: f64, source: i64) -> Self {
        Self { target, source }
    }
}

/// Affine mapping from source nanoseconds to output microseconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockMapping {
    pub source_origin: i64,
    pub target_origin: f64,
    pub ratio: f64,

    /// Half the tightest marker spacing, in microseconds
    pub precision: Option<f64>,
}

impl Default for ClockMapping {
    fn default() -> Self {
        Self {
            source_origin: 0,
            target_origin: 0.0,
            ratio: DEFAULT_RATIO,
            precision: None,
        }
    }
}

impl ClockMapping {
    /// Compute the mapping from sync pairs in order of occurrence
    ///
    /// **Public** - main entry point for clock correlation
    ///
    /// Fewer than two pairs leaves the default nanoseconds-to-microseconds
    /// scale in effect.
    pub fn compute(pairs: &[SyncPair]) -> Self {
        if pairs.len() < 2 {
            info!(
                "Too few sync markers ({}), using default time scale",
                pairs.len()
            );
            return Self::default();
        }

        // Tightest consecutive pair; ties fall back to source spacing, then position
        let (anchor, d_target, d_source) = pairs
            .windows(2)
            .enumerate()
            .map(|(i, w)| (i, w[1].target - w[0].target, w[1].source - w[0].source))
            .min_by(|a, b| {
                a.1.total_cmp(&b.1)
                    .then(a.2.cmp(&b.2))
                    .then(a.0.cmp(&b.0))
            })
            .map(|(i, dt, ds)| (pairs[i], dt, ds))
            .unwrap_or((pairs[0], 0.0, 0));

        let source_origin = anchor.source + (d_source as f64 * 0.75) as i64;
        let target_origin = (anchor.target + d_target * 0.25) * SECONDS_TO_MICROS;
        let precision = d_target / 2.0 * SECONDS_TO_MICROS;

        info!("Timelines correlation precision is +- {:.6} us", precision);

        let (first, last) = (pairs[0], pairs[pairs.len() - 1]);
        let span_source = last.source - first.source;
        let ratio = if span_source > 0 {
            SECONDS_TO_MICROS * (last.target - first.target) / span_source as f64
        } else {
            warn!("Sync markers span no source time, keeping default ratio");
            DEFAULT_RATIO
        };

        Self {
            source_origin,
            target_origin,
            ratio,
            precision: Some(precision),
        }
    }

    /// Convert a source timestamp to output units
    pub fn convert(&self, source_time: i64) -> f64 {
        (source_time - self.source_origin) as f64 * self.ratio + self.target_origin
    }
}
