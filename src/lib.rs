//! seatrace export
//!
//! Converts decoded instrumentation traces into the Chrome trace-event
//! format, consumable by common trace viewers.
//!
//! The core pieces are:
//! - [`clock`]: correlation of the instrumentation clock with a kernel trace clock
//! - [`aggregator`]: stack-frame deduplication and counter bookkeeping
//! - [`format`]: rendering of single events into trace records
//! - [`exporter`]: the session orchestrator writing size-bounded shards
//! - [`output`]: shard files and the final compressed bundle
//!
//! ## Getting Started
//!
//! ```bash
//! seatrace export --input tree.json --output trace
//! ```

pub mod aggregator;
pub mod clock;
pub mod commands;
pub mod exporter;
pub mod format;
pub mod output;
pub mod parser;
pub mod utils;
