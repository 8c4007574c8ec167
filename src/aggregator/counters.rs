//! Last-seen counter values.
//!
//! Trace viewers drop the final sample of a counter track, so the exporter
//! remembers the last event per `(domain, name)` and replays it one unit
//! later when the session ends.

use crate::parser::Event;
use std::collections::BTreeMap;

/// Last counter event per `(domain, name)`
#[derive(Debug, Default)]
pub struct CounterTable {
    last: BTreeMap<(String, String), Event>,
}

impl CounterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `event` as the latest value of its counter
    pub fn record(&mut self, event: &Event) {
        let key = (
            event.domain.clone(),
            event.name.clone().unwrap_or_default(),
        );
        self.last.insert(key, event.clone());
    }

    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }

    /// Drain the table into replay events, each shifted by one time unit
    ///
    /// **Public** - called once at session end
    pub fn take_replays(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.last)
            .into_values()
            .map(|mut event| {
                event.time += 1;
                event
            })
            .collect()
    }
}
