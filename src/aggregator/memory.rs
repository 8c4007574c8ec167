//! Summary of per-event memory breakdowns.

use crate::parser::{ArgValue, MemoryBreakdown};
use std::collections::BTreeMap;

/// Summarize a breakdown into a nested args object
///
/// **Public** - used by the formatter when an event carries `memory`
///
/// Each non-empty size bucket maps to its total count, `TOTAL` is the sum
/// of size times count, and `CHILDREN` carries the children's total count.
pub fn summarize_memory(memory: &MemoryBreakdown) -> ArgValue {
    let mut breakdown = BTreeMap::new();
    let mut total: u64 = 0;

    for (size, counts) in &memory.buckets {
        let count: u64 = counts.iter().sum();
        total = total.saturating_add(size.saturating_mul(count));
        if count > 0 {
            breakdown.insert(size.to_string(), ArgValue::from(count));
        }
    }

    let children: u64 = memory.children.iter().sum();
    breakdown.insert("TOTAL".to_string(), ArgValue::from(total));
    breakdown.insert("CHILDREN".to_string(), ArgValue::from(children));

    ArgValue::Map(breakdown)
}
