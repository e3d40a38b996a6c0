use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::NS_PER_SEC;

/// One parsed benchmark measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    /// Benchmark name exactly as it appeared in the source, ie. `BenchmarkGolDirect-4-16`
    pub label: String,
    /// Worker or thread count, always >= 1
    pub threads: u32,
    pub time_seconds: f64,
    /// Caller supplied tag for the run this record belongs to, ie. `Direct`
    pub category: String,
}

impl BenchmarkRecord {
    pub fn new(label: impl Into<String>, threads: u32, time_ns: f64, category: &str) -> Self {
        Self {
            label: label.into(),
            threads,
            time_seconds: ns_to_seconds(time_ns),
            category: category.to_owned(),
        }
    }
}

pub fn ns_to_seconds(ns: f64) -> f64 {
    ns / NS_PER_SEC
}

/// Smallest and largest `time_seconds`, or `None` for an empty slice
pub fn time_bounds(records: &[BenchmarkRecord]) -> Option<(f64, f64)> {
    records.iter().map(|r| r.time_seconds).fold(None, |acc, t| {
        Some(match acc {
            Some((min, max)) => (f64::min(min, t), f64::max(max, t)),
            None => (t, t),
        })
    })
}

/// Every `(threads, category)` pair that occurs more than once, in first-seen order
pub fn duplicate_groups(records: &[BenchmarkRecord]) -> Vec<(u32, String)> {
    let mut counts: HashMap<(u32, &str), usize> = HashMap::new();
    let mut order = Vec::new();
    for record in records {
        let key = (record.threads, record.category.as_str());
        let count = counts.entry(key).or_default();
        *count += 1;
        if *count == 2 {
            order.push((record.threads, record.category.clone()));
        }
    }
    order
}
