//! Monotonic counters and settable gauges.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Collector, Desc, Opts};

/// Monotonically increasing count, optionally split by labels.
#[derive(Debug)]
pub struct Counter {
    desc: Desc,
    values: RwLock<BTreeMap<Vec<String>, u64>>,
}

impl Counter {
    /// Creates an unlabelled counter.
    pub fn new(opts: Opts) -> Arc<Self> {
        Self::with_labels(opts, &[])
    }

    /// Creates a counter family with the given label names.
    pub fn with_labels(opts: Opts, labels: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            desc: Desc::new(opts, labels),
            values: RwLock::new(BTreeMap::new()),
        })
    }

    pub fn inc(&self) {
        self.inc_by(&[], 1);
    }

    pub fn inc_with(&self, values: &[&str]) {
        self.inc_by(values, 1);
    }

    pub fn inc_by(&self, values: &[&str], n: u64) {
        let key = self.desc.key(values);
        *self.values.write().entry(key).or_insert(0) += n;
    }

    /// Current value of the unlabelled series.
    pub fn get(&self) -> u64 {
        self.get_with(&[])
    }

    pub fn get_with(&self, values: &[&str]) -> u64 {
        let key = self.desc.key(values);
        self.values.read().get(&key).copied().unwrap_or(0)
    }
}

impl Collector for Counter {
    fn name(&self) -> &str {
        &self.desc.name
    }

    fn render(&self, out: &mut String) {
        self.desc.write_header(out, "counter");
        let values = self.values.read();
        if values.is_empty() && self.desc.labels.is_empty() {
            let _ = writeln!(out, "{} 0", self.desc.name);
        }
        for (key, v) in values.iter() {
            out.push_str(&self.desc.name);
            self.desc.write_labels(out, key, None);
            let _ = writeln!(out, " {v}");
        }
    }
}

/// Value that may go up and down.
#[derive(Debug)]
pub struct Gauge {
    desc: Desc,
    values: RwLock<BTreeMap<Vec<String>, f64>>,
}

impl Gauge {
    pub fn new(opts: Opts) -> Arc<Self> {
        Self::with_labels(opts, &[])
    }

    pub fn with_labels(opts: Opts, labels: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            desc: Desc::new(opts, labels),
            values: RwLock::new(BTreeMap::new()),
        })
    }

    pub fn set(&self, v: f64) {
        self.set_with(&[], v);
    }

    pub fn set_with(&self, values: &[&str], v: f64) {
        let key = self.desc.key(values);
        self.values.write().insert(key, v);
    }

    pub fn add(&self, delta: f64) {
        self.add_with(&[], delta);
    }

    pub fn add_with(&self, values: &[&str], delta: f64) {
        let key = self.desc.key(values);
        *self.values.write().entry(key).or_insert(0.0) += delta;
    }

    pub fn get(&self) -> f64 {
        self.get_with(&[])
    }

    pub fn get_with(&self, values: &[&str]) -> f64 {
        let key = self.desc.key(values);
        self.values.read().get(&key).copied().unwrap_or(0.0)
    }
}

impl Collector for Gauge {
    fn name(&self) -> &str {
        &self.desc.name
    }

    fn render(&self, out: &mut String) {
        self.desc.write_header(out, "gauge");
        let values = self.values.read();
        if values.is_empty() && self.desc.labels.is_empty() {
            let _ = writeln!(out, "{} 0", self.desc.name);
        }
        for (key, v) in values.iter() {
            out.push_str(&self.desc.name);
            self.desc.write_labels(out, key, None);
            let _ = writeln!(out, " {v}");
        }
    }
}
