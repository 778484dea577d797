//! Bucketed distributions.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Collector, Desc, Opts};

/// Returns `count` bucket upper bounds: `start`, `start + width`, ...
///
/// ```
/// use probevisor::metrics::linear_buckets;
/// assert_eq!(linear_buckets(0.0, 2.0, 3), vec![0.0, 2.0, 4.0]);
/// ```
pub fn linear_buckets(start: f64, width: f64, count: usize) -> Vec<f64> {
    (0..count).map(|i| start + width * i as f64).collect()
}

#[derive(Debug, Clone)]
struct Series {
    /// Non-cumulative per-bucket counts; rendered cumulatively.
    counts: Vec<u64>,
    sum: f64,
    count: u64,
}

/// Distribution of observed values over fixed buckets, optionally split by labels.
#[derive(Debug)]
pub struct Histogram {
    desc: Desc,
    bounds: Vec<f64>,
    series: RwLock<BTreeMap<Vec<String>, Series>>,
}

impl Histogram {
    pub fn new(opts: Opts, buckets: Vec<f64>) -> Arc<Self> {
        Self::with_labels(opts, buckets, &[])
    }

    /// Creates a histogram family. Buckets are sorted and deduplicated.
    pub fn with_labels(opts: Opts, mut buckets: Vec<f64>, labels: &[&str]) -> Arc<Self> {
        buckets.retain(|b| b.is_finite());
        buckets.sort_by(f64::total_cmp);
        buckets.dedup();
        Arc::new(Self {
            desc: Desc::new(opts, labels),
            bounds: buckets,
            series: RwLock::new(BTreeMap::new()),
        })
    }

    pub fn observe(&self, v: f64) {
        self.observe_with(&[], v);
    }

    pub fn observe_with(&self, values: &[&str], v: f64) {
        let key = self.desc.key(values);
        let slot = self.bounds.iter().position(|b| v <= *b);

        let mut series = self.series.write();
        let s = series.entry(key).or_insert_with(|| Series {
            counts: vec![0; self.bounds.len()],
            sum: 0.0,
            count: 0,
        });
        if let Some(i) = slot {
            s.counts[i] += 1;
        }
        s.sum += v;
        s.count += 1;
    }

    /// Number of observations and their sum for one series.
    pub fn sample_count_with(&self, values: &[&str]) -> (u64, f64) {
        let key = self.desc.key(values);
        self.series
            .read()
            .get(&key)
            .map(|s| (s.count, s.sum))
            .unwrap_or((0, 0.0))
    }

    /// Total observations across every series.
    pub fn total_count(&self) -> u64 {
        self.series.read().values().map(|s| s.count).sum()
    }
}

impl Collector for Histogram {
    fn name(&self) -> &str {
        &self.desc.name
    }

    fn render(&self, out: &mut String) {
        self.desc.write_header(out, "histogram");
        let name = &self.desc.name;

        for (key, s) in self.series.read().iter() {
            let mut cumulative = 0;
            for (bound, n) in self.bounds.iter().zip(&s.counts) {
                cumulative += n;
                let le = bound.to_string();
                let _ = write!(out, "{name}_bucket");
                self.desc.write_labels(out, key, Some(("le", le.as_str())));
                let _ = writeln!(out, " {cumulative}");
            }
            let _ = write!(out, "{name}_bucket");
            self.desc.write_labels(out, key, Some(("le", "+Inf")));
            let _ = writeln!(out, " {}", s.count);

            let _ = write!(out, "{name}_sum");
            self.desc.write_labels(out, key, None);
            let _ = writeln!(out, " {}", s.sum);

            let _ = write!(out, "{name}_count");
            self.desc.write_labels(out, key, None);
            let _ = writeln!(out, " {}", s.count);
        }
    }
}
