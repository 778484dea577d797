//! # Process metrics without a global registry.
//!
//! Collectors are plain values owned by whoever creates them (a task, the queue,
//! the metrics subscriber). They become visible only once handed to a
//! [`Registry`], and a registry accepts each fully-qualified name once.
//!
//! ## Contents
//! - [`Collector`] - anything that can render itself in text exposition format
//! - [`Counter`], [`Gauge`], [`Histogram`] - labelled metric families
//! - [`Registry`] - register-once set of collectors with [`Registry::render`]
//! - [`Opts`] - namespace/subsystem/name triple
//!
//! ## Rules
//! - Metric families carry a fixed list of label names; observations supply values in the same order.
//! - A family with no label names is used through the unlabelled shorthands (`inc`, `set`, `observe`).
//! - Registering the same name twice is an error ([`MetricsError::AlreadyRegistered`](crate::MetricsError)).

mod counter;
mod histogram;
mod registry;

pub use counter::{Counter, Gauge};
pub use histogram::{Histogram, linear_buckets};
pub use registry::Registry;

use std::fmt::Write as _;

/// Something that can be registered and rendered.
pub trait Collector: Send + Sync + 'static {
    /// Fully-qualified metric name, unique within a registry.
    fn name(&self) -> &str;

    /// Appends the text exposition of this collector to `out`.
    fn render(&self, out: &mut String);
}

/// Name parts of a metric family.
///
/// The fully-qualified name joins the non-empty parts with `_`.
#[derive(Clone, Debug, Default)]
pub struct Opts {
    pub namespace: String,
    pub subsystem: String,
    pub name: String,
    pub help: String,
}

impl Opts {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = subsystem.into();
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    /// Returns `namespace_subsystem_name`, skipping empty parts.
    pub fn fq_name(&self) -> String {
        [&self.namespace, &self.subsystem, &self.name]
            .into_iter()
            .filter(|p| !p.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// Resolved identity of a family: name, help and label names.
#[derive(Clone, Debug)]
pub(crate) struct Desc {
    pub(crate) name: String,
    pub(crate) help: String,
    pub(crate) labels: Vec<String>,
}

impl Desc {
    pub(crate) fn new(opts: Opts, labels: &[&str]) -> Self {
        Self {
            name: opts.fq_name(),
            help: opts.help,
            labels: labels.iter().map(|l| (*l).to_string()).collect(),
        }
    }

    /// Turns label values into the storage key, padding or truncating to the label arity.
    pub(crate) fn key(&self, values: &[&str]) -> Vec<String> {
        debug_assert_eq!(
            values.len(),
            self.labels.len(),
            "label arity mismatch for {}",
            self.name
        );
        let mut key: Vec<String> = values
            .iter()
            .take(self.labels.len())
            .map(|v| (*v).to_string())
            .collect();
        key.resize(self.labels.len(), String::new());
        key
    }

    pub(crate) fn write_header(&self, out: &mut String, kind: &str) {
        if !self.help.is_empty() {
            let _ = writeln!(out, "# HELP {} {}", self.name, self.help);
        }
        let _ = writeln!(out, "# TYPE {} {}", self.name, kind);
    }

    /// Writes `{a="x",b="y"}` (or nothing when there are no pairs).
    pub(crate) fn write_labels(&self, out: &mut String, values: &[String], extra: Option<(&str, &str)>) {
        let pairs = self
            .labels
            .iter()
            .map(String::as_str)
            .zip(values.iter().map(String::as_str))
            .chain(extra);

        let mut first = true;
        for (k, v) in pairs {
            out.push(if first { '{' } else { ',' });
            first = false;
            let _ = write!(out, "{k}=\"{}\"", escape(v));
        }
        if !first {
            out.push('}');
        }
    }
}

fn escape(v: &str) -> String {
    v.replace('\\', r"\\")
        .replace('"', "\\\"")
        .replace('\n', r"\n")
}
