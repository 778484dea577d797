//! Register-once collector set.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

use super::Collector;
use crate::error::MetricsError;

#[derive(Default)]
struct Inner {
    names: HashSet<String>,
    collectors: Vec<Arc<dyn Collector>>,
}

/// Explicit replacement for a process-global metrics registry.
///
/// Pass one `Arc<Registry>` to everything that registers collectors
/// (engine construction, queue, subscribers). Each fully-qualified name is
/// accepted once; a second registration returns
/// [`MetricsError::AlreadyRegistered`] and leaves the registry unchanged.
///
/// ## Example
/// ```rust
/// use probevisor::metrics::{Counter, Opts, Registry};
///
/// let reg = Registry::new();
/// let c = Counter::new(Opts::new("errors_count").namespace("gatewaymonitor"));
/// reg.register(c.clone()).unwrap();
/// assert!(reg.register(c).is_err());
/// ```
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one collector.
    pub fn register(&self, collector: Arc<dyn Collector>) -> Result<(), MetricsError> {
        let mut inner = self.inner.write();
        let name = collector.name().to_string();
        if !inner.names.insert(name.clone()) {
            return Err(MetricsError::AlreadyRegistered { name });
        }
        inner.collectors.push(collector);
        Ok(())
    }

    /// Registers every collector or none of them.
    pub fn register_all<I>(&self, collectors: I) -> Result<(), MetricsError>
    where
        I: IntoIterator<Item = Arc<dyn Collector>>,
    {
        let collectors: Vec<_> = collectors.into_iter().collect();
        let mut inner = self.inner.write();

        let mut batch = HashSet::with_capacity(collectors.len());
        for c in &collectors {
            let name = c.name();
            if inner.names.contains(name) || !batch.insert(name) {
                return Err(MetricsError::AlreadyRegistered {
                    name: name.to_string(),
                });
            }
        }
        for c in collectors {
            inner.names.insert(c.name().to_string());
            inner.collectors.push(c);
        }
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.inner.read().names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.inner.read().collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Renders every collector in registration order, text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for c in self.inner.read().collectors.iter() {
            c.render(&mut out);
        }
        out
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        let mut names: Vec<&str> = inner.names.iter().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Registry").field("collectors", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{Counter, Gauge, Opts};

    #[test]
    fn duplicate_name_is_rejected() {
        let reg = Registry::new();
        reg.register(Counter::new(Opts::new("a"))).unwrap();
        let err = reg.register(Gauge::new(Opts::new("a"))).unwrap_err();
        assert_eq!(err, MetricsError::AlreadyRegistered { name: "a".into() });
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn register_all_is_atomic() {
        let reg = Registry::new();
        reg.register(Counter::new(Opts::new("taken"))).unwrap();

        let batch: Vec<Arc<dyn Collector>> = vec![
            Counter::new(Opts::new("fresh")),
            Counter::new(Opts::new("taken")),
        ];
        assert!(reg.register_all(batch).is_err());
        assert!(!reg.is_registered("fresh"));
    }

    #[test]
    fn render_concatenates_in_registration_order() {
        let reg = Registry::new();
        reg.register(Counter::new(Opts::new("first"))).unwrap();
        reg.register(Counter::new(Opts::new("second"))).unwrap();
        let text = reg.render();
        let a = text.find("first 0").unwrap();
        let b = text.find("second 0").unwrap();
        assert!(a < b);
    }
}
