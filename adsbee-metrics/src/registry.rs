//! In-memory gauge registry shared between the update path and scrapes.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

/// A single gauge cell holding the last value set.
///
/// The value is stored as the bit pattern of an `f64`, so reads and writes
/// are single atomic operations and never block a scrape.
#[derive(Debug, Default)]
pub struct Gauge {
    bits: AtomicU64,
}

impl Gauge {
    /// Overwrite the value.
    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Read the current value.
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// A named gauge with a fixed set of label names.
///
/// An unlabeled family holds exactly one cell, created with the family and
/// reading `0` until first set. A labeled family creates a cell per label
/// value tuple on first use; cells are never removed.
#[derive(Debug)]
pub struct GaugeFamily {
    name: String,
    help: String,
    label_names: Vec<String>,
    cells: RwLock<BTreeMap<Vec<String>, Arc<Gauge>>>,
}

impl GaugeFamily {
    fn new(name: &str, help: &str, label_names: &[&str]) -> Self {
        let mut cells = BTreeMap::new();
        if label_names.is_empty() {
            cells.insert(Vec::new(), Arc::new(Gauge::default()));
        }

        Self {
            name: name.to_string(),
            help: help.to_string(),
            label_names: label_names.iter().map(|l| l.to_string()).collect(),
            cells: RwLock::new(cells),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    /// Get or create the cell for a label value tuple.
    ///
    /// Returns `None` if the number of values does not match the family's
    /// label names.
    pub fn with_labels(&self, values: &[&str]) -> Option<Arc<Gauge>> {
        if values.len() != self.label_names.len() {
            return None;
        }
        let key: Vec<String> = values.iter().map(|v| v.to_string()).collect();

        // Fast path: check if it exists
        {
            let cells = self.cells.read();
            if let Some(gauge) = cells.get(&key) {
                return Some(gauge.clone());
            }
        }

        // Slow path: create it
        let mut cells = self.cells.write();
        Some(
            cells
                .entry(key)
                .or_insert_with(|| Arc::new(Gauge::default()))
                .clone(),
        )
    }

    /// Read a cell without creating it.
    pub fn get(&self, values: &[&str]) -> Option<f64> {
        let cells = self.cells.read();
        cells
            .iter()
            .find(|(key, _)| key.iter().map(String::as_str).eq(values.iter().copied()))
            .map(|(_, gauge)| gauge.get())
    }

    /// Number of cells (label combinations) in this family.
    pub fn len(&self) -> usize {
        self.cells.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy out every cell as `(label values, value)`, sorted by labels.
    pub fn samples(&self) -> Vec<(Vec<String>, f64)> {
        self.cells
            .read()
            .iter()
            .map(|(labels, gauge)| (labels.clone(), gauge.get()))
            .collect()
    }
}

/// Table of all gauge families, keyed by metric name.
///
/// Families and their cells only ever grow. Writers and scrapers may run
/// concurrently: each cell is read and written atomically, but a scrape is
/// not a consistent cut across cells.
#[derive(Debug, Default)]
pub struct MetricRegistry {
    families: RwLock<BTreeMap<String, Arc<GaugeFamily>>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an unlabeled gauge, or return the existing family.
    pub fn register_gauge(&self, name: &str, help: &str) -> Arc<GaugeFamily> {
        self.register_gauge_vec(name, help, &[])
    }

    /// Register a labeled gauge, or return the existing family.
    pub fn register_gauge_vec(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Arc<GaugeFamily> {
        // Fast path
        {
            let families = self.families.read();
            if let Some(family) = families.get(name) {
                return family.clone();
            }
        }

        // Slow path
        let mut families = self.families.write();
        families
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(GaugeFamily::new(name, help, label_names)))
            .clone()
    }

    /// Look up a family by name.
    pub fn family(&self, name: &str) -> Option<Arc<GaugeFamily>> {
        self.families.read().get(name).cloned()
    }

    /// Snapshot of all families, sorted by name.
    pub fn families(&self) -> Vec<Arc<GaugeFamily>> {
        self.families.read().values().cloned().collect()
    }

    /// Overwrite an unlabeled gauge, registering it if needed.
    pub fn set_absolute(&self, name: &str, value: f64) {
        self.set_labeled(name, &[], value);
    }

    /// Overwrite a labeled gauge cell, creating the cell if needed.
    ///
    /// A family that does not exist yet is registered with the given arity
    /// and no help text.
    pub fn set_labeled(&self, name: &str, label_values: &[&str], value: f64) {
        let family = match self.family(name) {
            Some(family) => family,
            None => {
                let label_names: Vec<String> =
                    (0..label_values.len()).map(|i| format!("label_{i}")).collect();
                let label_names: Vec<&str> = label_names.iter().map(String::as_str).collect();
                self.register_gauge_vec(name, "", &label_names)
            }
        };

        match family.with_labels(label_values) {
            Some(gauge) => gauge.set(value),
            None => warn!(
                metric = name,
                expected = family.label_names().len(),
                got = label_values.len(),
                "label arity mismatch; value dropped"
            ),
        }
    }

    /// Read a gauge cell, if it exists.
    pub fn get(&self, name: &str, label_values: &[&str]) -> Option<f64> {
        self.family(name)?.get(label_values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gauge_set_overwrites() {
        let gauge = Gauge::default();
        assert_eq!(gauge.get(), 0.0);

        gauge.set(42.5);
        gauge.set(7.0);
        assert_eq!(gauge.get(), 7.0);
    }

    #[test]
    fn unlabeled_gauge_exists_from_registration() {
        let registry = MetricRegistry::new();
        registry.register_gauge("frames", "Frames seen.");

        assert_eq!(registry.get("frames", &[]), Some(0.0));
    }

    #[test]
    fn labeled_cells_are_created_lazily() {
        let registry = MetricRegistry::new();
        let family = registry.register_gauge_vec("feed_mps", "Rate.", &["feed_uri"]);
        assert!(family.is_empty());

        registry.set_labeled("feed_mps", &["a"], 1.5);
        registry.set_labeled("feed_mps", &["b"], 2.0);

        assert_eq!(family.len(), 2);
        assert_eq!(registry.get("feed_mps", &["a"]), Some(1.5));
        assert_eq!(registry.get("feed_mps", &["c"]), None);
    }

    #[test]
    fn register_same_family_twice_returns_same_arc() {
        let registry = MetricRegistry::new();

        let f1 = registry.register_gauge_vec("usage", "Usage.", &["device", "core"]);
        let f2 = registry.register_gauge_vec("usage", "Ignored.", &["device", "core"]);

        assert!(Arc::ptr_eq(&f1, &f2));
        assert_eq!(f2.help(), "Usage.");
    }

    #[test]
    fn with_labels_returns_same_cell_on_second_call() {
        let registry = MetricRegistry::new();
        let family = registry.register_gauge_vec("usage", "Usage.", &["device", "core"]);

        let g1 = family.with_labels(&["pico", "core_0"]).unwrap();
        let g2 = family.with_labels(&["pico", "core_0"]).unwrap();
        assert!(Arc::ptr_eq(&g1, &g2));

        g1.set(3.0);
        assert_eq!(g2.get(), 3.0);
    }

    #[test]
    fn wrong_arity_is_dropped() {
        let registry = MetricRegistry::new();
        let family = registry.register_gauge_vec("usage", "Usage.", &["device", "core"]);

        registry.set_labeled("usage", &["pico"], 1.0);

        assert!(family.is_empty());
        assert!(family.with_labels(&["a", "b", "c"]).is_none());
    }

    #[test]
    fn set_on_unknown_name_registers_family() {
        let registry = MetricRegistry::new();

        registry.set_absolute("late", 9.0);
        registry.set_labeled("late_vec", &["x", "y"], 1.0);

        assert_eq!(registry.get("late", &[]), Some(9.0));
        assert_eq!(registry.get("late_vec", &["x", "y"]), Some(1.0));
        assert_eq!(registry.family("late_vec").unwrap().label_names().len(), 2);
    }

    #[test]
    fn families_sorted_by_name() {
        let registry = MetricRegistry::new();
        registry.register_gauge("b", "");
        registry.register_gauge("a", "");
        registry.register_gauge("c", "");

        let names: Vec<_> = registry.families().iter().map(|f| f.name().to_string()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn concurrent_writers_and_readers_are_thread_safe() {
        use std::thread;

        let registry = Arc::new(MetricRegistry::new());
        registry.register_gauge_vec("feed_mps", "Rate.", &["feed_uri"]);

        let mut handles = vec![];
        for t in 0..8 {
            let r = registry.clone();
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    let uri = format!("feed-{}", i % 10);
                    r.set_labeled("feed_mps", &[uri.as_str()], f64::from(t));
                    let _ = r.get("feed_mps", &[uri.as_str()]);
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(registry.family("feed_mps").unwrap().len(), 10);
    }
}
