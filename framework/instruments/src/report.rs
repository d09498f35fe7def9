mod in_memory_reporter;

use std::time::Duration;

use parking_lot::Mutex;

use crate::metrics::MetricStore;
use crate::threshold::ThresholdOutcome;
use crate::OperationRecord;

pub use in_memory_reporter::InMemoryReporter;

/// A destination for the records produced during a run.
///
/// Collectors receive every record as it is made and are finalized once, after the run, with
/// the aggregated metrics and the threshold outcomes.
pub trait ReportCollector: Send {
    fn add_operation(&mut self, operation_record: &OperationRecord);

    fn add_check(&mut self, name: &str, passed: bool);

    fn finalize(&self, metrics: &MetricStore, thresholds: &[ThresholdOutcome]);
}

/// Choose which collectors a [Reporter] should forward records to.
///
/// With nothing enabled the reporter still aggregates metrics, so thresholds can be evaluated,
/// but prints nothing.
#[derive(Default)]
pub struct ReportConfig {
    enable_in_memory: bool,
}

impl ReportConfig {
    pub fn enable_in_memory(mut self) -> Self {
        self.enable_in_memory = true;
        self
    }

    pub fn init(self) -> Reporter {
        let mut collectors: Vec<Box<dyn ReportCollector>> = Vec::new();
        if self.enable_in_memory {
            collectors.push(Box::new(InMemoryReporter::new()));
        }

        Reporter {
            metrics: Mutex::new(MetricStore::new()),
            collectors: Mutex::new(collectors),
        }
    }
}

/// Shared by every virtual user of a run to record what happened.
pub struct Reporter {
    metrics: Mutex<MetricStore>,
    collectors: Mutex<Vec<Box<dyn ReportCollector>>>,
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("collectors", &self.collectors.lock().len())
            .finish()
    }
}

impl Reporter {
    pub fn add_operation(&self, operation_record: &OperationRecord) {
        self.metrics.lock().record_operation(operation_record);
        for collector in self.collectors.lock().iter_mut() {
            collector.add_operation(operation_record);
        }
    }

    /// Record the outcome of a named check, returning the outcome so it can be used inline.
    pub fn add_check(&self, name: &str, passed: bool) -> bool {
        self.metrics.lock().record_check(name, passed);
        for collector in self.collectors.lock().iter_mut() {
            collector.add_check(name, passed);
        }
        passed
    }

    pub fn add_iteration(&self, elapsed: Duration) {
        self.metrics.lock().record_iteration(elapsed);
    }

    /// Run a closure against the aggregated metrics.
    pub fn with_metrics<T>(&self, f: impl FnOnce(&MetricStore) -> T) -> T {
        f(&self.metrics.lock())
    }

    pub fn metrics_snapshot(&self) -> MetricStore {
        self.metrics.lock().clone()
    }

    pub fn finalize(&self, thresholds: &[ThresholdOutcome]) {
        let metrics = self.metrics_snapshot();
        for collector in self.collectors.lock().iter() {
            collector.finalize(&metrics, thresholds);
        }
    }
}
