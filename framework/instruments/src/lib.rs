mod metrics;
mod report;
mod threshold;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub use metrics::{
    CheckCounts, MetricKind, MetricSink, MetricStore, Trend, CHECKS, HTTP_OPERATION_PREFIX,
    HTTP_REQS, HTTP_REQ_DURATION, HTTP_REQ_FAILED, ITERATIONS, ITERATION_DURATION,
};
pub use report::{InMemoryReporter, ReportCollector, ReportConfig, Reporter};
pub use threshold::{
    evaluate_thresholds, Aggregation, Comparison, Threshold, ThresholdExpr, ThresholdOutcome,
    ThresholdParseError,
};

/// A single timed operation, such as one HTTP request.
///
/// Create the record just before starting the operation so that the start time is accurate,
/// then call [OperationRecord::finish] once the operation is done and hand it to a [Reporter].
#[derive(Debug, Clone)]
pub struct OperationRecord {
    operation_id: String,
    started: Instant,
    elapsed: Option<Duration>,
    is_error: bool,
    attr: BTreeMap<String, String>,
}

impl OperationRecord {
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            started: Instant::now(),
            elapsed: None,
            is_error: false,
            attr: BTreeMap::new(),
        }
    }

    pub fn add_attr(&mut self, key: impl Into<String>, value: impl ToString) {
        self.attr.insert(key.into(), value.to_string());
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.add_attr(key, value);
        self
    }

    /// Stop the clock and mark whether the operation failed.
    pub fn finish(mut self, is_error: bool) -> Self {
        self.elapsed = Some(self.started.elapsed());
        self.is_error = is_error;
        self
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// The measured duration, if the operation has finished.
    pub fn duration(&self) -> Option<Duration> {
        self.elapsed
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attr.get(key).map(String::as_str)
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attr.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_records_elapsed_and_error() {
        let record = OperationRecord::new("http_post").with_attr("status", 503);
        assert!(record.duration().is_none());

        std::thread::sleep(Duration::from_millis(5));
        let record = record.finish(true);

        assert!(record.duration().unwrap() >= Duration::from_millis(5));
        assert!(record.is_error());
        assert_eq!(Some("503"), record.attr("status"));
    }
}
