use std::collections::BTreeMap;
use std::time::Duration;

use crate::threshold::Aggregation;
use crate::OperationRecord;

/// Operations whose id starts with this prefix feed the built-in `http_*` metrics.
pub const HTTP_OPERATION_PREFIX: &str = "http_";

pub const HTTP_REQS: &str = "http_reqs";
pub const HTTP_REQ_DURATION: &str = "http_req_duration";
pub const HTTP_REQ_FAILED: &str = "http_req_failed";
pub const CHECKS: &str = "checks";
pub const ITERATIONS: &str = "iterations";
pub const ITERATION_DURATION: &str = "iteration_duration";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A cumulative count.
    Counter,
    /// The fraction of recorded values that were true.
    Rate,
    /// A distribution of values, in milliseconds for durations.
    Trend,
}

/// All values recorded for a trend metric.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trend {
    values: Vec<f64>,
}

impl Trend {
    pub fn add(&mut self, value: f64) {
        self.values.push(value);
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    pub fn min(&self) -> f64 {
        self.values.iter().copied().reduce(f64::min).unwrap_or(0.0)
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().reduce(f64::max).unwrap_or(0.0)
    }

    pub fn avg(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }

        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    pub fn med(&self) -> f64 {
        self.percentile(50.0)
    }

    /// Exact percentile, interpolating linearly between the two closest ranks.
    ///
    /// `pct` is in the range `0..=100`. An empty trend has a percentile of 0 and a trend with a
    /// single value returns that value for every percentile.
    pub fn percentile(&self, pct: f64) -> f64 {
        match self.values.len() {
            0 => 0.0,
            1 => self.values[0],
            n => {
                let mut sorted = self.values.clone();
                sorted.sort_by(f64::total_cmp);

                let rank = (pct / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
                let lower = sorted[rank.floor() as usize];
                let upper = sorted[rank.ceil() as usize];
                lower + (upper - lower) * rank.fract()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricSink {
    Counter { value: f64 },
    Rate { trues: u64, total: u64 },
    Trend(Trend),
}

impl MetricSink {
    pub fn new(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Counter => MetricSink::Counter { value: 0.0 },
            MetricKind::Rate => MetricSink::Rate { trues: 0, total: 0 },
            MetricKind::Trend => MetricSink::Trend(Trend::default()),
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            MetricSink::Counter { .. } => MetricKind::Counter,
            MetricSink::Rate { .. } => MetricKind::Rate,
            MetricSink::Trend(_) => MetricKind::Trend,
        }
    }

    /// Compute an aggregation over this sink.
    ///
    /// Returns `None` when the aggregation does not apply to the kind of metric, for example a
    /// percentile of a counter.
    pub fn aggregate(&self, aggregation: &Aggregation) -> Option<f64> {
        match (self, aggregation) {
            (MetricSink::Counter { value }, Aggregation::Count) => Some(*value),
            (MetricSink::Rate { trues, total }, Aggregation::Rate) => Some(if *total == 0 {
                0.0
            } else {
                *trues as f64 / *total as f64
            }),
            (MetricSink::Trend(trend), Aggregation::Avg) => Some(trend.avg()),
            (MetricSink::Trend(trend), Aggregation::Min) => Some(trend.min()),
            (MetricSink::Trend(trend), Aggregation::Max) => Some(trend.max()),
            (MetricSink::Trend(trend), Aggregation::Med) => Some(trend.med()),
            (MetricSink::Trend(trend), Aggregation::Percentile(pct)) => {
                Some(trend.percentile(*pct))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckCounts {
    pub passes: u64,
    pub fails: u64,
}

/// Aggregated metrics for a run.
///
/// The built-in metrics are always present so that thresholds on them can be evaluated even
/// when nothing was recorded.
#[derive(Debug, Clone)]
pub struct MetricStore {
    metrics: BTreeMap<String, MetricSink>,
    checks: BTreeMap<String, CheckCounts>,
}

impl Default for MetricStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricStore {
    pub fn new() -> Self {
        let metrics = [
            (HTTP_REQS, MetricKind::Counter),
            (HTTP_REQ_DURATION, MetricKind::Trend),
            (HTTP_REQ_FAILED, MetricKind::Rate),
            (CHECKS, MetricKind::Rate),
            (ITERATIONS, MetricKind::Counter),
            (ITERATION_DURATION, MetricKind::Trend),
        ]
        .into_iter()
        .map(|(name, kind)| (name.to_string(), MetricSink::new(kind)))
        .collect();

        Self {
            metrics,
            checks: BTreeMap::new(),
        }
    }

    pub fn record_operation(&mut self, record: &OperationRecord) {
        let Some(duration) = record.duration() else {
            log::warn!(
                "Ignoring unfinished operation record: {}",
                record.operation_id()
            );
            return;
        };
        let duration_ms = as_millis(duration);

        self.add_trend(record.operation_id(), duration_ms);

        if record.operation_id().starts_with(HTTP_OPERATION_PREFIX) {
            self.add_counter(HTTP_REQS, 1.0);
            self.add_trend(HTTP_REQ_DURATION, duration_ms);
            self.add_rate(HTTP_REQ_FAILED, record.is_error());
        }
    }

    pub fn record_check(&mut self, name: &str, passed: bool) {
        let counts = self.checks.entry(name.to_string()).or_default();
        if passed {
            counts.passes += 1;
        } else {
            counts.fails += 1;
        }

        self.add_rate(CHECKS, passed);
    }

    pub fn record_iteration(&mut self, elapsed: Duration) {
        self.add_counter(ITERATIONS, 1.0);
        self.add_trend(ITERATION_DURATION, as_millis(elapsed));
    }

    pub fn get(&self, name: &str) -> Option<&MetricSink> {
        self.metrics.get(name)
    }

    pub fn trend(&self, name: &str) -> Option<&Trend> {
        match self.metrics.get(name) {
            Some(MetricSink::Trend(trend)) => Some(trend),
            _ => None,
        }
    }

    pub fn check(&self, name: &str) -> Option<CheckCounts> {
        self.checks.get(name).copied()
    }

    pub fn checks(&self) -> impl Iterator<Item = (&str, &CheckCounts)> {
        self.checks.iter().map(|(name, counts)| (name.as_str(), counts))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricSink)> {
        self.metrics.iter().map(|(name, sink)| (name.as_str(), sink))
    }

    pub fn aggregate(&self, name: &str, aggregation: &Aggregation) -> Option<f64> {
        self.metrics.get(name)?.aggregate(aggregation)
    }

    fn sink(&mut self, name: &str, kind: MetricKind) -> Option<&mut MetricSink> {
        let sink = self
            .metrics
            .entry(name.to_string())
            .or_insert_with(|| MetricSink::new(kind));

        if sink.kind() == kind {
            Some(sink)
        } else {
            log::warn!(
                "Metric {} is a {:?}, cannot record a {:?} value",
                name,
                sink.kind(),
                kind
            );
            None
        }
    }

    fn add_counter(&mut self, name: &str, delta: f64) {
        if let Some(MetricSink::Counter { value }) = self.sink(name, MetricKind::Counter) {
            *value += delta;
        }
    }

    fn add_rate(&mut self, name: &str, value: bool) {
        if let Some(MetricSink::Rate { trues, total }) = self.sink(name, MetricKind::Rate) {
            *total += 1;
            if value {
                *trues += 1;
            }
        }
    }

    fn add_trend(&mut self, name: &str, value: f64) {
        if let Some(MetricSink::Trend(trend)) = self.sink(name, MetricKind::Trend) {
            trend.add(value);
        }
    }
}

fn as_millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
