use std::time::Duration;

use load_tunnel_instruments::{MetricSink, MetricStore, ThresholdOutcome};
use load_tunnel_summary_model::{CheckSummary, MetricSummary, RunSummary, ThresholdSummary};

pub(crate) fn metric_summary(sink: &MetricSink) -> MetricSummary {
    match sink {
        MetricSink::Counter { value } => MetricSummary::Counter { count: *value },
        MetricSink::Rate { trues, total } => MetricSummary::Rate {
            rate: if *total == 0 {
                0.0
            } else {
                *trues as f64 / *total as f64
            },
            trues: *trues,
            total: *total,
        },
        MetricSink::Trend(trend) => MetricSummary::Trend {
            count: trend.count(),
            avg: trend.avg(),
            min: trend.min(),
            med: trend.med(),
            max: trend.max(),
            p90: trend.percentile(90.0),
            p95: trend.percentile(95.0),
        },
    }
}

/// Whole seconds for the summary, rounded up so a short schedule never reports 0.
pub(crate) fn planned_duration_s(planned: Duration) -> u64 {
    planned.as_secs() + u64::from(planned.subsec_nanos() > 0)
}

/// Copy the aggregated metrics, checks and threshold outcomes into the run summary.
pub(crate) fn fill_run_summary(
    summary: &mut RunSummary,
    metrics: &MetricStore,
    outcomes: &[ThresholdOutcome],
) {
    summary.metrics = metrics
        .iter()
        .map(|(name, sink)| (name.to_string(), metric_summary(sink)))
        .collect();

    summary.checks = metrics
        .checks()
        .map(|(name, counts)| {
            (
                name.to_string(),
                CheckSummary {
                    passes: counts.passes,
                    fails: counts.fails,
                },
            )
        })
        .collect();

    summary.thresholds = outcomes
        .iter()
        .map(|outcome| ThresholdSummary {
            metric: outcome.metric.clone(),
            expression: outcome.expression.clone(),
            observed: outcome.observed,
            passed: outcome.passed,
        })
        .collect();
}
