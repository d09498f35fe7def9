use tabled::Tabled;

use crate::metrics::MetricSink;
use crate::threshold::ThresholdOutcome;

#[derive(Tabled)]
pub struct MetricRow {
    pub metric: String,
    pub values: String,
}

impl MetricRow {
    pub fn new(name: &str, sink: &MetricSink) -> Self {
        let values = match sink {
            MetricSink::Counter { value } => format!("count={value}"),
            MetricSink::Rate { trues, total } => {
                let rate = if *total == 0 {
                    0.0
                } else {
                    *trues as f64 / *total as f64
                };
                format!("rate={:.2}% ({trues} of {total})", rate * 100.0)
            }
            MetricSink::Trend(trend) => format!(
                "avg={:.2}ms min={:.2}ms med={:.2}ms max={:.2}ms p(90)={:.2}ms p(95)={:.2}ms",
                trend.avg(),
                trend.min(),
                trend.med(),
                trend.max(),
                trend.percentile(90.0),
                trend.percentile(95.0),
            ),
        };

        Self {
            metric: name.to_string(),
            values,
        }
    }
}

#[derive(Tabled)]
pub struct ThresholdRow {
    pub metric: String,
    pub threshold: String,
    pub observed: String,
    pub result: String,
}

impl From<&ThresholdOutcome> for ThresholdRow {
    fn from(outcome: &ThresholdOutcome) -> Self {
        Self {
            metric: outcome.metric.clone(),
            threshold: outcome.expression.clone(),
            observed: outcome
                .observed
                .map(|v| format!("{v:.4}"))
                .unwrap_or_else(|| "n/a".to_string()),
            result: if outcome.passed { "pass" } else { "FAIL" }.to_string(),
        }
    }
}
