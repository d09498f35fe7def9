use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::metrics::MetricStore;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ThresholdParseError {
    #[error("threshold expression `{0}` has no comparison operator")]
    MissingOperator(String),
    #[error("unknown aggregation `{0}`, expected one of count, rate, avg, min, max, med, p(N)")]
    UnknownAggregation(String),
    #[error("invalid percentile `{0}`, expected a number between 0 and 100")]
    InvalidPercentile(String),
    #[error("invalid threshold value `{0}`")]
    InvalidValue(String),
}

/// How a metric is reduced to a single number before it is compared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    Count,
    Rate,
    Avg,
    Min,
    Max,
    Med,
    /// Percentile in the range `0..=100`.
    Percentile(f64),
}

impl FromStr for Aggregation {
    type Err = ThresholdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "count" => Ok(Aggregation::Count),
            "rate" => Ok(Aggregation::Rate),
            "avg" => Ok(Aggregation::Avg),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "med" => Ok(Aggregation::Med),
            _ => {
                let pct = s
                    .strip_prefix("p(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .ok_or_else(|| ThresholdParseError::UnknownAggregation(s.to_string()))?;

                match pct.trim().parse::<f64>() {
                    Ok(pct) if (0.0..=100.0).contains(&pct) => Ok(Aggregation::Percentile(pct)),
                    _ => Err(ThresholdParseError::InvalidPercentile(pct.to_string())),
                }
            }
        }
    }
}

impl Display for Aggregation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Aggregation::Count => write!(f, "count"),
            Aggregation::Rate => write!(f, "rate"),
            Aggregation::Avg => write!(f, "avg"),
            Aggregation::Min => write!(f, "min"),
            Aggregation::Max => write!(f, "max"),
            Aggregation::Med => write!(f, "med"),
            Aggregation::Percentile(pct) => write!(f, "p({pct})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    // Longest operators first so that `<=` is not read as `<`.
    const OPERATORS: [(&'static str, Comparison); 7] = [
        ("<=", Comparison::Le),
        (">=", Comparison::Ge),
        ("==", Comparison::Eq),
        ("!=", Comparison::Ne),
        ("<", Comparison::Lt),
        (">", Comparison::Gt),
        ("=", Comparison::Eq),
    ];

    pub fn holds(&self, observed: f64, bound: f64) -> bool {
        match self {
            Comparison::Lt => observed < bound,
            Comparison::Le => observed <= bound,
            Comparison::Gt => observed > bound,
            Comparison::Ge => observed >= bound,
            Comparison::Eq => observed == bound,
            Comparison::Ne => observed != bound,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
        }
    }
}

/// A pass/fail predicate over an aggregated metric, such as `p(95)<2000` or `rate<0.01`.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdExpr {
    pub aggregation: Aggregation,
    pub comparison: Comparison,
    pub bound: f64,
}

impl FromStr for ThresholdExpr {
    type Err = ThresholdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let split_at = s
            .find(&['<', '>', '=', '!'][..])
            .ok_or_else(|| ThresholdParseError::MissingOperator(s.to_string()))?;
        let (lhs, rest) = s.split_at(split_at);

        let (symbol, comparison) = Comparison::OPERATORS
            .iter()
            .find(|(symbol, _)| rest.starts_with(symbol))
            .ok_or_else(|| ThresholdParseError::MissingOperator(s.to_string()))?;

        let aggregation = lhs.parse::<Aggregation>()?;

        let value = rest[symbol.len()..].trim();
        let bound = value
            .parse::<f64>()
            .ok()
            .filter(|bound| bound.is_finite())
            .ok_or_else(|| ThresholdParseError::InvalidValue(value.to_string()))?;

        Ok(Self {
            aggregation,
            comparison: *comparison,
            bound,
        })
    }
}

impl Display for ThresholdExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.aggregation,
            self.comparison.symbol(),
            self.bound
        )
    }
}

/// A threshold expression bound to the metric it applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub metric: String,
    pub expression: ThresholdExpr,
}

impl Threshold {
    pub fn new(metric: impl Into<String>, expression: &str) -> Result<Self, ThresholdParseError> {
        Ok(Self {
            metric: metric.into(),
            expression: expression.parse()?,
        })
    }

    pub fn evaluate(&self, store: &MetricStore) -> ThresholdOutcome {
        let observed = store.aggregate(&self.metric, &self.expression.aggregation);
        if observed.is_none() {
            log::warn!(
                "Threshold {} on {} cannot be evaluated, the metric is missing or does not support {}",
                self.expression,
                self.metric,
                self.expression.aggregation
            );
        }

        ThresholdOutcome {
            metric: self.metric.clone(),
            expression: self.expression.to_string(),
            observed,
            passed: observed
                .map(|v| self.expression.comparison.holds(v, self.expression.bound))
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdOutcome {
    pub metric: String,
    pub expression: String,
    /// The aggregated value, or `None` if the threshold could not be evaluated.
    pub observed: Option<f64>,
    pub passed: bool,
}

pub fn evaluate_thresholds(store: &MetricStore, thresholds: &[Threshold]) -> Vec<ThresholdOutcome> {
    thresholds.iter().map(|t| t.evaluate(store)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{CHECKS, HTTP_REQ_DURATION, HTTP_REQ_FAILED};
    use crate::OperationRecord;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_rate_threshold() {
        let expr: ThresholdExpr = "rate<0.01".parse().unwrap();
        assert_eq!(
            ThresholdExpr {
                aggregation: Aggregation::Rate,
                comparison: Comparison::Lt,
                bound: 0.01,
            },
            expr
        );
    }

    #[test]
    fn parse_percentile_threshold_with_spaces() {
        let expr: ThresholdExpr = " p(95) < 2000 ".parse().unwrap();
        assert_eq!(Aggregation::Percentile(95.0), expr.aggregation);
        assert_eq!(Comparison::Lt, expr.comparison);
        assert_eq!(2000.0, expr.bound);

        let expr: ThresholdExpr = "p(99.9)<=150".parse().unwrap();
        assert_eq!(Aggregation::Percentile(99.9), expr.aggregation);
        assert_eq!(Comparison::Le, expr.comparison);
    }

    #[test]
    fn parse_all_operators() {
        let cases = [
            ("avg<1", Comparison::Lt),
            ("avg<=1", Comparison::Le),
            ("avg>1", Comparison::Gt),
            ("avg>=1", Comparison::Ge),
            ("avg==1", Comparison::Eq),
            ("avg=1", Comparison::Eq),
            ("avg!=1", Comparison::Ne),
        ];

        for (input, expected) in cases {
            assert_eq!(
                expected,
                input.parse::<ThresholdExpr>().unwrap().comparison,
                "{input}"
            );
        }
    }

    #[test]
    fn parse_errors() {
        assert_eq!(
            Err(ThresholdParseError::MissingOperator("rate 0.01".to_string())),
            "rate 0.01".parse::<ThresholdExpr>()
        );
        assert_eq!(
            Err(ThresholdParseError::UnknownAggregation("p95".to_string())),
            "p95<10".parse::<ThresholdExpr>()
        );
        assert_eq!(
            Err(ThresholdParseError::InvalidPercentile("101".to_string())),
            "p(101)<10".parse::<ThresholdExpr>()
        );
        assert_eq!(
            Err(ThresholdParseError::InvalidValue("fast".to_string())),
            "avg<fast".parse::<ThresholdExpr>()
        );
    }

    #[test]
    fn display_round_trips_canonical_form() {
        let expr: ThresholdExpr = "p(95) < 2000".parse().unwrap();
        assert_eq!("p(95)<2000", expr.to_string());
    }

    fn store_with_requests(failed: usize, ok: usize) -> MetricStore {
        let mut store = MetricStore::new();
        for _ in 0..failed {
            store.record_operation(&OperationRecord::new("http_post").finish(true));
        }
        for _ in 0..ok {
            store.record_operation(&OperationRecord::new("http_post").finish(false));
        }
        store
    }

    #[test]
    fn failure_rate_threshold() {
        let threshold = Threshold::new(HTTP_REQ_FAILED, "rate<0.01").unwrap();

        let outcome = threshold.evaluate(&store_with_requests(0, 200));
        assert!(outcome.passed);
        assert_eq!(Some(0.0), outcome.observed);

        let outcome = threshold.evaluate(&store_with_requests(2, 198));
        assert!(!outcome.passed);
        assert_eq!(Some(0.01), outcome.observed);
    }

    #[test]
    fn latency_threshold_passes_for_fast_requests() {
        let threshold = Threshold::new(HTTP_REQ_DURATION, "p(95)<2000").unwrap();
        let outcome = threshold.evaluate(&store_with_requests(0, 10));
        assert!(outcome.passed);
        assert_eq!("p(95)<2000", outcome.expression);
    }

    #[test]
    fn unsupported_aggregation_fails() {
        let outcome = Threshold::new(CHECKS, "p(95)<1")
            .unwrap()
            .evaluate(&MetricStore::new());
        assert!(!outcome.passed);
        assert_eq!(None, outcome.observed);

        let outcome = Threshold::new("unknown_metric", "count<1")
            .unwrap()
            .evaluate(&MetricStore::new());
        assert!(!outcome.passed);
    }

    #[test]
    fn evaluate_all_thresholds_in_order() {
        let thresholds = vec![
            Threshold::new(HTTP_REQ_FAILED, "rate<0.01").unwrap(),
            Threshold::new(CHECKS, "rate>0.99").unwrap(),
        ];
        let mut store = store_with_requests(0, 5);
        store.record_check("status is 200", true);

        let outcomes = evaluate_thresholds(&store, &thresholds);
        assert_eq!(2, outcomes.len());
        assert_eq!(HTTP_REQ_FAILED, outcomes[0].metric);
        assert!(outcomes.iter().all(|o| o.passed));
    }
}
