mod checks_table;
mod metrics_table;
mod operations_table;

use std::collections::BTreeMap;

use tabled::settings::Style;
use tabled::Table;

use crate::metrics::MetricStore;
use crate::report::in_memory_reporter::checks_table::CheckRow;
use crate::report::in_memory_reporter::metrics_table::{MetricRow, ThresholdRow};
use crate::report::in_memory_reporter::operations_table::OperationRow;
use crate::report::ReportCollector;
use crate::threshold::ThresholdOutcome;
use crate::OperationRecord;

/// A very basic reporter that is useful while developing scenarios. It keeps all of the operations
/// in memory and prints a summary of the operations, checks, metrics and thresholds at the end of
/// the run.
#[derive(Default)]
pub struct InMemoryReporter {
    operation_records: Vec<OperationRecord>,
}

impl InMemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn operation_rows(&self) -> Vec<OperationRow> {
        let mut grouped: BTreeMap<&str, Vec<&OperationRecord>> = BTreeMap::new();
        for record in &self.operation_records {
            grouped
                .entry(record.operation_id())
                .or_default()
                .push(record);
        }

        grouped
            .into_iter()
            .map(|(operation_id, operations)| {
                let durations_ms = operations
                    .iter()
                    .filter_map(|record| record.duration())
                    .map(|d| d.as_micros() as f64 / 1000.0)
                    .collect::<Vec<_>>();
                let total_operations = operations.len();
                let total_duration_ms = durations_ms.iter().sum::<f64>();

                // Min and max only consider successful operations, errors are often fast.
                let ok_durations_ms = operations
                    .iter()
                    .filter(|record| !record.is_error())
                    .filter_map(|record| record.duration())
                    .map(|d| d.as_micros() as f64 / 1000.0)
                    .collect::<Vec<_>>();

                OperationRow {
                    operation_id: operation_id.to_string(),
                    avg_time_ms: total_duration_ms / total_operations as f64,
                    min_time_ms: ok_durations_ms.iter().copied().reduce(f64::min).unwrap_or(0.0),
                    max_time_ms: ok_durations_ms.iter().copied().reduce(f64::max).unwrap_or(0.0),
                    total_operations,
                    errors: operations.iter().filter(|record| record.is_error()).count(),
                    total_duration_ms,
                }
            })
            .collect()
    }

    fn print_summary_of_operations(&self) {
        println!("\nSummary of operations");
        let mut table = Table::new(self.operation_rows());
        table.with(Style::modern());
        println!("{table}");
    }

    fn print_checks(metrics: &MetricStore) {
        let rows = metrics
            .checks()
            .map(|(name, counts)| CheckRow {
                check: name.to_string(),
                passes: counts.passes,
                fails: counts.fails,
                pass_rate: counts.passes as f64 / (counts.passes + counts.fails).max(1) as f64,
            })
            .collect::<Vec<_>>();
        if rows.is_empty() {
            return;
        }

        println!("\nChecks");
        let mut table = Table::new(rows);
        table.with(Style::modern());
        println!("{table}");
    }

    fn print_metrics(metrics: &MetricStore) {
        println!("\nMetrics");
        let rows = metrics
            .iter()
            .map(|(name, sink)| MetricRow::new(name, sink))
            .collect::<Vec<_>>();
        let mut table = Table::new(rows);
        table.with(Style::modern());
        println!("{table}");
    }

    fn print_thresholds(thresholds: &[ThresholdOutcome]) {
        if thresholds.is_empty() {
            return;
        }

        println!("\nThresholds");
        let mut table = Table::new(thresholds.iter().map(ThresholdRow::from));
        table.with(Style::modern());
        println!("{table}");
    }
}

impl ReportCollector for InMemoryReporter {
    fn add_operation(&mut self, operation_record: &OperationRecord) {
        self.operation_records.push(operation_record.clone());
    }

    fn add_check(&mut self, _name: &str, _passed: bool) {
        // Check counts are read from the aggregated metrics when finalizing.
    }

    fn finalize(&self, metrics: &MetricStore, thresholds: &[ThresholdOutcome]) {
        self.print_summary_of_operations();
        Self::print_checks(metrics);
        Self::print_metrics(metrics);
        Self::print_thresholds(thresholds);
    }
}
