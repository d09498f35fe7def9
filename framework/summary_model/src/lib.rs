use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};

/// Summary of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// The unique run id
    ///
    /// Chosen by the runner unless one is passed on the command line.
    pub run_id: String,
    /// The name of the scenario that was run
    pub scenario_name: String,
    /// The time the run started
    ///
    /// This is a Unix timestamp in seconds.
    pub started_at: i64,
    /// The planned duration of the run, in seconds
    ///
    /// This is the total duration of the stage schedule. Soak runs have no planned duration.
    pub planned_duration_s: Option<u64>,
    /// The highest number of concurrent virtual users the schedule asks for
    pub peak_agents: usize,
    /// The number of virtual users that were still healthy at the end of the run
    ///
    /// Virtual users that bail or fail their setup are not counted.
    pub agents_end_count: usize,
    /// The number of virtual-user slots assigned to each behaviour
    pub assigned_behaviours: BTreeMap<String, usize>,
    /// Environment variables that configured the run
    ///
    /// Only the variables the scenario chooses to record are captured.
    pub env: BTreeMap<String, String>,
    /// Aggregated metrics, keyed by metric name
    pub metrics: BTreeMap<String, MetricSummary>,
    /// Pass and fail counts per named check
    pub checks: BTreeMap<String, CheckSummary>,
    /// Threshold outcomes, in declaration order
    pub thresholds: Vec<ThresholdSummary>,
    /// The version of Load Tunnel that produced this summary
    pub load_tunnel_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricSummary {
    Counter {
        count: f64,
    },
    Rate {
        rate: f64,
        trues: u64,
        total: u64,
    },
    /// Durations in milliseconds.
    Trend {
        count: usize,
        avg: f64,
        min: f64,
        med: f64,
        max: f64,
        p90: f64,
        p95: f64,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckSummary {
    pub passes: u64,
    pub fails: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdSummary {
    pub metric: String,
    pub expression: String,
    pub observed: Option<f64>,
    pub passed: bool,
}

impl RunSummary {
    /// Create a new run summary with no results recorded yet
    pub fn new(
        run_id: String,
        scenario_name: String,
        started_at: i64,
        planned_duration_s: Option<u64>,
        peak_agents: usize,
        assigned_behaviours: BTreeMap<String, usize>,
        load_tunnel_version: String,
    ) -> Self {
        Self {
            run_id,
            scenario_name,
            started_at,
            planned_duration_s,
            peak_agents,
            agents_end_count: 0,
            assigned_behaviours,
            env: BTreeMap::new(),
            metrics: BTreeMap::new(),
            checks: BTreeMap::new(),
            thresholds: Vec::new(),
            load_tunnel_version,
        }
    }

    pub fn set_agents_end_count(&mut self, agents_end_count: usize) {
        self.agents_end_count = agents_end_count;
    }

    pub fn add_env(&mut self, key: String, value: String) {
        self.env.insert(key, value);
    }

    /// True when every threshold passed. A run without thresholds passes.
    pub fn passed(&self) -> bool {
        self.thresholds.iter().all(|t| t.passed)
    }

    pub fn failed_thresholds(&self) -> impl Iterator<Item = &ThresholdSummary> {
        self.thresholds.iter().filter(|t| !t.passed)
    }

    pub fn check(&self, name: &str) -> Option<CheckSummary> {
        self.checks.get(name).copied()
    }

    /// The count of a counter metric, if present
    pub fn counter(&self, name: &str) -> Option<f64> {
        match self.metrics.get(name) {
            Some(MetricSummary::Counter { count }) => Some(*count),
            _ => None,
        }
    }
}

/// Serialize the run summary to a writer as pretty printed JSON
pub fn store_run_summary<W: Write>(run_summary: &RunSummary, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(writer, run_summary)?;
    Ok(())
}

/// Load a run summary from a reader
pub fn load_run_summary<R: Read>(reader: R) -> anyhow::Result<RunSummary> {
    let reader = std::io::BufReader::new(reader);
    let run_summary: RunSummary = serde_json::from_reader(reader)?;
    Ok(run_summary)
}
