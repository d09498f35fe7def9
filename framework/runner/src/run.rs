use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use load_tunnel_core::prelude::ConcurrencyGate;
use load_tunnel_instruments::{evaluate_thresholds, ReportConfig};
use load_tunnel_summary_model::{store_run_summary, RunSummary};

use crate::agent::{AgentExit, AgentSlot};
use crate::cli::ReporterOpt;
use crate::monitor::start_monitor;
use crate::progress::start_progress;
use crate::scheduler::start_scheduler;
use crate::summary::{fill_run_summary, planned_duration_s};
use crate::{
    context::{RunnerContext, UserValuesConstraint},
    definition::ScenarioDefinitionBuilder,
    executor::Executor,
    shutdown::start_shutdown_listener,
};

/// Run a scenario to completion and return its summary.
///
/// The run fails only if the scenario definition is invalid or the global setup hook fails.
/// Failed thresholds are reported in the summary, see [RunSummary::passed].
pub fn run<RV: UserValuesConstraint, V: UserValuesConstraint>(
    definition: ScenarioDefinitionBuilder<RV, V>,
) -> anyhow::Result<RunSummary> {
    let definition = definition.build()?;

    log::info!("Running scenario: {}", definition.name);

    let run_id = definition
        .run_id
        .clone()
        .unwrap_or_else(|| nanoid::nanoid!());
    let started_at = chrono::Utc::now().timestamp();

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let shutdown_handle = start_shutdown_listener(&runtime);
    let executor = Arc::new(Executor::new(runtime, shutdown_handle.clone()));
    let reporter = Arc::new(match definition.reporter {
        ReporterOpt::InMemory => ReportConfig::default().enable_in_memory().init(),
        ReporterOpt::Noop => ReportConfig::default().init(),
    });
    let mut runner_context = RunnerContext::new(
        executor,
        reporter.clone(),
        shutdown_handle.clone(),
        definition.connection_string.clone(),
        run_id.clone(),
    );

    if let Some(setup_fn) = definition.setup_fn {
        setup_fn(&mut runner_context)?;
    }

    let runner_context = Arc::new(runner_context);
    let gate = Arc::new(ConcurrencyGate::new(0));

    let mut handles = Vec::with_capacity(definition.slot_behaviours.len());
    for (index, behaviour_name) in definition.slot_behaviours.iter().enumerate() {
        let slot = AgentSlot {
            index,
            behaviour_name: behaviour_name.clone(),
            behaviour: definition.agent_behaviour.get(behaviour_name).copied(),
            setup_agent_fn: definition.setup_agent_fn,
            teardown_agent_fn: definition.teardown_agent_fn,
            runner_context: runner_context.clone(),
            gate: gate.clone(),
            shutdown_handle: shutdown_handle.clone(),
        };

        let spawned = std::thread::Builder::new()
            .name(slot.agent_id())
            .spawn(move || slot.run());
        match spawned {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                // Release the agents that did start before giving up.
                shutdown_handle.shutdown();
                gate.close();
                return Err(e).context("Failed to spawn thread for test agent");
            }
        }
    }

    let planned_duration = definition.schedule.total_duration();
    let peak_agents = definition.schedule.peak_agents();
    log::info!(
        "Starting {} agents, planned duration {}",
        peak_agents,
        planned_duration
            .map(|d| humantime::format_duration(d).to_string())
            .unwrap_or_else(|| "unbounded".to_string())
    );

    let scheduler = start_scheduler(
        definition.schedule.clone(),
        gate.clone(),
        shutdown_handle.clone(),
    )
    .context("Failed to start the scheduler")?;

    if let (Some(planned_duration), false) = (planned_duration, definition.no_progress) {
        if let Err(e) = start_progress(planned_duration, gate.clone(), shutdown_handle.new_listener())
        {
            log::warn!("Failed to start progress bar: {:?}", e);
        }
    }

    // Ready to start running agents so start the resource monitor to report high usage by agents
    // which might lead to a misleading outcome.
    if let Err(e) = start_monitor(shutdown_handle.new_listener()) {
        log::warn!("Failed to start resource monitor: {:?}", e);
    }

    scheduler
        .join()
        .map_err(|e| anyhow::anyhow!("Error joining scheduler thread: {:?}", e))?;

    let mut agents_end_count = 0;
    for handle in handles {
        let exit = handle
            .join()
            .map_err(|e| anyhow::anyhow!("Error joining thread for test agent: {:?}", e))?;
        if exit.is_healthy() {
            agents_end_count += 1;
        } else if exit == AgentExit::SetupFailed {
            log::debug!("An agent did not run because its setup failed");
        }
    }

    if let Some(teardown_fn) = definition.teardown_fn {
        // Don't crash the runner if the teardown fails. We still want the reporting and runner
        // shutdown to happen cleanly. The hook is documented as 'best effort'
        if let Err(e) = teardown_fn(runner_context.clone()) {
            log::error!("Teardown failed: {:?}", e);
        }
    }

    let outcomes =
        reporter.with_metrics(|metrics| evaluate_thresholds(metrics, &definition.thresholds));
    reporter.finalize(&outcomes);

    let mut summary = RunSummary::new(
        run_id,
        definition.name.clone(),
        started_at,
        planned_duration.map(planned_duration_s),
        peak_agents,
        definition.assigned_behaviours(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    summary.set_agents_end_count(agents_end_count);
    for name in &definition.captured_env {
        if let Ok(value) = std::env::var(name) {
            summary.add_env(name.clone(), value);
        }
    }
    fill_run_summary(&mut summary, &reporter.metrics_snapshot(), &outcomes);

    for failed in summary.failed_thresholds() {
        log::error!(
            "Threshold failed: {} {} (observed {:?})",
            failed.metric,
            failed.expression,
            failed.observed
        );
    }

    if definition.summary_json {
        let mut stdout = std::io::stdout().lock();
        store_run_summary(&summary, &mut stdout).context("Failed to write run summary")?;
        writeln!(stdout)?;
    }

    Ok(summary)
}
