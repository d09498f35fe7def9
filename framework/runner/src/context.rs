use std::{fmt::Debug, sync::Arc};

use load_tunnel_instruments::Reporter;

use crate::executor::Executor;
use crate::shutdown::ShutdownHandle;

pub trait UserValuesConstraint: Default + Debug + Send + Sync + 'static {}

/// The context shared by every agent in a run.
///
/// It is mutable while the global setup hook runs and then frozen and shared read-only between
/// agents.
#[derive(Debug)]
pub struct RunnerContext<RV: UserValuesConstraint> {
    executor: Arc<Executor>,
    reporter: Arc<Reporter>,
    shutdown_handle: ShutdownHandle,
    connection_string: Option<String>,
    run_id: String,
    value: RV,
}

impl<RV: UserValuesConstraint> RunnerContext<RV> {
    pub(crate) fn new(
        executor: Arc<Executor>,
        reporter: Arc<Reporter>,
        shutdown_handle: ShutdownHandle,
        connection_string: Option<String>,
        run_id: String,
    ) -> Self {
        Self {
            executor,
            reporter,
            shutdown_handle,
            connection_string,
            run_id,
            value: Default::default(),
        }
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub fn reporter(&self) -> Arc<Reporter> {
        self.reporter.clone()
    }

    /// The connection string from the command line, if one was given.
    pub fn get_connection_string(&self) -> Option<&str> {
        self.connection_string.as_deref()
    }

    /// The id of this run, from `--run-id` or generated.
    pub fn get_run_id(&self) -> &str {
        &self.run_id
    }

    /// Stop the scenario as if the schedule had finished. Agents complete their current
    /// iteration unless it is waiting on [Executor::execute_in_place], which is cancelled.
    pub fn force_stop_scenario(&self) {
        log::info!("Scenario stop requested");
        self.shutdown_handle.shutdown();
    }

    pub fn get_mut(&mut self) -> &mut RV {
        &mut self.value
    }

    pub fn get(&self) -> &RV {
        &self.value
    }
}

/// The context of a single agent, one of the virtual users of a run.
pub struct AgentContext<RV: UserValuesConstraint, V: UserValuesConstraint> {
    agent_id: String,
    runner_context: Arc<RunnerContext<RV>>,
    value: V,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> AgentContext<RV, V> {
    pub(crate) fn new(agent_id: String, runner_context: Arc<RunnerContext<RV>>) -> Self {
        Self {
            agent_id,
            runner_context,
            value: Default::default(),
        }
    }

    /// A value which is unique within the run, such as `agent-3`.
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn runner_context(&self) -> &Arc<RunnerContext<RV>> {
        &self.runner_context
    }

    /// Record the outcome of a named check, such as `"status is 200"`, and return it.
    ///
    /// A failed check is only reported, it never stops the agent.
    pub fn check(&self, name: &str, passed: bool) -> bool {
        self.runner_context.reporter.add_check(name, passed)
    }

    pub fn get_mut(&mut self) -> &mut V {
        &mut self.value
    }

    pub fn get(&self) -> &V {
        &self.value
    }
}
