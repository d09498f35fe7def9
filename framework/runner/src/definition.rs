use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use load_tunnel_instruments::Threshold;

use crate::cli::{LoadTunnelScenarioCli, ReporterOpt};
use crate::context::{AgentContext, RunnerContext, UserValuesConstraint};
use crate::ramp::{RampSchedule, Stage};

pub type HookResult = anyhow::Result<()>;

pub type GlobalHookMut<RV> = fn(&mut RunnerContext<RV>) -> HookResult;
pub type AgentHookMut<RV, V> = fn(&mut AgentContext<RV, V>) -> HookResult;
pub type GlobalHook<RV> = fn(Arc<RunnerContext<RV>>) -> HookResult;

pub(crate) const DEFAULT_BEHAVIOUR: &str = "default";

/// The builder for a scenario definition.
///
/// This must be used at the start of a test to define the scenario that you want to run.
pub struct ScenarioDefinitionBuilder<RV: UserValuesConstraint, V: UserValuesConstraint> {
    /// The name of the scenario, which should be unique within the test suite.
    ///
    /// Recommended value is `env!("CARGO_PKG_NAME")`.
    name: String,
    /// This value is initialised for you and you cannot change it.
    #[doc(hidden)]
    cli: LoadTunnelScenarioCli,
    /// The duration to run a constant number of agents for when no stages are configured.
    default_duration_s: Option<u64>,
    /// The load ramp to use when none is given on the command line.
    default_stages: Vec<Stage>,
    /// Thresholds as `(metric, expression)`, parsed when the scenario is built.
    thresholds: Vec<(String, String)>,
    /// Environment variables to record in the run summary.
    captured_env: Vec<String>,
    /// Global setup hook for this scenario. It will be run once, before any agents are started.
    setup_fn: Option<GlobalHookMut<RV>>,
    /// Setup hook for an agent, which will be run the first time the ramp activates the agent.
    setup_agent_fn: Option<AgentHookMut<RV, V>>,
    /// The agent behaviour for this scenario. There are two ways that this can be used:
    /// - Specify a single behaviour for all agents using [ScenarioDefinitionBuilder::use_agent_behaviour]. This will then start as many identical agents as the ramp requires.
    /// - Specify multiple behaviours using [ScenarioDefinitionBuilder::use_named_agent_behaviour]. You then need to tell the runner how many agents you want to run each behaviour.
    agent_behaviour: HashMap<String, AgentHookMut<RV, V>>,
    /// Teardown hook for an agent, run at the end of the run for every agent that was set up.
    teardown_agent_fn: Option<AgentHookMut<RV, V>>,
    /// Global teardown hook, run once after all agents have stopped. Best effort, errors are
    /// logged and do not fail the run.
    teardown_fn: Option<GlobalHook<RV>>,
}

pub struct ScenarioDefinition<RV: UserValuesConstraint, V: UserValuesConstraint> {
    pub(crate) name: String,
    pub(crate) schedule: RampSchedule,
    /// The behaviour name for each agent slot, in activation order.
    pub(crate) slot_behaviours: Vec<String>,
    pub(crate) thresholds: Vec<Threshold>,
    pub(crate) captured_env: Vec<String>,
    pub(crate) connection_string: Option<String>,
    pub(crate) no_progress: bool,
    pub(crate) reporter: ReporterOpt,
    pub(crate) run_id: Option<String>,
    pub(crate) summary_json: bool,
    pub(crate) setup_fn: Option<GlobalHookMut<RV>>,
    pub(crate) setup_agent_fn: Option<AgentHookMut<RV, V>>,
    pub(crate) agent_behaviour: HashMap<String, AgentHookMut<RV, V>>,
    pub(crate) teardown_agent_fn: Option<AgentHookMut<RV, V>>,
    pub(crate) teardown_fn: Option<GlobalHook<RV>>,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> ScenarioDefinitionBuilder<RV, V> {
    /// Create a scenario definition from the scenario name and already parsed command line
    /// arguments. See the [ScenarioDefinitionBuilder::name] for more information about the name.
    pub fn new(name: &str, cli: LoadTunnelScenarioCli) -> Self {
        Self {
            name: name.to_string(),
            cli,
            default_duration_s: None,
            default_stages: Vec::new(),
            thresholds: Vec::new(),
            captured_env: Vec::new(),
            setup_fn: None,
            setup_agent_fn: None,
            agent_behaviour: HashMap::new(),
            teardown_agent_fn: None,
            teardown_fn: None,
        }
    }

    /// Run a constant number of agents for this long when neither stages nor a duration are
    /// given on the command line.
    pub fn with_default_duration_s(mut self, duration: u64) -> Self {
        self.default_duration_s = Some(duration);
        self
    }

    /// The load ramp to use when no `--stage` or `--agents` flags are given.
    pub fn with_default_stages(mut self, stages: Vec<Stage>) -> Self {
        self.default_stages = stages;
        self
    }

    /// Add a pass criterion for the run, such as `p(95)<2000` on `http_req_duration`.
    pub fn with_threshold(mut self, metric: &str, expression: &str) -> Self {
        self.thresholds.push((metric.to_string(), expression.to_string()));
        self
    }

    /// Record the values of these environment variables, when set, in the run summary.
    pub fn with_captured_env(mut self, names: &[&str]) -> Self {
        self.captured_env.extend(names.iter().map(|name| name.to_string()));
        self
    }

    /// Set the global setup hook [ScenarioDefinitionBuilder::setup_fn] for this scenario.
    pub fn use_setup(mut self, setup_fn: GlobalHookMut<RV>) -> Self {
        self.setup_fn = Some(setup_fn);
        self
    }

    /// Set the agent setup hook [ScenarioDefinitionBuilder::setup_agent_fn] for this scenario.
    pub fn use_agent_setup(mut self, setup_agent_fn: AgentHookMut<RV, V>) -> Self {
        self.setup_agent_fn = Some(setup_agent_fn);
        self
    }

    /// Set the default agent behaviour hook [ScenarioDefinitionBuilder::agent_behaviour] for this scenario.
    pub fn use_agent_behaviour(self, behaviour: AgentHookMut<RV, V>) -> Self {
        self.use_named_agent_behaviour(DEFAULT_BEHAVIOUR, behaviour)
    }

    /// Set a named agent behaviour hook [ScenarioDefinitionBuilder::agent_behaviour] for this scenario.
    pub fn use_named_agent_behaviour(mut self, name: &str, behaviour: AgentHookMut<RV, V>) -> Self {
        let previous = self.agent_behaviour.insert(name.to_string(), behaviour);

        if previous.is_some() {
            panic!("Behaviour [{}] is already defined", name);
        }

        self
    }

    /// Set the agent teardown hook [ScenarioDefinitionBuilder::teardown_agent_fn] for this scenario.
    pub fn use_agent_teardown(mut self, teardown_agent_fn: AgentHookMut<RV, V>) -> Self {
        self.teardown_agent_fn = Some(teardown_agent_fn);
        self
    }

    /// Set the global teardown hook [ScenarioDefinitionBuilder::teardown_fn] for this scenario.
    pub fn use_teardown(mut self, teardown_fn: GlobalHook<RV>) -> Self {
        self.teardown_fn = Some(teardown_fn);
        self
    }

    /// Choose the load ramp. Stages on the command line win, then `--agents`/`--duration`, then
    /// the scenario's default stages, then a single agent for the default duration.
    fn schedule(&self) -> RampSchedule {
        let cli = &self.cli;
        let default_duration = cli
            .duration
            .or(self.default_duration_s)
            .map(Duration::from_secs);

        let schedule = if !cli.stages.is_empty() {
            RampSchedule::new(cli.start_agents, cli.stages.clone())
        } else if let Some(agents) = cli.agents {
            RampSchedule::constant(agents, default_duration)
        } else if cli.duration.is_none() && !self.default_stages.is_empty() {
            RampSchedule::new(cli.start_agents, self.default_stages.clone())
        } else {
            RampSchedule::constant(1, default_duration)
        };

        if cli.soak {
            schedule.hold_final_target()
        } else {
            schedule
        }
    }

    /// Assign a behaviour to every agent slot. Behaviours requested on the command line take the
    /// first slots, in the order given, and the default behaviour fills the rest.
    fn slot_behaviours(&self, peak_agents: usize) -> anyhow::Result<Vec<String>> {
        let mut slots = Vec::with_capacity(peak_agents);
        for (name, count) in &self.cli.behaviour {
            if !self.agent_behaviour.contains_key(name) {
                anyhow::bail!(
                    "Behaviour [{}] is not defined by scenario {}",
                    name,
                    self.name
                );
            }
            slots.extend(std::iter::repeat(name.clone()).take(*count));
        }

        if slots.len() > peak_agents {
            anyhow::bail!(
                "{} agents were assigned behaviours but the schedule only runs up to {} agents",
                slots.len(),
                peak_agents
            );
        }

        slots.resize(peak_agents, DEFAULT_BEHAVIOUR.to_string());
        Ok(slots)
    }

    pub(crate) fn build(self) -> anyhow::Result<ScenarioDefinition<RV, V>> {
        let schedule = self.schedule();
        let slot_behaviours = self.slot_behaviours(schedule.peak_agents())?;

        let thresholds = self
            .thresholds
            .iter()
            .map(|(metric, expression)| {
                Threshold::new(metric.as_str(), expression)
                    .with_context(|| format!("Invalid threshold on {metric}: {expression}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(ScenarioDefinition {
            name: self.name,
            schedule,
            slot_behaviours,
            thresholds,
            captured_env: self.captured_env,
            connection_string: self.cli.connection_string,
            no_progress: self.cli.no_progress,
            reporter: self.cli.reporter,
            run_id: self.cli.run_id,
            summary_json: self.cli.summary_json,
            setup_fn: self.setup_fn,
            setup_agent_fn: self.setup_agent_fn,
            agent_behaviour: self.agent_behaviour,
            teardown_agent_fn: self.teardown_agent_fn,
            teardown_fn: self.teardown_fn,
        })
    }
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> ScenarioDefinition<RV, V> {
    /// The number of agent slots assigned to each behaviour.
    pub(crate) fn assigned_behaviours(&self) -> BTreeMap<String, usize> {
        self.slot_behaviours
            .iter()
            .fold(BTreeMap::new(), |mut acc, name| {
                *acc.entry(name.clone()).or_default() += 1;
                acc
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default)]
    struct Values;

    impl UserValuesConstraint for Values {}

    fn noop(_ctx: &mut AgentContext<Values, Values>) -> HookResult {
        Ok(())
    }

    fn builder(args: &[&str]) -> ScenarioDefinitionBuilder<Values, Values> {
        let cli = LoadTunnelScenarioCli::parse_from(
            std::iter::once("scenario").chain(args.iter().copied()),
        );
        ScenarioDefinitionBuilder::new("scenario", cli)
    }

    fn stages() -> Vec<Stage> {
        vec![
            Stage::new(Duration::from_secs(10), 10),
            Stage::new(Duration::from_secs(20), 50),
            Stage::new(Duration::from_secs(10), 0),
        ]
    }

    #[test]
    fn default_stages_are_used_without_cli_overrides() {
        let definition = builder(&[])
            .with_default_stages(stages())
            .use_agent_behaviour(noop)
            .build()
            .unwrap();

        assert_eq!(RampSchedule::new(0, stages()), definition.schedule);
        assert_eq!(50, definition.slot_behaviours.len());
    }

    #[test]
    fn cli_stages_override_default_stages() {
        let definition = builder(&["--stage", "1s:3"])
            .with_default_stages(stages())
            .build()
            .unwrap();

        assert_eq!(
            RampSchedule::new(0, vec![Stage::new(Duration::from_secs(1), 3)]),
            definition.schedule
        );
    }

    #[test]
    fn cli_agents_run_a_constant_schedule() {
        let definition = builder(&["--agents", "4", "--duration", "7"])
            .with_default_stages(stages())
            .build()
            .unwrap();

        assert_eq!(
            RampSchedule::constant(4, Some(Duration::from_secs(7))),
            definition.schedule
        );
    }

    #[test]
    fn soak_holds_the_final_target() {
        let definition = builder(&["--soak"])
            .with_default_stages(stages())
            .build()
            .unwrap();

        assert_eq!(None, definition.schedule.total_duration());
    }

    #[test]
    fn named_behaviours_take_the_first_slots() {
        let definition = builder(&["--agents", "3", "--behaviour", "burst:2"])
            .with_default_duration_s(1)
            .use_agent_behaviour(noop)
            .use_named_agent_behaviour("burst", noop)
            .build()
            .unwrap();

        assert_eq!(
            vec!["burst", "burst", "default"],
            definition.slot_behaviours
        );
        assert_eq!(
            BTreeMap::from([("burst".to_string(), 2), ("default".to_string(), 1)]),
            definition.assigned_behaviours()
        );
    }

    #[test]
    fn too_many_assigned_behaviours_is_an_error() {
        let result = builder(&["--agents", "1", "--behaviour", "burst:2"])
            .use_named_agent_behaviour("burst", noop)
            .build();

        assert!(result.is_err());
    }

    #[test]
    fn unknown_behaviour_is_an_error() {
        let result = builder(&["--agents", "1", "--behaviour", "missing:1"])
            .use_agent_behaviour(noop)
            .build();

        assert!(result.is_err());
    }

    #[test]
    fn invalid_threshold_is_an_error() {
        let result = builder(&[])
            .with_threshold("http_req_duration", "p95<2000")
            .build();

        assert!(result.is_err());
    }

    #[test]
    #[should_panic(expected = "Behaviour [default] is already defined")]
    fn duplicate_behaviour_panics() {
        let _ = builder(&[]).use_agent_behaviour(noop).use_agent_behaviour(noop);
    }
}
