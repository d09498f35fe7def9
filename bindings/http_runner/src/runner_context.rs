use load_tunnel_runner::prelude::UserValuesConstraint;

/// Scenario values for scenarios that do not need any.
#[derive(Default, Debug)]
pub struct DefaultScenarioValues;

impl UserValuesConstraint for DefaultScenarioValues {}

/// HTTP specific runner context values.
///
/// Scenarios keep their own configuration in `scenario_values`, usually filled in by the global
/// setup hook and then read by every agent.
#[derive(Default, Debug)]
pub struct HttpRunnerContext<SV: UserValuesConstraint = DefaultScenarioValues> {
    pub scenario_values: SV,
}

impl<SV: UserValuesConstraint> UserValuesConstraint for HttpRunnerContext<SV> {}
