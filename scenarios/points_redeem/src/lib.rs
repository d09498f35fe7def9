mod config;
mod redeem;

use std::time::Duration;

use anyhow::Context;
use http_load_tunnel_runner::prelude::*;

pub use config::{ConfigError, RunConfiguration};
pub use redeem::{redeem_url, RedeemRequest, MEMO, STATUS_CHECK};

#[derive(Debug, Default)]
pub struct ScenarioValues {
    config: Option<RunConfiguration>,
}

impl UserValuesConstraint for ScenarioValues {}

impl ScenarioValues {
    pub fn config(&self) -> anyhow::Result<&RunConfiguration> {
        self.config
            .as_ref()
            .context("Run configuration is not loaded, the scenario setup did not run")
    }
}

fn setup(ctx: &mut RunnerContext<HttpRunnerContext<ScenarioValues>>) -> HookResult {
    let config = RunConfiguration::from_env(ctx.get_connection_string())?;
    log::info!(
        "Run {} redeeming {} points for user {} against {} with a {:?} pause",
        ctx.get_run_id(),
        config.amount,
        config.user_id,
        config.base_url,
        config.pause
    );

    ctx.get_mut().scenario_values.config = Some(config);
    Ok(())
}

fn agent_setup(
    ctx: &mut AgentContext<HttpRunnerContext<ScenarioValues>, HttpAgentContext>,
) -> HookResult {
    create_http_client(ctx)?;
    Ok(())
}

/// 10 agents over 10s, up to 50 over 20s, then back down to 0 over 10s.
pub fn default_stages() -> Vec<Stage> {
    vec![
        Stage::new(Duration::from_secs(10), 10),
        Stage::new(Duration::from_secs(20), 50),
        Stage::new(Duration::from_secs(10), 0),
    ]
}

pub fn scenario(
    cli: LoadTunnelScenarioCli,
) -> ScenarioDefinitionBuilder<HttpRunnerContext<ScenarioValues>, HttpAgentContext> {
    ScenarioDefinitionBuilder::new(env!("CARGO_PKG_NAME"), cli)
        .with_default_stages(default_stages())
        .with_threshold("http_req_failed", "rate<0.01")
        .with_threshold("http_req_duration", "p(95)<2000")
        .with_captured_env(&[
            config::BASE_URL_VAR,
            config::USER_ID_VAR,
            config::AMOUNT_VAR,
            config::PAUSE_MS_VAR,
            config::IDEMPOTENCY_KEYS_VAR,
        ])
        .use_setup(setup)
        .use_agent_setup(agent_setup)
        .use_agent_behaviour(redeem::agent_behaviour)
}
