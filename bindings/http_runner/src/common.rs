use std::time::Duration;

use anyhow::Context;
use http_client_instrumented::{HttpClientInstrumented, HttpOutcome};
use load_tunnel_runner::prelude::{AgentContext, HookResult, LoadTunnelResult, UserValuesConstraint};
use serde::Serialize;

use crate::context::HttpAgentContext;
use crate::runner_context::HttpRunnerContext;

/// Create the agent's HTTP client, reporting to the run's reporter.
///
/// Call this from your agent setup hook:
/// ```rust
/// use http_load_tunnel_runner::prelude::{create_http_client, AgentContext, HookResult, HttpAgentContext, HttpRunnerContext};
///
/// fn agent_setup(ctx: &mut AgentContext<HttpRunnerContext, HttpAgentContext>) -> HookResult {
///     create_http_client(ctx)?;
///     Ok(())
/// }
/// ```
pub fn create_http_client<SV: UserValuesConstraint>(
    ctx: &mut AgentContext<HttpRunnerContext<SV>, HttpAgentContext>,
) -> HookResult {
    let reporter = ctx.runner_context().reporter();
    let client = HttpClientInstrumented::new(reporter)
        .with_context(|| format!("Failed to create HTTP client for {}", ctx.agent_id()))?;
    ctx.get_mut().client = Some(client);
    Ok(())
}

/// Send a JSON POST request from this agent and wait for the outcome.
///
/// Transport failures and error statuses are part of the returned [HttpOutcome]. An error is
/// returned if the run is shutting down, in which case the request is abandoned.
pub fn post_json<SV: UserValuesConstraint, T: Serialize + ?Sized>(
    ctx: &mut AgentContext<HttpRunnerContext<SV>, HttpAgentContext>,
    url: &str,
    body: &T,
    headers: &[(&str, String)],
) -> LoadTunnelResult<HttpOutcome> {
    let client = ctx.get().client()?.clone();
    ctx.runner_context()
        .executor()
        .execute_in_place(async move { client.post_json(url, body, headers).await })
}

/// Record a named check for this agent and return whether it passed.
pub fn check<RV: UserValuesConstraint, V: UserValuesConstraint>(
    ctx: &AgentContext<RV, V>,
    name: &str,
    passed: bool,
) -> bool {
    if !passed {
        log::debug!("Check [{}] failed for {}", name, ctx.agent_id());
    }
    ctx.check(name, passed)
}

/// Sleep for `duration` without holding up the runner's shutdown.
///
/// Ramping down does not interrupt a pause, the agent parks once it completes. Shutting down
/// cancels it.
pub fn pause<RV: UserValuesConstraint, V: UserValuesConstraint>(
    ctx: &AgentContext<RV, V>,
    duration: Duration,
) -> HookResult {
    ctx.runner_context().executor().execute_in_place(async move {
        tokio::time::sleep(duration).await;
        Ok(())
    })
}
