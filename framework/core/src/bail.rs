/// Return this error from an agent's behaviour function to indicate that the agent is bailing.
///
/// The agent stops running iterations, runs its teardown and exits, while the rest of the
/// virtual users carry on. Use it when an agent can no longer make useful requests, for example
/// when it has been configured with a target it cannot reach at all.
#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct AgentBailError {
    msg: String,
}

impl AgentBailError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

impl Default for AgentBailError {
    fn default() -> Self {
        Self::new("Agent is bailing")
    }
}
