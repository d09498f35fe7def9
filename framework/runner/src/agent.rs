use std::sync::Arc;
use std::time::Instant;

use load_tunnel_core::prelude::{AgentBailError, ConcurrencyGate};

use crate::context::{AgentContext, RunnerContext, UserValuesConstraint};
use crate::definition::AgentHookMut;
use crate::shutdown::{ShutdownHandle, ShutdownSignalError};

/// How an agent slot finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AgentExit {
    /// Ran until the end of the run, including slots that were never activated.
    Finished,
    /// The behaviour returned an [AgentBailError].
    Bailed,
    /// The agent setup hook failed so the slot never ran its behaviour.
    SetupFailed,
}

impl AgentExit {
    pub(crate) fn is_healthy(&self) -> bool {
        matches!(self, AgentExit::Finished)
    }
}

/// One virtual user. The slot parks on the gate while it is not part of the current target and
/// runs iterations of its behaviour while it is.
pub(crate) struct AgentSlot<RV: UserValuesConstraint, V: UserValuesConstraint> {
    pub(crate) index: usize,
    pub(crate) behaviour_name: String,
    pub(crate) behaviour: Option<AgentHookMut<RV, V>>,
    pub(crate) setup_agent_fn: Option<AgentHookMut<RV, V>>,
    pub(crate) teardown_agent_fn: Option<AgentHookMut<RV, V>>,
    pub(crate) runner_context: Arc<RunnerContext<RV>>,
    pub(crate) gate: Arc<ConcurrencyGate>,
    pub(crate) shutdown_handle: ShutdownHandle,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> AgentSlot<RV, V> {
    pub(crate) fn agent_id(&self) -> String {
        format!("agent-{}", self.index)
    }

    /// Run the slot until the gate closes or the behaviour bails.
    ///
    /// Setup happens the first time the slot is activated. A slot that is deactivated while an
    /// iteration is in flight finishes that iteration before parking.
    pub(crate) fn run(self) -> AgentExit {
        let agent_id = self.agent_id();
        let cycle_shutdown_listener = self.shutdown_handle.new_listener();
        let mut context: Option<AgentContext<RV, V>> = None;

        let exit = loop {
            if !self.gate.wait_until_active(self.index)
                || cycle_shutdown_listener.should_shutdown()
            {
                log::debug!("Stopping agent {}", agent_id);
                break AgentExit::Finished;
            }

            if context.is_none() {
                let mut new_context =
                    AgentContext::new(agent_id.clone(), self.runner_context.clone());
                if let Some(setup_agent_fn) = self.setup_agent_fn {
                    if let Err(e) = setup_agent_fn(&mut new_context) {
                        log::error!("Agent setup failed for agent {}: {:?}", agent_id, e);
                        break AgentExit::SetupFailed;
                    }
                }
                log::debug!(
                    "Started agent {} with behaviour {}",
                    agent_id,
                    self.behaviour_name
                );
                context = Some(new_context);
            }
            let Some(ctx) = context.as_mut() else {
                break AgentExit::Finished;
            };

            let Some(behaviour) = self.behaviour else {
                log::warn!(
                    "No behaviour [{}] defined, agent {} will idle until the run ends",
                    self.behaviour_name,
                    agent_id
                );
                // Resolves with a shutdown error once the run ends.
                let _ = self
                    .runner_context
                    .executor()
                    .execute_in_place(std::future::pending::<anyhow::Result<()>>());
                break AgentExit::Finished;
            };

            let started = Instant::now();
            match behaviour(ctx) {
                Ok(()) => self.runner_context.reporter().add_iteration(started.elapsed()),
                Err(e) if e.is::<ShutdownSignalError>() => {
                    // The run is stopping, the checks at the top of the loop end the agent.
                }
                Err(e) if e.is::<AgentBailError>() => {
                    log::warn!("Agent {} bailed: {}", agent_id, e);
                    break AgentExit::Bailed;
                }
                Err(e) => {
                    log::error!("Agent behaviour failed for agent {}: {:?}", agent_id, e);
                }
            }
        };

        if let (Some(mut ctx), Some(teardown_agent_fn)) = (context, self.teardown_agent_fn) {
            if let Err(e) = teardown_agent_fn(&mut ctx) {
                log::error!("Agent teardown failed for agent {}: {:?}", agent_id, e);
            }
        }

        exit
    }
}
