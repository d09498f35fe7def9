mod agent;
mod cli;
mod context;
mod definition;
mod executor;
mod init;
mod monitor;
mod progress;
mod ramp;
mod run;
mod scheduler;
mod shutdown;
mod summary;
mod types;

pub mod prelude {
    pub use crate::cli::{parse_agent_behaviour, LoadTunnelScenarioCli, ReporterOpt};
    pub use crate::context::UserValuesConstraint;
    pub use crate::context::{AgentContext, RunnerContext};
    pub use crate::definition::{HookResult, ScenarioDefinitionBuilder};
    pub use crate::executor::Executor;
    pub use crate::init::init;
    pub use crate::ramp::{RampSchedule, Stage, StageParseError};
    pub use crate::run::run;
    pub use crate::types::LoadTunnelResult;

    pub use load_tunnel_core::prelude::{
        AgentBailError, DelegatedShutdownListener, ShutdownSignalError,
    };
    pub use load_tunnel_instruments::{OperationRecord, Reporter};
    pub use load_tunnel_summary_model::RunSummary;
}
