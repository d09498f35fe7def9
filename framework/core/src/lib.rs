mod bail;
mod gate;
mod shutdown;

pub mod prelude {
    pub use crate::bail::AgentBailError;
    pub use crate::gate::ConcurrencyGate;
    pub use crate::shutdown::{DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError};
}
