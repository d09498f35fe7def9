use crate::cli::LoadTunnelScenarioCli;
use clap::Parser;

/// Initialise the CLI and logging for the load tunnel runner.
///
/// Logging is configured from `RUST_LOG`, for example `RUST_LOG=info`.
pub fn init() -> LoadTunnelScenarioCli {
    env_logger::init();

    LoadTunnelScenarioCli::parse()
}
