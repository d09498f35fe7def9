use tokio::signal;

pub(crate) use load_tunnel_core::prelude::{
    DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError,
};

/// Trigger the shutdown handle when the process receives Ctrl-C.
pub(crate) fn start_shutdown_listener(runtime: &tokio::runtime::Runtime) -> ShutdownHandle {
    let handle = ShutdownHandle::default();

    let listener_handle = handle.clone();
    runtime.spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                println!("Received shutdown signal, shutting down...");
                listener_handle.shutdown();
            }
            Err(e) => {
                log::error!("Failed to listen for Ctrl-C, the run can only end on its own: {e:?}");
            }
        }
    });

    handle
}
