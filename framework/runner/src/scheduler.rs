use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use load_tunnel_core::prelude::ConcurrencyGate;

use crate::ramp::RampSchedule;
use crate::shutdown::ShutdownHandle;

/// How often the target number of agents is re-evaluated.
pub(crate) const SCHEDULER_TICK: Duration = Duration::from_millis(100);

/// Drive the gate from the schedule until the schedule ends or the run is shut down.
///
/// When the schedule ends the shutdown handle is triggered. Either way the gate is closed
/// before the thread exits so that parked agents are released.
pub(crate) fn start_scheduler(
    schedule: RampSchedule,
    gate: Arc<ConcurrencyGate>,
    shutdown_handle: ShutdownHandle,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("scheduler".to_string())
        .spawn(move || {
            let start = Instant::now();
            loop {
                if shutdown_handle.is_shutdown() {
                    log::debug!("Scheduler stopping after shutdown");
                    break;
                }

                match schedule.target_at(start.elapsed()) {
                    Some(target) => {
                        let previous = gate.set_target(target);
                        if previous != target {
                            log::debug!("Target agents changed from {} to {}", previous, target);
                        } else {
                            log::trace!("Target agents {}", target);
                        }
                    }
                    None => {
                        log::info!("Schedule complete after {:?}", start.elapsed());
                        shutdown_handle.shutdown();
                        break;
                    }
                }

                std::thread::sleep(SCHEDULER_TICK);
            }

            gate.close();
        })
}
