use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct GateState {
    target: usize,
    closed: bool,
}

/// Decides which virtual-user slots may run iterations.
///
/// Slots are numbered from zero and slot `i` is active while `i < target`. Ramping the target
/// down deactivates the highest numbered slots first. Once closed, the gate never opens again
/// and every waiting slot is released.
#[derive(Debug, Default)]
pub struct ConcurrencyGate {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl ConcurrencyGate {
    pub fn new(target: usize) -> Self {
        Self {
            state: Mutex::new(GateState {
                target,
                closed: false,
            }),
            changed: Condvar::new(),
        }
    }

    /// Set the number of active slots, returning the previous target.
    pub fn set_target(&self, target: usize) -> usize {
        let mut state = self.state.lock();
        let previous = std::mem::replace(&mut state.target, target);
        if previous != target {
            self.changed.notify_all();
        }
        previous
    }

    pub fn target(&self) -> usize {
        self.state.lock().target
    }

    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.changed.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn is_active(&self, slot: usize) -> bool {
        let state = self.state.lock();
        !state.closed && slot < state.target
    }

    /// Block the calling thread until `slot` is active or the gate closes.
    ///
    /// Returns `true` if the slot may run, `false` if the gate was closed.
    pub fn wait_until_active(&self, slot: usize) -> bool {
        let mut state = self.state.lock();
        self.changed
            .wait_while(&mut state, |state| !state.closed && slot >= state.target);
        !state.closed
    }
}
