//! Shutdown gate shared by every handle of one store.
//!
//! Operations enter the gate before touching the backend and leave it when
//! their guard drops. Closing flips the gate shut, then blocks until every
//! operation already inside has left. After that no operation can reach the
//! backend, so it is safe to release.

use crate::error::{ProtocolError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct GateState {
    closed: bool,
    in_flight: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Gate {
    state: Mutex<GateState>,
    drained: Condvar,
    // fast path for rejecting calls once closed
    closed: AtomicBool,
}

/// Proof of being inside the gate. Dropping it leaves.
#[must_use]
pub(crate) struct GateGuard<'a> {
    gate: &'a Gate,
}

impl Gate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        // the state is two plain counters, still consistent after a panic
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn enter(&self) -> Result<GateGuard<'_>> {
        if self.is_closed() {
            return Err(ProtocolError::NotOpen);
        }

        let mut state = self.lock();
        if state.closed {
            return Err(ProtocolError::NotOpen);
        }
        state.in_flight += 1;
        Ok(GateGuard { gate: self })
    }

    /// Shut the gate and wait for in-flight operations to finish.
    ///
    /// Fails with `NotOpen` if the gate was already closed.
    pub(crate) fn close(&self) -> Result<usize> {
        let mut state = self.lock();
        if state.closed {
            return Err(ProtocolError::NotOpen);
        }
        state.closed = true;
        self.closed.store(true, Ordering::Release);

        let waited_for = state.in_flight;
        while state.in_flight > 0 {
            state = self
                .drained
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        Ok(waited_for)
    }

    fn leave(&self) {
        let mut state = self.lock();
        state.in_flight -= 1;
        if state.in_flight == 0 && state.closed {
            self.drained.notify_all();
        }
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.leave();
    }
}
