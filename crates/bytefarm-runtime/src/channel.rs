//! The operation queue and the completion signal.
//!
//! The queue is a plain `std::sync::mpsc` channel: the program thread owns
//! the sender, the simulation thread polls the receiver with `try_recv` and
//! never blocks. The completion signal is a single-slot flag the program
//! thread waits on after each push.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Condvar, Mutex, PoisonError};

use crate::operation::Operation;
use crate::ActionError;

/// Create the FIFO that carries operations from the program thread to the
/// scheduler.
pub fn operation_channel() -> (Sender<Operation>, Receiver<Operation>) {
    mpsc::channel()
}

#[derive(Debug, Default)]
struct SignalState {
    set: bool,
    cancelled: bool,
}

/// Binary wake flag shared by one program thread and the scheduler.
///
/// `set` is called once per applied operation; `wait` blocks until it is set
/// and clears it before returning, so each wake is consumed exactly once.
/// `cancel` releases any waiter permanently.
#[derive(Debug, Default)]
pub struct CompletionSignal {
    state: Mutex<SignalState>,
    cond: Condvar,
}

impl CompletionSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the in-flight operation complete and wake the waiter.
    pub fn set(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.set = true;
        self.cond.notify_all();
    }

    /// Block until set (then clear it) or cancelled.
    pub fn wait(&self) -> Result<(), ActionError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        while !state.set && !state.cancelled {
            state = self
                .cond
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.cancelled {
            return Err(ActionError::Stopped);
        }
        state.set = false;
        Ok(())
    }

    /// Release current and future waiters with [`ActionError::Stopped`].
    pub fn cancel(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.cancelled = true;
        self.cond.notify_all();
    }

    pub fn is_set(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set
    }
}
