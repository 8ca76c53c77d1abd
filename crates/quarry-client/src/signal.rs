//! One-shot completion gate

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use quarry_common::error::RpcError;

/// Terminal state of a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The last chunk was processed
    Succeeded,
    /// The query failed with the recorded cause
    Failed(RpcError),
}

#[derive(Debug)]
enum GateState {
    Open,
    Closed(Completion),
}

/// A gate that closes exactly once.
///
/// The first `close` wins and later ones are ignored. Everything the closing
/// thread wrote before `close` is visible to a thread returning from `wait`,
/// since both sides go through the same mutex.
#[derive(Debug)]
pub struct CompletionSignal {
    state: Mutex<GateState>,
    closed: Condvar,
}

impl CompletionSignal {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Open),
            closed: Condvar::new(),
        }
    }

    /// Close the gate, returning `false` when it was already closed
    pub fn close(&self, completion: Completion) -> bool {
        let mut state = self.state.lock();
        if matches!(*state, GateState::Closed(_)) {
            return false;
        }
        *state = GateState::Closed(completion);
        drop(state);

        self.closed.notify_all();
        true
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.state.lock(), GateState::Closed(_))
    }

    /// Terminal state, `None` while open
    pub fn completion(&self) -> Option<Completion> {
        match &*self.state.lock() {
            GateState::Open => None,
            GateState::Closed(completion) => Some(completion.clone()),
        }
    }

    /// Block until the gate closes
    pub fn wait(&self) -> Completion {
        let mut state = self.state.lock();
        loop {
            if let GateState::Closed(completion) = &*state {
                return completion.clone();
            }
            self.closed.wait(&mut state);
        }
    }

    /// Block until the gate closes or `timeout` elapses
    pub fn wait_for(&self, timeout: Duration) -> Option<Completion> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let GateState::Closed(completion) = &*state {
                return Some(completion.clone());
            }
            if self.closed.wait_until(&mut state, deadline).timed_out() {
                return match &*state {
                    GateState::Closed(completion) => Some(completion.clone()),
                    GateState::Open => None,
                };
            }
        }
    }
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}
