//! One-shot signals between the producer thread and waiting callers.
//!
//! Both are a `parking_lot::Mutex` + `Condvar` pair. Once fired they stay
//! fired, so late waiters return immediately instead of re-parking.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

/// Stream readiness as seen by readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalState {
    /// Nothing published yet and the stream is still open.
    Pending,
    /// At least one frame has been published.
    Published,
    /// The stream ended. Readers stop waiting.
    Ended,
}

/// First-frame latch with an end-of-stream escape.
///
/// `Pending → Published` fires once, on the first publish. `Ended` can be
/// entered from either state and wakes every parked reader.
pub struct FrameSignal {
    state: Mutex<SignalState>,
    changed: Condvar,
}

impl FrameSignal {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SignalState::Pending),
            changed: Condvar::new(),
        }
    }

    /// Record the first publish. Later calls are no-ops.
    pub fn publish(&self) {
        let mut state = self.state.lock();
        if *state == SignalState::Pending {
            *state = SignalState::Published;
            self.changed.notify_all();
        }
    }

    /// Mark the stream as ended and wake all waiters.
    pub fn end(&self) {
        let mut state = self.state.lock();
        if *state != SignalState::Ended {
            *state = SignalState::Ended;
            self.changed.notify_all();
        }
    }

    pub fn state(&self) -> SignalState {
        *self.state.lock()
    }

    /// Block while `Pending`, up to `timeout` if given.
    ///
    /// Returns the state observed on wake; `Pending` means the wait timed out.
    pub fn wait(&self, timeout: Option<Duration>) -> SignalState {
        let mut state = self.state.lock();
        wait_while(&self.changed, &mut state, timeout, |s| *s == SignalState::Pending);
        *state
    }
}

impl Default for FrameSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-shot gate: closed until `open`, then open forever.
pub struct Latch {
    open: Mutex<bool>,
    changed: Condvar,
}

impl Latch {
    pub fn new() -> Self {
        Self {
            open: Mutex::new(false),
            changed: Condvar::new(),
        }
    }

    pub fn open(&self) {
        let mut open = self.open.lock();
        if !*open {
            *open = true;
            self.changed.notify_all();
        }
    }

    pub fn is_open(&self) -> bool {
        *self.open.lock()
    }

    /// Block until open, up to `timeout` if given. Returns whether it opened.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut open = self.open.lock();
        wait_while(&self.changed, &mut open, timeout, |o| !*o);
        *open
    }
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}

fn wait_while<T>(
    condvar: &Condvar,
    guard: &mut MutexGuard<'_, T>,
    timeout: Option<Duration>,
    mut blocked: impl FnMut(&T) -> bool,
) {
    // A timeout too large to represent as a deadline waits forever.
    let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
    while blocked(&**guard) {
        match deadline {
            Some(deadline) => {
                if condvar.wait_until(guard, deadline).timed_out() {
                    return;
                }
            }
            None => condvar.wait(guard),
        }
    }
}
