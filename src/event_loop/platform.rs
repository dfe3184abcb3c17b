//! Host scheduling capability
//!
//! The promise core never decides on its own how to defer work to a later
//! turn. The embedder hands it a [`Platform`] at [`init`](super::init) time;
//! [`TickQueue`] is the built-in one, pumped by hand.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// A deferred callback handed to the platform
pub type Callback = Box<dyn FnOnce()>;

/// Deferred execution supplied by the embedding application.
///
/// Implementations must run each callback after the call that submitted it
/// has returned, and must run callbacks in submission order.
pub trait Platform {
    /// Schedule `callback` to run on a later turn
    fn schedule_microtask(&self, callback: Callback);
}

impl<F> Platform for F
where
    F: Fn(Callback),
{
    fn schedule_microtask(&self, callback: Callback) {
        self(callback)
    }
}

/// A FIFO of platform callbacks driven manually by the host.
///
/// Clones share the same queue, so a host can keep one handle and give the
/// other to the scheduler.
#[derive(Clone, Default)]
pub struct TickQueue {
    pending: Rc<RefCell<VecDeque<Callback>>>,
    ticks: Rc<Cell<u64>>,
}

impl TickQueue {
    /// Create an empty tick queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of callbacks waiting for a turn
    pub fn len(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Check if no callback is waiting
    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }

    /// Total number of turns run so far
    pub fn ticks(&self) -> u64 {
        self.ticks.get()
    }

    /// Run the oldest pending callback. Returns `false` when nothing was queued.
    pub fn tick(&self) -> bool {
        let next = self.pending.borrow_mut().pop_front();
        match next {
            Some(callback) => {
                self.ticks.set(self.ticks.get() + 1);
                callback();
                true
            }
            None => false,
        }
    }

    /// Run turns until no callback is left, including callbacks scheduled by
    /// the turns themselves. Returns the number of turns run.
    pub fn run_until_idle(&self) -> usize {
        let mut turns = 0;
        while self.tick() {
            turns += 1;
        }
        turns
    }
}

impl Platform for TickQueue {
    fn schedule_microtask(&self, callback: Callback) {
        self.pending.borrow_mut().push_back(callback);
    }
}

impl std::fmt::Debug for TickQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickQueue")
            .field("pending", &self.len())
            .field("ticks", &self.ticks())
            .finish()
    }
}
