//! Event Loop Implementation
//!
//! This module provides the microtask queue every promise reaction goes
//! through. One scheduler lives per thread; it is installed with [`init`]
//! and fed by [`enqueue`].
//!
//! The queue is drained in batches: [`drain`] swaps the whole queue out and
//! runs it in order. Tasks queued while a batch runs land in a fresh queue and
//! wait for the next platform turn, so one turn never grows unbounded and FIFO
//! order holds across turns.

pub mod platform;

use crate::config::{Config, FatalPolicy};
use crate::error::{Error, Result};
use platform::{Platform, TickQueue};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A microtask to be executed (promise reactions, thenable assimilation)
pub type Microtask = Box<dyn FnOnce()>;

/// Runtime statistics for the event loop
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLoopStats {
    /// Total microtasks processed across all batches
    pub total_microtasks: u64,
    /// Total number of drained batches
    pub total_batches: u64,
    /// Maximum microtasks drained in a single batch
    pub max_microtasks_per_batch: u64,
    /// Total promises created
    pub total_promises_created: u64,
    /// Total promises settled (fulfilled or rejected)
    pub total_promises_settled: u64,
    /// Rejections that reached the fatal channel
    pub fatal_rejections: u64,
}

/// An unhandled rejection that reached a terminal `done()`
pub struct Fatal {
    reason: Box<dyn Any>,
    message: String,
}

impl Fatal {
    pub(crate) fn new<E: fmt::Debug + 'static>(reason: E) -> Self {
        Self {
            message: format!("{:?}", reason),
            reason: Box::new(reason),
        }
    }

    /// Debug rendering of the rejection reason
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Borrow the reason as its concrete rejection type
    pub fn downcast_ref<E: 'static>(&self) -> Option<&E> {
        self.reason.downcast_ref()
    }

    /// Take the reason back as its concrete rejection type
    pub fn downcast<E: 'static>(self) -> std::result::Result<E, Self> {
        match self.reason.downcast::<E>() {
            Ok(reason) => Ok(*reason),
            Err(reason) => Err(Self {
                reason,
                message: self.message,
            }),
        }
    }
}

impl fmt::Debug for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fatal")
            .field("message", &self.message)
            .finish()
    }
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unhandled rejection: {}", self.message)
    }
}

/// The per-thread scheduler
struct Scheduler {
    /// Tasks waiting for the next drain
    queue: RefCell<Vec<Microtask>>,
    platform: Rc<dyn Platform>,
    ticks: Option<TickQueue>,
    fatal: FatalPolicy,
}

impl Scheduler {
    fn new(config: Config) -> Self {
        Self {
            queue: RefCell::new(Vec::new()),
            platform: config.platform,
            ticks: config.ticks,
            fatal: config.fatal,
        }
    }

    fn enqueue(&self, task: Microtask) {
        let was_empty = {
            let mut queue = self.queue.borrow_mut();
            queue.push(task);
            queue.len() == 1
        };
        if was_empty {
            self.platform.schedule_microtask(Box::new(|| {
                drain();
            }));
        }
    }
}

thread_local! {
    static SCHEDULER: RefCell<Option<Rc<Scheduler>>> = const { RefCell::new(None) };
    static STATS: RefCell<EventLoopStats> = RefCell::new(EventLoopStats::default());
}

/// Install the scheduler for the current thread.
///
/// Must run before the first promise operation that needs the queue;
/// otherwise a default configuration has already been installed lazily and
/// this returns [`Error::SchedulerInitialized`].
pub fn init(config: Config) -> Result<()> {
    SCHEDULER.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            return Err(Error::SchedulerInitialized);
        }
        tracing::debug!(?config, "installing promise scheduler");
        *slot = Some(Rc::new(Scheduler::new(config)));
        Ok(())
    })
}

/// Check if a scheduler is installed on this thread
pub fn is_initialized() -> bool {
    SCHEDULER.with(|slot| slot.borrow().is_some())
}

fn current() -> Rc<Scheduler> {
    SCHEDULER.with(|slot| {
        slot.borrow_mut()
            .get_or_insert_with(|| {
                tracing::debug!("no scheduler configured on this thread, using the built-in tick queue");
                Rc::new(Scheduler::new(Config::default()))
            })
            .clone()
    })
}

/// Enqueue a microtask
pub fn enqueue(task: impl FnOnce() + 'static) {
    current().enqueue(Box::new(task));
}

/// Run one batch: every task queued before this call, in order.
///
/// Normally invoked by the platform; returns the number of tasks run.
pub fn drain() -> usize {
    let scheduler = current();
    let batch = std::mem::take(&mut *scheduler.queue.borrow_mut());
    let count = batch.len();
    tracing::trace!(count, "draining microtask batch");

    for task in batch {
        task();
    }

    STATS.with(|stats| {
        let mut stats = stats.borrow_mut();
        stats.total_microtasks += count as u64;
        stats.total_batches += 1;
        if (count as u64) > stats.max_microtasks_per_batch {
            stats.max_microtasks_per_batch = count as u64;
        }
    });
    count
}

/// Check if there are queued microtasks
pub fn has_pending_microtasks() -> bool {
    SCHEDULER.with(|slot| {
        slot.borrow()
            .as_ref()
            .is_some_and(|scheduler| !scheduler.queue.borrow().is_empty())
    })
}

/// Pump the built-in tick queue until nothing is left.
///
/// Returns the number of platform turns run. With an embedder-supplied
/// platform there is nothing to pump here and this returns 0.
pub fn run_until_idle() -> usize {
    let ticks = current().ticks.clone();
    ticks.map_or(0, |ticks| ticks.run_until_idle())
}

/// Snapshot of this thread's counters
pub fn stats() -> EventLoopStats {
    STATS.with(|stats| stats.borrow().clone())
}

pub(crate) fn record_promise_created() {
    STATS.with(|stats| stats.borrow_mut().total_promises_created += 1);
}

pub(crate) fn record_promise_settled() {
    STATS.with(|stats| stats.borrow_mut().total_promises_settled += 1);
}

/// Surface a rejection nobody handled
pub(crate) fn report_fatal(fatal: Fatal) {
    STATS.with(|stats| stats.borrow_mut().fatal_rejections += 1);
    let scheduler = current();
    match &scheduler.fatal {
        FatalPolicy::Panic => {
            tracing::error!(reason = %fatal.message(), "unhandled rejection");
            let message = fatal.to_string();
            scheduler
                .platform
                .schedule_microtask(Box::new(move || panic!("{}", message)));
        }
        FatalPolicy::Log => {
            tracing::error!(reason = %fatal.message(), "unhandled rejection");
        }
        FatalPolicy::Hook(hook) => {
            tracing::warn!(reason = %fatal.message(), "unhandled rejection passed to fatal hook");
            hook(fatal);
        }
    }
}
