//! Shared test helpers for integration tests

use quicksilver_promise::event_loop::{self, platform::TickQueue};
use quicksilver_promise::{Config, Error};
use std::cell::RefCell;
use std::rc::Rc;

/// Ordered record of what the callbacks under test observed
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct Log(Rc<RefCell<Vec<String>>>);

#[allow(dead_code)]
impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

/// Install a tick queue whose fatal rejections are collected instead of
/// panicking
pub fn init_capturing() -> (TickQueue, Rc<RefCell<Vec<Error>>>) {
    let ticks = TickQueue::new();
    let fatals = Rc::new(RefCell::new(Vec::new()));
    let sink = fatals.clone();
    event_loop::init(Config::with_ticks(ticks.clone()).on_fatal(move |fatal| {
        match fatal.downcast_ref::<Error>() {
            Some(reason) => sink.borrow_mut().push(reason.clone()),
            None => panic!("unexpected fatal reason type: {}", fatal),
        }
    }))
    .expect("scheduler already installed on this test thread");
    (ticks, fatals)
}

/// Install a plain tick queue with the default fatal policy
#[allow(dead_code)]
pub fn init_ticks() -> TickQueue {
    let ticks = TickQueue::new();
    event_loop::init(Config::with_ticks(ticks.clone()))
        .expect("scheduler already installed on this test thread");
    ticks
}
