//! Scheduler configuration
//!
//! A [`Config`] picks the platform scheduling capability and what happens to
//! rejections nobody handled. It is consumed by [`event_loop::init`].
//!
//! [`event_loop::init`]: crate::event_loop::init

use crate::event_loop::platform::{Platform, TickQueue};
use crate::event_loop::Fatal;
use std::fmt;
use std::rc::Rc;

/// What to do with a rejection that reached `done()` unhandled
#[derive(Clone, Default)]
pub enum FatalPolicy {
    /// Log at error level, then panic on a fresh platform turn so the failure
    /// escapes to the host's fault handling
    #[default]
    Panic,
    /// Log at error level only
    Log,
    /// Hand the rejection to embedder code
    Hook(Rc<dyn Fn(Fatal)>),
}

impl FatalPolicy {
    /// Build a hook policy from a closure
    pub fn hook(f: impl Fn(Fatal) + 'static) -> Self {
        FatalPolicy::Hook(Rc::new(f))
    }
}

impl fmt::Debug for FatalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalPolicy::Panic => write!(f, "Panic"),
            FatalPolicy::Log => write!(f, "Log"),
            FatalPolicy::Hook(_) => write!(f, "Hook(..)"),
        }
    }
}

/// Scheduler configuration
#[derive(Clone)]
pub struct Config {
    pub(crate) platform: Rc<dyn Platform>,
    /// Set when the platform is a built-in tick queue the scheduler may pump
    pub(crate) ticks: Option<TickQueue>,
    pub(crate) fatal: FatalPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_ticks(TickQueue::new())
    }
}

impl Config {
    /// Use a built-in tick queue as the platform
    pub fn with_ticks(ticks: TickQueue) -> Self {
        Self {
            platform: Rc::new(ticks.clone()),
            ticks: Some(ticks),
            fatal: FatalPolicy::default(),
        }
    }

    /// Use an embedder-supplied platform
    pub fn with_platform(platform: impl Platform + 'static) -> Self {
        Self {
            platform: Rc::new(platform),
            ticks: None,
            fatal: FatalPolicy::default(),
        }
    }

    /// Set the fatal rejection policy
    pub fn fatal_policy(mut self, policy: FatalPolicy) -> Self {
        self.fatal = policy;
        self
    }

    /// Shorthand for `fatal_policy(FatalPolicy::hook(f))`
    pub fn on_fatal(self, f: impl Fn(Fatal) + 'static) -> Self {
        self.fatal_policy(FatalPolicy::hook(f))
    }

    /// The built-in tick queue, if this config uses one
    pub fn ticks(&self) -> Option<&TickQueue> {
        self.ticks.as_ref()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("ticks", &self.ticks)
            .field("fatal", &self.fatal)
            .finish_non_exhaustive()
    }
}
