//! Prelude module for convenient imports
//!
//! This module provides the most commonly used types and traits for working
//! with the promise core. Import everything from this module for quick access:
//!
//! ```
//! use quicksilver_promise::prelude::*;
//!
//! let doubled = Promise::<i32>::fulfilled(21).map(|v| v * 2);
//! event_loop::run_until_idle();
//! assert_eq!(doubled.value(), Some(42));
//! ```

// Promises and combinators
pub use crate::runtime::{
    all, all_settled, race, IntoResolution, Promise, PromiseState, Reject, Resolution, Resolve,
    Thenable,
};

// Error handling
pub use crate::error::{Error, Result};

// Scheduling
pub use crate::config::{Config, FatalPolicy};
pub use crate::event_loop::{self, platform::Platform, platform::TickQueue, Fatal};
