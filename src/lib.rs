//! Quicksilver Promise: the promise core of the Quicksilver runtime
//!
//! A [`Promise`] represents the eventual result of an asynchronous operation:
//! a value, a rejection reason, or forwarding to another promise. Observers
//! are notified exactly once, always from the microtask queue, in
//! registration order, whether or not the result was known when they
//! subscribed.
//!
//! # Quick Start
//!
//! ```
//! use quicksilver_promise::{event_loop, Error, Promise, Resolution};
//!
//! let (source, resolve, _reject) = Promise::<i32>::deferred();
//! let doubled = source.then(|v| Ok(Resolution::Value(v * 2)));
//!
//! resolve.fulfill(21);
//! assert!(doubled.is_pending());
//!
//! event_loop::run_until_idle();
//! assert_eq!(doubled.value(), Some(42));
//!
//! let failed: Promise<i32> = Promise::reject(Error::reason("nope"));
//! let recovered = failed.catch(|_| Ok(Resolution::Value(0)));
//! event_loop::run_until_idle();
//! assert_eq!(recovered.value(), Some(0));
//! ```
//!
//! # Module Overview
//!
//! | Category | Modules |
//! |----------|---------|
//! | **Core** | [`runtime`], [`error`](Error) |
//! | **Scheduling** | [`event_loop`], [`event_loop::platform`], [`config`] |
//! | **Benchmarking** | [`scenarios`] |
//!
//! All promise work happens on one thread. The microtask queue is installed
//! per thread with [`event_loop::init`]; the embedder chooses how the queue
//! gets its turns by passing a [`Platform`](event_loop::platform::Platform).
// Clippy configuration for the promise core.
//
// - type_complexity: reaction closures carry nested Result/Resolution types
#![allow(clippy::type_complexity)]

pub mod config;
pub mod event_loop;
pub mod prelude;
pub mod runtime;
pub mod scenarios;

mod error;

pub use config::{Config, FatalPolicy};
pub use error::{Error, Result};
pub use event_loop::Fatal;
pub use runtime::{
    all, all_settled, race, IntoResolution, Promise, PromiseState, Reject, Resolution, Resolve,
    Thenable,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
