//! Promise runtime
//!
//! This module provides the settlement state machine, the coercion of
//! resolved values and the combinators built on top of them.

mod combinators;
mod promise;
mod resolution;

pub use combinators::{all, all_settled, race};
pub use promise::{Promise, PromiseState, Reject, Resolve};
pub use resolution::{IntoResolution, Resolution, Thenable};
