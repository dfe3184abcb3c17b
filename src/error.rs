//! Error types for the Quicksilver promise core

use std::any::Any;
use thiserror::Error;

/// Main error type for the promise core.
///
/// This is also the default rejection type of [`Promise`](crate::Promise).
/// Custom rejection types only need `From<Error>` so the machinery can
/// report self-resolution and contained panics through them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A promise was resolved with itself
    #[error("TypeError: a promise may not resolve to itself")]
    SelfResolution,

    /// A user callback panicked and the panic was contained
    #[error("PanicError: {0}")]
    Panicked(String),

    /// A plain rejection reason
    #[error("Error: {0}")]
    Reason(String),

    /// The scheduler was already installed on this thread
    #[error("InternalError: scheduler already initialized on this thread")]
    SchedulerInitialized,
}

impl Error {
    /// Create a plain rejection reason
    pub fn reason(message: impl Into<String>) -> Self {
        Error::Reason(message.into())
    }

    /// Convert a caught panic payload into an error
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Error::Panicked(message)
    }
}

/// Result type for promise-core operations
pub type Result<T> = std::result::Result<T, Error>;
