//! Resolution and coercion
//!
//! Whatever a producer hands to `resolve` is classified once, by type, into a
//! [`Resolution`]: a plain value, one of our own promises, or a foreign
//! [`Thenable`]. The coercion algorithm below turns each of those into a
//! settled or still-following promise.

use super::promise::{contain, Promise, Reject, Resolve};
use crate::error::Error;
use crate::event_loop;
use std::fmt;

/// A candidate outcome for a promise
pub enum Resolution<T: 'static, E: 'static = Error> {
    /// Fulfill with this value
    Value(T),
    /// Adopt the state of another promise
    Promise(Promise<T, E>),
    /// Assimilate a foreign settlement source
    Thenable(Box<dyn Thenable<T, E>>),
}

impl<T: 'static, E: 'static> Resolution<T, E> {
    /// Wrap a foreign thenable
    pub fn thenable(thenable: impl Thenable<T, E> + 'static) -> Self {
        Resolution::Thenable(Box::new(thenable))
    }

    /// Wrap a closure acting as a thenable's `then`
    pub fn from_then<F>(then: F) -> Self
    where
        F: Fn(Resolve<T, E>, Reject<T, E>) -> Result<(), E> + 'static,
    {
        Resolution::Thenable(Box::new(ThenFn(then)))
    }
}

impl<T: fmt::Debug + 'static, E: fmt::Debug + 'static> fmt::Debug for Resolution<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Resolution::Promise(promise) => f.debug_tuple("Promise").field(promise).finish(),
            Resolution::Thenable(_) => write!(f, "Thenable(..)"),
        }
    }
}

/// Anything a callback may return to decide a derived promise.
///
/// Implemented for [`Resolution`], for [`Promise`] (awaited transparently)
/// and for `()`.
pub trait IntoResolution<E: 'static = Error> {
    /// The fulfillment type of the resulting promise
    type Value: 'static;

    fn into_resolution(self) -> Resolution<Self::Value, E>;
}

impl<T: 'static, E: 'static> IntoResolution<E> for Resolution<T, E> {
    type Value = T;

    fn into_resolution(self) -> Resolution<T, E> {
        self
    }
}

impl<T: 'static, E: 'static> IntoResolution<E> for Promise<T, E> {
    type Value = T;

    fn into_resolution(self) -> Resolution<T, E> {
        Resolution::Promise(self)
    }
}

impl<E: 'static> IntoResolution<E> for () {
    type Value = ();

    fn into_resolution(self) -> Resolution<(), E> {
        Resolution::Value(())
    }
}

/// A settlement source that is not one of our promises.
///
/// Its `then` is invoked on a later microtask with a one-shot
/// resolve/reject pair: only the first call on either handle counts, no
/// matter how often or in which order the implementation calls them.
pub trait Thenable<T: 'static, E: 'static = Error> {
    /// Look up the settlement capability.
    ///
    /// Runs synchronously while the promise is being resolved; an `Err` or a
    /// panic rejects that promise and `then` is never called.
    fn probe(&self) -> Result<(), E> {
        Ok(())
    }

    /// Register the promise's resolve/reject handles.
    ///
    /// An `Err` or a panic rejects the promise unless a handle already fired.
    fn then(&self, resolve: Resolve<T, E>, reject: Reject<T, E>) -> Result<(), E>;
}

struct ThenFn<F>(F);

impl<T: 'static, E: 'static, F> Thenable<T, E> for ThenFn<F>
where
    F: Fn(Resolve<T, E>, Reject<T, E>) -> Result<(), E>,
{
    fn then(&self, resolve: Resolve<T, E>, reject: Reject<T, E>) -> Result<(), E> {
        (self.0)(resolve, reject)
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + fmt::Debug + 'static,
{
    /// Coercion entry point. No-op once settled.
    pub(crate) fn resolve_with(&self, resolution: Resolution<T, E>) {
        if !self.is_pending() {
            return;
        }
        match resolution {
            Resolution::Value(value) => self.fulfill(value),
            Resolution::Promise(other) => self.follow(other),
            Resolution::Thenable(thenable) => self.assimilate(thenable),
        }
    }

    fn follow(&self, other: Promise<T, E>) {
        if self.ptr_eq(&other) {
            tracing::debug!("promise resolved with itself, rejecting");
            self.reject_with(E::from(Error::SelfResolution));
            return;
        }
        match other.result() {
            Some(Ok(value)) => self.fulfill(value),
            Some(Err(reason)) => self.reject_with(reason),
            None => {
                let target = self.clone();
                other.subscribe(move |outcome| match outcome {
                    Ok(value) => target.resolve_with(Resolution::Value(value)),
                    Err(reason) => target.reject_with(reason),
                });
            }
        }
    }

    fn assimilate(&self, thenable: Box<dyn Thenable<T, E>>) {
        if let Err(reason) = contain(|| thenable.probe()) {
            self.reject_with(reason);
            return;
        }
        let target = self.clone();
        event_loop::enqueue(move || {
            let (resolve, reject) = target.resolvers();
            let fallback = reject.clone();
            if let Err(reason) = contain(|| thenable.then(resolve, reject)) {
                fallback.reject(reason);
            }
        });
    }
}
