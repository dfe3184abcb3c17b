//! Promise Implementation
//!
//! A [`Promise`] is a shared handle on a settle-once state machine. Reactions
//! registered with [`then`](Promise::then) and friends never run on the
//! caller's stack: settling a promise moves its reactions onto the microtask
//! queue, and registering on an already settled promise queues the reaction
//! right away.

use super::resolution::{IntoResolution, Resolution};
use crate::error::Error;
use crate::event_loop::{self, Fatal};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

/// Observable promise state
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PromiseState {
    /// Promise is pending - not yet settled
    Pending,
    /// Promise is fulfilled with a value
    Fulfilled,
    /// Promise is rejected with a reason
    Rejected,
}

enum State<T, E> {
    Pending,
    Fulfilled(T),
    Rejected(E),
}

impl<T: Clone, E: Clone> State<T, E> {
    fn outcome(&self) -> Option<Result<T, E>> {
        match self {
            State::Pending => None,
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(reason) => Some(Err(reason.clone())),
        }
    }
}

/// A registered continuation. It closes over the user callbacks and the
/// downstream promise it settles.
type Reaction<T, E> = Box<dyn FnOnce(Result<T, E>)>;

struct Inner<T: 'static, E: 'static> {
    state: State<T, E>,
    /// Only populated while pending
    reactions: Vec<Reaction<T, E>>,
}

thread_local! {
    /// Reaction lists of dropped promises waiting to be released
    static RELEASED: RefCell<Vec<Box<dyn Any>>> = const { RefCell::new(Vec::new()) };
    static RELEASING: Cell<bool> = const { Cell::new(false) };
}

/// Clears the releasing flag even if a captured value panics on drop
struct ReleaseLoop;

impl Drop for ReleaseLoop {
    fn drop(&mut self) {
        let _ = RELEASING.try_with(|flag| flag.set(false));
    }
}

// Reactions own their downstream promises, so a pending chain would drop
// recursively, one frame set per link. Nested drops park their reactions and
// the outermost drop releases them in a loop.
impl<T: 'static, E: 'static> Drop for Inner<T, E> {
    fn drop(&mut self) {
        if self.reactions.is_empty() {
            return;
        }
        let reactions = std::mem::take(&mut self.reactions);
        let _ = RELEASED.try_with(move |released| released.borrow_mut().push(Box::new(reactions)));

        if !matches!(RELEASING.try_with(|flag| flag.replace(true)), Ok(false)) {
            return;
        }
        let _running = ReleaseLoop;
        while let Some(batch) = RELEASED
            .try_with(|released| released.borrow_mut().pop())
            .ok()
            .flatten()
        {
            drop(batch);
        }
    }
}

/// The eventual result of an asynchronous operation.
///
/// Cloning a promise copies the handle, not the state.
pub struct Promise<T: 'static, E: 'static = Error> {
    inner: Rc<RefCell<Inner<T, E>>>,
}

impl<T: 'static, E: 'static> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static, E: 'static> Promise<T, E> {
    /// Current state of the promise
    pub fn state(&self) -> PromiseState {
        match self.inner.borrow().state {
            State::Pending => PromiseState::Pending,
            State::Fulfilled(_) => PromiseState::Fulfilled,
            State::Rejected(_) => PromiseState::Rejected,
        }
    }

    /// Check if the promise has not settled yet
    pub fn is_pending(&self) -> bool {
        self.state() == PromiseState::Pending
    }

    /// Check if two handles refer to the same promise
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + fmt::Debug + 'static,
{
    pub(crate) fn pending() -> Self {
        event_loop::record_promise_created();
        Self {
            inner: Rc::new(RefCell::new(Inner {
                state: State::Pending,
                reactions: Vec::new(),
            })),
        }
    }

    /// Create a pending promise whose fate is decided by `resolver`.
    ///
    /// The resolver runs synchronously. Returning `Err` or panicking rejects
    /// the promise unless one of the handles already fired.
    pub fn new<F>(resolver: F) -> Self
    where
        F: FnOnce(Resolve<T, E>, Reject<T, E>) -> Result<(), E>,
    {
        let promise = Self::pending();
        let (resolve, reject) = promise.resolvers();
        let fallback = reject.clone();
        if let Err(reason) = contain(move || resolver(resolve, reject)) {
            fallback.reject(reason);
        }
        promise
    }

    /// Create a pending promise together with its resolve and reject handles
    pub fn deferred() -> (Self, Resolve<T, E>, Reject<T, E>) {
        let promise = Self::pending();
        let (resolve, reject) = promise.resolvers();
        (promise, resolve, reject)
    }

    /// Coerce `x` into a promise.
    ///
    /// A promise is returned as is; anything else becomes a new promise that
    /// follows it.
    pub fn resolve<R>(x: R) -> Self
    where
        R: IntoResolution<E, Value = T>,
    {
        match x.into_resolution() {
            Resolution::Promise(promise) => promise,
            other => {
                let promise = Self::pending();
                promise.resolve_with(other);
                promise
            }
        }
    }

    /// Create a promise already fulfilled with `value`
    pub fn fulfilled(value: T) -> Self {
        let promise = Self::pending();
        promise.fulfill(value);
        promise
    }

    /// Create a promise already rejected with `reason`
    pub fn reject(reason: E) -> Self {
        let promise = Self::pending();
        promise.reject_with(reason);
        promise
    }

    /// The fulfillment value, once fulfilled
    pub fn value(&self) -> Option<T> {
        match &self.inner.borrow().state {
            State::Fulfilled(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// The rejection reason, once rejected
    pub fn reason(&self) -> Option<E> {
        match &self.inner.borrow().state {
            State::Rejected(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    /// The settled outcome, or `None` while pending
    pub fn result(&self) -> Option<Result<T, E>> {
        self.inner.borrow().state.outcome()
    }

    /// A fresh resolve/reject pair sharing one "already resolved" flag
    pub(crate) fn resolvers(&self) -> (Resolve<T, E>, Reject<T, E>) {
        let guard = Guard::new();
        (
            Resolve {
                target: self.clone(),
                guard: guard.clone(),
            },
            Reject {
                target: self.clone(),
                guard,
            },
        )
    }

    pub(crate) fn fulfill(&self, value: T) {
        self.settle(State::Fulfilled(value));
    }

    pub(crate) fn reject_with(&self, reason: E) {
        self.settle(State::Rejected(reason));
    }

    fn settle(&self, state: State<T, E>) {
        let reactions = {
            let mut inner = self.inner.borrow_mut();
            if !matches!(inner.state, State::Pending) {
                return;
            }
            inner.state = state;
            std::mem::take(&mut inner.reactions)
        };
        event_loop::record_promise_settled();
        tracing::trace!(state = ?self.state(), reactions = reactions.len(), "promise settled");

        if reactions.is_empty() {
            return;
        }
        let Some(outcome) = self.result() else {
            return;
        };
        event_loop::enqueue(move || {
            for reaction in reactions {
                reaction(outcome.clone());
            }
        });
    }

    /// Register a raw reaction. It runs on the microtask queue, never inline.
    pub(crate) fn subscribe(&self, reaction: impl FnOnce(Result<T, E>) + 'static) {
        let mut inner = self.inner.borrow_mut();
        let outcome = inner.state.outcome();
        match outcome {
            None => inner.reactions.push(Box::new(reaction)),
            Some(outcome) => {
                drop(inner);
                event_loop::enqueue(move || reaction(outcome));
            }
        }
    }

    fn react<U, F, G>(&self, on_fulfilled: F, on_rejected: G) -> Promise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<Resolution<U, E>, E> + 'static,
        G: FnOnce(E) -> Result<Resolution<U, E>, E> + 'static,
    {
        let downstream = Promise::pending();
        let target = downstream.clone();
        self.subscribe(move |outcome| {
            let next = match outcome {
                Ok(value) => contain(move || on_fulfilled(value)),
                Err(reason) => contain(move || on_rejected(reason)),
            };
            match next {
                Ok(resolution) => target.resolve_with(resolution),
                Err(reason) => target.reject_with(reason),
            }
        });
        downstream
    }

    /// Derive a promise from the fulfillment value. Rejections pass through.
    ///
    /// The callback may return another promise, which is awaited
    /// transparently.
    pub fn then<R, F>(&self, on_fulfilled: F) -> Promise<R::Value, E>
    where
        R: IntoResolution<E>,
        R::Value: Clone + 'static,
        F: FnOnce(T) -> Result<R, E> + 'static,
    {
        self.react(
            move |value| on_fulfilled(value).map(IntoResolution::into_resolution),
            |reason| Err(reason),
        )
    }

    /// Derive a promise handling both outcomes
    pub fn then_or_else<R, S, F, G>(&self, on_fulfilled: F, on_rejected: G) -> Promise<R::Value, E>
    where
        R: IntoResolution<E>,
        R::Value: Clone + 'static,
        S: IntoResolution<E, Value = R::Value>,
        F: FnOnce(T) -> Result<R, E> + 'static,
        G: FnOnce(E) -> Result<S, E> + 'static,
    {
        self.react(
            move |value| on_fulfilled(value).map(IntoResolution::into_resolution),
            move |reason| on_rejected(reason).map(IntoResolution::into_resolution),
        )
    }

    /// Recover from a rejection. Fulfillment values pass through.
    pub fn catch<R, G>(&self, on_rejected: G) -> Promise<T, E>
    where
        R: IntoResolution<E, Value = T>,
        G: FnOnce(E) -> Result<R, E> + 'static,
    {
        self.react(
            |value| Ok(Resolution::Value(value)),
            move |reason| on_rejected(reason).map(IntoResolution::into_resolution),
        )
    }

    /// Transform the fulfillment value with an infallible function
    pub fn map<U, F>(&self, f: F) -> Promise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> U + 'static,
    {
        self.react(move |value| Ok(Resolution::Value(f(value))), |reason| Err(reason))
    }

    /// Terminal consumption with no handlers: a rejection is fatal
    pub fn done(&self) {
        self.done_or_else(|_| Ok(()), |reason| Err::<(), E>(reason));
    }

    /// Terminal consumption of the fulfillment value.
    ///
    /// A rejection of this promise, an `Err` or panic from the callback, or a
    /// returned promise that rejects all go to the fatal channel.
    pub fn done_with<R, F>(&self, on_fulfilled: F)
    where
        R: IntoResolution<E, Value = ()>,
        F: FnOnce(T) -> Result<R, E> + 'static,
    {
        self.done_or_else(on_fulfilled, |reason| Err::<(), E>(reason));
    }

    /// Terminal consumption of both outcomes. Only a failure of the handlers
    /// themselves is fatal.
    pub fn done_or_else<R, S, F, G>(&self, on_fulfilled: F, on_rejected: G)
    where
        R: IntoResolution<E, Value = ()>,
        S: IntoResolution<E, Value = ()>,
        F: FnOnce(T) -> Result<R, E> + 'static,
        G: FnOnce(E) -> Result<S, E> + 'static,
    {
        let sink: Promise<(), E> = self.react(
            move |value| on_fulfilled(value).map(IntoResolution::into_resolution),
            move |reason| on_rejected(reason).map(IntoResolution::into_resolution),
        );
        sink.subscribe(|outcome| {
            if let Err(reason) = outcome {
                event_loop::report_fatal(Fatal::new(reason));
            }
        });
    }
}

impl<T: fmt::Debug + 'static, E: fmt::Debug + 'static> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.borrow().state {
            State::Pending => write!(f, "Promise {{ <pending> }}"),
            State::Fulfilled(value) => write!(f, "Promise {{ {:?} }}", value),
            State::Rejected(reason) => write!(f, "Promise {{ <rejected> {:?} }}", reason),
        }
    }
}

/// Run a user callback, turning a panic into a rejection
pub(crate) fn contain<R, E, F>(f: F) -> Result<R, E>
where
    E: From<Error>,
    F: FnOnce() -> Result<R, E>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let error = Error::from_panic(payload);
            tracing::warn!(%error, "callback panicked, rejecting");
            Err(E::from(error))
        }
    }
}

/// One-shot flag shared by a resolve/reject pair
#[derive(Clone)]
struct Guard(Rc<Cell<bool>>);

impl Guard {
    fn new() -> Self {
        Self(Rc::new(Cell::new(false)))
    }

    /// Returns `true` for the first caller only
    fn fire(&self) -> bool {
        !self.0.replace(true)
    }

    fn fired(&self) -> bool {
        self.0.get()
    }
}

/// Resolve handle bound to one promise.
///
/// Shares its "already resolved" flag with the [`Reject`] handed out
/// alongside it: whichever fires first wins, every later call is a no-op.
pub struct Resolve<T: 'static, E: 'static = Error> {
    target: Promise<T, E>,
    guard: Guard,
}

impl<T: 'static, E: 'static> Clone for Resolve<T, E> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            guard: self.guard.clone(),
        }
    }
}

impl<T, E> Resolve<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + fmt::Debug + 'static,
{
    /// Install `x` as the outcome, coercing promises and thenables
    pub fn resolve<R>(&self, x: R)
    where
        R: IntoResolution<E, Value = T>,
    {
        if self.guard.fire() {
            self.target.resolve_with(x.into_resolution());
        }
    }

    /// Install a plain value as the outcome
    pub fn fulfill(&self, value: T) {
        self.resolve(Resolution::Value(value));
    }

    /// Check if this handle or its paired reject already fired
    pub fn is_done(&self) -> bool {
        self.guard.fired()
    }
}

/// Reject handle bound to one promise. See [`Resolve`].
pub struct Reject<T: 'static, E: 'static = Error> {
    target: Promise<T, E>,
    guard: Guard,
}

impl<T: 'static, E: 'static> Clone for Reject<T, E> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            guard: self.guard.clone(),
        }
    }
}

impl<T, E> Reject<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + fmt::Debug + 'static,
{
    /// Reject with `reason`. The reason is never coerced.
    pub fn reject(&self, reason: E) {
        if self.guard.fire() {
            self.target.reject_with(reason);
        }
    }

    /// Check if this handle or its paired resolve already fired
    pub fn is_done(&self) -> bool {
        self.guard.fired()
    }
}
