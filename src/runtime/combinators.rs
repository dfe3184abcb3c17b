//! Promise combinators
//!
//! Every input is first coerced through [`Promise::resolve`], so plain
//! values, promises and thenables can be mixed freely.

use super::promise::Promise;
use super::resolution::IntoResolution;
use crate::error::Error;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

struct Slots<V> {
    values: Vec<Option<V>>,
    remaining: usize,
}

impl<V> Slots<V> {
    fn new(count: usize) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            values: (0..count).map(|_| None).collect(),
            remaining: count,
        }))
    }

    /// Store one result; returns every result once the last one arrived
    fn fill(&mut self, index: usize, value: V) -> Option<Vec<V>> {
        self.values[index] = Some(value);
        self.remaining -= 1;
        if self.remaining == 0 {
            Some(std::mem::take(&mut self.values).into_iter().flatten().collect())
        } else {
            None
        }
    }
}

fn coerce_all<T, E, I>(inputs: I) -> Vec<Promise<T, E>>
where
    T: Clone + 'static,
    E: Clone + From<Error> + fmt::Debug + 'static,
    I: IntoIterator,
    I::Item: IntoResolution<E, Value = T>,
{
    inputs.into_iter().map(|input| Promise::resolve(input)).collect()
}

/// Promise.all — fulfills with every result in input order, rejects with the
/// first rejection
pub fn all<T, E, I>(inputs: I) -> Promise<Vec<T>, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + fmt::Debug + 'static,
    I: IntoIterator,
    I::Item: IntoResolution<E, Value = T>,
{
    let inputs = coerce_all(inputs);
    if inputs.is_empty() {
        return Promise::fulfilled(Vec::new());
    }

    let result = Promise::pending();
    let slots = Slots::new(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        let result = result.clone();
        let slots = slots.clone();
        input.subscribe(move |outcome| match outcome {
            Ok(value) => {
                let complete = slots.borrow_mut().fill(index, value);
                if let Some(values) = complete {
                    result.fulfill(values);
                }
            }
            Err(reason) => result.reject_with(reason),
        });
    }
    result
}

/// Promise.race — settles like whichever input settles first
///
/// An empty input never settles.
pub fn race<T, E, I>(inputs: I) -> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + fmt::Debug + 'static,
    I: IntoIterator,
    I::Item: IntoResolution<E, Value = T>,
{
    let (result, resolve, reject) = Promise::deferred();
    for input in coerce_all(inputs) {
        let resolve = resolve.clone();
        let reject = reject.clone();
        input.subscribe(move |outcome| match outcome {
            Ok(value) => resolve.fulfill(value),
            Err(reason) => reject.reject(reason),
        });
    }
    result
}

/// Promise.allSettled — fulfills with every outcome in input order once all
/// inputs settled; never rejects
pub fn all_settled<T, E, I>(inputs: I) -> Promise<Vec<Result<T, E>>, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + fmt::Debug + 'static,
    I: IntoIterator,
    I::Item: IntoResolution<E, Value = T>,
{
    let inputs = coerce_all(inputs);
    if inputs.is_empty() {
        return Promise::fulfilled(Vec::new());
    }

    let result = Promise::pending();
    let slots = Slots::new(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        let result = result.clone();
        let slots = slots.clone();
        input.subscribe(move |outcome| {
            let complete = slots.borrow_mut().fill(index, outcome);
            if let Some(outcomes) = complete {
                result.fulfill(outcomes);
            }
        });
    }
    result
}
