//! Benchmark scenarios
//!
//! Small promise workloads shared by the CLI and the criterion benches. Each
//! scenario returns a completion promise that fulfills once the workload
//! reached its final handler.

use crate::error::Error;
use crate::event_loop;
use crate::runtime::{Promise, Resolution};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// A promise workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scenario {
    /// Construct a promise that never settles
    CreatePending,
    /// Resolve from the resolver, observe with `done`
    ResolvePromise,
    /// Reject from the resolver, observe with `done`'s rejection handler
    RejectPromise,
    /// Reject, recover with `catch`, observe with `done`
    RejectThenResolve,
    /// Fulfilled promise followed by `n` pass-through `then`s
    ResolveChain(usize),
    /// Rejected promise followed by `n` rethrowing `catch`es
    RejectChain(usize),
}

impl Scenario {
    /// Every scenario, chains at the given length
    pub fn all(chain: usize) -> Vec<Scenario> {
        vec![
            Scenario::CreatePending,
            Scenario::ResolvePromise,
            Scenario::RejectPromise,
            Scenario::RejectThenResolve,
            Scenario::ResolveChain(chain),
            Scenario::RejectChain(chain),
        ]
    }

    /// Build the workload. Nothing runs until the queue is pumped.
    pub fn start(self) -> Promise<()> {
        let (finished, finish, _) = Promise::<()>::deferred();
        match self {
            Scenario::CreatePending => {
                let _pending: Promise<()> = Promise::new(|_, _| Ok(()));
                finish.fulfill(());
            }
            Scenario::ResolvePromise => {
                let promise: Promise<()> = Promise::new(|resolve, _| {
                    resolve.fulfill(());
                    Ok(())
                });
                promise.done_with(move |_| {
                    finish.fulfill(());
                    Ok(())
                });
            }
            Scenario::RejectPromise => {
                let promise: Promise<()> = Promise::new(|_, reject| {
                    reject.reject(Error::reason("benchmark"));
                    Ok(())
                });
                promise.done_or_else(
                    |_| Ok(()),
                    move |_| {
                        finish.fulfill(());
                        Ok(())
                    },
                );
            }
            Scenario::RejectThenResolve => {
                let promise: Promise<()> = Promise::new(|_, reject| {
                    reject.reject(Error::reason("benchmark"));
                    Ok(())
                });
                promise
                    .catch(|_| Ok(Resolution::Value(())))
                    .done_with(move |_| {
                        finish.fulfill(());
                        Ok(())
                    });
            }
            Scenario::ResolveChain(n) => {
                let mut promise: Promise<()> = Promise::fulfilled(());
                for _ in 0..n {
                    promise = promise.then(|v| Ok(Resolution::Value(v)));
                }
                promise.done_with(move |_| {
                    finish.fulfill(());
                    Ok(())
                });
            }
            Scenario::RejectChain(n) => {
                let mut promise: Promise<()> = Promise::reject(Error::reason("benchmark"));
                for _ in 0..n {
                    promise = promise.catch(|reason| Err::<(), Error>(reason));
                }
                promise.done_or_else(
                    |_| Ok(()),
                    move |_| {
                        finish.fulfill(());
                        Ok(())
                    },
                );
            }
        }
        finished
    }

    /// Run the workload `iterations` times against the built-in tick queue
    pub fn measure(self, iterations: usize) -> ScenarioReport {
        let began = Instant::now();
        let mut completed = 0;
        for _ in 0..iterations {
            let finished = self.start();
            event_loop::run_until_idle();
            if finished.value().is_some() {
                completed += 1;
            }
        }
        let elapsed = began.elapsed();
        tracing::info!(scenario = %self, iterations, completed, ?elapsed, "scenario finished");
        ScenarioReport::new(self, iterations, completed, elapsed)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scenario::CreatePending => write!(f, "create pending"),
            Scenario::ResolvePromise => write!(f, "resolve promise"),
            Scenario::RejectPromise => write!(f, "reject promise"),
            Scenario::RejectThenResolve => write!(f, "reject then resolve"),
            Scenario::ResolveChain(n) => write!(f, "resolve chain {}", n),
            Scenario::RejectChain(n) => write!(f, "reject chain {}", n),
        }
    }
}

/// Timing of one measured scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Display name of the scenario, chain length included
    pub name: String,
    /// Number of runs measured
    pub iterations: usize,
    /// Iterations whose completion promise fulfilled
    pub completed: usize,
    /// Wall-clock time for all runs, in microseconds
    pub total_micros: u128,
    /// Runs per second
    pub ops_per_sec: f64,
}

impl ScenarioReport {
    fn new(scenario: Scenario, iterations: usize, completed: usize, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        Self {
            name: scenario.to_string(),
            iterations,
            completed,
            total_micros: elapsed.as_micros(),
            ops_per_sec: if secs > 0.0 { iterations as f64 / secs } else { 0.0 },
        }
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<24} {:>10.0} op/s  ({} of {} completed)",
            self.name, self.ops_per_sec, self.completed, self.iterations
        )
    }
}
