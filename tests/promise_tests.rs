//! Integration tests for promise settlement, chaining and terminal consumption

mod common;
use common::{init_capturing, init_ticks, Log};
use pretty_assertions::assert_eq;
use quicksilver_promise::event_loop::{self, run_until_idle};
use quicksilver_promise::{Error, Promise, PromiseState, Resolution};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

mod settlement {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_settle_once() {
        let _ = init_capturing();
        let (promise, resolve, reject) = Promise::<i32>::deferred();
        resolve.fulfill(1);
        resolve.fulfill(2);
        reject.reject(Error::reason("late"));
        run_until_idle();

        assert_eq!(promise.state(), PromiseState::Fulfilled);
        assert_eq!(promise.value(), Some(1));
    }

    #[test]
    fn test_settle_once_rejected_first() {
        let _ = init_capturing();
        let promise: Promise<i32> = Promise::new(|resolve, reject| {
            reject.reject(Error::reason("first"));
            resolve.fulfill(1);
            reject.reject(Error::reason("second"));
            Ok(())
        });
        assert_eq!(promise.reason(), Some(Error::reason("first")));
    }

    #[test]
    fn test_resolving_with_pending_promise_locks_handles() {
        let _ = init_capturing();
        let (source, fulfill_source, _) = Promise::<i32>::deferred();
        let (promise, resolve, reject) = Promise::<i32>::deferred();

        resolve.resolve(source);
        reject.reject(Error::reason("ignored"));
        resolve.fulfill(0);
        assert!(promise.is_pending());

        fulfill_source.fulfill(5);
        run_until_idle();
        assert_eq!(promise.value(), Some(5));
    }

    #[test]
    fn test_self_resolution_through_handler() {
        let _ = init_capturing();
        let slot: Rc<RefCell<Option<Promise<i32>>>> = Rc::default();
        let own = slot.clone();
        let derived = Promise::<i32>::fulfilled(1).then(move |_| {
            Ok(own.borrow().clone().expect("derived promise stored"))
        });
        *slot.borrow_mut() = Some(derived.clone());

        run_until_idle();
        assert_eq!(derived.reason(), Some(Error::SelfResolution));
        assert_eq!(
            derived.reason().map(|e| e.to_string()),
            Some("TypeError: a promise may not resolve to itself".to_string())
        );
    }

    #[test]
    fn test_flattening_ten_thousand_pending_promises() {
        let _ = init_capturing();
        let (first, resolve_first, _) = Promise::<u32>::deferred();
        let mut last = resolve_first;
        for _ in 0..10_000 {
            let (next, resolve_next, _) = Promise::<u32>::deferred();
            last.resolve(next);
            last = resolve_next;
        }
        last.fulfill(42);

        run_until_idle();
        assert_eq!(first.value(), Some(42));
    }

    #[test]
    fn test_dropping_unsettled_follow_chain() {
        let _ = init_capturing();
        let (first, resolve_first, _) = Promise::<u32>::deferred();
        let mut last = resolve_first;
        for _ in 0..100_000 {
            let (next, resolve_next, _) = Promise::<u32>::deferred();
            last.resolve(next);
            last = resolve_next;
        }

        assert!(first.is_pending());
        drop(first);
        drop(last);
    }

    #[test]
    fn test_dropping_unsettled_then_chain() {
        let _ = init_capturing();
        let (source, resolve, _) = Promise::<u32>::deferred();
        let mut tail = source.map(|v| v + 1);
        for _ in 1..100_000 {
            tail = tail.map(|v| v + 1);
        }

        assert!(tail.is_pending());
        drop(tail);
        drop(source);
        drop(resolve);

        // the queue still works after a large release
        let after = Promise::<u32>::fulfilled(1).map(|v| v * 2);
        run_until_idle();
        assert_eq!(after.value(), Some(2));
    }

    #[test]
    fn test_resolve_returns_same_promise() {
        let _ = init_capturing();
        let (promise, _, _) = Promise::<i32>::deferred();
        assert!(Promise::resolve(promise.clone()).ptr_eq(&promise));

        let wrapped: Promise<i32> = Promise::resolve(Resolution::Value(3));
        assert_eq!(wrapped.value(), Some(3));
    }

    #[test]
    fn test_stats_count_promises() {
        let _ = init_capturing();
        let derived = Promise::<i32>::fulfilled(1).map(|v| v + 1);
        assert_eq!(event_loop::stats().total_promises_created, 2);
        assert_eq!(event_loop::stats().total_promises_settled, 1);

        run_until_idle();
        assert_eq!(derived.value(), Some(2));
        assert_eq!(event_loop::stats().total_promises_settled, 2);
    }
}

mod ordering {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_handlers_run_in_registration_order() {
        let _ = init_capturing();
        let log = Log::new();
        let (promise, resolve, _) = Promise::<i32>::deferred();
        for name in ["h1", "h2", "h3"] {
            let log = log.clone();
            promise.then(move |v| {
                log.push(format!("{} {}", name, v));
                Ok(())
            });
        }

        resolve.fulfill(7);
        run_until_idle();
        assert_eq!(log.entries(), vec!["h1 7", "h2 7", "h3 7"]);
    }

    #[test]
    fn test_then_on_settled_promise_is_asynchronous() {
        let _ = init_capturing();
        let called = Rc::new(Cell::new(false));
        let flag = called.clone();
        let promise: Promise<i32> = Promise::new(|resolve, _| {
            resolve.fulfill(1);
            Ok(())
        });
        promise.then(move |_| {
            flag.set(true);
            Ok(())
        });

        assert!(!called.get());
        run_until_idle();
        assert!(called.get());
    }

    #[test]
    fn test_chains_interleave_by_round() {
        let _ = init_capturing();
        let log = Log::new();
        let promise: Promise<()> = Promise::fulfilled(());

        for chain in ["a", "b"] {
            let first = log.clone();
            let second = log.clone();
            promise
                .then(move |_| {
                    first.push(format!("{}1", chain));
                    Ok(())
                })
                .then(move |_| {
                    second.push(format!("{}2", chain));
                    Ok(())
                });
        }

        run_until_idle();
        assert_eq!(log.entries(), vec!["a1", "b1", "a2", "b2"]);
    }
}

mod chaining {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_callback_result_forwards() {
        let _ = init_capturing();
        let result = Promise::<&str>::fulfilled("other")
            .then(|_| Ok(Resolution::Value("sentinel")))
            .map(|s| s.len());
        run_until_idle();
        assert_eq!(result.value(), Some(8));
    }

    #[test]
    fn test_rejection_skips_then() {
        let _ = init_capturing();
        let called = Rc::new(Cell::new(false));
        let flag = called.clone();
        let result = Promise::<i32>::reject(Error::reason("skip"))
            .then(move |v| {
                flag.set(true);
                Ok(Resolution::Value(v))
            })
            .catch(|reason| Ok(Resolution::Value(reason.to_string().len() as i32)));

        run_until_idle();
        assert!(!called.get());
        assert_eq!(result.value(), Some("Error: skip".len() as i32));
    }

    #[test]
    fn test_value_skips_catch() {
        let _ = init_capturing();
        let result = Promise::<i32>::fulfilled(4).catch(|_| Ok(Resolution::Value(0)));
        run_until_idle();
        assert_eq!(result.value(), Some(4));
    }

    #[test]
    fn test_returned_promise_is_awaited() {
        let _ = init_capturing();
        let (inner, resolve_inner, _) = Promise::<i32>::deferred();
        let result = Promise::<i32>::fulfilled(0).then(move |_| Ok(inner));

        run_until_idle();
        assert!(result.is_pending());
        resolve_inner.fulfill(11);
        run_until_idle();
        assert_eq!(result.value(), Some(11));
    }

    #[test]
    fn test_returned_rejection_switches_to_errback() {
        let _ = init_capturing();
        let result = Promise::<i32>::fulfilled(0)
            .then(|_| Ok(Promise::<i32>::reject(Error::reason("sentinel"))))
            .then_or_else(
                |_| Ok(Resolution::Value("fulfilled")),
                |reason| {
                    assert_eq!(reason, Error::reason("sentinel"));
                    Ok(Resolution::Value("rejected"))
                },
            );

        run_until_idle();
        assert_eq!(result.value(), Some("rejected"));
    }

    #[test]
    fn test_handler_error_rejects_downstream() {
        let _ = init_capturing();
        let result =
            Promise::<i32>::fulfilled(1).then(|_| Err::<Resolution<i32>, _>(Error::reason("thrown")));
        run_until_idle();
        assert_eq!(result.reason(), Some(Error::reason("thrown")));
    }

    #[test]
    fn test_rejection_handler_error_rejects_downstream() {
        let _ = init_capturing();
        let result = Promise::<i32>::reject(Error::reason("first"))
            .catch(|_| Err::<Resolution<i32>, _>(Error::reason("second")));
        run_until_idle();
        assert_eq!(result.reason(), Some(Error::reason("second")));
    }

    #[test]
    fn test_handler_panic_rejects_downstream() {
        let _ = init_capturing();
        let result: Promise<i32> =
            Promise::<i32>::fulfilled(1).then(|_| -> Result<Resolution<i32>, Error> {
                panic!("handler exploded")
            });
        run_until_idle();
        assert_eq!(result.reason(), Some(Error::Panicked("handler exploded".into())));
    }

    #[test]
    fn test_custom_error_type() {
        #[derive(Clone, Debug, PartialEq)]
        enum AppError {
            Core(Error),
            NotFound,
        }

        impl From<Error> for AppError {
            fn from(error: Error) -> Self {
                AppError::Core(error)
            }
        }

        let _ = init_capturing();
        let missing: Promise<i32, AppError> = Promise::reject(AppError::NotFound);
        let recovered = missing.catch(|reason| {
            assert_eq!(reason, AppError::NotFound);
            Ok(Resolution::Value(0))
        });
        let panicked: Promise<i32, AppError> =
            Promise::new(|_, _| panic!("no resolver for you"));

        run_until_idle();
        assert_eq!(recovered.value(), Some(0));
        assert_eq!(
            panicked.reason(),
            Some(AppError::Core(Error::Panicked("no resolver for you".into())))
        );
    }
}

mod done {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_done_rejection_is_fatal_exactly_once() {
        let (_, fatals) = init_capturing();
        Promise::<i32>::reject(Error::reason("unhandled")).done();

        run_until_idle();
        run_until_idle();
        assert_eq!(*fatals.borrow(), vec![Error::reason("unhandled")]);
        assert_eq!(event_loop::stats().fatal_rejections, 1);
    }

    #[test]
    fn test_done_fulfilled_is_quiet() {
        let (_, fatals) = init_capturing();
        let seen = Rc::new(Cell::new(0));
        let sink = seen.clone();
        Promise::<i32>::fulfilled(5).done_with(move |v| {
            sink.set(v);
            Ok(())
        });

        run_until_idle();
        assert_eq!(seen.get(), 5);
        assert!(fatals.borrow().is_empty());
    }

    #[test]
    fn test_done_handler_error_is_fatal() {
        let (_, fatals) = init_capturing();
        Promise::<()>::fulfilled(()).done_with(|_| Err::<(), _>(Error::reason("sentinel")));
        run_until_idle();
        assert_eq!(*fatals.borrow(), vec![Error::reason("sentinel")]);
    }

    #[test]
    fn test_done_handler_rejected_promise_is_fatal() {
        let (_, fatals) = init_capturing();
        Promise::<()>::fulfilled(())
            .done_with(|_| Ok(Promise::<()>::reject(Error::reason("sentinel"))));
        run_until_idle();
        assert_eq!(*fatals.borrow(), vec![Error::reason("sentinel")]);
    }

    #[test]
    fn test_done_rejection_handler_error_is_fatal() {
        let (_, fatals) = init_capturing();
        Promise::<()>::reject(Error::reason("original"))
            .done_or_else(|_| Ok(()), |_| Err::<(), _>(Error::reason("sentinel")));
        run_until_idle();
        assert_eq!(*fatals.borrow(), vec![Error::reason("sentinel")]);
    }

    #[test]
    fn test_done_rejection_handler_rejected_promise_is_fatal() {
        let (_, fatals) = init_capturing();
        Promise::<()>::reject(Error::reason("original")).done_or_else(
            |_| Ok(()),
            |_| Ok(Promise::<()>::reject(Error::reason("sentinel"))),
        );
        run_until_idle();
        assert_eq!(*fatals.borrow(), vec![Error::reason("sentinel")]);
    }

    #[test]
    fn test_done_handled_rejection_is_quiet() {
        let (_, fatals) = init_capturing();
        let log = Log::new();
        let sink = log.clone();
        Promise::<()>::reject(Error::reason("handled")).done_or_else(
            |_| Ok(()),
            move |reason| {
                sink.push(reason.to_string());
                Ok(())
            },
        );

        run_until_idle();
        assert_eq!(log.entries(), vec!["Error: handled"]);
        assert!(fatals.borrow().is_empty());
    }

    #[test]
    fn test_done_panic_policy_escapes_on_later_turn() {
        let ticks = init_ticks();
        Promise::<i32>::reject(Error::reason("escaped")).done();

        let outcome =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| ticks.run_until_idle()));
        let payload = outcome.expect_err("fatal rejection should panic");
        let message = payload
            .downcast_ref::<String>()
            .cloned()
            .unwrap_or_default();
        assert!(message.contains("escaped"), "unexpected panic: {}", message);
    }
}
