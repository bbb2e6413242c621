// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Cooperative event loop.
//!
//! A turn drains finalizers and microtasks until both are empty. Only then
//! is the next I/O completion applied, so settlement notifications from the
//! current call always run before callbacks derived from other I/O.

use std::time::Duration;

use futures::StreamExt;

use crate::bridge::abi::ModuleHost;
use crate::bridge::closures::drain_finalizers;
use crate::bridge::operations::{IoCompletion, Outcome};
use crate::bridge::promise::{run_microtask, PromiseRef};
use crate::bridge::value::HostValue;
use crate::errors::{BridgeError, BridgeResult};

/// Run finalizers and microtasks until neither has work left.
pub fn run_until_idle<H: ModuleHost + ?Sized>(host: &mut H) -> BridgeResult<()> {
    host.begin_turn();
    loop {
        drain_finalizers(host)?;
        match host.state().microtasks.pop_front() {
            Some(task) => run_microtask(host, task)?,
            None => break,
        }
    }
    Ok(())
}

/// Apply one I/O completion: settle its promise and retire its operation.
pub fn apply_completion<H: ModuleHost + ?Sized>(host: &mut H, completion: IoCompletion) -> BridgeResult<()> {
    let IoCompletion {
        promise,
        mut operation,
        outcome,
    } = completion;

    let result = if outcome.is_ok() {
        Outcome::Success
    } else {
        Outcome::Failure
    };
    operation.settle(result)?;

    let state = host.state();
    state.operations.record(result);
    match outcome {
        Ok(value) => promise.resolve(value, &mut state.microtasks),
        Err(reason) => promise.reject(reason, &mut state.microtasks),
    }
    operation.release()
}

/// Drive the loop until `promise` settles.
///
/// Each wait for I/O is bounded by `timeout`. A promise that is still
/// pending with no I/O outstanding can never settle and is reported as
/// [`BridgeError::Stalled`].
pub async fn settle<H: ModuleHost + ?Sized>(
    host: &mut H,
    promise: &PromiseRef,
    timeout: Duration,
) -> BridgeResult<Result<HostValue, HostValue>> {
    loop {
        run_until_idle(host)?;
        if let Some(outcome) = promise.outcome() {
            return Ok(outcome);
        }
        if host.state().io.is_empty() {
            return Err(BridgeError::Stalled {
                promise: promise.id(),
            });
        }

        let next = tokio::time::timeout(timeout, host.state().io.next())
            .await
            .map_err(|_| BridgeError::Timeout(timeout))?;
        if let Some(completion) = next {
            apply_completion(host, completion)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::operations::AsyncOperation;
    use crate::bridge::promise::{then, PromiseCell};
    use crate::bridge::testing::FakeModule;
    use futures::FutureExt;

    fn io_completion(module: &mut FakeModule, promise: &PromiseRef, value: &str) {
        let mut operation = AsyncOperation::new(module.state.next_id(), "test");
        operation.dispatch("test").unwrap();
        module.state.operations.dispatched += 1;
        let promise = promise.clone();
        let value = HostValue::from(value);
        module.state.io.push(
            async move {
                IoCompletion {
                    promise,
                    operation,
                    outcome: Ok(value),
                }
            }
            .boxed_local(),
        );
    }

    #[tokio::test]
    async fn test_settle_applies_io() {
        let mut module = FakeModule::new();
        let promise = PromiseCell::new(module.state.next_id());
        io_completion(&mut module, &promise, "response");

        let outcome = settle(&mut module, &promise, Duration::from_secs(1)).await.unwrap();

        assert_eq!(outcome.unwrap().as_str(), Some("response"));
        let stats = module.state.stats();
        assert_eq!(stats.operations_succeeded, 1);
        assert_eq!(stats.operations_in_flight, 0);
    }

    #[tokio::test]
    async fn test_microtasks_run_before_io() {
        let mut module = FakeModule::new();
        let log = module.record_calls();

        let io_promise = PromiseCell::new(module.state.next_id());
        io_completion(&mut module, &io_promise, "io");
        let io_reaction = module.recording_closure("io");
        let _ = then(&mut module, &io_promise, Some(io_reaction), None);

        let ready = PromiseCell::fulfilled(module.state.next_id(), HostValue::Null);
        let micro = module.recording_closure("microtask");
        let _ = then(&mut module, &ready, Some(micro), None);

        let done = then(&mut module, &io_promise, None, None);
        settle(&mut module, &done, Duration::from_secs(1)).await.unwrap().unwrap();

        assert_eq!(*log.borrow(), vec!["microtask".to_string(), "io".to_string()]);
    }

    #[tokio::test]
    async fn test_pending_without_io_is_stalled() {
        let mut module = FakeModule::new();
        let promise = PromiseCell::new(5);
        let err = settle(&mut module, &promise, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, BridgeError::Stalled { promise: 5 }));
    }

    #[tokio::test]
    async fn test_io_wait_is_bounded() {
        let mut module = FakeModule::new();
        let promise = PromiseCell::new(1);
        module
            .state
            .io
            .push(futures::future::pending::<IoCompletion>().boxed_local());

        let err = settle(&mut module, &promise, Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, BridgeError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_finalizers_run_each_turn() {
        let mut module = FakeModule::new();
        let cell = crate::bridge::closures::ClosureCell::wrap(
            &mut module,
            1,
            2,
            crate::bridge::testing::DTOR,
            crate::bridge::testing::SHIM,
        )
        .unwrap();
        drop(cell);

        let promise = PromiseCell::fulfilled(9, HostValue::Null);
        settle(&mut module, &promise, Duration::from_secs(1)).await.unwrap().unwrap();
        assert_eq!(module.destructor_calls.len(), 1);
    }
}
