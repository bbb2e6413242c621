// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Promise and microtask adapters.

use crate::adapters::reflect::get_property;
use crate::bridge::abi::{throw, Completion, ModuleHost};
use crate::bridge::functions::{call_function, Builtin, HostFunction};
use crate::bridge::handles::{alloc_handle, get};
use crate::bridge::promise::{self as promises, promise_handle, PromiseRef};
use crate::bridge::value::HostValue;
use crate::errors::{BridgeError, BridgeResult};

fn promise_at<H: ModuleHost + ?Sized>(host: &mut H, handle: u32) -> BridgeResult<PromiseRef> {
    match get(host, handle)? {
        HostValue::Promise(promise) => Ok(promise),
        other => Err(BridgeError::HandleTypeMismatch {
            handle,
            expected: "Promise",
            found: other.kind_name(),
        }),
    }
}

/// Non-function reaction arguments are ignored, as `then` ignores them.
fn reaction_at<H: ModuleHost + ?Sized>(host: &mut H, handle: u32) -> BridgeResult<Option<HostFunction>> {
    Ok(get(host, handle)?.as_function().cloned())
}

/// `new Promise(executor)`; the executor is lent for this call only.
pub fn promise_new<H: ModuleHost + ?Sized>(host: &mut H, code: u32, env: u32, shim: u32) -> BridgeResult<u32> {
    let promise = promises::new_with_executor(host, code, env, shim)?;
    promise_handle(host, promise)
}

/// `Promise.resolve(value)`.
pub fn promise_resolve<H: ModuleHost + ?Sized>(host: &mut H, value: u32) -> BridgeResult<u32> {
    let value = get(host, value)?;
    let promise = promises::promise_resolve(host, value);
    promise_handle(host, promise)
}

/// `promise.then(on_fulfilled)`.
pub fn then1<H: ModuleHost + ?Sized>(host: &mut H, promise: u32, on_fulfilled: u32) -> BridgeResult<u32> {
    let promise = promise_at(host, promise)?;
    let on_fulfilled = reaction_at(host, on_fulfilled)?;
    let derived = promises::then(host, &promise, on_fulfilled, None);
    promise_handle(host, derived)
}

/// `promise.then(on_fulfilled, on_rejected)`.
pub fn then2<H: ModuleHost + ?Sized>(
    host: &mut H,
    promise: u32,
    on_fulfilled: u32,
    on_rejected: u32,
) -> BridgeResult<u32> {
    let promise = promise_at(host, promise)?;
    let on_fulfilled = reaction_at(host, on_fulfilled)?;
    let on_rejected = reaction_at(host, on_rejected)?;
    let derived = promises::then(host, &promise, on_fulfilled, on_rejected);
    promise_handle(host, derived)
}

/// `queueMicrotask(callback)`.
pub fn queue_microtask<H: ModuleHost + ?Sized>(host: &mut H, callback: u32) -> BridgeResult<()> {
    let callback = get(host, callback)?;
    let queue = HostFunction::Builtin(Builtin::QueueMicrotask);
    match call_function(host, &queue, &HostValue::Undefined, &[callback])? {
        Completion::Normal(_) => Ok(()),
        Completion::Throw(error) => Err(throw(host, error)),
    }
}

/// `scope.queueMicrotask`, read as a property so the module can test for it.
pub fn queue_microtask_property<H: ModuleHost + ?Sized>(host: &mut H, scope: u32) -> BridgeResult<u32> {
    let scope = get(host, scope)?;
    let value = get_property(&scope, &HostValue::from("queueMicrotask")).map_err(|e| throw(host, e))?;
    alloc_handle(host, value)
}
