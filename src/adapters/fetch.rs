// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Network adapters: headers, request construction, `fetch`, responses and
//! abort controllers.
//!
//! `fetch` and `response.text()` never block. Each dispatches an
//! [`AsyncOperation`] whose future is polled by the event loop; its
//! completion settles the promise the module received.

use std::rc::Rc;

use futures::FutureExt;

use crate::adapters::reflect::get_property;
use crate::bridge::abi::{throw, Completion, ModuleHost};
use crate::bridge::debug::catching;
use crate::bridge::functions::{Builtin, HostFunction};
use crate::bridge::handles::{alloc_handle, get};
use crate::bridge::memory::read_bytes;
use crate::bridge::operations::{AsyncOperation, IoCompletion};
use crate::bridge::promise::{PromiseCell, PromiseRef};
use crate::bridge::strings::{decode, write_to_retptr};
use crate::bridge::value::HostValue;
use crate::errors::{BridgeError, BridgeResult};
use crate::net::objects::{
    AbortController, HeaderList, Request, RequestCredentials, RequestMode, Response,
};
use crate::net::{FetchError, FetchResponse};

fn mismatch(handle: u32, expected: &'static str, found: &HostValue) -> BridgeError {
    BridgeError::HandleTypeMismatch {
        handle,
        expected,
        found: found.kind_name(),
    }
}

fn headers_at<H: ModuleHost + ?Sized>(host: &mut H, handle: u32) -> BridgeResult<Rc<HeaderList>> {
    match get(host, handle)? {
        HostValue::Headers(headers) => Ok(headers),
        other => Err(mismatch(handle, "Headers", &other)),
    }
}

fn response_at<H: ModuleHost + ?Sized>(host: &mut H, handle: u32) -> BridgeResult<Rc<Response>> {
    match get(host, handle)? {
        HostValue::Response(response) => Ok(response),
        other => Err(mismatch(handle, "Response", &other)),
    }
}

fn controller_at<H: ModuleHost + ?Sized>(host: &mut H, handle: u32) -> BridgeResult<Rc<AbortController>> {
    match get(host, handle)? {
        HostValue::AbortController(controller) => Ok(controller),
        other => Err(mismatch(handle, "AbortController", &other)),
    }
}

/// Set one `RequestInit` member. The init object is a plain object.
fn set_init<H: ModuleHost + ?Sized>(host: &mut H, init: u32, key: &str, value: HostValue) -> BridgeResult<()> {
    match get(host, init)? {
        HostValue::Object(object) => {
            object.set(key, value);
            Ok(())
        }
        other => Err(mismatch(init, "RequestInit", &other)),
    }
}

/// `new Headers()`.
pub fn headers_new<H: ModuleHost + ?Sized>(host: &mut H) -> BridgeResult<u32> {
    catching(host, |host| alloc_handle(host, HostValue::Headers(Rc::new(HeaderList::default()))))
}

/// `headers.append(name, value)`.
pub fn headers_append<H: ModuleHost + ?Sized>(
    host: &mut H,
    headers: u32,
    name_ptr: u32,
    name_len: u32,
    value_ptr: u32,
    value_len: u32,
) -> BridgeResult<()> {
    catching(host, |host| {
        let headers = headers_at(host, headers)?;
        let name = decode(host, name_ptr, name_len)?;
        let value = decode(host, value_ptr, value_len)?;
        headers.append(&name, &value).map_err(|e| throw(host, e))
    })
}

pub fn set_method<H: ModuleHost + ?Sized>(host: &mut H, init: u32, ptr: u32, len: u32) -> BridgeResult<()> {
    let method = decode(host, ptr, len)?;
    set_init(host, init, "method", HostValue::from(method))
}

pub fn set_body<H: ModuleHost + ?Sized>(host: &mut H, init: u32, body: u32) -> BridgeResult<()> {
    let body = get(host, body)?;
    set_init(host, init, "body", body)
}

pub fn set_headers<H: ModuleHost + ?Sized>(host: &mut H, init: u32, headers: u32) -> BridgeResult<()> {
    let headers = get(host, headers)?;
    set_init(host, init, "headers", headers)
}

pub fn set_credentials<H: ModuleHost + ?Sized>(host: &mut H, init: u32, value: i32) -> BridgeResult<()> {
    let credentials = RequestCredentials::from_discriminant(value)?;
    set_init(host, init, "credentials", credentials.as_str().into())
}

pub fn set_mode<H: ModuleHost + ?Sized>(host: &mut H, init: u32, value: i32) -> BridgeResult<()> {
    let mode = RequestMode::from_discriminant(value)?;
    set_init(host, init, "mode", mode.as_str().into())
}

pub fn set_signal<H: ModuleHost + ?Sized>(host: &mut H, init: u32, signal: u32) -> BridgeResult<()> {
    let signal = get(host, signal)?;
    set_init(host, init, "signal", signal)
}

/// `new Request(url, init)`.
pub fn request_new<H: ModuleHost + ?Sized>(host: &mut H, ptr: u32, len: u32, init: u32) -> BridgeResult<u32> {
    catching(host, |host| {
        let url = decode(host, ptr, len)?;
        let init = get(host, init)?;
        let request = Request::construct(&url, &init).map_err(|e| throw(host, e))?;
        alloc_handle(host, HostValue::Request(Rc::new(request)))
    })
}

/// `fetch(input)` against the global scope.
pub fn fetch<H: ModuleHost + ?Sized>(host: &mut H, input: u32) -> BridgeResult<u32> {
    let input = get(host, input)?;
    let completion = fetch_value(host, &input)?;
    promise_result(host, completion)
}

/// `scope.fetch(input)`, the form used when the module found a global scope.
pub fn fetch_with_scope<H: ModuleHost + ?Sized>(host: &mut H, scope: u32, input: u32) -> BridgeResult<u32> {
    let scope = get(host, scope)?;
    let input = get(host, input)?;
    let method = get_property(&scope, &HostValue::from("fetch")).map_err(|e| throw(host, e))?;
    if !matches!(method, HostValue::Function(HostFunction::Builtin(Builtin::Fetch))) {
        let error = HostValue::error("TypeError", format!("{}.fetch is not a function", scope.class_name()));
        return Err(throw(host, error));
    }
    let completion = fetch_value(host, &input)?;
    promise_result(host, completion)
}

fn promise_result<H: ModuleHost + ?Sized>(host: &mut H, completion: Completion) -> BridgeResult<u32> {
    match completion {
        Completion::Normal(value) => alloc_handle(host, value),
        Completion::Throw(error) => Err(throw(host, error)),
    }
}

/// Start a fetch for `input`, a `Request` or anything convertible to a URL.
///
/// Always completes normally with a promise: invalid input rejects it
/// rather than throwing, and an already aborted signal rejects it with the
/// signal's reason without touching the network.
pub fn fetch_value<H: ModuleHost + ?Sized>(host: &mut H, input: &HostValue) -> BridgeResult<Completion> {
    let state = host.state();
    let promise = PromiseCell::new(state.next_id());

    let request = match input {
        HostValue::Request(request) => request.clone(),
        other => match Request::construct(&other.to_display_string(), &HostValue::Undefined) {
            Ok(request) => Rc::new(request),
            Err(error) => {
                promise.reject(error, &mut state.microtasks);
                return Ok(Completion::Normal(HostValue::Promise(promise)));
            }
        },
    };

    let mut operation = AsyncOperation::new(state.next_id(), "fetch");
    operation.dispatch(request.url.as_str())?;
    state.operations.dispatched += 1;

    let fetcher = state.fetcher.clone();
    let signal = request.signal.clone();
    let outgoing = request.to_fetch_request();
    let settles = promise.clone();

    let future = async move {
        let outcome = match signal {
            Some(signal) if signal.aborted() => Err(signal.reason()),
            Some(signal) => {
                let token = signal.token();
                tokio::select! {
                    result = fetcher.fetch(outgoing) => fetch_outcome(result),
                    _ = token.cancelled() => Err(signal.reason()),
                }
            }
            None => fetch_outcome(fetcher.fetch(outgoing).await),
        };
        IoCompletion {
            promise: settles,
            operation,
            outcome,
        }
    };
    state.io.push(future.boxed_local());

    Ok(Completion::Normal(HostValue::Promise(promise)))
}

fn fetch_outcome(result: Result<FetchResponse, FetchError>) -> Result<HostValue, HostValue> {
    match result {
        Ok(response) => Ok(HostValue::Response(Rc::new(Response::from_fetch(response)))),
        Err(e) => Err(HostValue::error_at(
            "TypeError",
            format!("Failed to fetch: {}", e),
            "fetch",
        )),
    }
}

/// `value instanceof Response`.
pub fn instanceof_response<H: ModuleHost + ?Sized>(host: &mut H, value: u32) -> BridgeResult<i32> {
    Ok(matches!(get(host, value)?, HostValue::Response(_)) as i32)
}

pub fn status<H: ModuleHost + ?Sized>(host: &mut H, response: u32) -> BridgeResult<i32> {
    Ok(response_at(host, response)?.status as i32)
}

pub fn url<H: ModuleHost + ?Sized>(host: &mut H, retptr: u32, response: u32) -> BridgeResult<()> {
    let response = response_at(host, response)?;
    write_to_retptr(host, retptr, Some(&response.url))
}

/// `response.headers`, aliasing the response's own list.
pub fn headers<H: ModuleHost + ?Sized>(host: &mut H, response: u32) -> BridgeResult<u32> {
    let response = response_at(host, response)?;
    alloc_handle(host, HostValue::Headers(response.headers.clone()))
}

/// `response.text()`.
///
/// The body is consumed on the first call; a second call throws.
/// Malformed UTF-8 is replaced rather than rejected.
pub fn text<H: ModuleHost + ?Sized>(host: &mut H, response: u32) -> BridgeResult<u32> {
    catching(host, |host| {
        let response = response_at(host, response)?;
        let Some(body) = response.take_body() else {
            let error = HostValue::error_at(
                "TypeError",
                "Failed to execute 'text' on 'Response': body stream already read",
                "Response.text",
            );
            return Err(throw(host, error));
        };

        let state = host.state();
        let promise: PromiseRef = PromiseCell::new(state.next_id());
        let mut operation = AsyncOperation::new(state.next_id(), "text");
        operation.dispatch(&response.url)?;
        state.operations.dispatched += 1;

        let settles = promise.clone();
        let future = async move {
            let text = String::from_utf8_lossy(&body).into_owned();
            IoCompletion {
                promise: settles,
                operation,
                outcome: Ok(HostValue::from(text)),
            }
        };
        state.io.push(future.boxed_local());
        alloc_handle(host, HostValue::Promise(promise))
    })
}

/// `new AbortController()`.
pub fn abort_controller_new<H: ModuleHost + ?Sized>(host: &mut H) -> BridgeResult<u32> {
    catching(host, |host| alloc_handle(host, HostValue::AbortController(Rc::new(AbortController::default()))))
}

/// `controller.signal`.
pub fn signal<H: ModuleHost + ?Sized>(host: &mut H, controller: u32) -> BridgeResult<u32> {
    let controller = controller_at(host, controller)?;
    alloc_handle(host, HostValue::AbortSignal(controller.signal.clone()))
}

/// `controller.abort()`.
pub fn abort<H: ModuleHost + ?Sized>(host: &mut H, controller: u32) -> BridgeResult<()> {
    controller_at(host, controller)?.abort(None);
    Ok(())
}

/// `new Uint8Array(bytes)` copied from module memory.
pub fn uint8array_from_slice<H: ModuleHost + ?Sized>(host: &mut H, ptr: u32, len: u32) -> BridgeResult<u32> {
    let bytes = read_bytes(host, ptr, len)?;
    alloc_handle(host, HostValue::Bytes(Rc::from(bytes)))
}
