// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Call adapter table.
//!
//! Every host capability the module may import is listed in [`Adapter`],
//! keyed by a stable import name under [`IMPORT_MODULE`]. Adapters read their
//! arguments as handles or `(ptr, len)` pairs, do the host work, and hand back
//! handles or scalars. Registration into a wasmtime [`Linker`] is a single
//! exhaustive match so a new adapter cannot be listed without being wired.

pub mod fetch;
pub mod globals;
pub mod intrinsics;
pub mod promise;
pub mod reflect;

use wasmtime::{AsContextMut, Caller, Linker};

use crate::bridge::BridgeState;
use crate::config::GlobalScopeKind;
use crate::errors::{BridgeError, BridgeResult};

/// Import module namespace the adapters are linked under.
pub const IMPORT_MODULE: &str = "wbg";

/// Every import the host provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Adapter {
    // Intrinsics
    ObjectDropRef,
    ObjectCloneRef,
    StringNew,
    StringGet,
    NumberNew,
    NumberGet,
    DebugString,
    DisplayString,
    IsFunction,
    IsObject,
    IsUndefined,
    IsString,
    Throw,
    Rethrow,
    ClosureNew,
    CbDrop,
    InitExternrefTable,
    ExternrefTableGrow,
    ConsoleError,
    ErrorNew,
    Stack,
    // Reflection
    ObjectNew,
    Set,
    ReflectGet,
    ReflectHas,
    ReflectSet,
    Stringify,
    Call0,
    Call1,
    NewFunction,
    Iterator,
    NextProperty,
    Next,
    Done,
    Value,
    // Promises
    PromiseNew,
    PromiseResolve,
    Then1,
    Then2,
    QueueMicrotask,
    QueueMicrotaskProperty,
    // Network
    HeadersNew,
    HeadersAppend,
    SetMethod,
    SetBody,
    SetHeaders,
    SetCredentials,
    SetMode,
    SetSignal,
    RequestNew,
    Fetch,
    FetchWithScope,
    InstanceofResponse,
    Status,
    Url,
    ResponseHeaders,
    Text,
    AbortControllerNew,
    Signal,
    Abort,
    Uint8ArrayFromSlice,
    // Global scope
    StaticAccessorGlobal,
    StaticAccessorGlobalThis,
    StaticAccessorSelf,
    StaticAccessorWindow,
}

impl Adapter {
    pub const ALL: &'static [Adapter] = &[
        Adapter::ObjectDropRef,
        Adapter::ObjectCloneRef,
        Adapter::StringNew,
        Adapter::StringGet,
        Adapter::NumberNew,
        Adapter::NumberGet,
        Adapter::DebugString,
        Adapter::DisplayString,
        Adapter::IsFunction,
        Adapter::IsObject,
        Adapter::IsUndefined,
        Adapter::IsString,
        Adapter::Throw,
        Adapter::Rethrow,
        Adapter::ClosureNew,
        Adapter::CbDrop,
        Adapter::InitExternrefTable,
        Adapter::ExternrefTableGrow,
        Adapter::ConsoleError,
        Adapter::ErrorNew,
        Adapter::Stack,
        Adapter::ObjectNew,
        Adapter::Set,
        Adapter::ReflectGet,
        Adapter::ReflectHas,
        Adapter::ReflectSet,
        Adapter::Stringify,
        Adapter::Call0,
        Adapter::Call1,
        Adapter::NewFunction,
        Adapter::Iterator,
        Adapter::NextProperty,
        Adapter::Next,
        Adapter::Done,
        Adapter::Value,
        Adapter::PromiseNew,
        Adapter::PromiseResolve,
        Adapter::Then1,
        Adapter::Then2,
        Adapter::QueueMicrotask,
        Adapter::QueueMicrotaskProperty,
        Adapter::HeadersNew,
        Adapter::HeadersAppend,
        Adapter::SetMethod,
        Adapter::SetBody,
        Adapter::SetHeaders,
        Adapter::SetCredentials,
        Adapter::SetMode,
        Adapter::SetSignal,
        Adapter::RequestNew,
        Adapter::Fetch,
        Adapter::FetchWithScope,
        Adapter::InstanceofResponse,
        Adapter::Status,
        Adapter::Url,
        Adapter::ResponseHeaders,
        Adapter::Text,
        Adapter::AbortControllerNew,
        Adapter::Signal,
        Adapter::Abort,
        Adapter::Uint8ArrayFromSlice,
        Adapter::StaticAccessorGlobal,
        Adapter::StaticAccessorGlobalThis,
        Adapter::StaticAccessorSelf,
        Adapter::StaticAccessorWindow,
    ];

    pub fn import_name(self) -> &'static str {
        match self {
            Adapter::ObjectDropRef => "__wbindgen_object_drop_ref",
            Adapter::ObjectCloneRef => "__wbindgen_object_clone_ref",
            Adapter::StringNew => "__wbindgen_string_new",
            Adapter::StringGet => "__wbindgen_string_get",
            Adapter::NumberNew => "__wbindgen_number_new",
            Adapter::NumberGet => "__wbindgen_number_get",
            Adapter::DebugString => "__wbindgen_debug_string",
            Adapter::DisplayString => "__wbg_String",
            Adapter::IsFunction => "__wbindgen_is_function",
            Adapter::IsObject => "__wbindgen_is_object",
            Adapter::IsUndefined => "__wbindgen_is_undefined",
            Adapter::IsString => "__wbindgen_is_string",
            Adapter::Throw => "__wbindgen_throw",
            Adapter::Rethrow => "__wbindgen_rethrow",
            Adapter::ClosureNew => "__wbindgen_closure_new",
            Adapter::CbDrop => "__wbindgen_cb_drop",
            Adapter::InitExternrefTable => "__wbindgen_init_externref_table",
            Adapter::ExternrefTableGrow => "__wbindgen_externref_table_grow",
            Adapter::ConsoleError => "__wbg_error",
            Adapter::ErrorNew => "__wbg_new_error",
            Adapter::Stack => "__wbg_stack",
            Adapter::ObjectNew => "__wbg_new_object",
            Adapter::Set => "__wbg_set",
            Adapter::ReflectGet => "__wbg_reflect_get",
            Adapter::ReflectHas => "__wbg_reflect_has",
            Adapter::ReflectSet => "__wbg_reflect_set",
            Adapter::Stringify => "__wbg_stringify",
            Adapter::Call0 => "__wbg_call0",
            Adapter::Call1 => "__wbg_call1",
            Adapter::NewFunction => "__wbg_new_function",
            Adapter::Iterator => "__wbg_iterator",
            Adapter::NextProperty => "__wbg_next_property",
            Adapter::Next => "__wbg_next",
            Adapter::Done => "__wbg_done",
            Adapter::Value => "__wbg_value",
            Adapter::PromiseNew => "__wbg_promise_new",
            Adapter::PromiseResolve => "__wbg_promise_resolve",
            Adapter::Then1 => "__wbg_then1",
            Adapter::Then2 => "__wbg_then2",
            Adapter::QueueMicrotask => "__wbg_queue_microtask",
            Adapter::QueueMicrotaskProperty => "__wbg_queue_microtask_property",
            Adapter::HeadersNew => "__wbg_headers_new",
            Adapter::HeadersAppend => "__wbg_headers_append",
            Adapter::SetMethod => "__wbg_set_method",
            Adapter::SetBody => "__wbg_set_body",
            Adapter::SetHeaders => "__wbg_set_headers",
            Adapter::SetCredentials => "__wbg_set_credentials",
            Adapter::SetMode => "__wbg_set_mode",
            Adapter::SetSignal => "__wbg_set_signal",
            Adapter::RequestNew => "__wbg_request_new",
            Adapter::Fetch => "__wbg_fetch",
            Adapter::FetchWithScope => "__wbg_fetch_with_scope",
            Adapter::InstanceofResponse => "__wbg_instanceof_response",
            Adapter::Status => "__wbg_status",
            Adapter::Url => "__wbg_url",
            Adapter::ResponseHeaders => "__wbg_headers",
            Adapter::Text => "__wbg_text",
            Adapter::AbortControllerNew => "__wbg_abort_controller_new",
            Adapter::Signal => "__wbg_signal",
            Adapter::Abort => "__wbg_abort",
            Adapter::Uint8ArrayFromSlice => "__wbg_uint8array_new_from_slice",
            Adapter::StaticAccessorGlobal => "__wbg_static_accessor_GLOBAL",
            Adapter::StaticAccessorGlobalThis => "__wbg_static_accessor_GLOBAL_THIS",
            Adapter::StaticAccessorSelf => "__wbg_static_accessor_SELF",
            Adapter::StaticAccessorWindow => "__wbg_static_accessor_WINDOW",
        }
    }

    pub fn from_import_name(name: &str) -> Option<Adapter> {
        Adapter::ALL.iter().copied().find(|adapter| adapter.import_name() == name)
    }
}

/// Reject modules that import anything the adapter table does not provide.
///
/// Imports outside [`IMPORT_MODULE`] are reported too; the bridge is the
/// module's only source of host capabilities.
pub fn check_imports(module: &wasmtime::Module) -> BridgeResult<()> {
    for import in module.imports() {
        if !matches!(import.ty(), wasmtime::ExternType::Func(_)) {
            continue;
        }
        if import.module() != IMPORT_MODULE || Adapter::from_import_name(import.name()).is_none() {
            return Err(BridgeError::UnknownImport {
                module: import.module().to_string(),
                name: import.name().to_string(),
            });
        }
    }
    Ok(())
}

/// Register every adapter in `linker`.
pub fn add_to_linker(linker: &mut Linker<BridgeState>) -> BridgeResult<()> {
    for adapter in Adapter::ALL {
        register(linker, *adapter)?;
    }
    tracing::debug!("Registered {} bridge adapters under '{}'", Adapter::ALL.len(), IMPORT_MODULE);
    Ok(())
}

fn register(linker: &mut Linker<BridgeState>, adapter: Adapter) -> BridgeResult<()> {
    let name = adapter.import_name();
    match adapter {
        Adapter::ObjectDropRef => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, handle: u32| -> wasmtime::Result<()> {
                Ok(intrinsics::object_drop_ref(&mut caller.as_context_mut(), handle)?)
            },
        ),
        Adapter::ObjectCloneRef => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, handle: u32| -> wasmtime::Result<u32> {
                Ok(intrinsics::object_clone_ref(&mut caller.as_context_mut(), handle)?)
            },
        ),
        Adapter::StringNew => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, ptr: u32, len: u32| -> wasmtime::Result<u32> {
                Ok(intrinsics::string_new(&mut caller.as_context_mut(), ptr, len)?)
            },
        ),
        Adapter::StringGet => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, retptr: u32, handle: u32| -> wasmtime::Result<()> {
                Ok(intrinsics::string_get(&mut caller.as_context_mut(), retptr, handle)?)
            },
        ),
        Adapter::NumberNew => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, value: f64| -> wasmtime::Result<u32> {
                Ok(intrinsics::number_new(&mut caller.as_context_mut(), value)?)
            },
        ),
        Adapter::NumberGet => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, retptr: u32, handle: u32| -> wasmtime::Result<()> {
                Ok(intrinsics::number_get(&mut caller.as_context_mut(), retptr, handle)?)
            },
        ),
        Adapter::DebugString => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, retptr: u32, handle: u32| -> wasmtime::Result<()> {
                Ok(intrinsics::debug_string(&mut caller.as_context_mut(), retptr, handle)?)
            },
        ),
        Adapter::DisplayString => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, retptr: u32, handle: u32| -> wasmtime::Result<()> {
                Ok(intrinsics::display_string(&mut caller.as_context_mut(), retptr, handle)?)
            },
        ),
        Adapter::IsFunction => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, handle: u32| -> wasmtime::Result<i32> {
                Ok(intrinsics::is_function(&mut caller.as_context_mut(), handle)?)
            },
        ),
        Adapter::IsObject => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, handle: u32| -> wasmtime::Result<i32> {
                Ok(intrinsics::is_object(&mut caller.as_context_mut(), handle)?)
            },
        ),
        Adapter::IsUndefined => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, handle: u32| -> wasmtime::Result<i32> {
                Ok(intrinsics::is_undefined(&mut caller.as_context_mut(), handle)?)
            },
        ),
        Adapter::IsString => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, handle: u32| -> wasmtime::Result<i32> {
                Ok(intrinsics::is_string(&mut caller.as_context_mut(), handle)?)
            },
        ),
        Adapter::Throw => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, ptr: u32, len: u32| -> wasmtime::Result<()> {
                Ok(intrinsics::throw_message(&mut caller.as_context_mut(), ptr, len)?)
            },
        ),
        Adapter::Rethrow => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, handle: u32| -> wasmtime::Result<()> {
                Ok(intrinsics::rethrow(&mut caller.as_context_mut(), handle)?)
            },
        ),
        Adapter::ClosureNew => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>,
             code: u32,
             env: u32,
             dtor: u32,
             shim: u32|
             -> wasmtime::Result<u32> {
                Ok(intrinsics::closure_new(&mut caller.as_context_mut(), code, env, dtor, shim)?)
            },
        ),
        Adapter::CbDrop => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, handle: u32| -> wasmtime::Result<i32> {
                Ok(intrinsics::cb_drop(&mut caller.as_context_mut(), handle)?)
            },
        ),
        Adapter::InitExternrefTable => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>| -> wasmtime::Result<()> {
                Ok(intrinsics::init_externref_table(&mut caller.as_context_mut())?)
            },
        ),
        Adapter::ExternrefTableGrow => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, delta: u32| -> wasmtime::Result<i32> {
                Ok(intrinsics::externref_table_grow(&mut caller.as_context_mut(), delta)?)
            },
        ),
        Adapter::ConsoleError => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, ptr: u32, len: u32| -> wasmtime::Result<()> {
                Ok(intrinsics::console_error(&mut caller.as_context_mut(), ptr, len)?)
            },
        ),
        Adapter::ErrorNew => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>| -> wasmtime::Result<u32> {
                Ok(intrinsics::error_new(&mut caller.as_context_mut())?)
            },
        ),
        Adapter::Stack => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, retptr: u32, handle: u32| -> wasmtime::Result<()> {
                Ok(intrinsics::stack(&mut caller.as_context_mut(), retptr, handle)?)
            },
        ),
        Adapter::ObjectNew => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>| -> wasmtime::Result<u32> {
                Ok(reflect::new_object(&mut caller.as_context_mut())?)
            },
        ),
        Adapter::Set => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, target: u32, key: u32, value: u32| -> wasmtime::Result<()> {
                Ok(reflect::set(&mut caller.as_context_mut(), target, key, value)?)
            },
        ),
        Adapter::ReflectGet => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, target: u32, key: u32| -> wasmtime::Result<u32> {
                Ok(reflect::reflect_get(&mut caller.as_context_mut(), target, key)?)
            },
        ),
        Adapter::ReflectHas => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, target: u32, key: u32| -> wasmtime::Result<i32> {
                Ok(reflect::reflect_has(&mut caller.as_context_mut(), target, key)?)
            },
        ),
        Adapter::ReflectSet => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, target: u32, key: u32, value: u32| -> wasmtime::Result<i32> {
                Ok(reflect::reflect_set(&mut caller.as_context_mut(), target, key, value)?)
            },
        ),
        Adapter::Stringify => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, value: u32| -> wasmtime::Result<u32> {
                Ok(reflect::stringify(&mut caller.as_context_mut(), value)?)
            },
        ),
        Adapter::Call0 => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, function: u32, this: u32| -> wasmtime::Result<u32> {
                Ok(reflect::call0(&mut caller.as_context_mut(), function, this)?)
            },
        ),
        Adapter::Call1 => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, function: u32, this: u32, arg: u32| -> wasmtime::Result<u32> {
                Ok(reflect::call1(&mut caller.as_context_mut(), function, this, arg)?)
            },
        ),
        Adapter::NewFunction => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, ptr: u32, len: u32| -> wasmtime::Result<u32> {
                Ok(reflect::new_function(&mut caller.as_context_mut(), ptr, len)?)
            },
        ),
        Adapter::Iterator => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>| -> wasmtime::Result<u32> {
                Ok(reflect::iterator(&mut caller.as_context_mut())?)
            },
        ),
        Adapter::NextProperty => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, iterator: u32| -> wasmtime::Result<u32> {
                Ok(reflect::next_property(&mut caller.as_context_mut(), iterator)?)
            },
        ),
        Adapter::Next => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, iterator: u32| -> wasmtime::Result<u32> {
                Ok(reflect::next(&mut caller.as_context_mut(), iterator)?)
            },
        ),
        Adapter::Done => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, result: u32| -> wasmtime::Result<i32> {
                Ok(reflect::done(&mut caller.as_context_mut(), result)?)
            },
        ),
        Adapter::Value => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, result: u32| -> wasmtime::Result<u32> {
                Ok(reflect::value(&mut caller.as_context_mut(), result)?)
            },
        ),
        Adapter::PromiseNew => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, code: u32, env: u32, shim: u32| -> wasmtime::Result<u32> {
                Ok(promise::promise_new(&mut caller.as_context_mut(), code, env, shim)?)
            },
        ),
        Adapter::PromiseResolve => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, value: u32| -> wasmtime::Result<u32> {
                Ok(promise::promise_resolve(&mut caller.as_context_mut(), value)?)
            },
        ),
        Adapter::Then1 => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, promise: u32, on_fulfilled: u32| -> wasmtime::Result<u32> {
                Ok(promise::then1(&mut caller.as_context_mut(), promise, on_fulfilled)?)
            },
        ),
        Adapter::Then2 => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>,
             promise: u32,
             on_fulfilled: u32,
             on_rejected: u32|
             -> wasmtime::Result<u32> {
                Ok(promise::then2(&mut caller.as_context_mut(), promise, on_fulfilled, on_rejected)?)
            },
        ),
        Adapter::QueueMicrotask => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, callback: u32| -> wasmtime::Result<()> {
                Ok(promise::queue_microtask(&mut caller.as_context_mut(), callback)?)
            },
        ),
        Adapter::QueueMicrotaskProperty => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, scope: u32| -> wasmtime::Result<u32> {
                Ok(promise::queue_microtask_property(&mut caller.as_context_mut(), scope)?)
            },
        ),
        Adapter::HeadersNew => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>| -> wasmtime::Result<u32> {
                Ok(fetch::headers_new(&mut caller.as_context_mut())?)
            },
        ),
        Adapter::HeadersAppend => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>,
             headers: u32,
             name_ptr: u32,
             name_len: u32,
             value_ptr: u32,
             value_len: u32|
             -> wasmtime::Result<()> {
                Ok(fetch::headers_append(
                    &mut caller.as_context_mut(),
                    headers,
                    name_ptr,
                    name_len,
                    value_ptr,
                    value_len,
                )?)
            },
        ),
        Adapter::SetMethod => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, init: u32, ptr: u32, len: u32| -> wasmtime::Result<()> {
                Ok(fetch::set_method(&mut caller.as_context_mut(), init, ptr, len)?)
            },
        ),
        Adapter::SetBody => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, init: u32, body: u32| -> wasmtime::Result<()> {
                Ok(fetch::set_body(&mut caller.as_context_mut(), init, body)?)
            },
        ),
        Adapter::SetHeaders => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, init: u32, headers: u32| -> wasmtime::Result<()> {
                Ok(fetch::set_headers(&mut caller.as_context_mut(), init, headers)?)
            },
        ),
        Adapter::SetCredentials => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, init: u32, value: i32| -> wasmtime::Result<()> {
                Ok(fetch::set_credentials(&mut caller.as_context_mut(), init, value)?)
            },
        ),
        Adapter::SetMode => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, init: u32, value: i32| -> wasmtime::Result<()> {
                Ok(fetch::set_mode(&mut caller.as_context_mut(), init, value)?)
            },
        ),
        Adapter::SetSignal => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, init: u32, signal: u32| -> wasmtime::Result<()> {
                Ok(fetch::set_signal(&mut caller.as_context_mut(), init, signal)?)
            },
        ),
        Adapter::RequestNew => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, ptr: u32, len: u32, init: u32| -> wasmtime::Result<u32> {
                Ok(fetch::request_new(&mut caller.as_context_mut(), ptr, len, init)?)
            },
        ),
        Adapter::Fetch => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, input: u32| -> wasmtime::Result<u32> {
                Ok(fetch::fetch(&mut caller.as_context_mut(), input)?)
            },
        ),
        Adapter::FetchWithScope => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, scope: u32, input: u32| -> wasmtime::Result<u32> {
                Ok(fetch::fetch_with_scope(&mut caller.as_context_mut(), scope, input)?)
            },
        ),
        Adapter::InstanceofResponse => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, value: u32| -> wasmtime::Result<i32> {
                Ok(fetch::instanceof_response(&mut caller.as_context_mut(), value)?)
            },
        ),
        Adapter::Status => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, response: u32| -> wasmtime::Result<i32> {
                Ok(fetch::status(&mut caller.as_context_mut(), response)?)
            },
        ),
        Adapter::Url => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, retptr: u32, response: u32| -> wasmtime::Result<()> {
                Ok(fetch::url(&mut caller.as_context_mut(), retptr, response)?)
            },
        ),
        Adapter::ResponseHeaders => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, response: u32| -> wasmtime::Result<u32> {
                Ok(fetch::headers(&mut caller.as_context_mut(), response)?)
            },
        ),
        Adapter::Text => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, response: u32| -> wasmtime::Result<u32> {
                Ok(fetch::text(&mut caller.as_context_mut(), response)?)
            },
        ),
        Adapter::AbortControllerNew => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>| -> wasmtime::Result<u32> {
                Ok(fetch::abort_controller_new(&mut caller.as_context_mut())?)
            },
        ),
        Adapter::Signal => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, controller: u32| -> wasmtime::Result<u32> {
                Ok(fetch::signal(&mut caller.as_context_mut(), controller)?)
            },
        ),
        Adapter::Abort => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, controller: u32| -> wasmtime::Result<()> {
                Ok(fetch::abort(&mut caller.as_context_mut(), controller)?)
            },
        ),
        Adapter::Uint8ArrayFromSlice => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>, ptr: u32, len: u32| -> wasmtime::Result<u32> {
                Ok(fetch::uint8array_from_slice(&mut caller.as_context_mut(), ptr, len)?)
            },
        ),
        Adapter::StaticAccessorGlobal => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>| -> wasmtime::Result<u32> {
                Ok(globals::static_accessor(&mut caller.as_context_mut(), GlobalScopeKind::Global)?)
            },
        ),
        Adapter::StaticAccessorGlobalThis => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>| -> wasmtime::Result<u32> {
                Ok(globals::static_accessor(&mut caller.as_context_mut(), GlobalScopeKind::GlobalThis)?)
            },
        ),
        Adapter::StaticAccessorSelf => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>| -> wasmtime::Result<u32> {
                Ok(globals::static_accessor(&mut caller.as_context_mut(), GlobalScopeKind::SelfScope)?)
            },
        ),
        Adapter::StaticAccessorWindow => linker.func_wrap(
            IMPORT_MODULE,
            name,
            |mut caller: Caller<'_, BridgeState>| -> wasmtime::Result<u32> {
                Ok(globals::static_accessor(&mut caller.as_context_mut(), GlobalScopeKind::Window)?)
            },
        ),
    }?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_import_names_are_unique() {
        let names: HashSet<&str> = Adapter::ALL.iter().map(|a| a.import_name()).collect();
        assert_eq!(names.len(), Adapter::ALL.len());
    }

    #[test]
    fn test_from_import_name_finds_every_adapter() {
        for adapter in Adapter::ALL {
            assert_eq!(Adapter::from_import_name(adapter.import_name()), Some(*adapter));
        }
        assert_eq!(Adapter::from_import_name("__wbg_eval"), None);
    }

    #[test]
    fn test_all_adapters_register() {
        let engine = wasmtime::Engine::default();
        let mut linker = Linker::<BridgeState>::new(&engine);
        add_to_linker(&mut linker).unwrap();
        assert!(add_to_linker(&mut linker).is_err(), "duplicate registration is rejected");
    }

    #[test]
    fn test_check_imports_rejects_unknown_names() {
        let engine = wasmtime::Engine::default();
        let wasm = wat::parse_str(
            r#"(module (import "wbg" "__wbindgen_throw" (func (param i32 i32))))"#,
        )
        .unwrap();
        let module = wasmtime::Module::new(&engine, &wasm).unwrap();
        check_imports(&module).unwrap();

        let wasm = wat::parse_str(r#"(module (import "env" "abort" (func)))"#).unwrap();
        let module = wasmtime::Module::new(&engine, &wasm).unwrap();
        assert!(matches!(
            check_imports(&module),
            Err(BridgeError::UnknownImport { .. })
        ));
    }
}
