// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Intrinsic adapters: handle bookkeeping, primitive conversion, type
//! probes, throwing, closures and console output.
//!
//! Handle arguments are borrowed: an adapter never releases a handle it
//! was given unless its contract says it consumes it (`object_drop_ref`,
//! `cb_drop`, `rethrow`). Returned handles are owned by the module.

use crate::bridge::abi::{throw, ModuleHost};
use crate::bridge::closures::ClosureCell;
use crate::bridge::debug::describe;
use crate::bridge::functions::HostFunction;
use crate::bridge::handles::{alloc_handle, clone_ref, get, release_handle, take};
use crate::bridge::memory::words;
use crate::bridge::strings::{decode, write_to_retptr};
use crate::bridge::value::{HostError, HostValue};
use crate::errors::{BridgeError, BridgeResult};
use crate::observability::messages::bridge::ConsoleError;
use crate::observability::messages::StructuredLog;

pub fn object_drop_ref<H: ModuleHost + ?Sized>(host: &mut H, handle: u32) -> BridgeResult<()> {
    release_handle(host, handle)
}

pub fn object_clone_ref<H: ModuleHost + ?Sized>(host: &mut H, handle: u32) -> BridgeResult<u32> {
    clone_ref(host, handle)
}

/// A string value from `(ptr, len)` in module memory.
pub fn string_new<H: ModuleHost + ?Sized>(host: &mut H, ptr: u32, len: u32) -> BridgeResult<u32> {
    let text = decode(host, ptr, len)?;
    alloc_handle(host, HostValue::from(text))
}

/// Write `(ptr, len)` of the string at `handle`, or `(0, 0)` for non-strings.
pub fn string_get<H: ModuleHost + ?Sized>(host: &mut H, retptr: u32, handle: u32) -> BridgeResult<()> {
    let value = get(host, handle)?;
    write_to_retptr(host, retptr, value.as_str())
}

pub fn number_new<H: ModuleHost + ?Sized>(host: &mut H, value: f64) -> BridgeResult<u32> {
    alloc_handle(host, HostValue::Number(value))
}

/// Write the number at `handle` as `(present: i32 @ +0, value: f64 @ +8)`.
pub fn number_get<H: ModuleHost + ?Sized>(host: &mut H, retptr: u32, handle: u32) -> BridgeResult<()> {
    let number = get(host, handle)?.as_number();
    let mut view = words(host)?;
    view.write_f64(retptr + 8, number.unwrap_or(0.0))?;
    view.write_i32(retptr, number.is_some() as i32)
}

/// Diagnostic rendering of any value.
pub fn debug_string<H: ModuleHost + ?Sized>(host: &mut H, retptr: u32, handle: u32) -> BridgeResult<()> {
    let value = get(host, handle)?;
    let text = describe(&value);
    write_to_retptr(host, retptr, Some(&text))
}

/// `String(value)`.
pub fn display_string<H: ModuleHost + ?Sized>(host: &mut H, retptr: u32, handle: u32) -> BridgeResult<()> {
    let value = get(host, handle)?;
    let text = value.to_display_string();
    write_to_retptr(host, retptr, Some(&text))
}

pub fn is_function<H: ModuleHost + ?Sized>(host: &mut H, handle: u32) -> BridgeResult<i32> {
    Ok(get(host, handle)?.is_function() as i32)
}

pub fn is_object<H: ModuleHost + ?Sized>(host: &mut H, handle: u32) -> BridgeResult<i32> {
    Ok(get(host, handle)?.is_object() as i32)
}

pub fn is_undefined<H: ModuleHost + ?Sized>(host: &mut H, handle: u32) -> BridgeResult<i32> {
    Ok(get(host, handle)?.is_undefined() as i32)
}

pub fn is_string<H: ModuleHost + ?Sized>(host: &mut H, handle: u32) -> BridgeResult<i32> {
    Ok(get(host, handle)?.as_str().is_some() as i32)
}

/// Throw an `Error` with the message at `(ptr, len)`.
pub fn throw_message<H: ModuleHost + ?Sized>(host: &mut H, ptr: u32, len: u32) -> BridgeResult<()> {
    let message = decode(host, ptr, len)?;
    Err(throw(host, HostValue::error("Error", message)))
}

/// Throw the value at `handle`, consuming it.
pub fn rethrow<H: ModuleHost + ?Sized>(host: &mut H, handle: u32) -> BridgeResult<()> {
    let value = take(host, handle)?;
    Err(throw(host, value))
}

/// Wrap a module callback as a function value.
pub fn closure_new<H: ModuleHost + ?Sized>(
    host: &mut H,
    code: u32,
    env: u32,
    dtor: u32,
    shim: u32,
) -> BridgeResult<u32> {
    let cell = ClosureCell::wrap(host, code, env, dtor, shim)?;
    alloc_handle(host, HostValue::Function(HostFunction::Closure(cell)))
}

/// Drop the module's reference to a closure, consuming the handle.
///
/// Returns 1 when this drop destroyed the closure. A closure that is
/// currently executing is destroyed when its outermost invocation returns.
pub fn cb_drop<H: ModuleHost + ?Sized>(host: &mut H, handle: u32) -> BridgeResult<i32> {
    let value = get(host, handle)?;
    let HostValue::Function(HostFunction::Closure(cell)) = &value else {
        return Err(BridgeError::HandleTypeMismatch {
            handle,
            expected: "closure",
            found: value.kind_name(),
        });
    };
    let destroyed = cell.release(host)?;
    release_handle(host, handle)?;
    Ok(destroyed as i32)
}

/// Install the reserved constants.
pub fn init_externref_table<H: ModuleHost + ?Sized>(host: &mut H) -> BridgeResult<()> {
    host.state().handles.install_reserved();
    Ok(())
}

/// Grow the handle table by `delta` slots, returning the previous size.
pub fn externref_table_grow<H: ModuleHost + ?Sized>(host: &mut H, delta: u32) -> BridgeResult<i32> {
    Ok(host.state().handles.grow(delta) as i32)
}

/// `console.error(text)` with text at `(ptr, len)`; the buffer is freed.
///
/// The last message is kept as the panic description should the module
/// trap right after reporting.
pub fn console_error<H: ModuleHost + ?Sized>(host: &mut H, ptr: u32, len: u32) -> BridgeResult<()> {
    let message = decode(host, ptr, len)?;
    ConsoleError { message: &message }.log();
    host.state().last_console_error = Some(message);
    host.free(ptr, len, 1)
}

/// `new Error()`.
pub fn error_new<H: ModuleHost + ?Sized>(host: &mut H) -> BridgeResult<u32> {
    let error = HostError::new("Error", "").at("module");
    alloc_handle(host, HostValue::Error(std::rc::Rc::new(error)))
}

/// `error.stack`, empty for values without one.
pub fn stack<H: ModuleHost + ?Sized>(host: &mut H, retptr: u32, handle: u32) -> BridgeResult<()> {
    let stack = match get(host, handle)? {
        HostValue::Error(error) => error.stack.clone().unwrap_or_default(),
        _ => String::new(),
    };
    write_to_retptr(host, retptr, Some(&stack))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::handles::{HANDLE_NULL, HANDLE_UNDEFINED};
    use crate::bridge::memory::bytes;
    use crate::bridge::strings::encode;
    use crate::bridge::testing::{FakeModule, DTOR, SHIM};

    const RETPTR: u32 = 1024;

    fn read_retptr_string(module: &mut FakeModule) -> Option<String> {
        let view = words(module).unwrap();
        let ptr = view.read_i32(RETPTR).unwrap() as u32;
        let len = view.read_i32(RETPTR + 4).unwrap() as u32;
        if ptr == 0 {
            return None;
        }
        let raw = bytes(module).unwrap().read(ptr, len).unwrap().to_vec();
        Some(String::from_utf8(raw).unwrap())
    }

    #[test]
    fn test_string_round_trip_through_handles() {
        let mut module = FakeModule::new();
        let record = encode(&mut module, "naïve text").unwrap();
        let handle = string_new(&mut module, record.ptr, record.len).unwrap();

        string_get(&mut module, RETPTR, handle).unwrap();
        assert_eq!(read_retptr_string(&mut module).as_deref(), Some("naïve text"));
    }

    #[test]
    fn test_string_get_of_non_string_writes_null_pair() {
        let mut module = FakeModule::new();
        let handle = number_new(&mut module, 4.0).unwrap();
        string_get(&mut module, RETPTR, handle).unwrap();
        assert_eq!(read_retptr_string(&mut module), None);
    }

    #[test]
    fn test_number_get_layout() {
        let mut module = FakeModule::new();
        let handle = number_new(&mut module, 2.5).unwrap();
        number_get(&mut module, RETPTR, handle).unwrap();
        let view = words(&mut module).unwrap();
        assert_eq!(view.read_i32(RETPTR).unwrap(), 1);
        assert_eq!(view.read_f64(RETPTR + 8).unwrap(), 2.5);
        drop(view);

        number_get(&mut module, RETPTR, HANDLE_NULL).unwrap();
        assert_eq!(words(&mut module).unwrap().read_i32(RETPTR).unwrap(), 0);
    }

    #[test]
    fn test_type_probes() {
        let mut module = FakeModule::new();
        let object = alloc_handle(&mut module, HostValue::new_object()).unwrap();
        assert_eq!(is_object(&mut module, object).unwrap(), 1);
        assert_eq!(is_object(&mut module, HANDLE_NULL).unwrap(), 0);
        assert_eq!(is_undefined(&mut module, HANDLE_UNDEFINED).unwrap(), 1);
        assert_eq!(is_function(&mut module, object).unwrap(), 0);
        assert_eq!(is_string(&mut module, object).unwrap(), 0);
    }

    #[test]
    fn test_debug_and_display_strings() {
        let mut module = FakeModule::new();
        let handle = alloc_handle(&mut module, HostValue::from("quoted")).unwrap();
        debug_string(&mut module, RETPTR, handle).unwrap();
        assert_eq!(read_retptr_string(&mut module).as_deref(), Some("\"quoted\""));
        display_string(&mut module, RETPTR, handle).unwrap();
        assert_eq!(read_retptr_string(&mut module).as_deref(), Some("quoted"));
    }

    #[test]
    fn test_throw_parks_error() {
        let mut module = FakeModule::new();
        let record = encode(&mut module, "boom").unwrap();
        let err = throw_message(&mut module, record.ptr, record.len).unwrap_err();
        assert!(matches!(err, BridgeError::Thrown));
        match module.state.pending_exception.take() {
            Some(HostValue::Error(e)) => assert_eq!(e.message, "boom"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rethrow_consumes_handle() {
        let mut module = FakeModule::new();
        let handle = alloc_handle(&mut module, HostValue::from("reason")).unwrap();
        assert!(matches!(rethrow(&mut module, handle), Err(BridgeError::Thrown)));
        assert!(get(&mut module, handle).is_err());
    }

    #[test]
    fn test_cb_drop_destroys_idle_closure() {
        let mut module = FakeModule::new();
        let handle = closure_new(&mut module, 10, 20, DTOR, SHIM).unwrap();
        assert_eq!(is_function(&mut module, handle).unwrap(), 1);

        assert_eq!(cb_drop(&mut module, handle).unwrap(), 1);
        assert_eq!(module.destructor_calls, vec![(DTOR, 10, 20)]);
        assert!(get(&mut module, handle).is_err());
    }

    #[test]
    fn test_cb_drop_rejects_non_closures() {
        let mut module = FakeModule::new();
        let handle = alloc_handle(&mut module, HostValue::new_object()).unwrap();
        assert!(matches!(
            cb_drop(&mut module, handle),
            Err(BridgeError::HandleTypeMismatch { expected: "closure", .. })
        ));
    }

    #[test]
    fn test_console_error_records_panic_text() {
        let mut module = FakeModule::new();
        let record = encode(&mut module, "panicked at src/lib.rs:1:1").unwrap();
        console_error(&mut module, record.ptr, record.len).unwrap();
        assert_eq!(
            module.state.last_console_error.as_deref(),
            Some("panicked at src/lib.rs:1:1")
        );
    }

    #[test]
    fn test_error_stack() {
        let mut module = FakeModule::new();
        let error = error_new(&mut module).unwrap();
        stack(&mut module, RETPTR, error).unwrap();
        assert_eq!(read_retptr_string(&mut module).as_deref(), Some("    at module"));
    }

    #[test]
    fn test_table_grow_reports_old_size() {
        let mut module = FakeModule::new();
        let before = module.state.handles.capacity() as i32;
        assert_eq!(externref_table_grow(&mut module, 4).unwrap(), before);
        assert_eq!(module.state.handles.capacity() as i32, before + 4);
        init_externref_table(&mut module).unwrap();
        assert!(matches!(get(&mut module, HANDLE_NULL).unwrap(), HostValue::Null));
    }
}
