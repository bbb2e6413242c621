// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Error and debug channel.
//!
//! Host exceptions raised while an adapter services the module are stored
//! as handles and signalled through `__wbindgen_exn_store`, so the module
//! turns them into its own typed failures. [`describe`] renders any value
//! for diagnostics and never fails.

use std::rc::Rc;

use crate::bridge::abi::ModuleHost;
use crate::bridge::handles::alloc_handle;
use crate::bridge::value::{format_number, HostValue};
use crate::errors::{BridgeError, BridgeResult};
use crate::observability::messages::bridge::HostExceptionCaptured;
use crate::observability::messages::StructuredLog;

/// Store `error` as a handle and signal the module.
pub fn capture_to_handle<H: ModuleHost + ?Sized>(host: &mut H, error: HostValue) -> BridgeResult<u32> {
    let description = describe(&error);
    let handle = alloc_handle(host, error)?;
    HostExceptionCaptured {
        handle,
        description: &description,
    }
    .log();
    host.exn_store(handle)?;
    Ok(handle)
}

/// Run an adapter body, converting a thrown host exception into a stored
/// handle plus the adapter's default return value.
///
/// Transfer and fatal faults are not host exceptions and still propagate.
pub fn catching<H, T, F>(host: &mut H, body: F) -> BridgeResult<T>
where
    H: ModuleHost + ?Sized,
    T: Default,
    F: FnOnce(&mut H) -> BridgeResult<T>,
{
    match body(host) {
        Err(BridgeError::Thrown) => {
            let error = host
                .state()
                .pending_exception
                .take()
                .unwrap_or(HostValue::Undefined);
            capture_to_handle(host, error)?;
            Ok(T::default())
        }
        other => other,
    }
}

/// Human-readable rendering of any value.
pub fn describe(value: &HostValue) -> String {
    let mut ancestors = Vec::new();
    describe_inner(value, &mut ancestors)
}

fn describe_inner(value: &HostValue, ancestors: &mut Vec<usize>) -> String {
    match value {
        HostValue::Undefined => "undefined".to_string(),
        HostValue::Null => "null".to_string(),
        HostValue::Bool(b) => b.to_string(),
        HostValue::Number(n) => format_number(*n),
        HostValue::String(s) => format!("\"{}\"", s),
        HostValue::Symbol(description) => match description {
            Some(d) => format!("Symbol({})", d),
            None => "Symbol".to_string(),
        },
        HostValue::Function(function) => match function.name() {
            Some(name) if !name.is_empty() => format!("Function({})", name),
            _ => "Function".to_string(),
        },
        HostValue::Array(items) => {
            let id = Rc::as_ptr(items) as *const () as usize;
            if ancestors.contains(&id) {
                return "Array".to_string();
            }
            let Ok(items) = items.try_borrow() else {
                return "Array".to_string();
            };
            ancestors.push(id);
            let parts: Vec<String> = items
                .iter()
                .map(|item| describe_inner(item, ancestors))
                .collect();
            ancestors.pop();
            format!("[{}]", parts.join(", "))
        }
        HostValue::Object(_) => match value.stringify() {
            Ok(Some(json)) => format!("Object({})", json),
            _ => "Object".to_string(),
        },
        HostValue::Error(err) => format!(
            "{}: {}\n{}",
            err.name,
            err.message,
            err.stack.as_deref().unwrap_or("")
        ),
        other => other.class_name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::functions::{Builtin, HostFunction};
    use crate::bridge::handles;
    use crate::bridge::testing::FakeModule;
    use std::cell::RefCell;

    #[test]
    fn test_describe_primitives() {
        assert_eq!(describe(&HostValue::Number(42.0)), "42");
        assert_eq!(describe(&HostValue::Bool(true)), "true");
        assert_eq!(describe(&HostValue::Undefined), "undefined");
        assert_eq!(describe(&HostValue::Null), "null");
        assert_eq!(describe(&HostValue::from("hi")), "\"hi\"");
        assert_eq!(describe(&HostValue::Symbol(Some(Rc::from("tag")))), "Symbol(tag)");
        assert_eq!(describe(&HostValue::Symbol(None)), "Symbol");
    }

    #[test]
    fn test_describe_functions_by_name() {
        let fetch = HostValue::Function(HostFunction::Builtin(Builtin::Fetch));
        assert_eq!(describe(&fetch), "Function(fetch)");
    }

    #[test]
    fn test_describe_arrays_recursively() {
        let nested = HostValue::new_array(vec![
            HostValue::Number(1.0),
            HostValue::new_array(vec![HostValue::from("a")]),
        ]);
        assert_eq!(describe(&nested), "[1, [\"a\"]]");
    }

    #[test]
    fn test_describe_cyclic_array_degrades() {
        let items = Rc::new(RefCell::new(Vec::new()));
        let array = HostValue::Array(items.clone());
        items.borrow_mut().push(array.clone());

        assert_eq!(describe(&array), "[Array]");
        items.borrow_mut().clear();
    }

    #[test]
    fn test_describe_objects_as_json() {
        let object = HostValue::from_json(&serde_json::json!({"model": "flash", "n": 2}));
        assert_eq!(describe(&object), r#"Object({"model":"flash","n":2})"#);
    }

    #[test]
    fn test_describe_cyclic_object_falls_back() {
        let object = HostValue::new_object();
        if let HostValue::Object(o) = &object {
            o.set("self", object.clone());
        }
        assert_eq!(describe(&object), "Object");
        if let HostValue::Object(o) = &object {
            o.set("self", HostValue::Null);
        }
    }

    #[test]
    fn test_describe_errors_with_trace() {
        let error = HostValue::error_at("TypeError", "bad input", "Request");
        assert_eq!(describe(&error), "TypeError: bad input\n    at Request");
    }

    #[test]
    fn test_describe_other_objects_by_class() {
        let promise = HostValue::Promise(crate::bridge::promise::PromiseCell::new(1));
        assert_eq!(describe(&promise), "Promise");
    }

    #[test]
    fn test_catching_stores_exception_and_returns_default() {
        let mut module = FakeModule::new();
        let result: i32 = catching(&mut module, |module| {
            Err(crate::bridge::abi::throw(module, HostValue::error("TypeError", "nope")))
        })
        .unwrap();

        assert_eq!(result, 0);
        let stored = module.exn_stored[0];
        match handles::get(&mut module, stored).unwrap() {
            HostValue::Error(err) => assert_eq!(err.message, "nope"),
            other => panic!("expected error, got {:?}", other),
        }
        assert!(module.state.pending_exception.is_none());
    }

    #[test]
    fn test_catching_passes_transfer_faults_through() {
        let mut module = FakeModule::new();
        let result: BridgeResult<i32> = catching(&mut module, |_| Err(BridgeError::InvalidHandle(77)));
        assert!(matches!(result, Err(BridgeError::InvalidHandle(77))));
        assert!(module.exn_stored.is_empty());
    }
}
