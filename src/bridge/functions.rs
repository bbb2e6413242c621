// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Callable host values.

use std::rc::Rc;

use crate::bridge::abi::{Completion, ModuleHost};
use crate::bridge::closures::ClosureCell;
use crate::bridge::promise::{Microtask, Resolver};
use crate::bridge::value::{HostValue, ListIterator};
use crate::errors::BridgeResult;

/// A function value.
#[derive(Clone)]
pub enum HostFunction {
    /// A wrapped module callback.
    Closure(Rc<ClosureCell>),
    /// The resolve or reject function of a promise.
    Resolver(Rc<Resolver>),
    /// A function implemented by the host.
    Builtin(Builtin),
}

/// Host-implemented functions reachable from the global scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// `queueMicrotask(callback)`.
    QueueMicrotask,
    /// `fetch(input)`.
    Fetch,
    /// `new Function("return this")`, the global scope probe.
    ReturnThis,
    /// `[Symbol.iterator]()` of arrays and header lists.
    Values,
    /// `iterator.next()`.
    IteratorNext,
}

impl HostFunction {
    /// The function's `name` property; empty names render as anonymous.
    pub fn name(&self) -> Option<&'static str> {
        match self {
            HostFunction::Closure(_) => Some("real"),
            HostFunction::Resolver(_) => None,
            HostFunction::Builtin(Builtin::QueueMicrotask) => Some("queueMicrotask"),
            HostFunction::Builtin(Builtin::Fetch) => Some("fetch"),
            HostFunction::Builtin(Builtin::ReturnThis) => Some("anonymous"),
            HostFunction::Builtin(Builtin::Values) => Some("values"),
            HostFunction::Builtin(Builtin::IteratorNext) => Some("next"),
        }
    }

    pub fn same_function(&self, other: &HostFunction) -> bool {
        match (self, other) {
            (HostFunction::Closure(a), HostFunction::Closure(b)) => Rc::ptr_eq(a, b),
            (HostFunction::Resolver(a), HostFunction::Resolver(b)) => Rc::ptr_eq(a, b),
            (HostFunction::Builtin(a), HostFunction::Builtin(b)) => a == b,
            _ => false,
        }
    }
}

/// `function.call(this, ...args)`.
pub fn call_function<H: ModuleHost + ?Sized>(
    host: &mut H,
    function: &HostFunction,
    this: &HostValue,
    args: &[HostValue],
) -> BridgeResult<Completion> {
    let first = args.first().cloned().unwrap_or(HostValue::Undefined);
    match function {
        HostFunction::Closure(cell) => cell.invoke(host, args),
        HostFunction::Resolver(resolver) => {
            resolver.call(first, &mut host.state().microtasks);
            Ok(Completion::Normal(HostValue::Undefined))
        }
        HostFunction::Builtin(Builtin::QueueMicrotask) => match first {
            HostValue::Function(callback) => {
                host.state().microtasks.push_back(Microtask::Callback(callback));
                Ok(Completion::Normal(HostValue::Undefined))
            }
            other => Ok(Completion::Throw(HostValue::error(
                "TypeError",
                format!(
                    "Failed to execute 'queueMicrotask': parameter 1 is not of type 'Function' ({})",
                    other.kind_name()
                ),
            ))),
        },
        HostFunction::Builtin(Builtin::Fetch) => crate::adapters::fetch::fetch_value(host, &first),
        HostFunction::Builtin(Builtin::ReturnThis) => {
            // sloppy-mode functions see the global object for an absent receiver
            let value = if this.is_nullish() {
                host.state().global_this().unwrap_or(HostValue::Undefined)
            } else {
                this.clone()
            };
            Ok(Completion::Normal(value))
        }
        HostFunction::Builtin(Builtin::Values) => {
            let items = match this {
                HostValue::Array(items) => items.borrow().clone(),
                HostValue::Headers(headers) => headers
                    .entries()
                    .into_iter()
                    .map(|(name, value)| HostValue::new_array(vec![name.into(), value.into()]))
                    .collect(),
                other => return Ok(Completion::Throw(not_iterable(other))),
            };
            Ok(Completion::Normal(HostValue::Iterator(Rc::new(ListIterator::new(items)))))
        }
        HostFunction::Builtin(Builtin::IteratorNext) => match this {
            HostValue::Iterator(iterator) => Ok(Completion::Normal(iterator.next_result())),
            other => Ok(Completion::Throw(HostValue::error(
                "TypeError",
                format!("next method called on incompatible receiver {}", other.kind_name()),
            ))),
        },
    }
}

fn not_iterable(value: &HostValue) -> HostValue {
    HostValue::error("TypeError", format!("{} is not iterable", value.kind_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::promise::{drain_microtasks, PromiseCell};
    use crate::bridge::testing::FakeModule;

    #[test]
    fn test_return_this_probe_yields_global() {
        let mut module = FakeModule::new();
        let probe = HostFunction::Builtin(Builtin::ReturnThis);
        let value = call_function(&mut module, &probe, &HostValue::Undefined, &[])
            .unwrap()
            .into_result()
            .unwrap();
        assert!(matches!(value, HostValue::Global(_)));
    }

    #[test]
    fn test_return_this_without_globals_is_undefined() {
        let mut module = FakeModule::with_globals(vec![]);
        let probe = HostFunction::Builtin(Builtin::ReturnThis);
        let value = call_function(&mut module, &probe, &HostValue::Undefined, &[])
            .unwrap()
            .into_result()
            .unwrap();
        assert!(value.is_undefined());
    }

    #[test]
    fn test_queue_microtask_rejects_non_functions() {
        let mut module = FakeModule::new();
        let queue = HostFunction::Builtin(Builtin::QueueMicrotask);
        let completion =
            call_function(&mut module, &queue, &HostValue::Undefined, &[HostValue::Number(1.0)]).unwrap();
        assert!(matches!(completion, Completion::Throw(HostValue::Error(_))));
        assert!(module.state.microtasks.is_empty());
    }

    #[test]
    fn test_resolver_call_settles_through_function_value() {
        let mut module = FakeModule::new();
        let promise = PromiseCell::new(1);
        let (resolve, _) = Resolver::pair(&promise);
        let resolve = HostFunction::Resolver(resolve);

        call_function(&mut module, &resolve, &HostValue::Undefined, &[HostValue::from("ok")]).unwrap();
        drain_microtasks(&mut module).unwrap();

        assert_eq!(promise.outcome().unwrap().unwrap().as_str(), Some("ok"));
    }

    #[test]
    fn test_array_iteration() {
        let mut module = FakeModule::new();
        let array = HostValue::new_array(vec![HostValue::Number(1.0), HostValue::Number(2.0)]);
        let values = HostFunction::Builtin(Builtin::Values);
        let next = HostFunction::Builtin(Builtin::IteratorNext);

        let iterator = call_function(&mut module, &values, &array, &[])
            .unwrap()
            .into_result()
            .unwrap();
        let mut seen = Vec::new();
        loop {
            let step = call_function(&mut module, &next, &iterator, &[])
                .unwrap()
                .into_result()
                .unwrap()
                .to_json()
                .unwrap()
                .unwrap();
            if step["done"] == serde_json::json!(true) {
                break;
            }
            seen.push(step["value"].clone());
        }
        assert_eq!(seen, vec![serde_json::json!(1), serde_json::json!(2)]);
    }

    #[test]
    fn test_values_on_non_iterable_throws() {
        let mut module = FakeModule::new();
        let values = HostFunction::Builtin(Builtin::Values);
        let completion = call_function(&mut module, &values, &HostValue::Number(3.0), &[]).unwrap();
        assert!(matches!(completion, Completion::Throw(HostValue::Error(_))));
    }

    #[test]
    fn test_function_identity() {
        let a = HostFunction::Builtin(Builtin::Fetch);
        let b = HostFunction::Builtin(Builtin::Fetch);
        let c = HostFunction::Builtin(Builtin::QueueMicrotask);
        assert!(a.same_function(&b));
        assert!(!a.same_function(&c));
    }
}
