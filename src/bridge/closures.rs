// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Closure lifetime manager.
//!
//! A module callback arrives as `(code, env)` plus the table indices of its
//! call shim and destructor. [`ClosureCell`] wraps that into a host function
//! with a reference count: one for "alive" plus one per in-flight call.
//!
//! The destructor runs when the count reaches zero, whether that happens at
//! the end of an invocation or on an explicit release. If the last host
//! reference is dropped first, `Drop` queues the destructor on the
//! [`ClosureLedger`] and it runs at the next safe point. All three paths go
//! through the `destroyed` flag, so the destructor runs at most once.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::bridge::abi::{complete, Completion, ModuleHost};
use crate::bridge::handles::alloc_handle;
use crate::bridge::value::HostValue;
use crate::errors::{BridgeError, BridgeResult};
use crate::observability::messages::closure::{
    ClosureCreated, ClosureDestroyed, ClosureReentryRejected, ClosureReleaseIgnored,
    FinalizersDrained,
};
use crate::observability::messages::StructuredLog;

pub const REENTRY_MESSAGE: &str = "closure invoked recursively or after being dropped";

/// A destructor owed to the module by a wrapper that was dropped unreleased.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingDestructor {
    pub closure_id: u64,
    pub dtor: u32,
    pub code: u32,
    pub env: u32,
}

/// Finalization queue plus lifetime counters shared by every closure.
#[derive(Debug, Default)]
pub struct ClosureLedger {
    pending: RefCell<Vec<PendingDestructor>>,
    created: Cell<u64>,
    destroyed: Cell<u64>,
}

impl ClosureLedger {
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn created(&self) -> u64 {
        self.created.get()
    }

    pub fn destroyed(&self) -> u64 {
        self.destroyed.get()
    }

    fn enqueue(&self, destructor: PendingDestructor) {
        self.pending.borrow_mut().push(destructor);
    }

    fn take_pending(&self) -> Vec<PendingDestructor> {
        std::mem::take(&mut *self.pending.borrow_mut())
    }
}

/// Run every destructor queued by dropped wrappers.
pub fn drain_finalizers<H: ModuleHost + ?Sized>(host: &mut H) -> BridgeResult<usize> {
    let ledger = host.state().closures.clone();
    let mut ran = 0;
    loop {
        let batch = ledger.take_pending();
        if batch.is_empty() {
            break;
        }
        for pending in batch {
            if pending.dtor != 0 {
                host.call_destructor(pending.dtor, pending.code, pending.env)?;
            }
            ledger.destroyed.set(ledger.destroyed.get() + 1);
            ClosureDestroyed {
                closure_id: pending.closure_id,
                trigger: "finalizer",
            }
            .log();
            ran += 1;
        }
    }
    if ran > 0 {
        FinalizersDrained { count: ran }.log();
    }
    Ok(ran)
}

/// Closure state shared by every handle to one wrapped callback.
pub struct ClosureCell {
    id: u64,
    code: u32,
    env: Cell<u32>,
    count: Cell<u32>,
    dtor: u32,
    shim: u32,
    destroyed: Cell<bool>,
    ledger: Rc<ClosureLedger>,
}

impl std::fmt::Debug for ClosureCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureCell")
            .field("id", &self.id)
            .field("code", &self.code)
            .field("env", &self.env.get())
            .field("count", &self.count.get())
            .field("destroyed", &self.destroyed.get())
            .finish()
    }
}

impl ClosureCell {
    /// Wrap a module callback. The new closure starts with one "alive" reference.
    pub fn wrap<H: ModuleHost + ?Sized>(
        host: &mut H,
        code: u32,
        env: u32,
        dtor: u32,
        shim: u32,
    ) -> BridgeResult<Rc<ClosureCell>> {
        if env == 0 {
            return Err(BridgeError::InvalidClosure(format!(
                "closure with code {} has a null environment",
                code
            )));
        }
        let state = host.state();
        let id = state.next_id();
        let ledger = state.closures.clone();
        ledger.created.set(ledger.created.get() + 1);
        ClosureCreated {
            closure_id: id,
            code,
            env,
            dtor,
        }
        .log();
        Ok(Rc::new(ClosureCell {
            id,
            code,
            env: Cell::new(env),
            count: Cell::new(1),
            dtor,
            shim,
            destroyed: Cell::new(false),
            ledger,
        }))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn count(&self) -> u32 {
        self.count.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    /// Invoke the callback with `args`, each passed as a new handle.
    pub fn invoke<H: ModuleHost + ?Sized>(
        &self,
        host: &mut H,
        args: &[HostValue],
    ) -> BridgeResult<Completion> {
        let env = self.env.get();
        if env == 0 || self.destroyed.get() {
            ClosureReentryRejected {
                closure_id: self.id,
                destroyed: self.destroyed.get(),
            }
            .log();
            return Ok(Completion::Throw(HostValue::error("Error", REENTRY_MESSAGE)));
        }

        self.count.set(self.count.get() + 1);
        self.env.set(0);

        let result = self.call(host, env, args);
        // collect a parked exception before the destructor can fail
        let completion = complete(host, result);

        self.count.set(self.count.get() - 1);
        if self.count.get() == 0 {
            self.destroy(host, env, "invocation")?;
        } else {
            self.env.set(env);
        }

        completion
    }

    fn call<H: ModuleHost + ?Sized>(&self, host: &mut H, env: u32, args: &[HostValue]) -> BridgeResult<()> {
        let mut handles = Vec::with_capacity(args.len());
        for arg in args {
            handles.push(alloc_handle(host, arg.clone())?);
        }
        host.call_shim(self.shim, self.code, env, &handles)
    }

    /// Drop the "alive" reference.
    ///
    /// Returns `true` when this release ran the destructor. A release with
    /// no references left is ignored.
    pub fn release<H: ModuleHost + ?Sized>(&self, host: &mut H) -> BridgeResult<bool> {
        if self.destroyed.get() || self.count.get() == 0 {
            ClosureReleaseIgnored { closure_id: self.id }.log();
            return Ok(false);
        }
        self.count.set(self.count.get() - 1);
        if self.count.get() == 0 {
            let env = self.env.get();
            self.destroy(host, env, "release")?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Retire a stack-scoped closure once the call that lent it returns.
    ///
    /// No destructor runs: the module still owns the environment. Later
    /// invocations throw the reentry error.
    pub fn expire(&self) {
        self.env.set(0);
        self.count.set(0);
        self.destroyed.set(true);
    }

    fn destroy<H: ModuleHost + ?Sized>(&self, host: &mut H, env: u32, trigger: &str) -> BridgeResult<()> {
        if self.destroyed.replace(true) {
            return Ok(());
        }
        self.env.set(0);
        self.ledger.destroyed.set(self.ledger.destroyed.get() + 1);
        ClosureDestroyed {
            closure_id: self.id,
            trigger,
        }
        .log();
        if self.dtor != 0 {
            host.call_destructor(self.dtor, self.code, env)?;
        }
        Ok(())
    }
}

impl Drop for ClosureCell {
    fn drop(&mut self) {
        if !self.destroyed.get() {
            self.ledger.enqueue(PendingDestructor {
                closure_id: self.id,
                dtor: self.dtor,
                code: self.code,
                env: self.env.get(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::functions::{call_function, HostFunction};
    use crate::bridge::handles::{self, release_handle};
    use crate::bridge::testing::{FakeModule, DTOR, SHIM};
    use std::rc::Rc;

    fn closure(module: &mut FakeModule) -> Rc<ClosureCell> {
        ClosureCell::wrap(module, 100, 200, DTOR, SHIM).unwrap()
    }

    #[test]
    fn test_invoke_passes_pointer_pair_and_args() {
        let mut module = FakeModule::new();
        let cell = closure(&mut module);

        let completion = cell.invoke(&mut module, &[HostValue::from("arg")]).unwrap();

        assert!(matches!(completion, Completion::Normal(HostValue::Undefined)));
        let (code, env, args) = module.shim_calls[0].clone();
        assert_eq!((code, env), (100, 200));
        assert_eq!(handles::get(&mut module, args[0]).unwrap().as_str(), Some("arg"));
        assert_eq!(cell.count(), 1);
        assert!(module.destructor_calls.is_empty());
    }

    #[test]
    fn test_release_runs_destructor_once() {
        let mut module = FakeModule::new();
        let cell = closure(&mut module);

        assert!(cell.release(&mut module).unwrap());
        assert!(!cell.release(&mut module).unwrap());
        drop(cell);
        drain_finalizers(&mut module).unwrap();

        assert_eq!(module.destructor_calls, vec![(DTOR, 100, 200)]);
        assert_eq!(module.state.closures.destroyed(), 1);
    }

    #[test]
    fn test_release_during_invocation_defers_destruction() {
        let mut module = FakeModule::new();
        let cell = closure(&mut module);
        let inner = cell.clone();
        module.on_shim(move |module, _, _, _| {
            // the module drops its last reference from inside the callback
            assert!(!inner.release(module)?);
            assert!(module.destructor_calls.is_empty());
            Ok(())
        });

        let completion = cell.invoke(&mut module, &[]).unwrap();

        assert!(matches!(completion, Completion::Normal(_)));
        assert_eq!(module.destructor_calls, vec![(DTOR, 100, 200)]);
        assert!(cell.is_destroyed());
        assert_eq!(cell.count(), 0);
    }

    #[test]
    fn test_recursive_invocation_throws() {
        let mut module = FakeModule::new();
        let cell = closure(&mut module);
        let inner = cell.clone();
        let nested = Rc::new(std::cell::RefCell::new(None));
        let seen = nested.clone();
        module.on_shim(move |module, _, _, _| {
            *seen.borrow_mut() = Some(inner.invoke(module, &[])?);
            Ok(())
        });

        cell.invoke(&mut module, &[]).unwrap();

        match nested.borrow_mut().take() {
            Some(Completion::Throw(HostValue::Error(err))) => assert_eq!(err.message, REENTRY_MESSAGE),
            other => panic!("expected reentry error, got {:?}", other.map(|c| c.into_result())),
        }
        assert_eq!(module.shim_calls.len(), 1);
        // env restored after the outer call
        assert!(matches!(cell.invoke(&mut module, &[]).unwrap(), Completion::Normal(_)));
    }

    #[test]
    fn test_invoke_after_destruction_throws_without_touching_count() {
        let mut module = FakeModule::new();
        let cell = closure(&mut module);
        cell.release(&mut module).unwrap();

        let completion = cell.invoke(&mut module, &[]).unwrap();

        assert!(matches!(completion, Completion::Throw(_)));
        assert_eq!(cell.count(), 0);
        assert_eq!(module.destructor_calls.len(), 1);
    }

    #[test]
    fn test_thrown_error_still_decrements() {
        let mut module = FakeModule::new();
        let cell = closure(&mut module);
        module.on_shim(|module, _, _, _| {
            Err(crate::bridge::abi::throw(module, HostValue::error("Error", "callback failed")))
        });

        let completion = cell.invoke(&mut module, &[]).unwrap();

        match completion {
            Completion::Throw(HostValue::Error(err)) => assert_eq!(err.message, "callback failed"),
            _ => panic!("expected a throw completion"),
        }
        assert_eq!(cell.count(), 1);
        assert!(!cell.is_destroyed());
    }

    #[test]
    fn test_failing_destructor_leaves_no_parked_exception() {
        let mut module = FakeModule::new();
        module.failing_destructor = true;
        let cell = closure(&mut module);
        let inner = cell.clone();
        module.on_shim(move |module, _, _, _| {
            inner.release(module)?;
            Err(crate::bridge::abi::throw(module, HostValue::error("Error", "callback failed")))
        });

        let err = cell.invoke(&mut module, &[]).unwrap_err();

        assert!(matches!(err, BridgeError::ModulePanicked(_)));
        assert!(module.state.pending_exception.is_none());
        assert_eq!(module.destructor_calls, vec![(DTOR, 100, 200)]);
        assert!(cell.is_destroyed());
    }

    #[test]
    fn test_finalizer_backstop_runs_once() {
        let mut module = FakeModule::new();
        let cell = closure(&mut module);
        let h = alloc_handle(&mut module, HostValue::Function(HostFunction::Closure(cell))).unwrap();

        release_handle(&mut module, h).unwrap();
        assert_eq!(module.state.closures.pending(), 1);
        assert!(module.destructor_calls.is_empty());

        assert_eq!(drain_finalizers(&mut module).unwrap(), 1);
        assert_eq!(drain_finalizers(&mut module).unwrap(), 0);
        assert_eq!(module.destructor_calls, vec![(DTOR, 100, 200)]);
    }

    #[test]
    fn test_null_environment_is_rejected() {
        let mut module = FakeModule::new();
        let err = ClosureCell::wrap(&mut module, 1, 0, DTOR, SHIM).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidClosure(_)));
    }

    #[test]
    fn test_expired_closure_skips_destructor() {
        let mut module = FakeModule::new();
        let cell = closure(&mut module);
        cell.expire();

        let completion = call_function(
            &mut module,
            &HostFunction::Closure(cell.clone()),
            &HostValue::Undefined,
            &[],
        )
        .unwrap();
        assert!(matches!(completion, Completion::Throw(_)));

        drop(cell);
        drain_finalizers(&mut module).unwrap();
        assert!(module.destructor_calls.is_empty());
    }

    #[test]
    fn test_count_never_negative_across_paths() {
        let mut module = FakeModule::new();
        let cell = closure(&mut module);
        for _ in 0..3 {
            cell.invoke(&mut module, &[]).unwrap();
        }
        assert!(cell.release(&mut module).unwrap());
        for _ in 0..3 {
            assert!(!cell.release(&mut module).unwrap());
            cell.invoke(&mut module, &[]).unwrap();
        }
        assert_eq!(cell.count(), 0);
        drop(cell);
        drain_finalizers(&mut module).unwrap();
        assert_eq!(module.destructor_calls.len(), 1);
    }
}
