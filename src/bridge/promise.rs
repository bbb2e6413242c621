// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Promise bridge.
//!
//! Host promises follow the usual settlement contract: a promise settles at
//! most once, reactions registered with `then` run as microtasks in FIFO
//! order, and resolving with another promise adopts its eventual state.
//! Resolve/reject function pairs share an "already resolved" flag, so only
//! the first call of either has any effect.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::bridge::abi::{Completion, ModuleHost};
use crate::bridge::closures::ClosureCell;
use crate::bridge::functions::{call_function, HostFunction};
use crate::bridge::handles::alloc_handle;
use crate::bridge::value::HostValue;
use crate::errors::BridgeResult;
use crate::observability::messages::promise::{MicrotaskFailed, PromiseSettled};
use crate::observability::messages::StructuredLog;

pub type PromiseRef = Rc<PromiseCell>;

/// Pending microtasks, run in FIFO order.
pub type MicrotaskQueue = VecDeque<Microtask>;

#[derive(Clone)]
enum PromiseState {
    Pending(Vec<Reaction>),
    Fulfilled(HostValue),
    Rejected(HostValue),
}

#[derive(Clone)]
struct Reaction {
    on_fulfilled: Option<HostFunction>,
    on_rejected: Option<HostFunction>,
    derived: Option<PromiseRef>,
}

/// Work queued to run after the current synchronous call stack.
pub enum Microtask {
    /// Run a `then` reaction against a settled value.
    Reaction {
        handler: Option<HostFunction>,
        argument: HostValue,
        rejected: bool,
        derived: Option<PromiseRef>,
    },
    /// A callback passed to `queueMicrotask`.
    Callback(HostFunction),
}

/// A host promise.
pub struct PromiseCell {
    id: u64,
    state: RefCell<PromiseState>,
}

impl PromiseCell {
    pub fn new(id: u64) -> PromiseRef {
        Rc::new(PromiseCell {
            id,
            state: RefCell::new(PromiseState::Pending(Vec::new())),
        })
    }

    pub fn fulfilled(id: u64, value: HostValue) -> PromiseRef {
        Rc::new(PromiseCell {
            id,
            state: RefCell::new(PromiseState::Fulfilled(value)),
        })
    }

    pub fn rejected(id: u64, reason: HostValue) -> PromiseRef {
        Rc::new(PromiseCell {
            id,
            state: RefCell::new(PromiseState::Rejected(reason)),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.state.borrow(), PromiseState::Pending(_))
    }

    pub fn state_name(&self) -> &'static str {
        match *self.state.borrow() {
            PromiseState::Pending(_) => "pending",
            PromiseState::Fulfilled(_) => "fulfilled",
            PromiseState::Rejected(_) => "rejected",
        }
    }

    /// The settled outcome, if any.
    pub fn outcome(&self) -> Option<Result<HostValue, HostValue>> {
        match &*self.state.borrow() {
            PromiseState::Pending(_) => None,
            PromiseState::Fulfilled(value) => Some(Ok(value.clone())),
            PromiseState::Rejected(reason) => Some(Err(reason.clone())),
        }
    }

    /// Register reactions; they run as microtasks once the promise settles.
    pub fn then(
        &self,
        on_fulfilled: Option<HostFunction>,
        on_rejected: Option<HostFunction>,
        derived: Option<PromiseRef>,
        queue: &mut MicrotaskQueue,
    ) {
        let reaction = Reaction {
            on_fulfilled,
            on_rejected,
            derived,
        };
        let mut state = self.state.borrow_mut();
        match &mut *state {
            PromiseState::Pending(reactions) => reactions.push(reaction),
            PromiseState::Fulfilled(value) => queue.push_back(reaction.into_task(value.clone(), false)),
            PromiseState::Rejected(reason) => queue.push_back(reaction.into_task(reason.clone(), true)),
        }
    }

    /// Resolve with `value`, adopting it when it is itself a promise.
    pub fn resolve(self: &Rc<Self>, value: HostValue, queue: &mut MicrotaskQueue) {
        if let HostValue::Promise(other) = &value {
            if Rc::ptr_eq(other, self) {
                self.settle(
                    Err(HostValue::error(
                        "TypeError",
                        "Chaining cycle detected for promise",
                    )),
                    queue,
                );
                return;
            }
            // Pass-through reaction: the other promise settles this one.
            other.then(None, None, Some(self.clone()), queue);
            return;
        }
        self.settle(Ok(value), queue);
    }

    pub fn reject(&self, reason: HostValue, queue: &mut MicrotaskQueue) {
        self.settle(Err(reason), queue);
    }

    fn settle(&self, outcome: Result<HostValue, HostValue>, queue: &mut MicrotaskQueue) {
        let reactions = {
            let mut state = self.state.borrow_mut();
            let PromiseState::Pending(reactions) = &mut *state else {
                return;
            };
            let reactions = std::mem::take(reactions);
            *state = match &outcome {
                Ok(value) => PromiseState::Fulfilled(value.clone()),
                Err(reason) => PromiseState::Rejected(reason.clone()),
            };
            reactions
        };

        PromiseSettled {
            promise_id: self.id,
            outcome: if outcome.is_ok() { "fulfilled" } else { "rejected" },
        }
        .log();

        let (argument, rejected) = match outcome {
            Ok(value) => (value, false),
            Err(reason) => (reason, true),
        };
        for reaction in reactions {
            queue.push_back(reaction.into_task(argument.clone(), rejected));
        }
    }
}

impl Reaction {
    fn into_task(self, argument: HostValue, rejected: bool) -> Microtask {
        let handler = if rejected {
            self.on_rejected
        } else {
            self.on_fulfilled
        };
        Microtask::Reaction {
            handler,
            argument,
            rejected,
            derived: self.derived,
        }
    }
}

/// Whether a resolving function resolves or rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverKind {
    Resolve,
    Reject,
}

/// One of the two functions that settle a promise.
pub struct Resolver {
    pub promise: PromiseRef,
    pub kind: ResolverKind,
    already_resolved: Rc<Cell<bool>>,
}

impl Resolver {
    /// A resolve/reject pair sharing one "already resolved" flag.
    pub fn pair(promise: &PromiseRef) -> (Rc<Resolver>, Rc<Resolver>) {
        let flag = Rc::new(Cell::new(false));
        (
            Rc::new(Resolver {
                promise: promise.clone(),
                kind: ResolverKind::Resolve,
                already_resolved: flag.clone(),
            }),
            Rc::new(Resolver {
                promise: promise.clone(),
                kind: ResolverKind::Reject,
                already_resolved: flag,
            }),
        )
    }

    /// Settle the promise unless either function of the pair already ran.
    pub fn call(&self, value: HostValue, queue: &mut MicrotaskQueue) {
        if self.already_resolved.replace(true) {
            return;
        }
        match self.kind {
            ResolverKind::Resolve => self.promise.resolve(value, queue),
            ResolverKind::Reject => self.promise.reject(value, queue),
        }
    }
}

/// `Promise.resolve(value)`.
pub fn promise_resolve<H: ModuleHost + ?Sized>(host: &mut H, value: HostValue) -> PromiseRef {
    if let HostValue::Promise(existing) = value {
        return existing;
    }
    let state = host.state();
    let promise = PromiseCell::new(state.next_id());
    promise.resolve(value, &mut state.microtasks);
    promise
}

/// `promise.then(on_fulfilled, on_rejected)`, returning the derived promise.
pub fn then<H: ModuleHost + ?Sized>(
    host: &mut H,
    promise: &PromiseRef,
    on_fulfilled: Option<HostFunction>,
    on_rejected: Option<HostFunction>,
) -> PromiseRef {
    let state = host.state();
    let derived = PromiseCell::new(state.next_id());
    promise.then(on_fulfilled, on_rejected, Some(derived.clone()), &mut state.microtasks);
    derived
}

/// `new Promise(executor)` where the executor is a module callback lent
/// for the duration of this call.
///
/// The executor receives handles to the resolve and reject functions. A
/// synchronous throw rejects the promise unless it already settled.
pub fn new_with_executor<H: ModuleHost + ?Sized>(
    host: &mut H,
    code: u32,
    env: u32,
    shim: u32,
) -> BridgeResult<PromiseRef> {
    let promise = PromiseCell::new(host.state().next_id());
    let (resolve, reject) = Resolver::pair(&promise);
    let executor = ClosureCell::wrap(host, code, env, 0, shim)?;

    let args = [
        HostValue::Function(HostFunction::Resolver(resolve)),
        HostValue::Function(HostFunction::Resolver(reject.clone())),
    ];
    let completion = executor.invoke(host, &args);
    executor.expire();

    if let Completion::Throw(error) = completion? {
        reject.call(error, &mut host.state().microtasks);
    }
    Ok(promise)
}

/// Run a single microtask.
pub fn run_microtask<H: ModuleHost + ?Sized>(host: &mut H, task: Microtask) -> BridgeResult<()> {
    match task {
        Microtask::Callback(callback) => {
            if let Completion::Throw(error) =
                call_function(host, &callback, &HostValue::Undefined, &[])?
            {
                let description = crate::bridge::debug::describe(&error);
                MicrotaskFailed {
                    description: &description,
                }
                .log();
            }
        }
        Microtask::Reaction {
            handler,
            argument,
            rejected,
            derived,
        } => {
            let outcome = match handler {
                Some(handler) => {
                    call_function(host, &handler, &HostValue::Undefined, &[argument])?.into_result()
                }
                None if rejected => Err(argument),
                None => Ok(argument),
            };
            if let Some(derived) = derived {
                let queue = &mut host.state().microtasks;
                match outcome {
                    Ok(value) => derived.resolve(value, queue),
                    Err(reason) => derived.reject(reason, queue),
                }
            }
        }
    }
    Ok(())
}

/// Run queued microtasks until the queue is empty, including ones queued
/// while running.
pub fn drain_microtasks<H: ModuleHost + ?Sized>(host: &mut H) -> BridgeResult<usize> {
    let mut ran = 0;
    while let Some(task) = host.state().microtasks.pop_front() {
        run_microtask(host, task)?;
        ran += 1;
    }
    Ok(ran)
}

/// Allocate a handle for a promise value.
pub fn promise_handle<H: ModuleHost + ?Sized>(host: &mut H, promise: PromiseRef) -> BridgeResult<u32> {
    alloc_handle(host, HostValue::Promise(promise))
}
