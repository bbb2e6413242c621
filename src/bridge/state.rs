// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-instance bridge state.
//!
//! One [`BridgeState`] lives inside each wasmtime store. It holds the
//! caches and tables the bridge components share: memory views, decoder,
//! handle table, closure ledger, microtask queue and pending I/O. The reset
//! procedure is to build a new state alongside a new instance.

use std::collections::VecDeque;
use std::rc::Rc;

use futures::stream::FuturesUnordered;

use crate::bridge::abi::ModuleExports;
use crate::bridge::closures::ClosureLedger;
use crate::bridge::functions::{Builtin, HostFunction};
use crate::bridge::handles::HandleTable;
use crate::bridge::memory::MemoryViews;
use crate::bridge::operations::{IoFuture, OperationLedger};
use crate::bridge::promise::MicrotaskQueue;
use crate::bridge::strings::TextDecoder;
use crate::bridge::value::{GlobalScope, HostValue, PlainObject};
use crate::config::{BridgeConfig, GlobalScopeKind};
use crate::net::Fetcher;
use crate::observability::messages::module::InstancePoisoned;
use crate::observability::messages::StructuredLog;

/// Snapshot of bridge counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub live_handles: usize,
    pub handle_capacity: usize,
    pub memory_generation: u64,
    pub decoded_bytes: u64,
    pub decoder_resets: u64,
    pub closures_created: u64,
    pub closures_destroyed: u64,
    pub pending_finalizers: usize,
    pub queued_microtasks: usize,
    pub operations_dispatched: u64,
    pub operations_succeeded: u64,
    pub operations_failed: u64,
    pub operations_in_flight: u64,
}

pub struct BridgeState {
    pub(crate) views: MemoryViews,
    pub(crate) decoder: TextDecoder,
    /// Byte length of the most recent string transfer.
    pub vector_len: u32,
    pub(crate) handles: HandleTable,
    pub(crate) closures: Rc<ClosureLedger>,
    pub(crate) microtasks: MicrotaskQueue,
    pub(crate) io: FuturesUnordered<IoFuture>,
    pub(crate) operations: OperationLedger,
    pub(crate) exports: Option<ModuleExports>,
    pub(crate) fetcher: Rc<dyn Fetcher>,
    global_scope: Option<Rc<GlobalScope>>,
    global_accessors: Vec<GlobalScopeKind>,
    pub(crate) pending_exception: Option<HostValue>,
    pub(crate) last_console_error: Option<String>,
    pub(crate) poisoned: Option<String>,
    pub(crate) panic_hook_installed: bool,
    pub(crate) fuel_per_call: u64,
    pub(crate) max_transfer_bytes: usize,
    next_id: u64,
}

impl BridgeState {
    pub fn new(config: &BridgeConfig, fetcher: Rc<dyn Fetcher>) -> Self {
        let global_scope = primary_scope(&config.globals).map(|kind| {
            let props = PlainObject::default();
            props.set(
                "queueMicrotask",
                HostValue::Function(HostFunction::Builtin(Builtin::QueueMicrotask)),
            );
            props.set(
                "fetch",
                HostValue::Function(HostFunction::Builtin(Builtin::Fetch)),
            );
            Rc::new(GlobalScope { kind, props })
        });

        Self {
            views: MemoryViews::default(),
            decoder: TextDecoder::new(config.strings.decoder_reset_threshold),
            vector_len: 0,
            handles: HandleTable::new(config.handles.chunk_size),
            closures: Rc::new(ClosureLedger::default()),
            microtasks: VecDeque::new(),
            io: FuturesUnordered::new(),
            operations: OperationLedger::default(),
            exports: None,
            fetcher,
            global_scope,
            global_accessors: config.globals.clone(),
            pending_exception: None,
            last_console_error: None,
            poisoned: None,
            panic_hook_installed: false,
            fuel_per_call: config.fuel_per_call(),
            max_transfer_bytes: config.strings.max_bytes,
            next_id: 0,
        }
    }

    /// Bind the instance's plumbing exports.
    pub fn bind(&mut self, exports: ModuleExports) {
        self.handles
            .set_module_managed(exports.module_managed_handles());
        self.exports = Some(exports);
    }

    /// Monotonic id for closures, promises and operations.
    pub fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// The global scope as seen through `accessor`, if the host exposes it.
    pub fn global(&self, accessor: GlobalScopeKind) -> Option<HostValue> {
        if !self.global_accessors.contains(&accessor) {
            return None;
        }
        self.global_scope.clone().map(HostValue::Global)
    }

    /// `globalThis`, whichever accessor exposes it.
    pub fn global_this(&self) -> Option<HostValue> {
        self.global_scope.clone().map(HostValue::Global)
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    pub fn poison_reason(&self) -> Option<&str> {
        self.poisoned.as_deref()
    }

    /// Mark the instance unusable. The first reason wins.
    pub fn poison(&mut self, reason: &str) {
        if self.poisoned.is_none() {
            InstancePoisoned { reason }.log();
            self.poisoned = Some(reason.to_string());
        }
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            live_handles: self.handles.live(),
            handle_capacity: self.handles.capacity(),
            memory_generation: self.views.generation(),
            decoded_bytes: self.decoder.decoded_bytes(),
            decoder_resets: self.decoder.resets(),
            closures_created: self.closures.created(),
            closures_destroyed: self.closures.destroyed(),
            pending_finalizers: self.closures.pending(),
            queued_microtasks: self.microtasks.len(),
            operations_dispatched: self.operations.dispatched,
            operations_succeeded: self.operations.succeeded,
            operations_failed: self.operations.failed,
            operations_in_flight: self.operations.in_flight(),
        }
    }
}

/// The most specific scope among the configured accessors names the class.
fn primary_scope(accessors: &[GlobalScopeKind]) -> Option<GlobalScopeKind> {
    [
        GlobalScopeKind::Window,
        GlobalScopeKind::SelfScope,
        GlobalScopeKind::Global,
        GlobalScopeKind::GlobalThis,
    ]
    .into_iter()
    .find(|kind| accessors.contains(kind))
}
