// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! In-memory stand-in for a module, used by unit tests.
//!
//! Memory is a plain byte vector with a bump allocator. Every reallocation
//! and growth moves the buffer, so stale views would be caught. Shims are
//! Rust closures registered by table index.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::bridge::abi::ModuleHost;
use crate::bridge::closures::ClosureCell;
use crate::bridge::functions::HostFunction;
use crate::bridge::state::BridgeState;
use crate::config::{BridgeConfig, GlobalScopeKind};
use crate::errors::{BridgeError, BridgeResult};
use crate::net::mock::MockFetcher;

/// Table index of the default shim.
pub const SHIM: u32 = 1;
/// Table index of the default destructor.
pub const DTOR: u32 = 2;

const PAGE: usize = 65_536;

type Shim = Rc<dyn Fn(&mut FakeModule, u32, u32, &[u32]) -> BridgeResult<()>>;

pub struct FakeModule {
    pub state: BridgeState,
    memory: Vec<u8>,
    heap_top: u32,
    pub realloc_enabled: bool,
    pub realloc_calls: Vec<(u32, u32)>,
    pub exn_stored: Vec<u32>,
    pub shim_calls: Vec<(u32, u32, Vec<u32>)>,
    pub destructor_calls: Vec<(u32, u32, u32)>,
    /// Destructor calls trap after being recorded.
    pub failing_destructor: bool,
    pub managed_allocations: Vec<u32>,
    pub managed_releases: Vec<u32>,
    pub fetcher: Rc<MockFetcher>,
    managed_free: Option<Vec<u32>>,
    shims: HashMap<u32, Shim>,
    next_shim: u32,
    call_log: Rc<RefCell<Vec<String>>>,
}

impl FakeModule {
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    pub fn with_globals(globals: Vec<GlobalScopeKind>) -> Self {
        let config = BridgeConfig {
            globals,
            ..BridgeConfig::default()
        };
        Self::with_config(config)
    }

    pub fn with_config(config: BridgeConfig) -> Self {
        let fetcher = Rc::new(MockFetcher::default());
        Self {
            state: BridgeState::new(&config, fetcher.clone()),
            memory: vec![0; PAGE],
            // keep address 0 unused, as a real allocator would
            heap_top: 8,
            realloc_enabled: true,
            realloc_calls: Vec::new(),
            exn_stored: Vec::new(),
            shim_calls: Vec::new(),
            destructor_calls: Vec::new(),
            failing_destructor: false,
            managed_allocations: Vec::new(),
            managed_releases: Vec::new(),
            fetcher,
            managed_free: None,
            shims: HashMap::new(),
            next_shim: 100,
            call_log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// A fake whose handle slots are tracked on the module side.
    pub fn with_managed_table() -> Self {
        let mut module = Self::new();
        module.managed_free = Some(Vec::new());
        module.state.handles.set_module_managed(true);
        module
    }

    /// Grow memory by `pages`, moving the buffer.
    pub fn grow(&mut self, pages: usize) {
        let mut grown = vec![0; self.memory.len() + pages * PAGE];
        grown[..self.memory.len()].copy_from_slice(&self.memory);
        self.memory = grown;
    }

    /// Handle calls to the default shim.
    pub fn on_shim<F>(&mut self, handler: F)
    where
        F: Fn(&mut FakeModule, u32, u32, &[u32]) -> BridgeResult<()> + 'static,
    {
        self.shims.insert(SHIM, Rc::new(handler));
    }

    pub fn record_calls(&self) -> Rc<RefCell<Vec<String>>> {
        self.call_log.clone()
    }

    /// A closure that appends `label` to the call log when invoked.
    pub fn recording_closure(&mut self, label: &str) -> HostFunction {
        let index = self.next_shim;
        self.next_shim += 1;
        let log = self.call_log.clone();
        let label = label.to_string();
        self.shims.insert(
            index,
            Rc::new(move |_, _, _, _| {
                log.borrow_mut().push(label.clone());
                Ok(())
            }),
        );
        let cell = ClosureCell::wrap(self, index, index, 0, index)
            .unwrap_or_else(|e| panic!("recording closure: {}", e));
        HostFunction::Closure(cell)
    }

    fn bump(&mut self, size: u32, align: u32) -> u32 {
        let align = align.max(1);
        let ptr = self.heap_top.div_ceil(align) * align;
        let end = ptr as usize + size as usize;
        while end > self.memory.len() {
            self.grow(1);
        }
        self.heap_top = end as u32;
        ptr
    }
}

impl Default for FakeModule {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleHost for FakeModule {
    fn state(&mut self) -> &mut BridgeState {
        &mut self.state
    }

    fn memory_and_state(&mut self) -> BridgeResult<(&mut [u8], &mut BridgeState)> {
        Ok((&mut self.memory, &mut self.state))
    }

    fn malloc(&mut self, size: u32, align: u32) -> BridgeResult<u32> {
        Ok(self.bump(size, align))
    }

    fn realloc(&mut self, ptr: u32, old_size: u32, new_size: u32, align: u32) -> BridgeResult<u32> {
        if !self.realloc_enabled {
            return Err(BridgeError::MissingExport {
                name: "__wbindgen_realloc".to_string(),
            });
        }
        self.realloc_calls.push((old_size, new_size));
        let moved = self.bump(new_size, align);
        let keep = old_size.min(new_size) as usize;
        let (src, dst) = (ptr as usize, moved as usize);
        self.memory.copy_within(src..src + keep, dst);
        Ok(moved)
    }

    fn supports_realloc(&mut self) -> bool {
        self.realloc_enabled
    }

    fn free(&mut self, _ptr: u32, _size: u32, _align: u32) -> BridgeResult<()> {
        Ok(())
    }

    fn exn_store(&mut self, handle: u32) -> BridgeResult<()> {
        self.exn_stored.push(handle);
        Ok(())
    }

    fn table_alloc(&mut self) -> BridgeResult<Option<u32>> {
        let Some(free) = self.managed_free.as_mut() else {
            return Ok(None);
        };
        let handle = match free.pop() {
            Some(handle) => handle,
            None => self.state.handles.grow(1),
        };
        self.managed_allocations.push(handle);
        Ok(Some(handle))
    }

    fn table_dealloc(&mut self, handle: u32) -> BridgeResult<()> {
        if let Some(free) = self.managed_free.as_mut() {
            free.push(handle);
            self.managed_releases.push(handle);
        }
        Ok(())
    }

    fn call_shim(&mut self, shim: u32, code: u32, env: u32, args: &[u32]) -> BridgeResult<()> {
        if self.state.is_poisoned() {
            return Err(BridgeError::InstanceUnusable);
        }
        self.shim_calls.push((code, env, args.to_vec()));
        match self.shims.get(&shim).cloned() {
            Some(handler) => handler(self, code, env, args),
            None => Ok(()),
        }
    }

    fn call_destructor(&mut self, dtor: u32, code: u32, env: u32) -> BridgeResult<()> {
        self.destructor_calls.push((dtor, code, env));
        if self.failing_destructor {
            return Err(BridgeError::ModulePanicked("destructor trapped".to_string()));
        }
        Ok(())
    }
}
