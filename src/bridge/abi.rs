// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The numeric seam between the bridge and the module.
//!
//! Every bridge component talks to the module through [`ModuleHost`]: a
//! handful of integer-only calls (allocate, reallocate, store an exception,
//! call a table entry) plus access to linear memory and the bridge state.
//! The production implementation is a wasmtime store context; tests use a
//! pure-Rust fake so the marshaling rules can be exercised without a module.

use wasmtime::{
    Instance, Memory, Ref, StoreContextMut, Table, Trap, TypedFunc, Val, WasmParams,
    WasmResults,
};

use crate::bridge::state::BridgeState;
use crate::bridge::value::HostValue;
use crate::errors::{BridgeError, BridgeResult};

/// How a call into host or module code finished.
#[derive(Debug, Clone)]
pub enum Completion {
    Normal(HostValue),
    Throw(HostValue),
}

impl Completion {
    pub fn into_result(self) -> Result<HostValue, HostValue> {
        match self {
            Completion::Normal(value) => Ok(value),
            Completion::Throw(error) => Err(error),
        }
    }
}

/// Everything the bridge needs from the module side of the boundary.
pub trait ModuleHost {
    /// Bridge state owned by the store.
    fn state(&mut self) -> &mut BridgeState;

    /// Current linear memory together with the bridge state.
    fn memory_and_state(&mut self) -> BridgeResult<(&mut [u8], &mut BridgeState)>;

    /// `__wbindgen_malloc(size, align)`.
    fn malloc(&mut self, size: u32, align: u32) -> BridgeResult<u32>;

    /// `__wbindgen_realloc(ptr, old_size, new_size, align)`.
    fn realloc(&mut self, ptr: u32, old_size: u32, new_size: u32, align: u32) -> BridgeResult<u32>;

    fn supports_realloc(&mut self) -> bool;

    /// `__wbindgen_free(ptr, size, align)`; a no-op when not exported.
    fn free(&mut self, ptr: u32, size: u32, align: u32) -> BridgeResult<()>;

    /// Signal the module that a host exception was stored at `handle`.
    fn exn_store(&mut self, handle: u32) -> BridgeResult<()>;

    /// Ask the module for a free handle slot.
    ///
    /// `None` means the module does not track handles and the host-side free
    /// list is used instead.
    fn table_alloc(&mut self) -> BridgeResult<Option<u32>>;

    /// Return a handle slot to the module's free list.
    fn table_dealloc(&mut self, handle: u32) -> BridgeResult<()>;

    /// Call a closure shim from the function table with `(code, env, args...)`.
    ///
    /// `Err(BridgeError::Thrown)` means a host exception unwound the module
    /// and is parked in [`BridgeState::pending_exception`].
    fn call_shim(&mut self, shim: u32, code: u32, env: u32, args: &[u32]) -> BridgeResult<()>;

    /// Call a closure destructor from the function table with `(code, env)`.
    fn call_destructor(&mut self, dtor: u32, code: u32, env: u32) -> BridgeResult<()>;

    /// Start of an event loop turn; refills any per-call budget.
    fn begin_turn(&mut self) {}
}

/// Park `value` as the pending exception and return the error that unwinds it.
pub fn throw<H: ModuleHost + ?Sized>(host: &mut H, value: HostValue) -> BridgeError {
    host.state().pending_exception = Some(value);
    BridgeError::Thrown
}

/// Turn the result of a module call into a completion.
pub fn complete<H: ModuleHost + ?Sized>(
    host: &mut H,
    result: BridgeResult<()>,
) -> BridgeResult<Completion> {
    match result {
        Ok(()) => Ok(Completion::Normal(HostValue::Undefined)),
        Err(BridgeError::Thrown) => {
            let thrown = host
                .state()
                .pending_exception
                .take()
                .unwrap_or(HostValue::Undefined);
            Ok(Completion::Throw(thrown))
        }
        Err(other) => Err(other),
    }
}

/// Typed handles to the plumbing exports of an instance.
#[derive(Clone)]
pub struct ModuleExports {
    pub memory: Memory,
    pub malloc: TypedFunc<(i32, i32), i32>,
    pub realloc: Option<TypedFunc<(i32, i32, i32, i32), i32>>,
    pub free: Option<TypedFunc<(i32, i32, i32), ()>>,
    pub exn_store: Option<TypedFunc<i32, ()>>,
    pub table_alloc: Option<TypedFunc<(), i32>>,
    pub table_dealloc: Option<TypedFunc<i32, ()>>,
    pub function_table: Option<Table>,
}

impl ModuleExports {
    pub fn resolve(
        instance: &Instance,
        store: &mut StoreContextMut<'_, BridgeState>,
    ) -> BridgeResult<Self> {
        let memory = instance
            .get_memory(&mut *store, "memory")
            .ok_or_else(|| BridgeError::MissingExport {
                name: "memory".to_string(),
            })?;

        let malloc = required_func(instance, store, "__wbindgen_malloc")?;
        let realloc = optional_func(instance, store, "__wbindgen_realloc")?;
        let free = optional_func(instance, store, "__wbindgen_free")?;
        let exn_store = optional_func(instance, store, "__wbindgen_exn_store")?;
        let table_alloc = optional_func(instance, store, "__externref_table_alloc")?;
        let table_dealloc = optional_func(instance, store, "__externref_table_dealloc")?;

        if table_alloc.is_some() != table_dealloc.is_some() {
            return Err(BridgeError::SignatureMismatch {
                name: "__externref_table_alloc".to_string(),
                reason: "alloc and dealloc must be exported together".to_string(),
            });
        }

        let function_table = instance.get_table(&mut *store, "__indirect_function_table");

        Ok(Self {
            memory,
            malloc,
            realloc,
            free,
            exn_store,
            table_alloc,
            table_dealloc,
            function_table,
        })
    }

    pub fn module_managed_handles(&self) -> bool {
        self.table_alloc.is_some()
    }
}

/// Look up a typed export that must be present.
pub fn required_func<P, R>(
    instance: &Instance,
    store: &mut StoreContextMut<'_, BridgeState>,
    name: &str,
) -> BridgeResult<TypedFunc<P, R>>
where
    P: WasmParams,
    R: WasmResults,
{
    optional_func(instance, store, name)?.ok_or_else(|| BridgeError::MissingExport {
        name: name.to_string(),
    })
}

/// Look up a typed export, treating absence as `None` and a wrong signature as an error.
pub fn optional_func<P, R>(
    instance: &Instance,
    store: &mut StoreContextMut<'_, BridgeState>,
    name: &str,
) -> BridgeResult<Option<TypedFunc<P, R>>>
where
    P: WasmParams,
    R: WasmResults,
{
    let Some(func) = instance.get_func(&mut *store, name) else {
        return Ok(None);
    };
    func.typed::<P, R>(&*store)
        .map(Some)
        .map_err(|e| BridgeError::SignatureMismatch {
            name: name.to_string(),
            reason: e.to_string(),
        })
}

/// Classify an error returned by a call into the module.
///
/// Thrown host exceptions pass through untouched. Anything else unwound
/// module frames with a trap, so the instance is marked unusable.
pub fn classify_call_error(error: wasmtime::Error, state: &mut BridgeState) -> BridgeError {
    let error = match error.downcast::<BridgeError>() {
        Ok(BridgeError::Thrown) => return BridgeError::Thrown,
        Ok(bridge_error) => {
            state.poison(&bridge_error.to_string());
            return bridge_error;
        }
        Err(other) => other,
    };

    if matches!(error.downcast_ref::<Trap>(), Some(Trap::OutOfFuel)) {
        state.poison("fuel exhausted");
        return BridgeError::FuelExhausted;
    }

    let reason = state
        .last_console_error
        .take()
        .unwrap_or_else(|| format!("{:#}", error));
    state.poison(&reason);
    BridgeError::ModulePanicked(reason)
}

fn exports(cx: &mut StoreContextMut<'_, BridgeState>) -> BridgeResult<ModuleExports> {
    cx.data().exports.clone().ok_or(BridgeError::NotInitialized)
}

fn ensure_usable(cx: &mut StoreContextMut<'_, BridgeState>) -> BridgeResult<()> {
    if cx.data().poisoned.is_some() {
        return Err(BridgeError::InstanceUnusable);
    }
    Ok(())
}

fn table_func(
    cx: &mut StoreContextMut<'_, BridgeState>,
    index: u32,
) -> BridgeResult<wasmtime::Func> {
    let table = exports(cx)?
        .function_table
        .ok_or_else(|| BridgeError::MissingExport {
            name: "__indirect_function_table".to_string(),
        })?;
    match table.get(&mut *cx, u64::from(index)) {
        Some(Ref::Func(Some(func))) => Ok(func),
        _ => Err(BridgeError::InvalidClosure(format!(
            "no function at table index {}",
            index
        ))),
    }
}

fn call_table_entry(
    cx: &mut StoreContextMut<'_, BridgeState>,
    index: u32,
    params: &[u32],
) -> BridgeResult<()> {
    ensure_usable(cx)?;
    let func = table_func(cx, index)?;
    let ty = func.ty(&*cx);
    if ty.params().len() != params.len() {
        return Err(BridgeError::SignatureMismatch {
            name: format!("table[{}]", index),
            reason: format!(
                "expected {} parameters, called with {}",
                ty.params().len(),
                params.len()
            ),
        });
    }
    let params: Vec<Val> = params.iter().map(|p| Val::I32(*p as i32)).collect();
    let mut results = vec![Val::I32(0); ty.results().len()];
    func.call(&mut *cx, &params, &mut results)
        .map_err(|e| classify_call_error(e, cx.data_mut()))
}

impl ModuleHost for StoreContextMut<'_, BridgeState> {
    fn state(&mut self) -> &mut BridgeState {
        self.data_mut()
    }

    fn memory_and_state(&mut self) -> BridgeResult<(&mut [u8], &mut BridgeState)> {
        let memory = exports(self)?.memory;
        Ok(memory.data_and_store_mut(self))
    }

    fn malloc(&mut self, size: u32, align: u32) -> BridgeResult<u32> {
        ensure_usable(self)?;
        let malloc = exports(self)?.malloc;
        let ptr = malloc
            .call(&mut *self, (size as i32, align as i32))
            .map_err(|e| classify_call_error(e, self.data_mut()))?;
        Ok(ptr as u32)
    }

    fn realloc(&mut self, ptr: u32, old_size: u32, new_size: u32, align: u32) -> BridgeResult<u32> {
        ensure_usable(self)?;
        let realloc = exports(self)?
            .realloc
            .ok_or_else(|| BridgeError::MissingExport {
                name: "__wbindgen_realloc".to_string(),
            })?;
        let ptr = realloc
            .call(
                &mut *self,
                (ptr as i32, old_size as i32, new_size as i32, align as i32),
            )
            .map_err(|e| classify_call_error(e, self.data_mut()))?;
        Ok(ptr as u32)
    }

    fn supports_realloc(&mut self) -> bool {
        self.data()
            .exports
            .as_ref()
            .is_some_and(|e| e.realloc.is_some())
    }

    fn free(&mut self, ptr: u32, size: u32, align: u32) -> BridgeResult<()> {
        ensure_usable(self)?;
        let Some(free) = exports(self)?.free else {
            return Ok(());
        };
        free.call(&mut *self, (ptr as i32, size as i32, align as i32))
            .map_err(|e| classify_call_error(e, self.data_mut()))
    }

    fn exn_store(&mut self, handle: u32) -> BridgeResult<()> {
        ensure_usable(self)?;
        let Some(store) = exports(self)?.exn_store else {
            return Ok(());
        };
        store
            .call(&mut *self, handle as i32)
            .map_err(|e| classify_call_error(e, self.data_mut()))
    }

    fn table_alloc(&mut self) -> BridgeResult<Option<u32>> {
        let Some(alloc) = exports(self)?.table_alloc else {
            return Ok(None);
        };
        ensure_usable(self)?;
        let index = alloc
            .call(&mut *self, ())
            .map_err(|e| classify_call_error(e, self.data_mut()))?;
        Ok(Some(index as u32))
    }

    fn table_dealloc(&mut self, handle: u32) -> BridgeResult<()> {
        let Some(dealloc) = exports(self)?.table_dealloc else {
            return Ok(());
        };
        ensure_usable(self)?;
        dealloc
            .call(&mut *self, handle as i32)
            .map_err(|e| classify_call_error(e, self.data_mut()))
    }

    fn call_shim(&mut self, shim: u32, code: u32, env: u32, args: &[u32]) -> BridgeResult<()> {
        let mut params = Vec::with_capacity(args.len() + 2);
        params.push(code);
        params.push(env);
        params.extend_from_slice(args);
        call_table_entry(self, shim, &params)
    }

    fn call_destructor(&mut self, dtor: u32, code: u32, env: u32) -> BridgeResult<()> {
        call_table_entry(self, dtor, &[code, env])
    }

    fn begin_turn(&mut self) {
        let fuel = self.data().fuel_per_call;
        if let Err(e) = self.set_fuel(fuel) {
            tracing::debug!("Fuel metering unavailable: {}", e);
        }
    }
}
