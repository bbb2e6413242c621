// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Handle table and allocator.
//!
//! Host values cross into the module as integer handles. Slots `0..=3` hold
//! `undefined`, `null`, `true` and `false` for the life of the instance.
//!
//! Slot allocation is delegated to the module when it exports
//! `__externref_table_alloc` / `__externref_table_dealloc`; the module then
//! grows the table through the `__wbindgen_externref_table_grow` import and
//! the host only stores and retrieves by index. Without those exports the
//! host keeps its own free list and grows by a fixed chunk.

use crate::bridge::abi::ModuleHost;
use crate::bridge::value::HostValue;
use crate::errors::{BridgeError, BridgeResult};
use crate::observability::messages::bridge::HandleTableGrown;
use crate::observability::messages::StructuredLog;

pub const HANDLE_UNDEFINED: u32 = 0;
pub const HANDLE_NULL: u32 = 1;
pub const HANDLE_TRUE: u32 = 2;
pub const HANDLE_FALSE: u32 = 3;

/// Number of reserved constant slots.
pub const RESERVED_HANDLES: u32 = 4;

pub fn is_reserved(handle: u32) -> bool {
    handle < RESERVED_HANDLES
}

/// Growable slot array indexed by handle.
pub struct HandleTable {
    slots: Vec<Option<HostValue>>,
    free: Vec<u32>,
    chunk_size: u32,
    module_managed: bool,
    live: usize,
}

impl HandleTable {
    pub fn new(chunk_size: u32) -> Self {
        let mut table = Self {
            slots: Vec::new(),
            free: Vec::new(),
            chunk_size: chunk_size.max(1),
            module_managed: false,
            live: 0,
        };
        table.install_reserved();
        table
    }

    /// (Re)write the reserved constants.
    pub fn install_reserved(&mut self) {
        if self.slots.len() < RESERVED_HANDLES as usize {
            self.slots.resize(RESERVED_HANDLES as usize, None);
        }
        self.slots[HANDLE_UNDEFINED as usize] = Some(HostValue::Undefined);
        self.slots[HANDLE_NULL as usize] = Some(HostValue::Null);
        self.slots[HANDLE_TRUE as usize] = Some(HostValue::Bool(true));
        self.slots[HANDLE_FALSE as usize] = Some(HostValue::Bool(false));
    }

    pub fn set_module_managed(&mut self, managed: bool) {
        self.module_managed = managed;
    }

    pub fn is_module_managed(&self) -> bool {
        self.module_managed
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Allocated slots, not counting the reserved constants.
    pub fn live(&self) -> usize {
        self.live
    }

    /// Store `value` in a slot from the host-managed free list.
    pub fn alloc(&mut self, value: HostValue) -> u32 {
        if self.free.is_empty() {
            self.grow_chunk();
        }
        // grow_chunk always leaves at least one free slot
        let handle = self.free.pop().unwrap_or(self.slots.len() as u32);
        if handle as usize >= self.slots.len() {
            self.slots.resize(handle as usize + 1, None);
        }
        self.slots[handle as usize] = Some(value);
        self.live += 1;
        handle
    }

    fn grow_chunk(&mut self) {
        let from = self.slots.len();
        let to = from + self.chunk_size as usize;
        self.slots.resize(to, None);
        // pop() hands out the lowest index first
        self.free.extend((from as u32..to as u32).rev());
        HandleTableGrown { from, to }.log();
    }

    /// Extend the table by `delta` empty slots, returning the previous size.
    ///
    /// This backs the module-side `table.grow`; existing handles stay valid.
    pub fn grow(&mut self, delta: u32) -> u32 {
        let from = self.slots.len();
        let to = from + delta as usize;
        self.slots.resize(to, None);
        if delta > 0 {
            HandleTableGrown { from, to }.log();
        }
        from as u32
    }

    /// Store `value` at a slot chosen by the module.
    pub fn set(&mut self, handle: u32, value: HostValue) -> BridgeResult<()> {
        if is_reserved(handle) {
            return Err(BridgeError::ReservedHandle(handle));
        }
        let slot = self
            .slots
            .get_mut(handle as usize)
            .ok_or(BridgeError::InvalidHandle(handle))?;
        if slot.is_none() {
            self.live += 1;
        }
        // the previous occupant is dropped here, outside any other borrow
        let _previous = slot.replace(value);
        Ok(())
    }

    pub fn get(&self, handle: u32) -> BridgeResult<HostValue> {
        self.slots
            .get(handle as usize)
            .and_then(|slot| slot.clone())
            .ok_or(BridgeError::InvalidHandle(handle))
    }

    /// Empty a slot and, in host-managed mode, return it to the free list.
    ///
    /// Reserved handles are ignored. The removed value is handed back so the
    /// caller decides where it is dropped.
    pub fn clear(&mut self, handle: u32) -> BridgeResult<Option<HostValue>> {
        if is_reserved(handle) {
            return Ok(None);
        }
        let slot = self
            .slots
            .get_mut(handle as usize)
            .ok_or(BridgeError::InvalidHandle(handle))?;
        let value = slot.take().ok_or(BridgeError::InvalidHandle(handle))?;
        self.live -= 1;
        if !self.module_managed {
            self.free.push(handle);
        }
        Ok(Some(value))
    }
}

/// Hand `value` to the module as a new handle.
///
/// The constants map onto their reserved slots; every other value gets a
/// fresh slot owned by the module until it releases it.
pub fn alloc_handle<H: ModuleHost + ?Sized>(host: &mut H, value: HostValue) -> BridgeResult<u32> {
    match value {
        HostValue::Undefined => return Ok(HANDLE_UNDEFINED),
        HostValue::Null => return Ok(HANDLE_NULL),
        HostValue::Bool(true) => return Ok(HANDLE_TRUE),
        HostValue::Bool(false) => return Ok(HANDLE_FALSE),
        _ => {}
    }

    if host.state().handles.is_module_managed() {
        if let Some(handle) = host.table_alloc()? {
            host.state().handles.set(handle, value)?;
            return Ok(handle);
        }
    }
    Ok(host.state().handles.alloc(value))
}

/// Look up the value behind a handle without taking ownership.
pub fn get<H: ModuleHost + ?Sized>(host: &mut H, handle: u32) -> BridgeResult<HostValue> {
    host.state().handles.get(handle)
}

/// Release a handle the module no longer needs.
pub fn release_handle<H: ModuleHost + ?Sized>(host: &mut H, handle: u32) -> BridgeResult<()> {
    let value = host.state().handles.clear(handle)?;
    if value.is_some() && host.state().handles.is_module_managed() {
        host.table_dealloc(handle)?;
    }
    drop(value);
    Ok(())
}

/// Take the value behind a handle, releasing the handle.
pub fn take<H: ModuleHost + ?Sized>(host: &mut H, handle: u32) -> BridgeResult<HostValue> {
    let value = get(host, handle)?;
    release_handle(host, handle)?;
    Ok(value)
}

/// Duplicate a handle: a second slot referring to the same value.
pub fn clone_ref<H: ModuleHost + ?Sized>(host: &mut H, handle: u32) -> BridgeResult<u32> {
    let value = get(host, handle)?;
    alloc_handle(host, value)
}
