// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Memory view cache.
//!
//! Linear memory may be replaced wholesale when the module grows it, so no
//! view may outlive a call back into the module. Views here borrow the store
//! mutably, which lets the borrow checker enforce that rule; the cache only
//! tracks which buffer instance the last view was built over.
//!
//! Each access compares the live buffer's address and length with the cached
//! descriptor. A mismatch bumps the generation, which is the "rebuild".

use std::ops::Range;

use crate::bridge::abi::ModuleHost;
use crate::errors::{BridgeError, BridgeResult};
use crate::observability::messages::bridge::MemoryViewRebuilt;
use crate::observability::messages::StructuredLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BufferDescriptor {
    base: usize,
    len: usize,
}

/// Identity cache for the current linear memory buffer.
#[derive(Debug, Default)]
pub struct MemoryViews {
    descriptor: Option<BufferDescriptor>,
    generation: u64,
}

impl MemoryViews {
    /// Compare `memory` against the cached descriptor, rebuilding on mismatch.
    ///
    /// Returns the generation the caller's view belongs to.
    pub fn refresh(&mut self, memory: &[u8]) -> u64 {
        let current = BufferDescriptor {
            base: memory.as_ptr() as usize,
            len: memory.len(),
        };
        if self.descriptor != Some(current) {
            self.descriptor = Some(current);
            self.generation += 1;
            MemoryViewRebuilt {
                generation: self.generation,
                size_bytes: current.len,
            }
            .log();
        }
        self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Bounds-checked byte access over the current buffer.
pub struct ByteView<'a> {
    data: &'a mut [u8],
    generation: u64,
}

impl<'a> ByteView<'a> {
    pub fn new(data: &'a mut [u8], generation: u64) -> Self {
        Self { data, generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn read(&self, ptr: u32, len: u32) -> BridgeResult<&[u8]> {
        let range = checked_range(self.data.len(), ptr, len)?;
        Ok(&self.data[range])
    }

    pub fn write(&mut self, ptr: u32, bytes: &[u8]) -> BridgeResult<()> {
        let len = u32::try_from(bytes.len()).map_err(|_| BridgeError::OutOfBounds {
            ptr,
            len: u32::MAX,
            size: self.data.len(),
        })?;
        let range = checked_range(self.data.len(), ptr, len)?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }
}

/// Little-endian word access over the current buffer.
pub struct WordView<'a> {
    data: &'a mut [u8],
    generation: u64,
}

impl<'a> WordView<'a> {
    pub fn new(data: &'a mut [u8], generation: u64) -> Self {
        Self { data, generation }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn read_i32(&self, ptr: u32) -> BridgeResult<i32> {
        let range = checked_range(self.data.len(), ptr, 4)?;
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.data[range]);
        Ok(i32::from_le_bytes(word))
    }

    pub fn write_i32(&mut self, ptr: u32, value: i32) -> BridgeResult<()> {
        let range = checked_range(self.data.len(), ptr, 4)?;
        self.data[range].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn read_f64(&self, ptr: u32) -> BridgeResult<f64> {
        let range = checked_range(self.data.len(), ptr, 8)?;
        let mut word = [0u8; 8];
        word.copy_from_slice(&self.data[range]);
        Ok(f64::from_le_bytes(word))
    }

    pub fn write_f64(&mut self, ptr: u32, value: f64) -> BridgeResult<()> {
        let range = checked_range(self.data.len(), ptr, 8)?;
        self.data[range].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Write a `(first, second)` pair of words at `retptr`, the layout used
    /// for pointer/length return slots.
    pub fn write_pair(&mut self, retptr: u32, first: u32, second: u32) -> BridgeResult<()> {
        // Validate the whole slot before touching either word.
        checked_range(self.data.len(), retptr, 8)?;
        self.write_i32(retptr, first as i32)?;
        self.write_i32(retptr + 4, second as i32)
    }
}

/// A byte view over the module's current memory.
pub fn bytes<H: ModuleHost + ?Sized>(host: &mut H) -> BridgeResult<ByteView<'_>> {
    let (memory, state) = host.memory_and_state()?;
    let generation = state.views.refresh(memory);
    Ok(ByteView::new(memory, generation))
}

/// A word view over the module's current memory.
pub fn words<H: ModuleHost + ?Sized>(host: &mut H) -> BridgeResult<WordView<'_>> {
    let (memory, state) = host.memory_and_state()?;
    let generation = state.views.refresh(memory);
    Ok(WordView::new(memory, generation))
}

/// Copy `len` bytes at `ptr` out of module memory.
pub fn read_bytes<H: ModuleHost + ?Sized>(host: &mut H, ptr: u32, len: u32) -> BridgeResult<Vec<u8>> {
    let max = host.state().max_transfer_bytes;
    if len as usize > max {
        return Err(BridgeError::PayloadTooLarge {
            len: len as usize,
            max,
        });
    }
    Ok(bytes(host)?.read(ptr, len)?.to_vec())
}

pub(crate) fn checked_range(size: usize, ptr: u32, len: u32) -> BridgeResult<Range<usize>> {
    let start = ptr as usize;
    let end = start.checked_add(len as usize).filter(|end| *end <= size);
    match end {
        Some(end) => Ok(start..end),
        None => Err(BridgeError::OutOfBounds { ptr, len, size }),
    }
}
