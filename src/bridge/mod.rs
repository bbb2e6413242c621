// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Host side of the module boundary.
//!
//! The module only ever sees integers: pointers into its linear memory,
//! lengths, and handles into the host's value table. This module owns the
//! machinery that makes those integers meaningful:
//!
//! - [`memory`]: cached views over linear memory, rebuilt after growth
//! - [`strings`]: UTF-8 transfer in both directions
//! - [`handles`]: the handle table and its reserved constants
//! - [`closures`]: lifetime of module callbacks held by the host
//! - [`promise`] and [`event_loop`]: promises, microtasks and pending I/O
//! - [`debug`]: exception capture and value rendering
//!
//! Everything is single threaded and lives in one [`state::BridgeState`]
//! inside the wasmtime store.

pub mod abi;
pub mod closures;
pub mod debug;
pub mod event_loop;
pub mod functions;
pub mod handles;
pub mod memory;
pub mod operations;
pub mod promise;
pub mod state;
pub mod strings;
pub mod value;

#[cfg(test)]
pub(crate) mod testing;

pub use abi::{Completion, ModuleExports, ModuleHost};
pub use handles::{HANDLE_FALSE, HANDLE_NULL, HANDLE_TRUE, HANDLE_UNDEFINED};
pub use promise::PromiseRef;
pub use state::{BridgeState, BridgeStats};
pub use value::HostValue;
