// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Error types for the module boundary.
//!
//! Every failure the bridge can observe is one of these variants. They fall
//! into four groups:
//! - transfer faults (bad pointers, oversized payloads, invalid handles)
//! - host-call faults that escaped to an entry point (`HostException`)
//! - asynchronous faults (`Rejected`, `Stalled`, `Timeout`)
//! - fatal faults that leave the instance unusable (`ModulePanicked`,
//!   `FuelExhausted`)
//!
//! All variants are `Send + Sync` so they can travel through wasmtime's
//! error type when an import aborts the module.

use std::time::Duration;
use thiserror::Error;

use crate::errors::ConfigError;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// An entry point or adapter ran before the module exports were bound.
    #[error("Bridge is not initialized: module exports are not bound")]
    NotInitialized,

    /// A required export is missing from the module.
    #[error("Module must export '{name}'")]
    MissingExport { name: String },

    /// An export exists but has the wrong signature.
    #[error("Export '{name}' has an unexpected signature: {reason}")]
    SignatureMismatch { name: String, reason: String },

    /// The module imports something the host does not provide.
    #[error("Module imports unknown function '{module}.{name}'")]
    UnknownImport { module: String, name: String },

    /// Memory access outside the current linear memory.
    #[error("Memory access out of bounds: ptr={ptr} len={len} memory_size={size}")]
    OutOfBounds { ptr: u32, len: u32, size: usize },

    /// A string or byte payload exceeds the configured transfer limit.
    #[error("Payload too large: {len} bytes (max: {max} bytes)")]
    PayloadTooLarge { len: usize, max: usize },

    /// Strict UTF-8 decoding failed.
    #[error("Invalid UTF-8 in module memory: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// Handle does not reference a live slot.
    #[error("Invalid handle: {0}")]
    InvalidHandle(u32),

    /// Attempt to overwrite one of the reserved constant handles.
    #[error("Handle {0} is reserved and cannot be reassigned")]
    ReservedHandle(u32),

    /// Handle references a value of the wrong kind for the operation.
    #[error("Handle {handle} holds {found}, expected {expected}")]
    HandleTypeMismatch {
        handle: u32,
        expected: &'static str,
        found: &'static str,
    },

    /// Closure construction with an unusable pointer pair.
    #[error("Invalid closure: {0}")]
    InvalidClosure(String),

    /// Enum discriminant outside the known range.
    #[error("Invalid {name} discriminant: {value}")]
    InvalidEnumValue { name: &'static str, value: i32 },

    /// Async operation state machine violation.
    #[error("Invalid async operation transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// A host exception is pending and is unwinding through the module.
    ///
    /// The thrown value itself is parked in `BridgeState::pending_exception`.
    #[error("Host exception thrown across the module boundary")]
    Thrown,

    /// A host exception escaped to an entry point.
    #[error("Uncaught host exception: {0}")]
    HostException(String),

    /// A bridged promise settled to failure.
    #[error("Promise rejected: {0}")]
    Rejected(String),

    /// The module panicked; the instance must be reinstantiated.
    #[error("Module panicked: {0}")]
    ModulePanicked(String),

    /// The module ran out of fuel.
    #[error("Module exhausted its fuel budget")]
    FuelExhausted,

    /// A previous fatal fault poisoned this instance.
    #[error("Module instance is unusable after a fatal fault; reinstantiate it")]
    InstanceUnusable,

    /// A promise is still pending but nothing can settle it any more.
    #[error("Promise {promise} can never settle: no pending tasks or I/O")]
    Stalled { promise: u64 },

    /// Awaiting I/O exceeded the configured timeout.
    #[error("Timed out after {0:?} waiting for pending I/O")]
    Timeout(Duration),

    /// Invalid or malformed WASM binary format.
    #[error("Invalid WASM binary: {0}")]
    InvalidWasmBinary(String),

    /// Unsupported WASM encoding (component model binaries).
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// WASM binary parsing error from wasmparser.
    #[error("WASM parser error: {0}")]
    ParserError(#[from] wasmparser::BinaryReaderError),

    /// Wasmtime engine creation or configuration error.
    #[error("Engine creation error: {0}")]
    EngineError(String),

    /// Input validation error (size limits, format, etc.).
    #[error("Invalid input: {0}")]
    ValidationError(String),

    /// Wasmtime linking, instantiation or execution error.
    #[error("WASM execution error: {0}")]
    ExecutionError(#[from] wasmtime::Error),

    /// File I/O error during module loading.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl BridgeError {
    /// Returns true for faults after which the instance must not be reused.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::ModulePanicked(_) | BridgeError::FuelExhausted | BridgeError::InstanceUnusable
        )
    }
}

/// Result type alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(BridgeError::ModulePanicked("boom".to_string()).is_fatal());
        assert!(BridgeError::FuelExhausted.is_fatal());
        assert!(BridgeError::InstanceUnusable.is_fatal());
        assert!(!BridgeError::InvalidHandle(9).is_fatal());
        assert!(!BridgeError::Rejected("nope".to_string()).is_fatal());
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = BridgeError::OutOfBounds {
            ptr: 65_530,
            len: 16,
            size: 65_536,
        };
        let msg = err.to_string();
        assert!(msg.contains("ptr=65530"));
        assert!(msg.contains("memory_size=65536"));
    }

    #[test]
    fn test_bridge_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<BridgeError>();
    }
}
