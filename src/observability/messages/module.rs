// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for module loading and lifecycle events.
//!
//! This module contains message types for logging events related to:
//! * WASM module loading and validation
//! * Instantiation and export binding
//! * Entry point calls
//! * Fatal faults that leave the instance unusable

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// WASM module loaded successfully.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use validation_bridge::observability::messages::module::ModuleLoaded;
///
/// let msg = ModuleLoaded {
///     module_path: "pkg/validation_bg.wasm",
///     size_bytes: 4096,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ModuleLoaded<'a> {
    pub module_path: &'a str,
    pub size_bytes: usize,
}

impl Display for ModuleLoaded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Loaded WASM module: {} ({} bytes)",
            self.module_path, self.size_bytes
        )
    }
}

impl StructuredLog for ModuleLoaded<'_> {
    fn log(&self) {
        tracing::info!(
            module_path = self.module_path,
            size_bytes = self.size_bytes,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "module_loaded",
            span_name = name,
            module_path = self.module_path,
            size_bytes = self.size_bytes,
        )
    }
}

/// WASM module loading failed.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use validation_bridge::observability::messages::module::ModuleLoadFailed;
///
/// let error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
/// let msg = ModuleLoadFailed {
///     module_path: "pkg/missing.wasm",
///     error: &error,
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct ModuleLoadFailed<'a> {
    pub module_path: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ModuleLoadFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Failed to load WASM module '{}': {}",
            self.module_path, self.error
        )
    }
}

impl StructuredLog for ModuleLoadFailed<'_> {
    fn log(&self) {
        tracing::error!(
            module_path = self.module_path,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("module_load_failed", span_name = name, module_path = self.module_path)
    }
}

/// Module instantiated and its exports bound.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use validation_bridge::observability::messages::module::ModuleInstantiated;
///
/// let msg = ModuleInstantiated {
///     module_path: "pkg/validation_bg.wasm",
///     realloc: true,
///     module_managed_handles: true,
///     fuel_per_call: 100_000_000,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ModuleInstantiated<'a> {
    pub module_path: &'a str,
    pub realloc: bool,
    pub module_managed_handles: bool,
    pub fuel_per_call: u64,
}

impl Display for ModuleInstantiated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Instantiated module {} (realloc={}, module_managed_handles={}, fuel_per_call={})",
            self.module_path, self.realloc, self.module_managed_handles, self.fuel_per_call
        )
    }
}

impl StructuredLog for ModuleInstantiated<'_> {
    fn log(&self) {
        tracing::info!(
            module_path = self.module_path,
            realloc = self.realloc,
            module_managed_handles = self.module_managed_handles,
            fuel_per_call = self.fuel_per_call,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "module",
            span_name = name,
            module_path = self.module_path,
            fuel_per_call = self.fuel_per_call,
        )
    }
}

/// An entry point is about to run.
///
/// # Log Level
/// `debug!` - Per-call event
///
/// # Example
/// ```
/// use validation_bridge::observability::messages::module::EntryPointCalled;
///
/// let msg = EntryPointCalled {
///     entry_point: "getSupportedModels",
///     fuel: 100_000_000,
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct EntryPointCalled<'a> {
    pub entry_point: &'a str,
    pub fuel: u64,
}

impl Display for EntryPointCalled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Calling entry point {} (fuel: {})", self.entry_point, self.fuel)
    }
}

impl StructuredLog for EntryPointCalled<'_> {
    fn log(&self) {
        tracing::debug!(entry_point = self.entry_point, fuel = self.fuel, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("entry_point", span_name = name, entry_point = self.entry_point)
    }
}

/// The instance hit a fatal fault and is now unusable.
///
/// # Log Level
/// `error!` - Requires reinstantiation by the caller
///
/// # Example
/// ```
/// use validation_bridge::observability::messages::module::InstancePoisoned;
///
/// let msg = InstancePoisoned {
///     reason: "panicked at src/lib.rs:10:5: index out of bounds",
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct InstancePoisoned<'a> {
    pub reason: &'a str,
}

impl Display for InstancePoisoned<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Module instance is unusable until reinstantiated: {}",
            self.reason
        )
    }
}

impl StructuredLog for InstancePoisoned<'_> {
    fn log(&self) {
        tracing::error!(reason = self.reason, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("instance_poisoned", span_name = name)
    }
}

/// A fresh instance replaced a poisoned or stale one.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use validation_bridge::observability::messages::module::ModuleReinstantiated;
///
/// let msg = ModuleReinstantiated {
///     module_path: "pkg/validation_bg.wasm",
///     was_poisoned: true,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ModuleReinstantiated<'a> {
    pub module_path: &'a str,
    pub was_poisoned: bool,
}

impl Display for ModuleReinstantiated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Reinstantiated module {} (previous instance poisoned: {})",
            self.module_path, self.was_poisoned
        )
    }
}

impl StructuredLog for ModuleReinstantiated<'_> {
    fn log(&self) {
        tracing::info!(
            module_path = self.module_path,
            was_poisoned = self.was_poisoned,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("reinstantiate", span_name = name, module_path = self.module_path)
    }
}
