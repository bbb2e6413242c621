// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the marshaling layer.
//!
//! This module contains message types for logging events related to:
//! * Memory view invalidation after buffer growth
//! * String decoder resets
//! * Handle table growth
//! * Host exceptions captured on behalf of the module
//! * Diagnostic text the module writes to `console.error`

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Memory views were rebuilt because the buffer changed identity.
///
/// # Log Level
/// `debug!` - Internal state change
///
/// # Example
/// ```
/// use validation_bridge::observability::messages::bridge::MemoryViewRebuilt;
///
/// let msg = MemoryViewRebuilt {
///     generation: 3,
///     size_bytes: 131072,
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct MemoryViewRebuilt {
    pub generation: u64,
    pub size_bytes: usize,
}

impl Display for MemoryViewRebuilt {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Rebuilt memory views: generation {} ({} bytes)",
            self.generation, self.size_bytes
        )
    }
}

impl StructuredLog for MemoryViewRebuilt {
    fn log(&self) {
        tracing::debug!(
            generation = self.generation,
            size_bytes = self.size_bytes,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "memory_views",
            span_name = name,
            generation = self.generation,
            size_bytes = self.size_bytes,
        )
    }
}

/// The string decoder was reinitialized after crossing its volume threshold.
///
/// # Log Level
/// `info!` - Rare operational event
///
/// # Example
/// ```
/// use validation_bridge::observability::messages::bridge::DecoderReset;
///
/// let msg = DecoderReset {
///     decoded_bytes: 2_146_435_100,
///     threshold: 2_146_435_072,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct DecoderReset {
    pub decoded_bytes: u64,
    pub threshold: u64,
}

impl Display for DecoderReset {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Reinitialized string decoder after {} bytes (threshold: {})",
            self.decoded_bytes, self.threshold
        )
    }
}

impl StructuredLog for DecoderReset {
    fn log(&self) {
        tracing::info!(
            decoded_bytes = self.decoded_bytes,
            threshold = self.threshold,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "decoder_reset",
            span_name = name,
            decoded_bytes = self.decoded_bytes,
            threshold = self.threshold,
        )
    }
}

/// The host-managed handle table grew by one chunk.
///
/// # Log Level
/// `debug!` - Internal state change
///
/// # Example
/// ```
/// use validation_bridge::observability::messages::bridge::HandleTableGrown;
///
/// let msg = HandleTableGrown {
///     from: 132,
///     to: 260,
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct HandleTableGrown {
    pub from: usize,
    pub to: usize,
}

impl Display for HandleTableGrown {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Grew handle table from {} to {} slots", self.from, self.to)
    }
}

impl StructuredLog for HandleTableGrown {
    fn log(&self) {
        tracing::debug!(from = self.from, to = self.to, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("handle_table", span_name = name, from = self.from, to = self.to)
    }
}

/// A host exception raised by an adapter was stored as a handle.
///
/// # Log Level
/// `debug!` - Expected control flow; the module decides what to do with it
///
/// # Example
/// ```
/// use validation_bridge::observability::messages::bridge::HostExceptionCaptured;
///
/// let msg = HostExceptionCaptured {
///     handle: 140,
///     description: "TypeError: Failed to construct 'Request': Invalid URL",
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct HostExceptionCaptured<'a> {
    pub handle: u32,
    pub description: &'a str,
}

impl Display for HostExceptionCaptured<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Captured host exception as handle {}: {}",
            self.handle, self.description
        )
    }
}

impl StructuredLog for HostExceptionCaptured<'_> {
    fn log(&self) {
        tracing::debug!(handle = self.handle, description = self.description, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "host_exception",
            span_name = name,
            handle = self.handle,
            description = self.description,
        )
    }
}

/// The module wrote diagnostic text through `console.error`.
///
/// # Log Level
/// `error!` - The module only does this for panics and fatal diagnostics
///
/// # Example
/// ```
/// use validation_bridge::observability::messages::bridge::ConsoleError;
///
/// let msg = ConsoleError {
///     message: "panicked at src/lib.rs:10:5: index out of bounds",
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct ConsoleError<'a> {
    pub message: &'a str,
}

impl Display for ConsoleError<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Module console.error: {}", self.message)
    }
}

impl StructuredLog for ConsoleError<'_> {
    fn log(&self) {
        tracing::error!(text = self.message, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("console_error", span_name = name)
    }
}
