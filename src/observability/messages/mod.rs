// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for the human-readable line and
//! [`StructuredLog`] to emit the same event with its fields attached.
//!
//! # Organization
//!
//! * `bridge` - marshaling layer events
//! * `closure` - closure lifetime events
//! * `promise` - promise and async operation events
//! * `module` - module lifecycle and fatal faults
//!
//! # Usage Pattern
//!
//! ```rust
//! use validation_bridge::observability::messages::module::EntryPointCalled;
//!
//! let msg = EntryPointCalled {
//!     entry_point: "validateInput",
//!     fuel: 100_000_000,
//! };
//!
//! tracing::debug!("{}", msg);
//! ```

use tracing::Span;

pub mod bridge;
pub mod closure;
pub mod module;
pub mod promise;

/// Emit a message as a structured event, or open a span carrying its fields.
pub trait StructuredLog: std::fmt::Display {
    /// Log the message at its documented level with structured fields.
    fn log(&self);

    /// Create a span carrying the message fields.
    fn span(&self, name: &str) -> Span;
}
