// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for promise settlement and async operations.
//!
//! This module contains message types for logging events related to:
//! * Promise settlement
//! * Microtasks that threw without a handler
//! * Network-style operations moving through their state machine

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A promise settled.
///
/// # Log Level
/// `debug!` - Internal state change
///
/// # Example
/// ```
/// use validation_bridge::observability::messages::promise::PromiseSettled;
///
/// let msg = PromiseSettled {
///     promise_id: 12,
///     outcome: "fulfilled",
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct PromiseSettled<'a> {
    pub promise_id: u64,
    pub outcome: &'a str,
}

impl Display for PromiseSettled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Promise {} {}", self.promise_id, self.outcome)
    }
}

impl StructuredLog for PromiseSettled<'_> {
    fn log(&self) {
        tracing::debug!(promise_id = self.promise_id, outcome = self.outcome, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "promise",
            span_name = name,
            promise_id = self.promise_id,
            outcome = self.outcome,
        )
    }
}

/// A queued microtask threw and nothing was waiting for the result.
///
/// # Log Level
/// `warn!` - Equivalent of an uncaught exception report
///
/// # Example
/// ```
/// use validation_bridge::observability::messages::promise::MicrotaskFailed;
///
/// let msg = MicrotaskFailed {
///     description: "Error: boom\n    at queueMicrotask",
/// };
///
/// tracing::warn!("{}", msg);
/// ```
pub struct MicrotaskFailed<'a> {
    pub description: &'a str,
}

impl Display for MicrotaskFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Uncaught exception in microtask: {}", self.description)
    }
}

impl StructuredLog for MicrotaskFailed<'_> {
    fn log(&self) {
        tracing::warn!(description = self.description, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("microtask", span_name = name)
    }
}

/// An async operation was dispatched to the host.
///
/// # Log Level
/// `debug!` - Internal state change
///
/// # Example
/// ```
/// use validation_bridge::observability::messages::promise::OperationDispatched;
///
/// let msg = OperationDispatched {
///     operation_id: 3,
///     kind: "fetch",
///     target: "https://example.com/v1/models",
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct OperationDispatched<'a> {
    pub operation_id: u64,
    pub kind: &'a str,
    pub target: &'a str,
}

impl Display for OperationDispatched<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dispatched {} operation {}: {}",
            self.kind, self.operation_id, self.target
        )
    }
}

impl StructuredLog for OperationDispatched<'_> {
    fn log(&self) {
        tracing::debug!(
            operation_id = self.operation_id,
            kind = self.kind,
            target = self.target,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "operation",
            span_name = name,
            operation_id = self.operation_id,
            kind = self.kind,
        )
    }
}

/// An async operation settled and its result was delivered.
///
/// # Log Level
/// `debug!` for success, `info!` for failures
///
/// # Example
/// ```
/// use validation_bridge::observability::messages::promise::OperationSettled;
/// use std::time::Duration;
///
/// let msg = OperationSettled {
///     operation_id: 3,
///     kind: "fetch",
///     outcome: "failure",
///     elapsed: Duration::from_millis(40),
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct OperationSettled<'a> {
    pub operation_id: u64,
    pub kind: &'a str,
    pub outcome: &'a str,
    pub elapsed: Duration,
}

impl Display for OperationSettled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} operation {} settled with {} after {:?}",
            self.kind, self.operation_id, self.outcome, self.elapsed
        )
    }
}

impl StructuredLog for OperationSettled<'_> {
    fn log(&self) {
        if self.outcome == "success" {
            tracing::debug!(
                operation_id = self.operation_id,
                kind = self.kind,
                outcome = self.outcome,
                elapsed_ms = self.elapsed.as_millis() as u64,
                "{}", self
            );
        } else {
            tracing::info!(
                operation_id = self.operation_id,
                kind = self.kind,
                outcome = self.outcome,
                elapsed_ms = self.elapsed.as_millis() as u64,
                "{}", self
            );
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "operation_settled",
            span_name = name,
            operation_id = self.operation_id,
            kind = self.kind,
            outcome = self.outcome,
            elapsed = ?self.elapsed,
        )
    }
}
