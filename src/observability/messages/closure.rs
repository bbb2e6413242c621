// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for closure lifetime events.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A module callback was wrapped into a host function.
///
/// # Log Level
/// `debug!` - Internal state change
///
/// # Example
/// ```
/// use validation_bridge::observability::messages::closure::ClosureCreated;
///
/// let msg = ClosureCreated {
///     closure_id: 1,
///     code: 1048,
///     env: 1052,
///     dtor: 12,
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct ClosureCreated {
    pub closure_id: u64,
    pub code: u32,
    pub env: u32,
    pub dtor: u32,
}

impl Display for ClosureCreated {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Created closure {} (code={}, env={}, dtor={})",
            self.closure_id, self.code, self.env, self.dtor
        )
    }
}

impl StructuredLog for ClosureCreated {
    fn log(&self) {
        tracing::debug!(
            closure_id = self.closure_id,
            code = self.code,
            env = self.env,
            dtor = self.dtor,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "closure",
            span_name = name,
            closure_id = self.closure_id,
            code = self.code,
            env = self.env,
        )
    }
}

/// A closure destructor ran.
///
/// `trigger` is one of `invocation`, `release` or `finalizer`.
///
/// # Log Level
/// `debug!` - Internal state change
///
/// # Example
/// ```
/// use validation_bridge::observability::messages::closure::ClosureDestroyed;
///
/// let msg = ClosureDestroyed {
///     closure_id: 1,
///     trigger: "finalizer",
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct ClosureDestroyed<'a> {
    pub closure_id: u64,
    pub trigger: &'a str,
}

impl Display for ClosureDestroyed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Destroyed closure {} (trigger: {})",
            self.closure_id, self.trigger
        )
    }
}

impl StructuredLog for ClosureDestroyed<'_> {
    fn log(&self) {
        tracing::debug!(closure_id = self.closure_id, trigger = self.trigger, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "closure_destroyed",
            span_name = name,
            closure_id = self.closure_id,
            trigger = self.trigger,
        )
    }
}

/// A release arrived for a closure that has no references left.
///
/// # Log Level
/// `warn!` - The module released more often than it acquired
///
/// # Example
/// ```
/// use validation_bridge::observability::messages::closure::ClosureReleaseIgnored;
///
/// let msg = ClosureReleaseIgnored { closure_id: 4 };
///
/// tracing::warn!("{}", msg);
/// ```
pub struct ClosureReleaseIgnored {
    pub closure_id: u64,
}

impl Display for ClosureReleaseIgnored {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Ignored release of closure {}: reference count is already zero",
            self.closure_id
        )
    }
}

impl StructuredLog for ClosureReleaseIgnored {
    fn log(&self) {
        tracing::warn!(closure_id = self.closure_id, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("closure_release", span_name = name, closure_id = self.closure_id)
    }
}

/// A closure was invoked while in use or after destruction.
///
/// # Log Level
/// `warn!` - Surfaces to the caller as a thrown error
///
/// # Example
/// ```
/// use validation_bridge::observability::messages::closure::ClosureReentryRejected;
///
/// let msg = ClosureReentryRejected {
///     closure_id: 2,
///     destroyed: false,
/// };
///
/// tracing::warn!("{}", msg);
/// ```
pub struct ClosureReentryRejected {
    pub closure_id: u64,
    pub destroyed: bool,
}

impl Display for ClosureReentryRejected {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let reason = if self.destroyed {
            "after it was dropped"
        } else {
            "recursively"
        };
        write!(f, "Rejected call to closure {} {}", self.closure_id, reason)
    }
}

impl StructuredLog for ClosureReentryRejected {
    fn log(&self) {
        tracing::warn!(
            closure_id = self.closure_id,
            destroyed = self.destroyed,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("closure_reentry", span_name = name, closure_id = self.closure_id)
    }
}

/// Destructors queued by dropped wrappers were run.
///
/// # Log Level
/// `debug!` - Internal state change
///
/// # Example
/// ```
/// use validation_bridge::observability::messages::closure::FinalizersDrained;
///
/// let msg = FinalizersDrained { count: 2 };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct FinalizersDrained {
    pub count: usize,
}

impl Display for FinalizersDrained {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Ran {} queued closure destructor(s)", self.count)
    }
}

impl StructuredLog for FinalizersDrained {
    fn log(&self) {
        tracing::debug!(count = self.count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("finalizers", span_name = name, count = self.count)
    }
}
