// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! This module provides centralized message types for all diagnostic and operational
//! logging in the bridge. Message types follow a struct-based pattern with `Display`
//! trait implementation to:
//!
//! * Eliminate magic strings scattered throughout the codebase
//! * Keep field names consistent between the text and the structured fields
//! * Provide consistent, structured logging output
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::bridge` - memory views, string codec, handle table, host exceptions
//! * `messages::closure` - closure creation, release and destruction
//! * `messages::promise` - promise settlement, microtasks and async operations
//! * `messages::module` - module loading, instantiation, entry points and fatal faults
//!
//! # Usage
//!
//! ```rust
//! use validation_bridge::observability::messages::closure::ClosureDestroyed;
//! use validation_bridge::observability::messages::StructuredLog;
//!
//! ClosureDestroyed {
//!     closure_id: 7,
//!     trigger: "release",
//! }
//! .log();
//! ```

pub mod messages;
