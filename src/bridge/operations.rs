// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Async operation state machine.
//!
//! Every network-style call the module makes through an adapter is tracked
//! as `Idle -> Dispatched -> Settled(Success | Failure) -> Released`. No
//! transition skips `Dispatched`, and `Released` is only reachable from
//! `Settled`.

use std::fmt;
use std::time::Instant;

use futures::future::LocalBoxFuture;

use crate::bridge::promise::PromiseRef;
use crate::bridge::value::HostValue;
use crate::errors::{BridgeError, BridgeResult};
use crate::observability::messages::promise::{OperationDispatched, OperationSettled};
use crate::observability::messages::StructuredLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Idle,
    Dispatched,
    Settled(Outcome),
    Released,
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationState::Idle => write!(f, "Idle"),
            OperationState::Dispatched => write!(f, "Dispatched"),
            OperationState::Settled(Outcome::Success) => write!(f, "Settled(Success)"),
            OperationState::Settled(Outcome::Failure) => write!(f, "Settled(Failure)"),
            OperationState::Released => write!(f, "Released"),
        }
    }
}

/// One asynchronous call made through the adapter table.
#[derive(Debug)]
pub struct AsyncOperation {
    id: u64,
    kind: &'static str,
    state: OperationState,
    started: Option<Instant>,
}

impl AsyncOperation {
    pub fn new(id: u64, kind: &'static str) -> Self {
        Self {
            id,
            kind,
            state: OperationState::Idle,
            started: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn state(&self) -> OperationState {
        self.state
    }

    fn transition(&mut self, to: OperationState) -> BridgeResult<()> {
        let allowed = matches!(
            (self.state, to),
            (OperationState::Idle, OperationState::Dispatched)
                | (OperationState::Dispatched, OperationState::Settled(_))
                | (OperationState::Settled(_), OperationState::Released)
        );
        if !allowed {
            return Err(BridgeError::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        self.state = to;
        Ok(())
    }

    pub fn dispatch(&mut self, target: &str) -> BridgeResult<()> {
        self.transition(OperationState::Dispatched)?;
        self.started = Some(Instant::now());
        OperationDispatched {
            operation_id: self.id,
            kind: self.kind,
            target,
        }
        .log();
        Ok(())
    }

    pub fn settle(&mut self, outcome: Outcome) -> BridgeResult<()> {
        self.transition(OperationState::Settled(outcome))?;
        OperationSettled {
            operation_id: self.id,
            kind: self.kind,
            outcome: match outcome {
                Outcome::Success => "success",
                Outcome::Failure => "failure",
            },
            elapsed: self.started.map(|s| s.elapsed()).unwrap_or_default(),
        }
        .log();
        Ok(())
    }

    pub fn release(&mut self) -> BridgeResult<()> {
        self.transition(OperationState::Released)
    }
}

/// Counters over every operation the instance has dispatched.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OperationLedger {
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl OperationLedger {
    pub fn in_flight(&self) -> u64 {
        self.dispatched - self.succeeded - self.failed
    }

    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.succeeded += 1,
            Outcome::Failure => self.failed += 1,
        }
    }
}

/// The result of an I/O future, applied to its promise by the event loop.
pub struct IoCompletion {
    pub promise: PromiseRef,
    pub operation: AsyncOperation,
    pub outcome: Result<HostValue, HostValue>,
}

pub type IoFuture = LocalBoxFuture<'static, IoCompletion>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut op = AsyncOperation::new(1, "fetch");
        op.dispatch("https://example.com").unwrap();
        op.settle(Outcome::Failure).unwrap();
        op.release().unwrap();
        assert_eq!(op.state(), OperationState::Released);
    }

    #[test]
    fn test_cannot_skip_dispatch() {
        let mut op = AsyncOperation::new(1, "fetch");
        let err = op.settle(Outcome::Success).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::InvalidTransition { ref from, ref to } if from == "Idle" && to == "Settled(Success)"
        ));
        assert!(op.release().is_err());
    }

    #[test]
    fn test_settles_once() {
        let mut op = AsyncOperation::new(1, "text");
        op.dispatch("body").unwrap();
        op.settle(Outcome::Success).unwrap();
        assert!(op.settle(Outcome::Failure).is_err());
        assert_eq!(op.state(), OperationState::Settled(Outcome::Success));
    }

    #[test]
    fn test_released_is_terminal() {
        let mut op = AsyncOperation::new(1, "fetch");
        op.dispatch("x").unwrap();
        op.settle(Outcome::Success).unwrap();
        op.release().unwrap();
        assert!(op.dispatch("x").is_err());
        assert!(op.release().is_err());
    }

    #[test]
    fn test_ledger_in_flight() {
        let mut ledger = OperationLedger {
            dispatched: 3,
            ..Default::default()
        };
        ledger.record(Outcome::Success);
        ledger.record(Outcome::Failure);
        assert_eq!(ledger.in_flight(), 1);
    }
}
