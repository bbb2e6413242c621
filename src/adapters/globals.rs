// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Global scope accessors.
//!
//! Each accessor returns a handle to the global scope, or 0 when the host
//! does not expose that name. All configured accessors alias one scope.

use crate::bridge::abi::ModuleHost;
use crate::bridge::handles::alloc_handle;
use crate::config::GlobalScopeKind;
use crate::errors::BridgeResult;

pub fn static_accessor<H: ModuleHost + ?Sized>(host: &mut H, kind: GlobalScopeKind) -> BridgeResult<u32> {
    match host.state().global(kind) {
        Some(scope) => alloc_handle(host, scope),
        None => Ok(0),
    }
}
