// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Engine construction for the validation module.

use wasmtime::{Config, Engine};

use crate::errors::{BridgeError, BridgeResult};

/// Create a fuel-metered engine for a core module.
///
/// Only the proposals the bridge ABI relies on stay enabled. Fuel is always
/// on so every entry point and event-loop turn runs under a budget.
pub fn create_engine() -> BridgeResult<Engine> {
    let mut config = Config::new();

    config.wasm_component_model(false);
    config.wasm_threads(false);
    config.wasm_simd(false);
    config.wasm_relaxed_simd(false);
    config.wasm_multi_memory(false);
    config.wasm_memory64(false);
    config.consume_fuel(true);
    config.epoch_interruption(false);

    tracing::debug!("Creating fuel-metered engine for core module");
    Engine::new(&config).map_err(|e| BridgeError::EngineError(e.to_string()))
}
