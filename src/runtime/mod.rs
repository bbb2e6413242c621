// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Loading, instantiating and driving the validation module.

pub mod detector;
pub mod engine;
pub mod instance;
pub mod loader;


pub use instance::ModuleRuntime;
