// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod adapters;      // call adapter table (module imports)
pub mod bridge;        // marshaling layer: memory, strings, handles, closures, promises
pub mod config;        // config loading
pub mod errors;        // error handling
pub mod models;        // model selectors reported by the module
pub mod net;           // fetch capability
pub mod observability;
pub mod runtime;       // module loading and entry points

pub use models::{SupportedModel, SupportedModels};
pub use runtime::ModuleRuntime;
