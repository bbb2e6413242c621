// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Network capability and the host objects the fetch adapters expose.

pub mod fetcher;
#[cfg(test)]
pub mod mock;
pub mod objects;

pub use fetcher::{FetchError, FetchRequest, FetchResponse, Fetcher, ReqwestFetcher};
