// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Scripted [`Fetcher`] for tests.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use async_trait::async_trait;

use crate::net::fetcher::{FetchError, FetchRequest, FetchResponse, Fetcher};

/// Answers from canned responses keyed by URL; unknown URLs get a 404.
#[derive(Default)]
pub struct MockFetcher {
    responses: RefCell<HashMap<String, FetchResponse>>,
    failure: RefCell<Option<String>>,
    hang: Cell<bool>,
    requests: RefCell<Vec<FetchRequest>>,
}

impl MockFetcher {
    pub fn respond(&self, url: &str, status: u16, body: &str) {
        self.responses.borrow_mut().insert(
            url.to_string(),
            FetchResponse {
                status,
                url: url.to_string(),
                headers: vec![("content-type".to_string(), "application/json".to_string())],
                body: body.as_bytes().to_vec(),
            },
        );
    }

    /// Fail every request with a network error.
    pub fn fail_with(&self, message: &str) {
        *self.failure.borrow_mut() = Some(message.to_string());
    }

    /// Never answer; the request only ends through abort or timeout.
    pub fn hang(&self) {
        self.hang.set(true);
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        let url = request.url.to_string();
        self.requests.borrow_mut().push(request);

        if self.hang.get() {
            futures::future::pending::<()>().await;
        }
        if let Some(message) = self.failure.borrow().clone() {
            return Err(FetchError::Network(message));
        }
        let response = self.responses.borrow().get(&url).cloned();
        Ok(response.unwrap_or(FetchResponse {
            status: 404,
            url,
            headers: Vec::new(),
            body: Vec::new(),
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
