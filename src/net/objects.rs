// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Host objects behind the network adapters.
//!
//! `Headers`, `Request`, `Response` and `AbortController` values the module
//! builds and inspects through handles. Construction failures are returned
//! as host error values so adapters can throw them into the module.

use std::cell::RefCell;
use std::rc::Rc;

use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Method, Url};
use tokio_util::sync::CancellationToken;

use crate::bridge::value::HostValue;
use crate::errors::{BridgeError, BridgeResult};
use crate::net::fetcher::{FetchRequest, FetchResponse};

/// An ordered header list. Names are stored lowercased.
#[derive(Debug, Default)]
pub struct HeaderList {
    entries: RefCell<Vec<(String, String)>>,
}

impl HeaderList {
    /// `headers.append(name, value)`.
    ///
    /// Rejects names and values that could not be sent on the wire.
    pub fn append(&self, name: &str, value: &str) -> Result<(), HostValue> {
        let header = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            HostValue::error_at(
                "TypeError",
                format!("Failed to execute 'append' on 'Headers': Invalid name: {}", name),
                "Headers.append",
            )
        })?;
        let trimmed = value.trim_matches(|c| c == ' ' || c == '\t');
        HeaderValue::from_str(trimmed).map_err(|_| {
            HostValue::error_at(
                "TypeError",
                format!("Failed to execute 'append' on 'Headers': Invalid value for {}", name),
                "Headers.append",
            )
        })?;
        self.entries
            .borrow_mut()
            .push((header.as_str().to_string(), trimmed.to_string()));
        Ok(())
    }

    /// All values for `name`, joined the way `headers.get` joins them.
    pub fn get(&self, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        let values: Vec<String> = self
            .entries
            .borrow()
            .iter()
            .filter(|(k, _)| *k == name)
            .map(|(_, v)| v.clone())
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.join(", "))
        }
    }

    pub fn has(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.entries.borrow().iter().any(|(k, _)| *k == name)
    }

    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

/// `RequestCredentials`, in discriminant order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestCredentials {
    Omit,
    #[default]
    SameOrigin,
    Include,
}

impl RequestCredentials {
    const NAMES: [&'static str; 3] = ["omit", "same-origin", "include"];

    pub fn from_discriminant(value: i32) -> BridgeResult<Self> {
        match value {
            0 => Ok(RequestCredentials::Omit),
            1 => Ok(RequestCredentials::SameOrigin),
            2 => Ok(RequestCredentials::Include),
            _ => Err(BridgeError::InvalidEnumValue {
                name: "RequestCredentials",
                value,
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        Self::NAMES[self as usize]
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .position(|n| *n == name)
            .and_then(|i| Self::from_discriminant(i as i32).ok())
    }
}

/// `RequestMode`, in discriminant order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    SameOrigin,
    NoCors,
    #[default]
    Cors,
    Navigate,
}

impl RequestMode {
    const NAMES: [&'static str; 4] = ["same-origin", "no-cors", "cors", "navigate"];

    pub fn from_discriminant(value: i32) -> BridgeResult<Self> {
        match value {
            0 => Ok(RequestMode::SameOrigin),
            1 => Ok(RequestMode::NoCors),
            2 => Ok(RequestMode::Cors),
            3 => Ok(RequestMode::Navigate),
            _ => Err(BridgeError::InvalidEnumValue {
                name: "RequestMode",
                value,
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        Self::NAMES[self as usize]
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::NAMES
            .iter()
            .position(|n| *n == name)
            .and_then(|i| Self::from_discriminant(i as i32).ok())
    }
}

/// A constructed `Request`.
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: Rc<HeaderList>,
    pub body: Option<Vec<u8>>,
    pub credentials: RequestCredentials,
    pub mode: RequestMode,
    pub signal: Option<AbortSignal>,
}

fn request_error(message: impl Into<String>) -> HostValue {
    HostValue::error_at(
        "TypeError",
        format!("Failed to construct 'Request': {}", message.into()),
        "Request",
    )
}

impl Request {
    /// `new Request(url, init)`.
    ///
    /// `init` is the plain object filled in by the `RequestInit` setters;
    /// `undefined` means no options.
    pub fn construct(url: &str, init: &HostValue) -> Result<Self, HostValue> {
        let url = Url::parse(url).map_err(|_| request_error(format!("Invalid URL '{}'", url)))?;

        let option = |key: &str| match init {
            HostValue::Object(object) => object.get(key).unwrap_or(HostValue::Undefined),
            _ => HostValue::Undefined,
        };

        let method = match option("method") {
            HostValue::Undefined => Method::GET,
            value => parse_method(&value.to_display_string())?,
        };

        let mut content_type = None;
        let body = match option("body") {
            HostValue::Undefined | HostValue::Null => None,
            HostValue::Bytes(bytes) => Some(bytes.to_vec()),
            HostValue::String(text) => {
                content_type = Some("text/plain;charset=UTF-8");
                Some(text.as_bytes().to_vec())
            }
            other => {
                content_type = Some("text/plain;charset=UTF-8");
                Some(other.to_display_string().into_bytes())
            }
        };
        if body.is_some() && (method == Method::GET || method == Method::HEAD) {
            return Err(request_error("Request with GET/HEAD method cannot have body."));
        }

        let headers = HeaderList::default();
        match option("headers") {
            HostValue::Undefined | HostValue::Null => {}
            HostValue::Headers(list) => {
                for (name, value) in list.entries() {
                    headers.append(&name, &value)?;
                }
            }
            HostValue::Object(object) => {
                for (name, value) in object.entries() {
                    headers.append(&name, &value.to_display_string())?;
                }
            }
            other => {
                return Err(request_error(format!(
                    "headers must be a Headers object or a record, got {}",
                    other.kind_name()
                )))
            }
        }
        if let Some(content_type) = content_type {
            if !headers.has("content-type") {
                headers.append("content-type", content_type)?;
            }
        }

        let credentials = match option("credentials") {
            HostValue::Undefined => RequestCredentials::default(),
            value => {
                let name = value.to_display_string();
                RequestCredentials::parse(&name).ok_or_else(|| {
                    request_error(format!("'{}' is not a valid RequestCredentials value", name))
                })?
            }
        };
        let mode = match option("mode") {
            HostValue::Undefined => RequestMode::default(),
            value => {
                let name = value.to_display_string();
                RequestMode::parse(&name)
                    .ok_or_else(|| request_error(format!("'{}' is not a valid RequestMode value", name)))?
            }
        };
        let signal = match option("signal") {
            HostValue::Undefined | HostValue::Null => None,
            HostValue::AbortSignal(signal) => Some(signal),
            other => {
                return Err(request_error(format!(
                    "signal must be an AbortSignal, got {}",
                    other.kind_name()
                )))
            }
        };

        Ok(Self {
            method,
            url,
            headers: Rc::new(headers),
            body,
            credentials,
            mode,
            signal,
        })
    }

    /// The owned description handed to a [`Fetcher`](crate::net::Fetcher).
    pub fn to_fetch_request(&self) -> FetchRequest {
        FetchRequest {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.entries(),
            body: self.body.clone(),
            credentials: self.credentials,
            mode: self.mode,
        }
    }
}

fn parse_method(name: &str) -> Result<Method, HostValue> {
    // the standard methods are matched case-insensitively and normalised
    const NORMALISED: [&str; 7] = ["DELETE", "GET", "HEAD", "OPTIONS", "POST", "PUT", "PATCH"];
    let upper = name.to_ascii_uppercase();
    let name = if NORMALISED.contains(&upper.as_str()) {
        upper.as_str()
    } else {
        name
    };
    Method::from_bytes(name.as_bytes())
        .map_err(|_| request_error(format!("'{}' is not a valid HTTP method.", name)))
}

/// A received `Response`. The body can be consumed once.
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub url: String,
    pub headers: Rc<HeaderList>,
    body: RefCell<Option<Vec<u8>>>,
}

impl Response {
    pub fn from_fetch(response: FetchResponse) -> Self {
        let headers = HeaderList::default();
        for (name, value) in &response.headers {
            // invalid headers from the transport are dropped, not fatal
            let _ = headers.append(name, value);
        }
        Self {
            status: response.status,
            url: response.url,
            headers: Rc::new(headers),
            body: RefCell::new(Some(response.body)),
        }
    }

    /// `response.ok`.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Take the body. `None` once it has been read.
    pub fn take_body(&self) -> Option<Vec<u8>> {
        self.body.borrow_mut().take()
    }

    pub fn body_used(&self) -> bool {
        self.body.borrow().is_none()
    }
}

struct SignalState {
    token: CancellationToken,
    reason: RefCell<Option<HostValue>>,
}

/// `AbortSignal`. Clones observe the same abort.
#[derive(Clone)]
pub struct AbortSignal {
    inner: Rc<SignalState>,
}

impl std::fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortSignal")
            .field("aborted", &self.aborted())
            .finish()
    }
}

impl Default for AbortSignal {
    fn default() -> Self {
        Self {
            inner: Rc::new(SignalState {
                token: CancellationToken::new(),
                reason: RefCell::new(None),
            }),
        }
    }
}

impl AbortSignal {
    pub fn aborted(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Abort once; later calls keep the first reason.
    pub fn abort(&self, reason: Option<HostValue>) {
        if self.aborted() {
            return;
        }
        let reason = reason
            .filter(|r| !r.is_undefined())
            .unwrap_or_else(|| {
                HostValue::error_at("AbortError", "signal is aborted without reason", "AbortController.abort")
            });
        *self.inner.reason.borrow_mut() = Some(reason);
        self.inner.token.cancel();
    }

    /// `signal.reason`; `undefined` until aborted.
    pub fn reason(&self) -> HostValue {
        self.inner
            .reason
            .borrow()
            .clone()
            .unwrap_or(HostValue::Undefined)
    }

    /// Token cancelled when the signal aborts.
    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    pub fn same_signal(&self, other: &AbortSignal) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// `AbortController`.
#[derive(Debug, Default)]
pub struct AbortController {
    pub signal: AbortSignal,
}

impl AbortController {
    pub fn abort(&self, reason: Option<HostValue>) {
        self.signal.abort(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init(pairs: &[(&str, HostValue)]) -> HostValue {
        let object = HostValue::new_object();
        if let HostValue::Object(o) = &object {
            for (key, value) in pairs {
                o.set(key, value.clone());
            }
        }
        object
    }

    fn error_message(value: HostValue) -> String {
        match value {
            HostValue::Error(err) => format!("{}: {}", err.name, err.message),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_enum_discriminants() {
        assert_eq!(RequestCredentials::from_discriminant(2).unwrap().as_str(), "include");
        assert_eq!(RequestMode::from_discriminant(1).unwrap().as_str(), "no-cors");
        assert!(matches!(
            RequestMode::from_discriminant(4),
            Err(BridgeError::InvalidEnumValue { name: "RequestMode", value: 4 })
        ));
        assert!(RequestCredentials::from_discriminant(-1).is_err());
    }

    #[test]
    fn test_headers_join_and_lowercase() {
        let headers = HeaderList::default();
        headers.append("Accept", "text/plain").unwrap();
        headers.append("accept", " application/json ").unwrap();
        assert_eq!(headers.get("ACCEPT").as_deref(), Some("text/plain, application/json"));
        assert_eq!(headers.entries()[0].0, "accept");
    }

    #[test]
    fn test_headers_reject_invalid_names() {
        let headers = HeaderList::default();
        let err = headers.append("bad name", "x").unwrap_err();
        assert!(error_message(err).starts_with("TypeError"));
        assert!(headers.is_empty());
    }

    #[test]
    fn test_request_defaults() {
        let request = Request::construct("https://example.com/api", &HostValue::Undefined).unwrap();
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.credentials, RequestCredentials::SameOrigin);
        assert_eq!(request.mode, RequestMode::Cors);
        assert!(request.body.is_none());
    }

    #[test]
    fn test_request_reads_init_options() {
        let headers = Rc::new(HeaderList::default());
        headers.append("x-api-key", "secret").unwrap();
        let init = init(&[
            ("method", "post".into()),
            ("body", r#"{"q":1}"#.into()),
            ("headers", HostValue::Headers(headers)),
            ("mode", "cors".into()),
            ("credentials", "omit".into()),
        ]);

        let request = Request::construct("https://example.com/", &init).unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.body.as_deref(), Some(br#"{"q":1}"#.as_slice()));
        assert_eq!(request.headers.get("x-api-key").as_deref(), Some("secret"));
        assert_eq!(
            request.headers.get("content-type").as_deref(),
            Some("text/plain;charset=UTF-8")
        );
        assert_eq!(request.credentials, RequestCredentials::Omit);
    }

    #[test]
    fn test_explicit_content_type_is_kept() {
        let headers = Rc::new(HeaderList::default());
        headers.append("Content-Type", "application/json").unwrap();
        let init = init(&[
            ("method", "POST".into()),
            ("body", "{}".into()),
            ("headers", HostValue::Headers(headers)),
        ]);
        let request = Request::construct("https://example.com/", &init).unwrap();
        assert_eq!(request.headers.get("content-type").as_deref(), Some("application/json"));
    }

    #[test]
    fn test_request_rejects_invalid_url() {
        let err = Request::construct("not a url", &HostValue::Undefined).unwrap_err();
        assert!(error_message(err).contains("Invalid URL"));
    }

    #[test]
    fn test_get_with_body_is_rejected() {
        let init = init(&[("body", "payload".into())]);
        let err = Request::construct("https://example.com/", &init).unwrap_err();
        assert!(error_message(err).contains("GET/HEAD"));
    }

    #[test]
    fn test_abort_keeps_first_reason() {
        let controller = AbortController::default();
        let signal = controller.signal.clone();
        assert!(signal.reason().is_undefined());

        controller.abort(None);
        controller.abort(Some("later".into()));

        assert!(signal.aborted());
        assert!(signal.token().is_cancelled());
        assert_eq!(
            error_message(signal.reason()),
            "AbortError: signal is aborted without reason"
        );
    }

    #[test]
    fn test_response_body_reads_once() {
        let response = Response::from_fetch(FetchResponse {
            status: 201,
            url: "https://example.com/".to_string(),
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body: b"ok".to_vec(),
        });
        assert!(response.ok());
        assert_eq!(response.headers.get("content-type").as_deref(), Some("text/plain"));
        assert_eq!(response.take_body(), Some(b"ok".to_vec()));
        assert!(response.body_used());
        assert_eq!(response.take_body(), None);
    }
}
