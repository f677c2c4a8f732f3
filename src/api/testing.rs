//! Scripted transport for tests: replays queued responses and records every
//! request so call counts and ordering can be asserted.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::Cursor;

use reqwest::Method;
use serde_json::json;

use super::error::ApiError;
use super::transport::{ApiRequest, RawResponse, Transport};

/// A request as seen by the transport, with owned fields for assertions.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub json: Option<serde_json::Value>,
    pub bearer: Option<String>,
}

/// One canned response. Bodies are bytes so the downloader's streaming path
/// can be exercised too.
pub struct ScriptedResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub content_length: Option<u64>,
}

impl ScriptedResponse {
    pub fn ok_json(value: serde_json::Value) -> Self {
        let body = serde_json::to_vec(&value).unwrap();
        ScriptedResponse {
            status: 200,
            content_length: Some(body.len() as u64),
            body,
        }
    }

    pub fn status(status: u16) -> Self {
        ScriptedResponse {
            status,
            body: Vec::new(),
            content_length: None,
        }
    }

    pub fn ok_bytes(body: Vec<u8>) -> Self {
        ScriptedResponse {
            status: 200,
            content_length: Some(body.len() as u64),
            body,
        }
    }
}

/// A successful login response carrying the given access token.
pub fn token_response(token: &str) -> ScriptedResponse {
    ScriptedResponse::ok_json(json!({"data": {"access": token}}))
}

/// Transport that pops one scripted response per request. Panics when a
/// request arrives with the script exhausted, failing the test loudly.
pub struct ScriptedTransport {
    responses: RefCell<VecDeque<ScriptedResponse>>,
    requests: RefCell<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        ScriptedTransport {
            responses: RefCell::new(responses.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.borrow().clone()
    }

    /// Requests whose URL contains the given fragment.
    pub fn requests_to(&self, url_fragment: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.contains(url_fragment))
            .collect()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: &ApiRequest) -> Result<RawResponse, ApiError> {
        self.requests.borrow_mut().push(RecordedRequest {
            method: request.method.clone(),
            url: request.url.clone(),
            query: request.query.clone(),
            json: request.json.clone(),
            bearer: request.bearer.clone(),
        });
        let scripted = self
            .responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected request: {} {}", request.method, request.url));
        Ok(RawResponse::new(
            request.url.clone(),
            scripted.status,
            scripted.content_length,
            Box::new(Cursor::new(scripted.body)),
        ))
    }
}
