//! HTTP transport seam: a replayable request value and a trait executing it.
//!
//! The token-refresh middleware in [`client`](super::client) needs to resend
//! the same request after a refresh, so requests are plain values rather than
//! one-shot builders. Tests script responses through the same trait.

use std::io::Read;
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;

use super::error::ApiError;

const USER_AGENT: &str = "packtgrab/0.1 (+https://github.com/packtgrab)";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const MAX_REDIRECTS: usize = 10;

/// One outbound API call. Cloneable so the client can replay it after a
/// token refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub json: Option<serde_json::Value>,
    /// Bearer token attached by the client; `None` for unauthenticated calls.
    pub bearer: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        ApiRequest {
            method,
            url: url.into(),
            query: Vec::new(),
            json: None,
            bearer: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn query(mut self, pairs: &[(&str, &str)]) -> Self {
        self.query
            .extend(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.json = Some(body);
        self
    }

    pub fn bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }
}

/// Response with status, optional length, and a lazily readable body, so the
/// downloader can stream large files without buffering them.
pub struct RawResponse {
    url: String,
    status: u16,
    content_length: Option<u64>,
    body: Box<dyn Read>,
}

impl RawResponse {
    pub fn new(
        url: impl Into<String>,
        status: u16,
        content_length: Option<u64>,
        body: Box<dyn Read>,
    ) -> Self {
        RawResponse {
            url: url.into(),
            status,
            content_length,
            body,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Consume the response, returning the body reader for streaming.
    pub fn into_body(self) -> Box<dyn Read> {
        self.body
    }

    /// Read the whole body and decode it as JSON.
    pub fn json<T: DeserializeOwned>(mut self) -> Result<T, ApiError> {
        let mut buf = Vec::new();
        self.body
            .read_to_end(&mut buf)
            .map_err(|e| ApiError::BodyRead {
                url: self.url.clone(),
                source: Box::new(e),
            })?;
        serde_json::from_slice(&buf).map_err(|e| ApiError::shape(self.url, e.to_string()))
    }
}

/// Executes an [ApiRequest]. Implemented by [ReqwestTransport] and by the
/// scripted transport used in tests.
pub trait Transport {
    fn execute(&self, request: &ApiRequest) -> Result<RawResponse, ApiError>;
}

/// Blocking reqwest-backed transport with cookie store and a browser-ish
/// User-Agent.
#[derive(Debug)]
pub struct ReqwestTransport {
    inner: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let inner = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(ReqwestTransport { inner })
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: &ApiRequest) -> Result<RawResponse, ApiError> {
        let mut builder = self
            .inner
            .request(request.method.clone(), &request.url)
            .query(&request.query);
        if let Some(ref token) = request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = request.json {
            builder = builder.json(body);
        }
        let response = builder
            .send()
            .map_err(|e| ApiError::network(request.url.clone(), e))?;
        let status = response.status().as_u16();
        let content_length = response.content_length();
        Ok(RawResponse::new(
            request.url.clone(),
            status,
            content_length,
            Box::new(response),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn request_builder_collects_query_and_body() {
        let request = ApiRequest::get("https://example.com/products")
            .query(&[("offset", "0"), ("limit", "25")])
            .bearer(Some("tok".to_string()));
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.query.len(), 2);
        assert_eq!(request.query[1], ("limit".to_string(), "25".to_string()));
        assert_eq!(request.bearer.as_deref(), Some("tok"));
        assert!(request.json.is_none());
    }

    #[test]
    fn raw_response_json_decodes_body() {
        let body = br#"{"data": [{"id": "x"}], "count": 1}"#.to_vec();
        let response = RawResponse::new(
            "https://example.com",
            200,
            Some(body.len() as u64),
            Box::new(Cursor::new(body)),
        );
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["count"], 1);
    }

    #[test]
    fn raw_response_json_rejects_malformed_body() {
        let response = RawResponse::new(
            "https://example.com",
            200,
            None,
            Box::new(Cursor::new(b"not json".to_vec())),
        );
        let result: Result<serde_json::Value, _> = response.json();
        assert!(matches!(result, Err(ApiError::UnexpectedShape { .. })));
    }

    #[test]
    fn raw_response_success_range() {
        let ok = RawResponse::new("u", 204, None, Box::new(Cursor::new(Vec::new())));
        let not_found = RawResponse::new("u", 404, None, Box::new(Cursor::new(Vec::new())));
        assert!(ok.is_success());
        assert!(!not_found.is_success());
    }
}
