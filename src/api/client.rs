//! Authenticated API client: attaches the bearer token to every request and
//! refreshes it exactly once when the platform answers 401.

use log::{error, info};
use serde::Deserialize;
use serde_json::json;

use super::error::ApiError;
use super::transport::{ApiRequest, RawResponse, Transport};
use super::LOGIN_URL;
use crate::model::Credentials;

/// Shape of the login response: `{"data": {"access": "<jwt>"}}`.
#[derive(Debug, Deserialize)]
struct TokenEnvelope {
    data: TokenData,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    access: String,
}

/// API client making platform requests on the user's behalf.
///
/// The bearer token is the only mutable state. It is fetched eagerly at
/// construction (failure is logged and leaves the client unauthenticated, so
/// the first 401 triggers a fresh fetch) and replaced at most once per
/// request when the platform rejects it.
pub struct ApiClient<T: Transport> {
    transport: T,
    credentials: Credentials,
    token: Option<String>,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T, credentials: Credentials) -> Self {
        let mut client = ApiClient {
            transport,
            credentials,
            token: None,
        };
        client.refresh_token();
        client
    }

    /// Fetch a fresh access token and store it. Failure is logged, never
    /// raised: the next request then goes out unauthenticated and surfaces
    /// the upstream error on its own.
    fn refresh_token(&mut self) {
        match self.fetch_token() {
            Ok(token) => {
                self.token = Some(token);
                info!("Access token has been fetched successfully.");
            }
            Err(e) => {
                error!("Fetching access token failed: {}", e);
            }
        }
    }

    fn fetch_token(&self) -> Result<String, ApiError> {
        let request = ApiRequest::post(LOGIN_URL).json(json!({
            "username": self.credentials.email,
            "password": self.credentials.password,
        }));
        let response = self.transport.execute(&request)?;
        if !response.is_success() {
            return Err(ApiError::HttpStatus {
                status: response.status(),
                url: LOGIN_URL.to_string(),
                context: Some("login".to_string()),
            });
        }
        let envelope: TokenEnvelope = response.json()?;
        Ok(envelope.data.access)
    }

    /// Execute a request with the current token. On 401, refresh the token
    /// once and resend the same request a single time; any further 401 is
    /// returned as-is.
    pub fn request(&mut self, request: ApiRequest) -> Result<RawResponse, ApiError> {
        let first = request.clone().bearer(self.token.clone());
        let response = self.transport.execute(&first)?;
        if response.status() != 401 {
            return Ok(response);
        }
        info!("Access token was rejected, fetching a new one.");
        self.refresh_token();
        let retry = request.bearer(self.token.clone());
        self.transport.execute(&retry)
    }

    pub fn get(&mut self, url: impl Into<String>) -> Result<RawResponse, ApiError> {
        self.request(ApiRequest::get(url))
    }

    pub fn get_with_query(
        &mut self,
        url: impl Into<String>,
        query: &[(&str, &str)],
    ) -> Result<RawResponse, ApiError> {
        self.request(ApiRequest::get(url).query(query))
    }

    pub fn put_json(
        &mut self,
        url: impl Into<String>,
        body: serde_json::Value,
    ) -> Result<RawResponse, ApiError> {
        self.request(ApiRequest::put(url).json(body))
    }

    /// Test hook: inspect the transport's recorded requests.
    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{token_response, ScriptedResponse, ScriptedTransport};

    fn credentials() -> Credentials {
        Credentials {
            email: "user@example.com".to_string(),
            password: "hunter2".to_string(),
        }
    }

    #[test]
    fn construction_fetches_token_eagerly() {
        let transport = ScriptedTransport::new(vec![token_response("jwt-1")]);
        let client = ApiClient::new(transport, credentials());
        assert_eq!(client.token.as_deref(), Some("jwt-1"));
        let recorded = client.transport.requests();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].url, LOGIN_URL);
        assert_eq!(recorded[0].json.as_ref().unwrap()["username"], "user@example.com");
    }

    #[test]
    fn failed_initial_fetch_leaves_client_usable() {
        let transport = ScriptedTransport::new(vec![
            ScriptedResponse::status(500),
            ScriptedResponse::ok_json(json!({"ok": true})),
        ]);
        let mut client = ApiClient::new(transport, credentials());
        assert!(client.token.is_none());

        let response = client.get("https://example.com/thing").unwrap();
        assert_eq!(response.status(), 200);
        // Second recorded request is the GET, sent without a bearer token.
        let recorded = client.transport.requests();
        assert_eq!(recorded.len(), 2);
        assert!(recorded[1].bearer.is_none());
    }

    #[test]
    fn refreshes_once_on_401_and_returns_retried_response() {
        let transport = ScriptedTransport::new(vec![
            token_response("jwt-1"),
            ScriptedResponse::status(401),
            token_response("jwt-2"),
            ScriptedResponse::ok_json(json!({"data": []})),
        ]);
        let mut client = ApiClient::new(transport, credentials());

        let response = client.get("https://example.com/products").unwrap();
        assert_eq!(response.status(), 200);

        let recorded = client.transport.requests();
        assert_eq!(recorded.len(), 4);
        assert_eq!(recorded[1].bearer.as_deref(), Some("jwt-1"));
        assert_eq!(recorded[2].url, LOGIN_URL);
        assert_eq!(recorded[3].bearer.as_deref(), Some("jwt-2"));
    }

    #[test]
    fn second_401_is_returned_without_a_third_attempt() {
        let transport = ScriptedTransport::new(vec![
            token_response("jwt-1"),
            ScriptedResponse::status(401),
            token_response("jwt-2"),
            ScriptedResponse::status(401),
        ]);
        let mut client = ApiClient::new(transport, credentials());

        let response = client.get("https://example.com/products").unwrap();
        assert_eq!(response.status(), 401);
        // login, GET, login, GET: exactly four requests, no further retry.
        assert_eq!(client.transport.requests().len(), 4);
    }

    #[test]
    fn non_401_statuses_are_not_retried() {
        let transport = ScriptedTransport::new(vec![
            token_response("jwt-1"),
            ScriptedResponse::status(503),
        ]);
        let mut client = ApiClient::new(transport, credentials());

        let response = client.get("https://example.com/products").unwrap();
        assert_eq!(response.status(), 503);
        assert_eq!(client.transport.requests().len(), 2);
    }
}
