//! Academy REST client
//!
//! Single chokepoint for HTTP calls:
//! - Owns the in-memory bearer token shared by every clone of the client
//! - Sends JSON headers and `Authorization: Bearer` when a token is set
//! - Normalizes transport and HTTP failures into [`Error`]
//!
//! The client never retries and never reads persisted storage; the session
//! manager decides which token it holds.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client as HttpClient, Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::ApiConfig;
use crate::error::{Error, Result};

use super::endpoints;
use super::types::{ApiErrorBody, AuthResponse, AuthResult, Credentials, RegisterRequest, User};

const JSON: &str = "application/json";

/// Default request timeout when none is configured
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Bearer credential held in memory, zeroed when replaced or dropped
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct BearerToken {
    inner: String,
}

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            inner: token.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

/// Academy REST client
///
/// Cheap to clone. All clones share the same in-memory token, so the token
/// set by the session manager is the one feature-level fetches send.
#[derive(Clone)]
pub struct ApiClient {
    /// HTTP client for making requests
    http_client: HttpClient,
    /// Base URL every relative path is joined onto
    base_url: String,
    token: Arc<RwLock<Option<BearerToken>>>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("has_token", &self.has_token())
            .finish()
    }
}

/// Builder for creating an ApiClient
#[derive(Debug, Default)]
pub struct ApiClientBuilder {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

impl ApiClientBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API base URL, e.g. `https://academy.example.com/api`
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Build the ApiClient
    pub fn build(self) -> Result<ApiClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Config("API base URL is required".to_string()))?;
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|e| Error::Config(format!("Invalid API base URL '{}': {}", base_url, e)))?;

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(
                self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ))
            .build()
            .map_err(Error::Network)?;

        Ok(ApiClient {
            http_client,
            base_url,
            token: Arc::new(RwLock::new(None)),
        })
    }
}

impl ApiClient {
    /// Create a client from configuration
    pub fn new(config: &ApiConfig) -> Result<Self> {
        ApiClientBuilder::new()
            .base_url(config.resolved_base_url())
            .timeout_secs(config.timeout_secs)
            .build()
    }

    /// Create a new builder for ApiClient
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ========== In-memory token ==========

    /// Replace the token used by subsequent requests
    pub fn set_token(&self, token: Option<&str>) {
        let mut slot = self.token.write().unwrap_or_else(PoisonError::into_inner);
        *slot = token.map(BearerToken::new);
        debug!(has_token = slot.is_some(), "API token set in memory");
    }

    /// Forget the in-memory token
    pub fn clear_token(&self) {
        self.set_token(None);
    }

    /// Current in-memory token
    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|t| t.as_str().to_string())
    }

    pub fn has_token(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    // ========== Requests ==========

    /// Resolve a path against the base URL; absolute URLs pass through
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Resolve a path and append URL-encoded query parameters
    pub fn url_with_query(&self, path: &str, query: &[(&str, &str)]) -> Result<String> {
        let mut url = Url::parse(&self.url(path))
            .map_err(|e| Error::InvalidInput(format!("Invalid URL for '{}': {}", path, e)))?;
        url.query_pairs_mut().extend_pairs(query);
        Ok(url.to_string())
    }

    /// Issue a request and normalize the outcome
    ///
    /// Resolves to `None` for 204 responses and for 2xx responses whose body
    /// is empty or not JSON. Callers of endpoints that may return no content
    /// must treat `None` as success.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Option<T>> {
        // Read the token once so a concurrent set_token cannot split a request
        let token = self.token();
        self.send(method, path, body, token.as_deref()).await
    }

    /// Like [`request`](Self::request), but authenticated with `token`
    /// instead of the shared in-memory one, which is left untouched
    pub async fn request_as<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        token: &str,
    ) -> Result<Option<T>> {
        self.send(method, path, body, Some(token)).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Result<Option<T>> {
        let url = self.url(path);

        let mut builder = self
            .http_client
            .request(method.clone(), &url)
            .header(CONTENT_TYPE, JSON)
            .header(ACCEPT, JSON);

        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.body(serde_json::to_vec(&body)?);
        }

        debug!(method = %method, url = %url, has_token = token.is_some(), "Sending request");

        let response = builder.send().await.map_err(|e| {
            warn!(method = %method, url = %url, error = %e, "Request failed before a response");
            Error::Network(e)
        })?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            debug!(status = status.as_u16(), "No content");
            return Ok(None);
        }

        let text = response.text().await.map_err(Error::Network)?;
        let parsed = serde_json::from_str::<Value>(&text).ok();

        match parsed {
            None if status.is_success() => {
                if !text.trim().is_empty() {
                    warn!(status = status.as_u16(), url = %url, "Could not parse JSON for successful response");
                }
                Ok(None)
            }
            None => {
                let message = status
                    .canonical_reason()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("HTTP error {}", status.as_u16()));
                warn!(status = status.as_u16(), url = %url, "Error response without JSON body");
                Err(Error::http(status.as_u16(), message))
            }
            Some(body) if !status.is_success() => Err(error_from_body(status, body)),
            Some(body) => serde_json::from_value(body).map(Some).map_err(|e| {
                Error::MalformedResponse(format!("Unexpected response from {}: {}", path, e))
            }),
        }
    }

    /// GET a JSON resource
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        self.request(Method::GET, path, None).await
    }

    /// POST a JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<T>> {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, path, Some(body)).await
    }

    /// POST without a body
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        self.request(Method::POST, path, None).await
    }

    // ========== Auth ==========

    /// Submit credentials and normalize the server's answer
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthResult> {
        let response: AuthResponse = self
            .post(endpoints::AUTH_LOGIN, credentials)
            .await?
            .ok_or_else(|| {
                Error::MalformedResponse("empty authentication response".to_string())
            })?;
        response.normalize()
    }

    /// Create an account; the server does not sign the user in
    pub async fn register(&self, request: &RegisterRequest) -> Result<()> {
        self.post::<Value, _>(endpoints::AUTH_REGISTER, request)
            .await?;
        Ok(())
    }

    /// Fetch the profile behind the current token
    pub async fn current_user(&self) -> Result<User> {
        self.get(endpoints::AUTH_CURRENT_USER)
            .await?
            .ok_or_else(|| Error::MalformedResponse("empty current-user response".to_string()))
    }

    /// Fetch the profile behind `token` without adopting it
    pub async fn current_user_as(&self, token: &str) -> Result<User> {
        self.request_as(Method::GET, endpoints::AUTH_CURRENT_USER, None, token)
            .await?
            .ok_or_else(|| Error::MalformedResponse("empty current-user response".to_string()))
    }

    /// Tell the server the token is done with
    ///
    /// Only the server call; the caller decides what to clear locally.
    pub async fn logout(&self) -> Result<()> {
        self.post_empty::<Value>(endpoints::AUTH_LOGOUT).await?;
        Ok(())
    }

    /// Tell the server `token` is done with, whatever the shared token is
    pub async fn logout_as(&self, token: &str) -> Result<()> {
        self.request_as::<Value>(Method::POST, endpoints::AUTH_LOGOUT, None, token)
            .await?;
        Ok(())
    }
}

/// Build the error for a non-2xx response that carried JSON
fn error_from_body(status: StatusCode, body: Value) -> Error {
    let envelope = ApiErrorBody::from_value(&body);
    let message = envelope.message_or(status.as_u16());
    warn!(status = status.as_u16(), message = %message, "Error response");
    Error::Http {
        status: status.as_u16(),
        message,
        details: envelope.details.or(Some(body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::builder()
            .base_url(format!("{}/api", server.uri()))
            .timeout_secs(5)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_base_url() {
        assert!(matches!(ApiClient::builder().build(), Err(Error::Config(_))));
        assert!(ApiClient::builder().base_url("not a url").build().is_err());
    }

    #[test]
    fn test_url_joining() {
        let client = ApiClient::builder()
            .base_url("https://academy.example.com/api/")
            .build()
            .unwrap();
        assert_eq!(client.url("/courses"), "https://academy.example.com/api/courses");
        assert_eq!(client.url("courses"), "https://academy.example.com/api/courses");
        assert_eq!(client.url("https://other.example/x"), "https://other.example/x");
        assert_eq!(
            client
                .url_with_query("/companies/search", &[("query", "moulage & co")])
                .unwrap(),
            "https://academy.example.com/api/companies/search?query=moulage+%26+co"
        );
    }

    #[test]
    fn test_token_is_shared_between_clones_and_redacted() {
        let client = ApiClient::builder()
            .base_url("https://academy.example.com/api")
            .build()
            .unwrap();
        let clone = client.clone();

        client.set_token(Some("secret-token"));
        assert_eq!(clone.token().as_deref(), Some("secret-token"));
        assert!(!format!("{:?}", client).contains("secret-token"));

        clone.clear_token();
        assert!(client.token().is_none());
        assert!(!client.has_token());
    }

    #[test]
    fn test_client_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ApiClient>();
    }

    #[tokio::test]
    async fn test_sends_json_and_bearer_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/me"))
            .and(header("Accept", "application/json"))
            .and(header("Content-Type", "application/json"))
            .and(header("Authorization", "Bearer abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1, "username": "marie", "email": "m@example.com", "role": "ROLE_LEARNER"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.set_token(Some("abc"));
        let user = client.current_user().await.unwrap();
        assert_eq!(user.username, "marie");
    }

    #[tokio::test]
    async fn test_explicit_token_leaves_shared_token_alone() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/me"))
            .and(header("Authorization", "Bearer other"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 2, "username": "paul", "email": "p@example.com", "role": "ROLE_ADMIN"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.set_token(Some("shared"));
        let user = client.current_user_as("other").await.unwrap();
        assert_eq!(user.id, 2);
        assert_eq!(client.token().as_deref(), Some("shared"));
    }

    #[tokio::test]
    async fn test_no_authorization_header_without_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/courses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let courses: Option<Vec<Value>> = client.get("/courses").await.unwrap();
        assert_eq!(courses, Some(vec![]));

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_no_content_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/register"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result: Option<Value> = client
            .post("/auth/register", &json!({"username": "x"}))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_empty_success_body_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/logout"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.logout().await.is_ok());
    }

    #[tokio::test]
    async fn test_error_message_from_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(body_json(json!({"username": "a@b.com", "password": "wrong"})))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .login(&Credentials::new("a@b.com", "wrong"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.message(), "Bad credentials");
        assert_eq!(err.details(), Some(&json!({"message": "Bad credentials"})));
    }

    #[tokio::test]
    async fn test_error_details_and_generic_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/payments/me"))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(json!({"details": {"field": "amount"}})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.get::<Value>("/payments/me").await.unwrap_err();
        assert_eq!(err.message(), "HTTP error! status: 422");
        assert_eq!(err.details(), Some(&json!({"field": "amount"})));
    }

    #[tokio::test]
    async fn test_unparsable_error_body_uses_status_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/events"))
            .respond_with(ResponseTemplate::new(500).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.get::<Value>("/events").await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.message(), "Internal Server Error");
    }

    #[tokio::test]
    async fn test_wrong_shape_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "not-a-number"})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.current_user().await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_is_normalized() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ApiClient::builder()
            .base_url(format!("http://{}/api", addr))
            .timeout_secs(2)
            .build()
            .unwrap();
        client.set_token(Some("never-leaks"));

        let err = client.get::<Value>("/courses").await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
        assert_eq!(err.status(), None);
        assert!(!err.message().is_empty());
        assert!(!err.message().contains("never-leaks"));
        assert!(!err.to_string().contains("never-leaks"));
    }
}
