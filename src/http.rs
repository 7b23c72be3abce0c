use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Error, Secret};

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// HTTP GET method
    Get,
    /// HTTP POST method
    Post,
    /// HTTP PUT method
    Put,
    /// HTTP DELETE method
    Delete,
    /// HTTP PATCH method
    Patch,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Put => write!(f, "PUT"),
            HttpMethod::Delete => write!(f, "DELETE"),
            HttpMethod::Patch => write!(f, "PATCH"),
        }
    }
}

/// An outgoing API call before it reaches the network layer.
///
/// The two authentication carriers are kept apart from the rest of the
/// request so that [`CredentialChannel`](crate::CredentialChannel) is the only
/// place that decides which one is used:
///
/// - `authorization`: the `Authorization` header value. Wrapped in
///   [`Secret`] so a `Debug` dump of the request never shows the token.
/// - `with_credentials`: the ambient-credential flag asking the transport to
///   send its cookie jar.
///
/// # Examples
///
/// ```
/// use posture_core::{ApiRequest, HttpMethod};
///
/// let request = ApiRequest::post("/auth/logout");
/// assert_eq!(request.method(), HttpMethod::Post);
/// assert!(request.authorization().is_none());
/// assert!(!request.with_credentials());
/// ```
#[derive(Debug)]
pub struct ApiRequest {
    method: HttpMethod,
    path: String,
    body: Option<serde_json::Value>,
    authorization: Option<Secret<String>>,
    with_credentials: bool,
}

impl ApiRequest {
    /// Creates a request without a body or credentials.
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            authorization: None,
            with_credentials: false,
        }
    }

    /// Shorthand for a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// Shorthand for a POST request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    /// Attaches a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if `body` cannot be represented as JSON.
    pub fn with_json<T: Serialize>(mut self, body: &T) -> Result<Self, Error> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Returns the path relative to the API base URL.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the JSON body, if any.
    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    /// Returns the `Authorization` header value, if one was attached.
    pub fn authorization(&self) -> Option<&Secret<String>> {
        self.authorization.as_ref()
    }

    /// Sets `Authorization: Bearer <token>`.
    pub(crate) fn set_bearer(&mut self, token: &Secret<String>) {
        self.authorization = Some(Secret::new(format!("Bearer {}", token.expose_secret())));
    }

    /// Returns `true` when the transport should send ambient cookies.
    pub fn with_credentials(&self) -> bool {
        self.with_credentials
    }

    pub(crate) fn set_with_credentials(&mut self, enabled: bool) {
        self.with_credentials = enabled;
    }
}

/// A server response with its raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    status: u16,
    body: String,
}

impl ApiResponse {
    /// Creates a response from a status code and raw body.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns the status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the raw body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Decodes the body as JSON, treating an empty body as `T::default()`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if a non-empty body is not valid JSON for `T`.
    pub fn json_or_default<T: DeserializeOwned + Default>(&self) -> Result<T, Error> {
        if self.body.trim().is_empty() {
            return Ok(T::default());
        }
        self.json()
    }
}

/// The network layer seam.
///
/// A transport sends a fully decorated [`ApiRequest`] and reports whatever
/// status the server answered with. Mapping statuses onto [`Error`] variants
/// is the caller's job; a transport only fails on its own (connection,
/// timeout, IO) problems.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request and returns the raw response.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, Error>;
}

/// [`Transport`] backed by `reqwest`.
///
/// Holds two clients: a plain one, and one with a cookie store that plays the
/// role of the browser's cookie jar. Requests whose ambient-credential flag
/// is set go through the cookie-backed client, so cookies the server sets on
/// a SECURE-mode login are replayed on later SECURE-mode calls and never
/// surface to client code.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    base_url: String,
    plain: reqwest::Client,
    ambient: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a transport rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the underlying clients cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, Error> {
        let plain = reqwest::Client::builder().timeout(timeout).build()?;
        let ambient = reqwest::Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            plain,
            ambient,
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        let client = if request.with_credentials {
            &self.ambient
        } else {
            &self.plain
        };
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
        };

        let mut builder = client.request(method, self.url(&request.path));
        if let Some(auth) = &request.authorization {
            builder = builder.header(reqwest::header::AUTHORIZATION, auth.expose_secret().as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        tracing::debug!(method = %request.method, path = %request.path, status, "api call completed");
        Ok(ApiResponse::new(status, body))
    }
}

/// Metadata about a request seen by [`RecordingTransport`].
///
/// Unlike [`ApiRequest`], the authorization value is recorded in the clear so
/// tests can assert on the exact header that would have been sent.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    /// HTTP method used
    pub method: HttpMethod,
    /// Request path
    pub path: String,
    /// JSON body, if any
    pub body: Option<serde_json::Value>,
    /// `Authorization` header value, if any
    pub authorization: Option<String>,
    /// Whether ambient credentials were requested
    pub with_credentials: bool,
}

type Handler = Box<dyn Fn(&RecordedRequest) -> Result<ApiResponse, Error> + Send + Sync>;

/// Scripted, offline [`Transport`] that records every request.
///
/// Unscripted routes answer `404` with an empty body.
///
/// # Examples
///
/// ```
/// use posture_core::{ApiResponse, HttpMethod, RecordingTransport};
///
/// let transport = RecordingTransport::new();
/// transport.respond(HttpMethod::Get, "/config", ApiResponse::new(200, r#"{"mode":"secure"}"#));
/// assert_eq!(transport.request_count(), 0);
/// ```
#[derive(Default)]
pub struct RecordingTransport {
    routes: Mutex<HashMap<(HttpMethod, String), Handler>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl RecordingTransport {
    /// Creates a transport with no scripted routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every call to `method path` with `response`.
    pub fn respond(&self, method: HttpMethod, path: &str, response: ApiResponse) {
        self.route(method, path, move |_| Ok(response.clone()));
    }

    /// Fails every call to `method path` with `error`.
    pub fn fail(&self, method: HttpMethod, path: &str, error: Error) {
        self.route(method, path, move |_| Err(error.clone()));
    }

    /// Answers calls to `method path` with a handler that can inspect the request.
    pub fn route<F>(&self, method: HttpMethod, path: &str, handler: F)
    where
        F: Fn(&RecordedRequest) -> Result<ApiResponse, Error> + Send + Sync + 'static,
    {
        self.routes
            .lock()
            .insert((method, path.to_string()), Box::new(handler));
    }

    /// Returns every request seen so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of requests seen so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns how many times `method path` was called.
    pub fn calls_to(&self, method: HttpMethod, path: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    /// Returns the most recent call to `method path`.
    pub fn last_call(&self, method: HttpMethod, path: &str) -> Option<RecordedRequest> {
        self.requests
            .lock()
            .iter()
            .rev()
            .find(|r| r.method == method && r.path == path)
            .cloned()
    }
}

impl fmt::Debug for RecordingTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingTransport")
            .field("routes", &self.routes.lock().len())
            .field("requests", &self.requests.lock().len())
            .finish()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        let recorded = RecordedRequest {
            method: request.method,
            path: request.path.clone(),
            body: request.body.clone(),
            authorization: request
                .authorization
                .as_ref()
                .map(|a| a.expose_secret().clone()),
            with_credentials: request.with_credentials,
        };
        self.requests.lock().push(recorded.clone());

        let routes = self.routes.lock();
        match routes.get(&(recorded.method, recorded.path.clone())) {
            Some(handler) => handler(&recorded),
            None => Ok(ApiResponse::new(404, "")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_debug_redacts_authorization() {
        let mut request = ApiRequest::get("/auth/me");
        request.set_bearer(&Secret::new("tok-123".to_string()));

        let debug_output = format!("{:?}", request);
        assert!(!debug_output.contains("tok-123"));
        assert!(debug_output.contains("[REDACTED]"));
        assert_eq!(
            request.authorization().map(|a| a.expose_secret().as_str()),
            Some("Bearer tok-123")
        );
    }

    #[test]
    fn json_or_default_accepts_empty_body() {
        #[derive(serde::Deserialize, Default, Debug, PartialEq)]
        struct Body {
            value: Option<u32>,
        }

        let empty = ApiResponse::new(200, "  ");
        assert_eq!(empty.json_or_default::<Body>().unwrap(), Body::default());

        let filled = ApiResponse::new(200, r#"{"value":7}"#);
        assert_eq!(filled.json_or_default::<Body>().unwrap().value, Some(7));

        let broken = ApiResponse::new(200, "{not json");
        assert!(matches!(broken.json::<Body>(), Err(Error::Decode(_))));
    }

    #[test]
    fn success_range() {
        assert!(ApiResponse::new(204, "").is_success());
        assert!(!ApiResponse::new(301, "").is_success());
        assert!(!ApiResponse::new(401, "").is_success());
    }

    #[test]
    fn reqwest_transport_joins_urls() {
        let transport =
            ReqwestTransport::new("http://localhost:8080/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            transport.url("/auth/me"),
            "http://localhost:8080/api/auth/me"
        );
        assert_eq!(transport.url("config"), "http://localhost:8080/api/config");
    }

    #[tokio::test]
    async fn recording_transport_scripts_and_records() {
        let transport = RecordingTransport::new();
        transport.respond(HttpMethod::Get, "/config", ApiResponse::new(200, "{}"));
        transport.fail(
            HttpMethod::Post,
            "/auth/logout",
            Error::Transport("offline".into()),
        );

        let ok = transport.send(ApiRequest::get("/config")).await.unwrap();
        assert_eq!(ok.status(), 200);

        let err = transport.send(ApiRequest::post("/auth/logout")).await;
        assert_eq!(err, Err(Error::Transport("offline".into())));

        let missing = transport.send(ApiRequest::get("/nowhere")).await.unwrap();
        assert_eq!(missing.status(), 404);

        assert_eq!(transport.request_count(), 3);
        assert_eq!(transport.calls_to(HttpMethod::Get, "/config"), 1);
    }
}
