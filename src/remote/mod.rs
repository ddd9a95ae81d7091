//! Remote access for the two backends the app talks to.
//!
//! - **Catalog**: a public JSON endpoint returning every show in one
//!   response. No authentication.
//! - **User data**: a PostgREST-style table keyed by email, read with
//!   filtered selects and written with merge upserts. Optionally
//!   authenticated with an API key.
//!
//! The client never retries. Every outcome is reported to the state layer
//! exactly once; trying again is a user decision, not a transport one.

mod catalog;
mod user_data;

use std::time::Duration;

use futures::StreamExt;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Upper bound for any response body we are willing to buffer.
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024; // 10MB

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Malformed response: {0}")]
    Decode(String),
    #[error("Invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported URL scheme '{0}': only http and https are allowed")]
    UnsupportedScheme(String),
    #[error("Insecure base URL: HTTPS required when an API key is configured")]
    InsecureBaseUrl,
    #[error("No preference record found for {email}")]
    NotFound { email: String },
    #[error("Expected one preference record for {email}, found {count}")]
    Ambiguous { email: String, count: usize },
    #[error("No user data backend configured")]
    NotConfigured,
}

// ============================================================================
// Remote Client
// ============================================================================

/// HTTP client for both backends.
///
/// Base URLs are validated once at construction. The user-data endpoint is
/// optional: a client built without one still serves the catalog and reports
/// [`RemoteError::NotConfigured`] for preference operations.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    timeout: Duration,
    catalog_url: String,
    user_data: Option<UserDataEndpoint>,
}

#[derive(Debug, Clone)]
pub(crate) struct UserDataEndpoint {
    pub(crate) base_url: String,
    pub(crate) api_key: Option<SecretString>,
}

impl RemoteClient {
    pub fn new(catalog_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let catalog_url = normalize_base_url(catalog_url)?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("podshelf/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(RemoteClient {
            http,
            timeout,
            catalog_url,
            user_data: None,
        })
    }

    /// Attach the preference backend.
    ///
    /// With an API key the base URL must be HTTPS; plain HTTP is allowed for
    /// localhost only, so tests never send a real key over the wire.
    pub fn with_user_data(
        mut self,
        base_url: &str,
        api_key: Option<SecretString>,
    ) -> Result<Self, RemoteError> {
        let base_url = normalize_base_url(base_url)?;
        if api_key.is_some() && !is_https_or_loopback(&base_url) {
            tracing::error!(base_url = %base_url, "Rejecting non-HTTPS user data base URL");
            return Err(RemoteError::InsecureBaseUrl);
        }
        self.user_data = Some(UserDataEndpoint { base_url, api_key });
        Ok(self)
    }

    pub fn has_user_data(&self) -> bool {
        self.user_data.is_some()
    }

    pub(crate) fn user_data(&self) -> Result<&UserDataEndpoint, RemoteError> {
        self.user_data.as_ref().ok_or(RemoteError::NotConfigured)
    }

    /// Send `request` under the configured timeout and require a success
    /// status. The body is not read; operations that expect one go through
    /// [`RemoteClient::fetch_bytes`] so the body shares the deadline.
    pub(crate) async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, RemoteError> {
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| RemoteError::Timeout(self.timeout.as_secs()))?
            .map_err(RemoteError::Network)?;
        check_status(response)
    }

    /// Send `request` and buffer its body under one deadline.
    ///
    /// The timeout covers the full exchange, so a server that stalls midway
    /// through the body settles the same way as one that never responds.
    pub(crate) async fn fetch_bytes(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Vec<u8>, RemoteError> {
        let exchange = async {
            let response = request.send().await.map_err(RemoteError::Network)?;
            read_limited_bytes(check_status(response)?, MAX_RESPONSE_SIZE).await
        };
        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| RemoteError::Timeout(self.timeout.as_secs()))?
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Validate a base URL and strip the trailing slash so path joins are
/// uniform.
fn normalize_base_url(raw: &str) -> Result<String, RemoteError> {
    let parsed = Url::parse(raw)?;
    match parsed.scheme() {
        "http" | "https" => Ok(raw.trim_end_matches('/').to_string()),
        other => Err(RemoteError::UnsupportedScheme(other.to_string())),
    }
}

/// Map non-success statuses to [`RemoteError::HttpStatus`].
fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(RemoteError::HttpStatus(status.as_u16()))
    }
}

/// An API key may only travel over TLS or stay on the local machine. The
/// host is compared exactly; `localhost.attacker.example` is not local.
fn is_https_or_loopback(base: &str) -> bool {
    let Ok(parsed) = Url::parse(base) else {
        return false;
    };
    if parsed.scheme() == "https" {
        return true;
    }
    match parsed.host() {
        Some(url::Host::Domain(host)) => host == "localhost",
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

/// Buffer the response body, rejecting anything over `limit` bytes.
///
/// Checks `Content-Length` first, then enforces the limit while streaming
/// for responses that do not declare a length.
async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, RemoteError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(RemoteError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(RemoteError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(RemoteError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_rejects_unparseable_base_url() {
        let result = RemoteClient::new("not a url", TIMEOUT);
        assert!(matches!(result, Err(RemoteError::InvalidUrl(_))));
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let result = RemoteClient::new("ftp://example.com", TIMEOUT);
        assert!(matches!(result, Err(RemoteError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_rejects_http_user_data_url_with_api_key() {
        let result = RemoteClient::new("https://catalog.example.com", TIMEOUT)
            .unwrap()
            .with_user_data(
                "http://insecure.example.com",
                Some(SecretString::from("key")),
            );
        assert!(matches!(result, Err(RemoteError::InsecureBaseUrl)));
    }

    #[test]
    fn test_rejects_localhost_lookalike_host_with_api_key() {
        // A hostname that merely starts with "localhost" is a remote host
        let result = RemoteClient::new("https://catalog.example.com", TIMEOUT)
            .unwrap()
            .with_user_data(
                "http://localhost.attacker.example",
                Some(SecretString::from("key")),
            );
        assert!(matches!(result, Err(RemoteError::InsecureBaseUrl)));

        let result = RemoteClient::new("https://catalog.example.com", TIMEOUT)
            .unwrap()
            .with_user_data("http://127.0.0.1.example.com", Some(SecretString::from("key")));
        assert!(matches!(result, Err(RemoteError::InsecureBaseUrl)));
    }

    #[test]
    fn test_allows_loopback_ipv6_with_api_key() {
        let result = RemoteClient::new("https://catalog.example.com", TIMEOUT)
            .unwrap()
            .with_user_data("http://[::1]:9999", Some(SecretString::from("key")));
        assert!(result.is_ok());
    }

    #[test]
    fn test_allows_localhost_user_data_url_with_api_key() {
        let result = RemoteClient::new("https://catalog.example.com", TIMEOUT)
            .unwrap()
            .with_user_data("http://127.0.0.1:9999", Some(SecretString::from("key")));
        assert!(result.is_ok());
    }

    #[test]
    fn test_allows_http_user_data_url_without_api_key() {
        let result = RemoteClient::new("https://catalog.example.com", TIMEOUT)
            .unwrap()
            .with_user_data("http://selfhosted.example.com", None);
        assert!(result.is_ok());
    }

    #[test]
    fn test_trailing_slash_is_normalized() {
        let client = RemoteClient::new("https://catalog.example.com/", TIMEOUT).unwrap();
        assert_eq!(client.catalog_url, "https://catalog.example.com");
    }

    #[tokio::test]
    async fn test_fetch_bytes_times_out_when_the_body_stalls() {
        use tokio::io::AsyncWriteExt;

        // Headers arrive promptly, then the server holds the socket open
        // without ever finishing the declared body.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 10000\r\n\r\nx")
                .await
                .unwrap();
            std::future::pending::<()>().await;
        });

        let client =
            RemoteClient::new(&format!("http://{addr}"), Duration::from_millis(100)).unwrap();
        let request = client.http.get(&client.catalog_url);
        let err = client.fetch_bytes(request).await.unwrap_err();
        assert!(matches!(err, RemoteError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_read_limited_bytes_enforces_the_limit() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_string("0123456789"))
            .mount(&mock_server)
            .await;

        let response = reqwest::get(format!("{}/big", mock_server.uri()))
            .await
            .unwrap();
        let result = read_limited_bytes(response, 4).await;
        assert!(matches!(result, Err(RemoteError::ResponseTooLarge(4))));
    }

    #[tokio::test]
    async fn test_read_limited_bytes_passes_small_bodies() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/small"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&mock_server)
            .await;

        let response = reqwest::get(format!("{}/small", mock_server.uri()))
            .await
            .unwrap();
        let bytes = read_limited_bytes(response, 1024).await.unwrap();
        assert_eq!(bytes, b"ok");
    }
}
