// UniFi Video API HTTP client
//
// Wraps `reqwest::Client` with `/api/2.0` URL construction, status
// classification, and envelope decoding. Endpoint groups (auth, cameras,
// recordings) are implemented as inherent methods in separate files to
// keep this module focused on transport mechanics.

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::auth::SessionToken;
use crate::error::Error;
use crate::models::ApiResponse;
use crate::transport::TransportConfig;

/// Longest slice of an error body kept in [`Error::Http`] messages.
const ERROR_BODY_LIMIT: usize = 512;

/// A boxed stream of response body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>;

/// An open segment download: the declared length and the body stream.
pub struct RecordingDownload {
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

impl std::fmt::Debug for RecordingDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingDownload")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Raw HTTP client for the UniFi Video controller API (version 2.0).
///
/// Stateless with respect to authentication: every call takes the
/// [`SessionToken`] to present, so one client can be shared across
/// concurrent downloads while the session is swapped underneath.
#[derive(Debug, Clone)]
pub struct UvcClient {
    http: reqwest::Client,
    base_url: Url,
    /// Per-request limit the client was built with, when known.
    timeout: Option<Duration>,
}

impl UvcClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the controller root, e.g. `https://nvr.local:7443`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            timeout: Some(transport.timeout),
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    ///
    /// Its timeout is unknown here, so timeouts surface as
    /// [`Error::Transport`].
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            timeout: None,
        }
    }

    /// Build the controller root URL from a host and port.
    ///
    /// A value that already carries a scheme is taken verbatim; a bare
    /// host gets `https://` and `port` unless it names its own port.
    pub fn controller_url(host: &str, port: u16) -> Result<Url, Error> {
        let host = host.trim().trim_end_matches('/');
        let has_port = if host.starts_with('[') {
            host.contains("]:")
        } else {
            host.contains(':')
        };

        let raw = if host.contains("://") {
            host.to_owned()
        } else if has_port {
            format!("https://{host}")
        } else {
            format!("https://{host}:{port}")
        };

        Ok(Url::parse(&raw)?)
    }

    /// The underlying HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// The controller base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a full URL for an API path: `{base}/api/2.0/{path}`.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let full = format!(
            "{}/api/2.0/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&full).map_err(Error::InvalidUrl)
    }

    // ── Request helpers ──────────────────────────────────────────────

    pub(crate) fn transport_error(&self, err: reqwest::Error) -> Error {
        Error::transport(err, self.timeout)
    }

    /// Send an authenticated GET and decode the `{ data, meta }` envelope.
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        url: Url,
        session: &SessionToken,
        query: &[(&str, String)],
        extra_cookies: &[(&str, &str)],
    ) -> Result<ApiResponse<T>, Error> {
        debug!("GET {}", url);

        let resp = session
            .apply(self.http.get(url), extra_cookies)
            .query(query)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let resp = Self::check_status(resp).await?;
        self.parse_envelope(resp).await
    }

    /// Send an authenticated GET and return the body as a byte stream.
    pub(crate) async fn get_stream(
        &self,
        url: Url,
        session: &SessionToken,
        extra_cookies: &[(&str, &str)],
    ) -> Result<RecordingDownload, Error> {
        debug!("GET (stream) {}", url);

        let resp = session
            .apply(self.http.get(url), extra_cookies)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let resp = Self::check_status(resp).await?;
        let content_length = resp.content_length();
        let timeout = self.timeout;
        let body = resp
            .bytes_stream()
            .map_err(move |e| Error::transport(e, timeout));

        Ok(RecordingDownload {
            content_length,
            body: Box::pin(body),
        })
    }

    /// Map 401 to [`Error::SessionExpired`] and other failures to
    /// [`Error::Http`], passing successful responses through.
    pub(crate) async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::SessionExpired);
        }

        if !status.is_success() {
            let mut message = resp.text().await.unwrap_or_default();
            if message.len() > ERROR_BODY_LIMIT {
                let mut cut = ERROR_BODY_LIMIT;
                while !message.is_char_boundary(cut) {
                    cut -= 1;
                }
                message.truncate(cut);
            }
            return Err(Error::Http {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp)
    }

    /// Decode the `{ data, meta }` envelope from a successful response.
    async fn parse_envelope<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<ApiResponse<T>, Error> {
        let body = resp.text().await.map_err(|e| self.transport_error(e))?;

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_url_adds_scheme_and_port() {
        let url = UvcClient::controller_url("nvr.local", 7443).expect("url");
        assert_eq!(url.as_str(), "https://nvr.local:7443/");
    }

    #[test]
    fn controller_url_bare_host_with_port() {
        let url = UvcClient::controller_url("10.0.0.2:8443", 7443).expect("url");
        assert_eq!(url.as_str(), "https://10.0.0.2:8443/");
    }

    #[test]
    fn controller_url_keeps_explicit_port() {
        let url = UvcClient::controller_url("http://10.0.0.2:8080", 7443).expect("url");
        assert_eq!(url.port(), Some(8080));
        assert_eq!(url.scheme(), "http");
    }

    #[test]
    fn api_url_joins_version_prefix() {
        let client = UvcClient::with_client(
            reqwest::Client::new(),
            Url::parse("https://nvr.local:7443/").expect("url"),
        );
        let url = client.api_url("recording/abc/download").expect("url");
        assert_eq!(
            url.as_str(),
            "https://nvr.local:7443/api/2.0/recording/abc/download"
        );
    }
}
