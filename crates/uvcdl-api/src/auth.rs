// Session authentication
//
// `POST /api/2.0/login` answers with a `JSESSIONID_AV` cookie and, in the
// body, the user's API key. Both are captured into a `SessionToken` that
// the caller passes back explicitly on every request -- the client keeps
// no ambient session state of its own.

use std::fmt;

use reqwest::header::{COOKIE, SET_COOKIE};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::debug;

use crate::client::UvcClient;
use crate::error::Error;
use crate::models::{ApiResponse, LoginUser};

/// Name of the session cookie issued by the controller.
pub const SESSION_COOKIE: &str = "JSESSIONID_AV";

/// Credential material for one authenticated session.
///
/// The cookie is preferred; the API key is only sent (as the `apiKey`
/// query parameter) when the controller issued no cookie.
#[derive(Clone)]
pub struct SessionToken {
    cookie: Option<SecretString>,
    api_key: Option<SecretString>,
}

impl SessionToken {
    pub fn new(cookie: Option<SecretString>, api_key: Option<SecretString>) -> Self {
        Self { cookie, api_key }
    }

    /// A token carrying only a session cookie value.
    pub fn from_cookie(value: impl Into<String>) -> Self {
        Self {
            cookie: Some(SecretString::from(value.into())),
            api_key: None,
        }
    }

    pub fn cookie(&self) -> Option<&SecretString> {
        self.cookie.as_ref()
    }

    pub fn api_key(&self) -> Option<&SecretString> {
        self.api_key.as_ref()
    }

    /// Attach this token (plus any extra cookies) to an outgoing request.
    pub(crate) fn apply(
        &self,
        mut request: reqwest::RequestBuilder,
        extra_cookies: &[(&str, &str)],
    ) -> reqwest::RequestBuilder {
        let mut cookies: Vec<String> = Vec::with_capacity(extra_cookies.len() + 1);
        if let Some(ref value) = self.cookie {
            cookies.push(format!("{SESSION_COOKIE}={}", value.expose_secret()));
        }
        cookies.extend(extra_cookies.iter().map(|(k, v)| format!("{k}={v}")));

        if !cookies.is_empty() {
            request = request.header(COOKIE, cookies.join("; "));
        }

        if self.cookie.is_none() {
            if let Some(ref key) = self.api_key {
                request = request.query(&[("apiKey", key.expose_secret())]);
            }
        }

        request
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("cookie", &self.cookie.as_ref().map(|_| "[REDACTED]"))
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Pull the session cookie value out of the response's `Set-Cookie` headers.
fn session_cookie(headers: &reqwest::header::HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|raw| raw.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| name.trim() == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

impl UvcClient {
    /// Authenticate with the controller using username/password.
    ///
    /// `POST /api/2.0/login`. Any non-success status is reported as
    /// [`Error::Authentication`]; a success that yields neither a session
    /// cookie nor an API key is rejected the same way.
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<SessionToken, Error> {
        let url = self.api_url("login")?;
        debug!("logging in at {}", url);

        let body = json!({
            "username": username,
            "password": password.expose_secret(),
        });

        let resp = self
            .http()
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {status}): {body}"),
            });
        }

        let cookie = session_cookie(resp.headers());
        let text = resp.text().await.map_err(|e| self.transport_error(e))?;

        // The body is only consulted for the API key; older firmware
        // answers with an empty body.
        let api_key = serde_json::from_str::<ApiResponse<LoginUser>>(&text)
            .ok()
            .and_then(|envelope| {
                envelope
                    .data
                    .into_iter()
                    .find(|user| {
                        user.account
                            .as_ref()
                            .is_none_or(|account| account.username == username)
                    })
                    .and_then(|user| user.api_key)
            });

        if cookie.is_none() && api_key.is_none() {
            return Err(Error::Authentication {
                message: "controller accepted the login but issued no session".into(),
            });
        }

        debug!(
            cookie = cookie.is_some(),
            api_key = api_key.is_some(),
            "login successful"
        );

        Ok(SessionToken::new(
            cookie.map(SecretString::from),
            api_key.map(SecretString::from),
        ))
    }

    /// End the session. `GET /api/2.0/logout`.
    pub async fn logout(&self, session: &SessionToken) -> Result<(), Error> {
        let url = self.api_url("logout")?;
        debug!("logging out at {}", url);

        let resp = session
            .apply(self.http().get(url), &[])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        Self::check_status(resp).await?;
        debug!("logout complete");
        Ok(())
    }
}
