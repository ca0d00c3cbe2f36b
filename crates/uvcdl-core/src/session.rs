// ── Authenticated session lifecycle ──
//
// One live `Session` per run, shared read-mostly by every concurrent
// request. Reads go through an `ArcSwapOption` (lock-free); re-login is
// serialized behind a mutex and keyed on the generation the caller saw,
// so K simultaneous expiries collapse into a single login.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use uvcdl_api::SessionToken;

use crate::api::ControllerApi;
use crate::config::Credentials;
use crate::error::CoreError;

/// An authenticated context against one controller.
///
/// Immutable: a re-login publishes a new `Session` with a higher
/// generation rather than mutating this one.
#[derive(Debug, Clone)]
pub struct Session {
    pub base_url: Url,
    pub token: SessionToken,
    pub established_at: DateTime<Utc>,
    /// `None` when the controller's lifetime is unknown.
    pub expires_at: Option<DateTime<Utc>>,
    /// Increases by one with every successful login in this run.
    pub generation: u64,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Debug, Default)]
struct LoginState {
    generation: u64,
    /// Set once a re-login fails; later callers get this error without
    /// another attempt.
    lost: Option<String>,
}

/// Owns the run's session: login, expiry detection, coalesced re-login,
/// and logout.
pub struct SessionClient<C: ?Sized> {
    api: Arc<C>,
    credentials: Credentials,
    ttl: Option<Duration>,
    current: ArcSwapOption<Session>,
    login: Mutex<LoginState>,
}

impl<C: ControllerApi + ?Sized> SessionClient<C> {
    pub fn new(api: Arc<C>, credentials: Credentials, ttl: Option<Duration>) -> Self {
        Self {
            api,
            credentials,
            ttl,
            current: ArcSwapOption::empty(),
            login: Mutex::new(LoginState::default()),
        }
    }

    pub fn api(&self) -> &Arc<C> {
        &self.api
    }

    /// Authenticate and publish a fresh session.
    ///
    /// Refuses once the session has been lost to a failed re-login.
    ///
    /// Fails with `AuthenticationFailed` on rejected credentials and
    /// `ConnectionFailed`/`Timeout` when the controller is unreachable.
    pub async fn login(&self) -> Result<Arc<Session>, CoreError> {
        let mut state = self.login.lock().await;
        if let Some(ref message) = state.lost {
            return Err(CoreError::AuthenticationFailed {
                message: message.clone(),
            });
        }
        let session = self.establish(&mut state).await?;
        info!(
            url = %session.base_url,
            user = %self.credentials.username,
            "logged in"
        );
        Ok(session)
    }

    /// The live session, refreshed first if its lifetime has run out.
    pub async fn current(&self) -> Result<Arc<Session>, CoreError> {
        let Some(session) = self.current.load_full() else {
            return self.login().await;
        };
        if session.is_expired_at(Utc::now()) {
            debug!(generation = session.generation, "session past its lifetime");
            return self.refresh(session.generation).await;
        }
        Ok(session)
    }

    /// Replace the session that was rejected at `stale_generation`.
    ///
    /// Only the first caller for a given generation logs in again; the
    /// rest wait on the mutex and receive the session it published. A
    /// failed re-login marks the session lost for the rest of the run.
    pub async fn refresh(&self, stale_generation: u64) -> Result<Arc<Session>, CoreError> {
        let mut state = self.login.lock().await;

        if let Some(ref message) = state.lost {
            return Err(CoreError::AuthenticationFailed {
                message: message.clone(),
            });
        }

        if let Some(session) = self.current.load_full() {
            if session.generation != stale_generation {
                debug!(
                    stale = stale_generation,
                    current = session.generation,
                    "session already refreshed"
                );
                return Ok(session);
            }
        }

        warn!(generation = stale_generation, "session expired, logging in again");
        match self.establish(&mut state).await {
            Ok(session) => Ok(session),
            Err(e) => {
                warn!(error = %e, "re-login failed, session lost");
                state.lost = Some(e.to_string());
                self.current.store(None);
                Err(e)
            }
        }
    }

    /// Run `op` with the live session, re-authenticating once if the
    /// controller rejects it. A second rejection is returned as-is.
    pub async fn authorized<T, F, Fut>(&self, op: F) -> Result<T, CoreError>
    where
        F: Fn(Arc<Session>) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let session = self.current().await?;
        let generation = session.generation;

        match op(session).await {
            Err(e) if e.is_session_expired() => {
                let fresh = self.refresh(generation).await?;
                op(fresh).await
            }
            other => other,
        }
    }

    /// End the session. Best effort: failures are logged, not returned.
    pub async fn logout(&self) {
        let Some(session) = self.current.swap(None) else {
            return;
        };
        match self.api.logout(&session.token).await {
            Ok(()) => debug!("logged out"),
            Err(e) => warn!(error = %e, "logout failed"),
        }
    }

    async fn establish(&self, state: &mut LoginState) -> Result<Arc<Session>, CoreError> {
        let token = self.api.login(&self.credentials).await?;
        let now = Utc::now();

        state.generation += 1;
        let session = Arc::new(Session {
            base_url: self.api.base_url().clone(),
            token,
            established_at: now,
            expires_at: self
                .ttl
                .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
                .map(|ttl| now + ttl),
            generation: state.generation,
        });
        self.current.store(Some(Arc::clone(&session)));
        Ok(session)
    }
}
