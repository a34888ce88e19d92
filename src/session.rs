//! OAuth2 token lifecycle: login, proactive refresh, logout.

use crate::error::{AppError, Result};
use crate::identity::{IdentityProvider, TokenSet};
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Tokens are refreshed once `now` passes `expiry - REFRESH_MARGIN_SECS`.
pub const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    LoggedIn,
    /// Terminal: login failed, no further remote calls this run.
    Disabled,
    /// Terminal: logout ran on stop.
    LoggedOut,
}

pub struct Credentials {
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl Credentials {
    /// Fails when `expires_in` does not fit a timestamp.
    fn issue(tokens: TokenSet, now: DateTime<Utc>) -> Result<Self> {
        let expires_at = Duration::try_seconds(tokens.expires_in_secs)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                AppError::Authentication(format!(
                    "token lifetime out of range: expires_in={}",
                    tokens.expires_in_secs
                ))
            })?;
        Ok(Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at,
        })
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at - Duration::seconds(REFRESH_MARGIN_SECS)
    }
}

impl Drop for Credentials {
    fn drop(&mut self) {
        wipe(&mut self.access_token);
        wipe(&mut self.refresh_token);
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Overwrite the secret's buffer before releasing it.
pub(crate) fn wipe(secret: &mut String) {
    let mut bytes = std::mem::take(secret).into_bytes();
    bytes.fill(0);
    std::hint::black_box(&bytes);
}

pub struct TokenSession {
    provider: Option<Arc<dyn IdentityProvider>>,
    credentials: Option<Credentials>,
    state: SessionState,
}

impl TokenSession {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider: Some(provider),
            credentials: None,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_logged_in(&self) -> bool {
        self.state == SessionState::LoggedIn
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn access_token(&self) -> Option<&str> {
        match (&self.state, &self.credentials) {
            (SessionState::LoggedIn, Some(c)) => Some(c.access_token.as_str()),
            _ => None,
        }
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.refresh_token.as_str())
    }

    /// Exchange username/password for a token set.
    ///
    /// Any failure moves the session to [`SessionState::Disabled`]. Also used for
    /// the single re-login after the telemetry endpoint answers 401.
    pub async fn login(&mut self, username: &str, password: &str, now: DateTime<Utc>) -> Result<()> {
        if matches!(self.state, SessionState::Disabled | SessionState::LoggedOut) {
            return Err(AppError::Session(format!(
                "login refused in state {:?}",
                self.state
            )));
        }
        let provider = self
            .provider
            .clone()
            .ok_or_else(|| AppError::Session("no identity provider".into()))?;

        match provider
            .token(username, password)
            .await
            .and_then(|tokens| Credentials::issue(tokens, now))
        {
            Ok(creds) => {
                info!(expires_at = %creds.expires_at, "logged in to identity provider");
                self.credentials = Some(creds);
                self.state = SessionState::LoggedIn;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "login failed; session disabled for the rest of this run");
                self.credentials = None;
                self.state = SessionState::Disabled;
                Err(e)
            }
        }
    }

    /// Refresh the token set when `now` is inside the safety margin.
    ///
    /// Returns whether a refresh happened. A failed refresh keeps the stale tokens
    /// so the next tick retries.
    pub async fn refresh_if_needed(&mut self, now: DateTime<Utc>) -> Result<bool> {
        if self.state != SessionState::LoggedIn {
            return Ok(false);
        }
        let (Some(provider), Some(creds)) = (self.provider.clone(), self.credentials.as_ref())
        else {
            return Ok(false);
        };
        if !creds.needs_refresh(now) {
            return Ok(false);
        }

        match provider
            .refresh(&creds.refresh_token)
            .await
            .and_then(|tokens| Credentials::issue(tokens, now))
        {
            Ok(creds) => {
                info!(expires_at = %creds.expires_at, "access token refreshed");
                self.credentials = Some(creds);
                Ok(true)
            }
            Err(e) => {
                error!(error = %e, "token refresh failed; keeping current tokens");
                Err(e)
            }
        }
    }

    /// Revoke the refresh token (when logged in) and wipe all credentials.
    ///
    /// Credentials and provider handle are taken out before the remote call so
    /// they are released whatever the call does.
    pub async fn logout(&mut self) {
        let creds = self.credentials.take();
        let provider = self.provider.take();
        let was_logged_in = self.state == SessionState::LoggedIn;
        if self.state != SessionState::Disabled {
            self.state = SessionState::LoggedOut;
        }

        if let (true, Some(provider), Some(creds)) = (was_logged_in, provider, creds.as_ref()) {
            match provider.revoke(&creds.refresh_token).await {
                Ok(()) => info!("logged out from identity provider"),
                Err(e) => warn!(error = %e, "refresh token revoke failed"),
            }
        }
        drop(creds);
    }
}
