//! Session manager: the refresh-or-logout protocol.
//!
//! Every authenticated request goes through [`SessionManager::authorized_fetch`],
//! which attaches the bearer token, refreshes it exactly once on an
//! authorization failure, and retries. A refresh the server rejects ends
//! the session: both tokens are cleared and the caller sees an auth
//! error. Data-call failures never touch the stored tokens.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use super::store::{TokenPair, TokenStore};
use crate::api::ApiError;

/// HTTP request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Serialize)]
struct RefreshRequest {
    refresh_token: String,
}

/// Owns the access/refresh token pair and the HTTP client.
///
/// The session is "logged in" exactly when a token pair exists in the
/// injected [`TokenStore`]; no other component writes that storage.
pub struct SessionManager {
    client: Client,
    base_url: String,
    store: Mutex<Box<dyn TokenStore>>,
    // Serializes refreshes so concurrent callers reuse one in-flight
    // refresh instead of replaying the refresh token.
    refresh_gate: tokio::sync::Mutex<()>,
}

impl SessionManager {
    pub fn new(base_url: impl Into<String>, store: Box<dyn TokenStore>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let base_url: String = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            store: Mutex::new(store),
            refresh_gate: tokio::sync::Mutex::new(()),
        })
    }

    /// The shared HTTP client, for unauthenticated endpoints.
    /// Clone is cheap - reqwest::Client uses Arc internally.
    pub fn http(&self) -> &Client {
        &self.client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current access token, if any. Never triggers a refresh.
    pub fn access_token(&self) -> Option<String> {
        match self.store.lock().unwrap().load() {
            Ok(pair) => pair.map(|p| p.access_token),
            Err(e) => {
                warn!(error = %e, "Failed to read token store");
                None
            }
        }
    }

    /// Replace both tokens atomically.
    pub fn set_tokens(&self, pair: TokenPair) -> Result<(), ApiError> {
        self.store
            .lock()
            .unwrap()
            .save(&pair)
            .map_err(ApiError::Storage)
    }

    /// Remove both tokens; `access_token` returns `None` afterwards.
    pub fn clear_tokens(&self) -> Result<(), ApiError> {
        self.store
            .lock()
            .unwrap()
            .clear()
            .map_err(ApiError::Storage)
    }

    /// A token pair exists in persisted storage.
    pub fn is_logged_in(&self) -> bool {
        matches!(self.store.lock().unwrap().load(), Ok(Some(_)))
    }

    fn tokens(&self) -> Result<Option<TokenPair>, ApiError> {
        self.store.lock().unwrap().load().map_err(ApiError::Storage)
    }

    /// Clear the session after an unrecoverable auth failure. Storage
    /// errors here are logged, not surfaced - the caller already holds
    /// the error that matters.
    fn force_logout(&self) {
        if let Err(e) = self.clear_tokens() {
            warn!(error = %e, "Failed to clear tokens during forced logout");
        }
    }

    /// Exchange the stored refresh token for a new token pair.
    ///
    /// On success both tokens are replaced and the new access token is
    /// returned. Every failure - missing refresh token, rejecting or
    /// unreachable server, unreadable response - clears the stored pair
    /// (forced logout) before the error is returned.
    pub async fn refresh(&self) -> Result<String, ApiError> {
        let _gate = self.refresh_gate.lock().await;
        self.refresh_locked().await
    }

    /// Refresh, reusing the result of a refresh that completed while we
    /// waited for the gate. `observed` is the access token the caller
    /// last saw (`None` if it saw no token); if the stored token already
    /// differs, another caller refreshed for us.
    async fn refresh_reusing(&self, observed: Option<&str>) -> Result<String, ApiError> {
        let _gate = self.refresh_gate.lock().await;
        if let Some(current) = self.access_token() {
            if observed != Some(current.as_str()) {
                debug!("Reusing token from concurrent refresh");
                return Ok(current);
            }
        }
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<String, ApiError> {
        let refresh_token = match self.tokens()? {
            Some(pair) => pair.refresh_token,
            None => {
                self.force_logout();
                return Err(ApiError::Auth("no refresh token available".to_string()));
            }
        };

        let url = format!("{}/user/refresh_tokens/", self.base_url);
        let result = self
            .client
            .post(&url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Token refresh unreachable, ending session");
                self.force_logout();
                return Err(ApiError::Network(e));
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Token refresh rejected, ending session");
            self.force_logout();
            return Err(ApiError::from_status(status, &body));
        }

        // The backend may already have rotated the refresh token; a pair
        // we cannot read is a pair we cannot keep.
        let pair: TokenPair = match response.json().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "Unparseable refresh response, ending session");
                self.force_logout();
                return Err(ApiError::InvalidResponse(format!(
                    "Failed to parse refresh response: {e}"
                )));
            }
        };

        let access_token = pair.access_token.clone();
        self.set_tokens(pair)?;
        debug!("Access token refreshed");
        Ok(access_token)
    }

    /// Issue an authenticated request, refreshing the access token at
    /// most once.
    ///
    /// `make` builds the request so it can be re-issued for the retry
    /// (multipart bodies are not clonable). The bearer header is
    /// attached here; callers never handle tokens. On the first
    /// 401/403 the token is refreshed and the request retried exactly
    /// once; a second authorization failure clears the session and
    /// surfaces the failure.
    pub async fn authorized_fetch<F>(&self, make: F) -> Result<Response, ApiError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = match self.access_token() {
            Some(token) => token,
            None => self.refresh_reusing(None).await?,
        };

        let response = make(&self.client).bearer_auth(&token).send().await?;
        if !is_auth_failure(response.status()) {
            return Ok(response);
        }

        debug!(status = %response.status(), "Authorization failed, refreshing token");
        let fresh = self.refresh_reusing(Some(&token)).await?;

        let retry = make(&self.client).bearer_auth(&fresh).send().await?;
        if is_auth_failure(retry.status()) {
            let status = retry.status();
            let body = retry.text().await.unwrap_or_default();
            warn!(status = %status, "Still unauthorized after refresh, ending session");
            self.force_logout();
            return Err(ApiError::from_status(status, &body));
        }
        Ok(retry)
    }

    /// Keep the access token fresh during idle periods.
    ///
    /// For long-lived embedders (a GUI or daemon); one-shot callers
    /// like the CLI have no idle period to cover and skip this.
    /// Refreshes on a fixed interval while logged in. A failed refresh
    /// has already ended the session; the task keeps ticking so a later
    /// login resumes the cycle. Abort the returned handle to stop it.
    pub fn spawn_proactive_refresh(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let session = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !session.is_logged_in() {
                    continue;
                }
                match session.refresh().await {
                    Ok(_) => debug!("Proactive token refresh succeeded"),
                    Err(e) => warn!(error = %e, "Proactive token refresh failed"),
                }
            }
        })
    }
}

fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}
