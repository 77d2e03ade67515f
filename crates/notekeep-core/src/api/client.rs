//! API client for the notes service gateway.
//!
//! Covers both backend services behind the gateway: the users service
//! (login, register, refresh, logout, self info) and the notes service
//! (list, get, create with attachments, delete).

use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use reqwest::Response;
use tracing::{debug, info, warn};

use crate::auth::{SessionManager, TokenPair};
use crate::models::{Note, NoteListResponse, NoteResponse, RegisterRequest, UploadFile, UserInfo};

use super::ApiError;

/// API client for the notes service.
/// Clone is cheap - the session manager is shared behind an Arc.
#[derive(Clone)]
pub struct ApiClient {
    session: Arc<SessionManager>,
}

impl ApiClient {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.session.base_url(), path)
    }

    /// Check if a response is successful, returning a typed error with
    /// the server-provided body if not.
    async fn check(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    // ===== Health checks =====

    pub async fn health_check_notes(&self) -> Result<(), ApiError> {
        let response = self
            .session
            .http()
            .get(self.url("/notes_service/health_check/"))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    pub async fn health_check_users(&self) -> Result<(), ApiError> {
        let response = self
            .session
            .http()
            .get(self.url("/users_service/health_check/"))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    // ===== Authentication =====

    /// Log in and persist the issued token pair.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let response = self
            .session
            .http()
            .post(self.url("/user/login/"))
            .form(&[
                ("grant_type", "password"),
                ("username", username),
                ("password", password),
            ])
            .send()
            .await?;

        let response = Self::check(response).await?;
        let pair: TokenPair = response.json().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse login response: {e}"))
        })?;

        self.session.set_tokens(pair)?;
        info!(username, "Logged in");
        Ok(())
    }

    /// Register a new account, then log in with the same credentials.
    pub async fn register(&self, request: &RegisterRequest) -> Result<(), ApiError> {
        let response = self
            .session
            .http()
            .post(self.url("/user/register/"))
            .json(request)
            .send()
            .await?;

        Self::check(response).await?;
        debug!(username = %request.username, "Registered");

        self.login(&request.username, &request.password).await
    }

    /// Log out of the backend session.
    ///
    /// Local tokens are cleared unconditionally, before the server's
    /// answer is inspected, so the client never stays logged in against
    /// a dead backend. A failed network call is still reported.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let mut request = self.session.http().post(self.url("/user/logout/"));
        if let Some(token) = self.session.access_token() {
            request = request.bearer_auth(token);
        }
        let result = request.send().await;

        self.session.clear_tokens()?;
        info!("Logged out");

        match result {
            Ok(response) => {
                if !response.status().is_success() {
                    warn!(status = %response.status(), "Server rejected logout call");
                }
                Ok(())
            }
            Err(e) => Err(ApiError::Network(e)),
        }
    }

    /// Fetch the authenticated user's own profile.
    pub async fn self_info(&self) -> Result<UserInfo, ApiError> {
        let url = self.url("/user/self_info/");
        let response = self
            .session
            .authorized_fetch(|client| client.get(&url))
            .await?;
        let response = Self::check(response).await?;
        let text = response.text().await?;

        // The users service nests the record under `user_db`; accept
        // both the bare and the enveloped shape.
        if let Ok(user) = serde_json::from_str::<UserInfo>(&text) {
            return Ok(user);
        }
        let envelope: SelfInfoEnvelope = serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse user info: {e}")))?;
        envelope
            .user_db
            .ok_or_else(|| ApiError::InvalidResponse("user info missing user record".to_string()))
    }

    // ===== Notes =====

    pub async fn list_notes(&self) -> Result<Vec<Note>, ApiError> {
        let url = self.url("/notes/get_all_notes");
        let response = self
            .session
            .authorized_fetch(|client| client.get(&url))
            .await?;
        let response = Self::check(response).await?;
        let parsed: NoteListResponse = response.json().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse notes list: {e}"))
        })?;
        debug!(count = parsed.data.len(), "Fetched notes");
        Ok(parsed.data)
    }

    pub async fn get_note(&self, id: i64) -> Result<Note, ApiError> {
        let url = self.url(&format!("/notes/get_note/{id}/"));
        let response = self
            .session
            .authorized_fetch(|client| client.get(&url))
            .await?;
        let response = Self::check(response).await?;
        let parsed: NoteResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse note: {e}")))?;
        Ok(parsed.data)
    }

    /// Create a note with optional media attachments.
    ///
    /// Title and content travel as query parameters, attachments as
    /// multipart fields bucketed by media type. Every file must carry
    /// an accepted extension; the form is rebuilt from the in-memory
    /// bytes if the request is retried after a token refresh.
    pub async fn create_note(
        &self,
        title: &str,
        content: &str,
        files: &[UploadFile],
    ) -> Result<(), ApiError> {
        if let Some(unsupported) = files.iter().find(|f| f.kind().is_none()) {
            return Err(ApiError::UnsupportedMedia(unsupported.file_name.clone()));
        }

        let url = self.url("/notes/create");
        let response = self
            .session
            .authorized_fetch(|client| {
                let mut form = Form::new();
                for file in files {
                    if let Some(kind) = file.kind() {
                        let part = Part::bytes(file.bytes.clone())
                            .file_name(file.file_name.clone());
                        form = form.part(kind.form_field(), part);
                    }
                }
                client
                    .post(&url)
                    .query(&[("title", title), ("content", content)])
                    .multipart(form)
            })
            .await?;

        Self::check(response).await?;
        info!(title, attachments = files.len(), "Created note");
        Ok(())
    }

    pub async fn delete_note(&self, id: i64) -> Result<(), ApiError> {
        let url = self.url(&format!("/notes/delete/{id}/"));
        let response = self
            .session
            .authorized_fetch(|client| client.delete(&url))
            .await?;
        Self::check(response).await?;
        info!(id, "Deleted note");
        Ok(())
    }
}

// Internal API response types for parsing

#[derive(Debug, serde::Deserialize)]
struct SelfInfoEnvelope {
    #[serde(default)]
    user_db: Option<UserInfo>,
}
