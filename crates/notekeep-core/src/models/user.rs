use serde::{Deserialize, Serialize};

/// The authenticated user, from `GET /user/self_info/`.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    #[serde(alias = "user_id")]
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub role: Option<String>,
}

/// Body for `POST /user/register/`. `profile` is free-form and only
/// sent when present.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<serde_json::Value>,
}
