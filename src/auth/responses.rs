use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::service::SessionTokens;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GoogleSignInRequest {
    pub id_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Successful outcome of any session-issuing operation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SessionResponse {
    pub user_id: Uuid,
    pub tokens: TokenPair,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

impl From<SessionTokens> for SessionResponse {
    fn from(tokens: SessionTokens) -> Self {
        Self {
            user_id: tokens.account_id,
            tokens: TokenPair {
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
            },
            access_token_expires_at: tokens.access_expires_at,
            refresh_token_expires_at: tokens.refresh_expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MeResponse {
    pub user_id: Uuid,
}
