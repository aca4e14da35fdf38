use chrono::Duration;

use crate::auth::{AuthError, AuthResult};

const DEFAULT_ACCESS_TTL_MINS: i64 = 15;
const DEFAULT_REFRESH_TTL_DAYS: i64 = 30;
const DEFAULT_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Authentication configuration loaded from environment variables.
///
/// Each component receives only the slice of this value it needs at
/// construction time; nothing reads the environment after startup.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret for signing access tokens.
    pub access_token_secret: String,
    /// Distinct secret class for refresh tokens; keys the fingerprint hash
    /// under which refresh-token records are stored.
    pub refresh_token_secret: String,
    pub access_token_ttl_mins: i64,
    pub refresh_token_ttl_days: i64,
    /// Expected `aud` claim on third-party identity assertions.
    pub google_client_id: String,
    /// Tokeninfo endpoint; overridable so tests can point at a local mock.
    pub google_tokeninfo_url: String,
}

impl AuthConfig {
    pub fn from_env() -> AuthResult<Self> {
        let access_token_secret = required_env("HUSHZONE_ACCESS_TOKEN_SECRET")?;
        let refresh_token_secret = required_env("HUSHZONE_REFRESH_TOKEN_SECRET")?;
        if access_token_secret == refresh_token_secret {
            return Err(AuthError::Config(
                "HUSHZONE_ACCESS_TOKEN_SECRET and HUSHZONE_REFRESH_TOKEN_SECRET must differ"
                    .into(),
            ));
        }

        let access_token_ttl_mins = std::env::var("HUSHZONE_ACCESS_TTL_MINUTES")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_ACCESS_TTL_MINS);
        let refresh_token_ttl_days = std::env::var("HUSHZONE_REFRESH_TTL_DAYS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_REFRESH_TTL_DAYS);
        let google_client_id = std::env::var("HUSHZONE_GOOGLE_CLIENT_ID").unwrap_or_default();
        let google_tokeninfo_url = std::env::var("HUSHZONE_GOOGLE_TOKENINFO_URL")
            .unwrap_or_else(|_| DEFAULT_TOKENINFO_URL.into());

        Ok(Self {
            access_token_secret,
            refresh_token_secret,
            access_token_ttl_mins,
            refresh_token_ttl_days,
            google_client_id,
            google_tokeninfo_url,
        })
    }

    pub fn access_token_ttl(&self) -> Duration {
        Duration::minutes(self.access_token_ttl_mins)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::days(self.refresh_token_ttl_days)
    }
}

fn required_env(key: &str) -> AuthResult<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AuthError::Config(format!("{key} is required"))),
    }
}
