use std::time::Duration;

use serde::Deserialize;

use crate::auth::{AuthConfig, AuthError, AuthResult};

const PROVIDER_TIMEOUT_SECS: u64 = 5;

/// Identity attributes extracted from a validated third-party assertion.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    /// Provider-scoped stable subject identifier (`sub`).
    pub external_id: String,
    /// Lowercased email, used as the account key.
    pub email: String,
}

/// Payload of the provider's tokeninfo endpoint. `email_verified` arrives
/// as the string "true"/"false", not a boolean.
#[derive(Debug, Deserialize)]
struct TokenInfoResponse {
    #[serde(default)]
    sub: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    email_verified: String,
    #[serde(default)]
    aud: String,
}

/// Resolves third-party identity assertions against the provider's
/// tokeninfo endpoint and enforces the audience check.
#[derive(Debug, Clone)]
pub struct IdentityVerifier {
    http: reqwest::Client,
    endpoint: String,
    audience: String,
}

impl IdentityVerifier {
    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(PROVIDER_TIMEOUT_SECS))
            .build()
            .map_err(|err| AuthError::Config(format!("identity http client: {err}")))?;

        Ok(Self {
            http,
            endpoint: config.google_tokeninfo_url.clone(),
            audience: config.google_client_id.clone(),
        })
    }

    /// Validates an assertion token. Transport failures and timeouts map to
    /// `IdentityProviderUnreachable`, never to an authentication failure;
    /// an assertion minted for a different application is rejected with
    /// `AudienceMismatch` before any account state is touched.
    pub async fn verify(&self, assertion: &str) -> AuthResult<VerifiedIdentity> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("id_token", assertion)])
            .send()
            .await
            .map_err(|_| AuthError::IdentityProviderUnreachable)?;

        if !response.status().is_success() {
            return Err(AuthError::InvalidAssertion);
        }

        let info: TokenInfoResponse = response
            .json()
            .await
            .map_err(|_| AuthError::InvalidAssertion)?;

        if info.sub.is_empty() || info.email.is_empty() {
            return Err(AuthError::InvalidAssertion);
        }

        if self.audience.is_empty() || info.aud != self.audience {
            return Err(AuthError::AudienceMismatch);
        }

        if !info.email_verified.eq_ignore_ascii_case("true") {
            return Err(AuthError::EmailNotVerified);
        }

        Ok(VerifiedIdentity {
            external_id: info.sub,
            email: info.email.to_lowercase(),
        })
    }
}
