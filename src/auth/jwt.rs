use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::auth::{AuthConfig, AuthError, AuthResult};

/// Claims carried by an access token: subject identity plus issued-at and
/// expiry instants. Self-contained; verification needs no store lookup.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct SignedAccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Mints and verifies HS256-signed access tokens.
///
/// The algorithm is pinned: tokens carrying any other `alg` header are
/// rejected during verification regardless of their signature.
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.access_token_secret)
    }

    pub fn issue(&self, subject: &str, ttl: Duration) -> AuthResult<SignedAccessToken> {
        let now = Utc::now();
        let expires_at = now + ttl;

        let claims = AccessTokenClaims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| AuthError::TokenEncoding(err.to_string()))?;

        Ok(SignedAccessToken { token, expires_at })
    }

    /// Verifies signature, algorithm and expiry, returning the subject.
    pub fn verify(&self, token: &str) -> AuthResult<String> {
        let data = decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    AuthError::InvalidSignature
                }
                _ => AuthError::TokenMalformed,
            })?;

        if data.claims.sub.trim().is_empty() {
            return Err(AuthError::TokenMalformed);
        }

        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "access-secret-for-tests";

    #[test]
    fn round_trips_subject_before_expiry() {
        let service = JwtService::new(TEST_SECRET);
        let signed = service
            .issue("7ad2cf4b-0f04-4dbd-93a5-bd2c0f0dd7c3", Duration::minutes(15))
            .expect("issue token");

        let subject = service.verify(&signed.token).expect("verify token");
        assert_eq!(subject, "7ad2cf4b-0f04-4dbd-93a5-bd2c0f0dd7c3");
        assert!(signed.expires_at > Utc::now());
    }

    #[test]
    fn expired_tokens_fail_with_expiry_error() {
        let service = JwtService::new(TEST_SECRET);
        let signed = service
            .issue("subject", Duration::seconds(-30))
            .expect("issue token");

        assert!(matches!(
            service.verify(&signed.token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn tokens_signed_with_a_different_secret_are_rejected() {
        let issuer = JwtService::new("some-other-secret");
        let verifier = JwtService::new(TEST_SECRET);
        let signed = issuer
            .issue("subject", Duration::minutes(5))
            .expect("issue token");

        assert!(matches!(
            verifier.verify(&signed.token),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn non_hs256_tokens_are_rejected_even_with_the_right_secret() {
        let claims = AccessTokenClaims {
            sub: "subject".into(),
            iat: Utc::now().timestamp(),
            exp: (Utc::now() + Duration::minutes(5)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .expect("encode HS384 token");

        let service = JwtService::new(TEST_SECRET);
        assert!(matches!(
            service.verify(&token),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        let service = JwtService::new(TEST_SECRET);
        assert!(matches!(
            service.verify("definitely.not.a-jwt"),
            Err(AuthError::TokenMalformed)
        ));
    }
}
