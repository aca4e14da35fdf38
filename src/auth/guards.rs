use rocket::Request;
use rocket::State;
use rocket::request::{FromRequest, Outcome};
use rocket_okapi::request::OpenApiFromRequest;
use uuid::Uuid;

use crate::auth::{AuthError, AuthResult, AuthState};

/// Request guard carrying the verified subject of a bearer access token.
///
/// Verification is the token signer's verify path only: signature,
/// algorithm pinning and expiry. No store lookup happens here, and `id` is
/// the one canonical subject value downstream handlers depend on.
#[derive(Debug, Clone, OpenApiFromRequest)]
pub struct AuthUser {
    pub id: Uuid,
}

/// Error code stashed by a failed guard so the error catcher can answer
/// with the same `{"error": <code>}` body the handlers produce.
#[derive(Debug, Clone, Default)]
pub(crate) struct GuardFailure(pub(crate) Option<&'static str>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match extract_subject(request).await {
            Ok(user) => Outcome::Success(user),
            Err(err) => {
                request.local_cache(|| GuardFailure(Some(err.code())));
                Outcome::Error((err.status(), err))
            }
        }
    }
}

async fn extract_subject(request: &Request<'_>) -> AuthResult<AuthUser> {
    let token = bearer_token(request)?;

    let state = request
        .guard::<&State<AuthState>>()
        .await
        .succeeded()
        .ok_or_else(|| AuthError::Config("AuthState missing from managed state".into()))?;

    // Expired, forged and malformed tokens all collapse into one code on
    // the wire; the distinction stays internal.
    let subject = state
        .jwt_service
        .verify(token)
        .map_err(|_| AuthError::InvalidToken)?;
    let id = subject.parse::<Uuid>().map_err(|_| AuthError::InvalidToken)?;

    Ok(AuthUser { id })
}

fn bearer_token<'r>(request: &'r Request<'_>) -> AuthResult<&'r str> {
    let header = request
        .headers()
        .get_one("Authorization")
        .ok_or(AuthError::MissingToken)?;
    let mut parts = header.splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default();
    if scheme.eq_ignore_ascii_case("Bearer") && !token.is_empty() {
        Ok(token)
    } else {
        Err(AuthError::MissingToken)
    }
}
