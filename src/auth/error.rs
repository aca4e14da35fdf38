use rocket::http::Status;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Error taxonomy for the credential and session subsystem.
///
/// Every variant maps to a stable snake_case code surfaced to clients via
/// [`AuthError::code`]; internal detail (storage errors, hashing errors)
/// never leaks into those codes.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing or malformed request fields")]
    InvalidPayload,
    #[error("email address is not valid")]
    InvalidEmail,
    #[error("password does not meet strength requirements")]
    WeakPassword,
    #[error("an account with this email already exists")]
    EmailExists,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account temporarily locked")]
    AccountLocked { minutes: i64 },
    #[error("email address is not verified")]
    EmailNotVerified,
    #[error("refresh token is invalid or expired")]
    InvalidOrExpired,
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid bearer token")]
    InvalidToken,
    #[error("token expired")]
    TokenExpired,
    #[error("token signature mismatch")]
    InvalidSignature,
    #[error("token is malformed")]
    TokenMalformed,
    #[error("identity provider unreachable")]
    IdentityProviderUnreachable,
    #[error("identity assertion rejected")]
    InvalidAssertion,
    #[error("identity assertion audience mismatch")]
    AudienceMismatch,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("password hashing error: {0}")]
    PasswordHash(String),
    #[error("token encoding error: {0}")]
    TokenEncoding(String),
    #[error("storage unavailable: {0}")]
    Storage(#[from] sqlx::Error),
}

impl AuthError {
    /// Stable, enumerable error code included in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidPayload => "invalid_payload",
            AuthError::InvalidEmail => "invalid_email",
            AuthError::WeakPassword => "weak_password",
            AuthError::EmailExists => "email_exists",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::AccountLocked { .. } => "account_locked",
            AuthError::EmailNotVerified => "email_not_verified",
            AuthError::InvalidOrExpired => "invalid_or_expired",
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidToken => "invalid_token",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenMalformed => "token_malformed",
            AuthError::IdentityProviderUnreachable => "identity_provider_unreachable",
            AuthError::InvalidAssertion => "invalid_assertion",
            AuthError::AudienceMismatch => "audience_mismatch",
            AuthError::Config(_) => "configuration_error",
            AuthError::PasswordHash(_) => "internal_error",
            AuthError::TokenEncoding(_) => "internal_error",
            AuthError::Storage(_) => "storage_unavailable",
        }
    }

    pub fn status(&self) -> Status {
        match self {
            AuthError::InvalidPayload | AuthError::InvalidEmail | AuthError::WeakPassword => {
                Status::BadRequest
            }
            AuthError::EmailExists => Status::Conflict,
            AuthError::InvalidCredentials
            | AuthError::InvalidOrExpired
            | AuthError::MissingToken
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::InvalidSignature
            | AuthError::TokenMalformed
            | AuthError::InvalidAssertion
            | AuthError::AudienceMismatch => Status::Unauthorized,
            AuthError::AccountLocked { .. } | AuthError::EmailNotVerified => Status::Forbidden,
            AuthError::IdentityProviderUnreachable => Status::BadGateway,
            AuthError::Storage(_) => Status::ServiceUnavailable,
            AuthError::Config(_) | AuthError::PasswordHash(_) | AuthError::TokenEncoding(_) => {
                Status::InternalServerError
            }
        }
    }
}

impl From<argon2::Error> for AuthError {
    fn from(err: argon2::Error) -> Self {
        AuthError::PasswordHash(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AuthError::PasswordHash(err.to_string())
    }
}
