//! Authentication module: configuration, credential handling, token
//! minting, refresh-token lifecycle, lockout policy, third-party identity
//! verification, Rocket request guards and HTTP route handlers.

use std::sync::Arc;

use sqlx::PgPool;

pub mod accounts;
pub mod config;
pub mod error;
pub mod guards;
pub mod identity;
pub mod jwt;
pub mod lockout;
pub mod passwords;
pub mod refresh_store;
pub mod responses;
pub mod routes;
pub mod service;
pub mod validate;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use guards::AuthUser;
pub use identity::IdentityVerifier;
pub use jwt::JwtService;
pub use passwords::PasswordService;
pub use refresh_store::RefreshTokenStore;
pub use service::{SessionService, SessionTokens};

/// Shared state handed to Rocket: the session issuer for the auth routes
/// and the token signer for the request guard.
#[derive(Clone)]
pub struct AuthState {
    pub config: AuthConfig,
    pub jwt_service: Arc<JwtService>,
    pub sessions: SessionService,
}

impl AuthState {
    /// Wires every component from configuration and a database pool.
    pub fn from_config(config: AuthConfig, pool: PgPool) -> AuthResult<Self> {
        let passwords = Arc::new(PasswordService::new()?);
        let jwt_service = Arc::new(JwtService::from_config(&config));
        let refresh_store = RefreshTokenStore::new(pool.clone(), &config);
        let identity = IdentityVerifier::from_config(&config)?;
        let sessions = SessionService::new(
            config.clone(),
            pool,
            passwords,
            jwt_service.clone(),
            refresh_store,
            identity,
        );

        Ok(Self {
            config,
            jwt_service,
            sessions,
        })
    }
}
