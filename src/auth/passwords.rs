use argon2::{
    Algorithm, Argon2, ParamsBuilder, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

use crate::auth::{AuthError, AuthResult};

const SALT_LEN: usize = 16;
const UNUSABLE_SECRET_LEN: usize = 32;

/// One-way password hashing and verification using Argon2id.
///
/// Digests are self-describing PHC strings (algorithm, parameters, salt and
/// hash in one value), so parameter changes only affect newly created
/// accounts.
#[derive(Clone)]
pub struct PasswordService {
    argon2: Argon2<'static>,
}

impl PasswordService {
    pub fn new() -> AuthResult<Self> {
        let mut builder = ParamsBuilder::new();
        builder.m_cost(19 * 1024); // 19 MiB
        builder.t_cost(2);
        builder.p_cost(1);
        let params = builder.build().map_err(AuthError::from)?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        Ok(Self { argon2 })
    }

    pub fn hash_password(&self, password: &str) -> AuthResult<String> {
        let mut salt_bytes = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes).map_err(AuthError::from)?;
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(AuthError::from)?
            .to_string();
        Ok(hash)
    }

    /// Returns `Ok(false)` on mismatch and `Err` on malformed digests or
    /// internal failure. Callers treat `Err` as a failed verification, never
    /// as success.
    pub fn verify_password(&self, password: &str, encoded: &str) -> AuthResult<bool> {
        let parsed = PasswordHash::new(encoded)?;
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(AuthError::from(err)),
        }
    }

    /// Digest of a random throwaway secret. Stored on externally created
    /// accounts so the non-null password-hash invariant holds while no
    /// password can ever verify against it.
    pub fn hash_unusable(&self) -> AuthResult<String> {
        let mut secret = [0u8; UNUSABLE_SECRET_LEN];
        rand::thread_rng().fill_bytes(&mut secret);
        self.hash_password(&URL_SAFE_NO_PAD.encode(secret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_and_verifies_passwords() {
        let service = PasswordService::new().expect("password service");
        let hash = service.hash_password("Sup3r-secret").expect("hash generation");
        assert!(
            service
                .verify_password("Sup3r-secret", &hash)
                .expect("verify succeeds")
        );
        assert!(
            !service
                .verify_password("wrong-password", &hash)
                .expect("verify runs")
        );
    }

    #[test]
    fn digests_are_salted() {
        let service = PasswordService::new().expect("password service");
        let a = service.hash_password("Sup3r-secret").expect("hash");
        let b = service.hash_password("Sup3r-secret").expect("hash");
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_digest_is_an_error_not_a_match() {
        let service = PasswordService::new().expect("password service");
        assert!(service.verify_password("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn unusable_hash_never_verifies_common_guesses() {
        let service = PasswordService::new().expect("password service");
        let hash = service.hash_unusable().expect("unusable hash");
        for guess in ["", "password", "google", "Abcd1234!"] {
            assert!(!service.verify_password(guess, &hash).expect("verify runs"));
        }
    }
}
