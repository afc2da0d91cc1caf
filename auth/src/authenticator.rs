use chrono::Duration;

use crate::jwt::Claims;
use crate::jwt::JwtError;
use crate::jwt::TokenService;
use crate::password::PasswordError;
use crate::password::PasswordHasher;

/// Authentication coordinator combining password verification and token issuance.
///
/// Immutable after construction; share it behind an `Arc`.
#[derive(Clone)]
pub struct Authenticator {
    password_hasher: PasswordHasher,
    token_service: TokenService,
}

/// Result of successful authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationResult {
    /// Signed access token
    pub access_token: String,
}

/// Authentication operation errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthenticationError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("JWT error: {0}")]
    JwtError(#[from] JwtError),
}

impl Authenticator {
    /// Create a new authenticator.
    ///
    /// # Arguments
    /// * `jwt_secret` - Secret key for token signing
    /// * `token_validity` - Lifetime of issued tokens (zero or negative means already expired)
    ///
    /// # Returns
    /// Configured Authenticator instance
    pub fn new(jwt_secret: &[u8], token_validity: Duration) -> Self {
        Self {
            password_hasher: PasswordHasher::new(),
            token_service: TokenService::new(jwt_secret, token_validity),
        }
    }

    pub fn token_service(&self) -> &TokenService {
        &self.token_service
    }

    /// Hash a password for storage.
    ///
    /// # Errors
    /// * `PasswordError` - Hashing operation failed
    pub fn hash_password(&self, password: &str) -> Result<String, PasswordError> {
        self.password_hasher.hash(password)
    }

    /// Verify credentials and issue a token for the subject.
    ///
    /// # Arguments
    /// * `password` - Plaintext password to verify
    /// * `stored_hash` - Stored password hash
    /// * `subject_id` - Identifier written to the token's `sub` claim
    /// * `subject_email` - Email written to the token's `email` claim
    ///
    /// # Errors
    /// * `InvalidCredentials` - Password does not match, or the stored hash is unreadable
    /// * `JwtError` - Token generation failed
    pub fn authenticate(
        &self,
        password: &str,
        stored_hash: &str,
        subject_id: &str,
        subject_email: &str,
    ) -> Result<AuthenticationResult, AuthenticationError> {
        if !self.password_hasher.verify(password, stored_hash) {
            return Err(AuthenticationError::InvalidCredentials);
        }

        let access_token = self.token_service.issue(subject_id, subject_email)?;

        Ok(AuthenticationResult { access_token })
    }

    /// Spend a password verification's worth of work for a subject that does not exist.
    ///
    /// Always fails; keeps an unknown subject as slow to reject as a wrong password.
    pub fn reject_unknown_subject(&self, password: &str) -> AuthenticationError {
        self.password_hasher.verify_dummy(password);
        AuthenticationError::InvalidCredentials
    }

    /// Issue a token without password verification.
    ///
    /// # Errors
    /// * `JwtError` - Token generation failed
    pub fn generate_token(&self, subject_id: &str, subject_email: &str) -> Result<String, JwtError> {
        self.token_service.issue(subject_id, subject_email)
    }

    /// Validate a token and return its claims.
    ///
    /// # Errors
    /// * `InvalidToken`, `InvalidSignature` or `TokenExpired`
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        self.token_service.verify(token)
    }
}
