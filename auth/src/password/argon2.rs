use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::PasswordHash;
use argon2::password_hash::PasswordHasher as Argon2PasswordHasher;
use argon2::password_hash::PasswordVerifier;
use argon2::password_hash::SaltString;
use argon2::Argon2;

use super::errors::PasswordError;

/// Digest of no known password, encoded with the default Argon2id parameters.
///
/// Verifying against it costs as much as verifying against a real stored hash.
const DUMMY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$yprIzkakPOg9uBdT/sie1A$7zIWyATKo4t2FxixeiX33HjQabv+7Akhzs0DT8bGoco";

/// Password hashing implementation.
///
/// Provides cryptographic password hashing (internally uses Argon2id).
/// Holds no state, so a single instance can be shared freely across tasks.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher;

impl PasswordHasher {
    /// Create a new password hasher instance.
    ///
    /// # Returns
    /// PasswordHasher instance configured with secure defaults
    pub fn new() -> Self {
        Self
    }

    /// Hash a plaintext password securely.
    ///
    /// Uses Argon2id with a random salt drawn from the OS RNG, so two hashes of
    /// the same password never match.
    ///
    /// # Arguments
    /// * `password` - Plaintext password to hash
    ///
    /// # Returns
    /// PHC string format hash (includes algorithm, parameters, salt, and hash)
    ///
    /// # Errors
    /// * `HashingFailed` - Password hashing operation failed
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }

    /// Verify a password against a stored hash.
    ///
    /// Algorithm, parameters and salt are read from the PHC string itself.
    /// The final digest comparison is constant-time.
    ///
    /// # Arguments
    /// * `password` - Plaintext password to verify
    /// * `hash` - Stored password hash in PHC string format
    ///
    /// # Returns
    /// True if password matches; false on mismatch or when `hash` is not a valid PHC string
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!(error = %e, "Stored password hash is malformed");
                return false;
            }
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Run a full verification against a digest no password matches.
    ///
    /// Used when there is no stored hash to check, so that the caller spends
    /// the same work as for a wrong password.
    pub fn verify_dummy(&self, password: &str) {
        let _ = self.verify(password, DUMMY_HASH);
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}
