use thiserror::Error;

/// Error type for password operations.
///
/// Verification never fails with an error: a malformed digest simply does not match.
#[derive(Debug, Clone, Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),
}
