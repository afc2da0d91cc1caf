use thiserror::Error;

/// Error type for JWT operations.
///
/// The three validation failures stay distinct here so callers can log them;
/// an HTTP boundary should answer all of them the same way.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    EncodingFailed(String),

    #[error("Token is invalid: {0}")]
    InvalidToken(String),

    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Token is expired")]
    TokenExpired,
}
