use thiserror::Error;

/// Error for UserId parsing failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UserIdError {
    #[error("Invalid UUID format: {0}")]
    InvalidFormat(String),
}

/// Error for Username validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UsernameError {
    #[error("Username is required")]
    Empty,
}

/// Error for EmailAddress validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmailError {
    #[error("Email is required")]
    Empty,
}

/// Error for Password validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PasswordError {
    #[error("Password is required")]
    Empty,
}

/// Top-level error for all user-related operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UserError {
    // Value object validation errors (automatically converted via #[from])
    #[error("Invalid username: {0}")]
    InvalidUsername(#[from] UsernameError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Invalid password: {0}")]
    InvalidPassword(#[from] PasswordError),

    // Domain-level errors
    #[error("User not found: {0}")]
    NotFound(String),

    /// Deliberately carries no detail about the colliding record.
    #[error("User already exists")]
    EmailAlreadyExists,

    /// Shared by "unknown email" and "wrong password".
    #[error("Invalid credentials")]
    InvalidCredentials,

    // Infrastructure errors
    #[error("Password hashing failed: {0}")]
    PasswordHashing(String),

    #[error("Token signing failed: {0}")]
    TokenSigning(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl UserError {
    /// Whether the error stems from rejected input rather than from the system.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            UserError::InvalidUsername(_)
                | UserError::InvalidEmail(_)
                | UserError::InvalidPassword(_)
        )
    }
}
