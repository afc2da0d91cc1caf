use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Identity claims carried by a session token.
///
/// Binds the subject's identifier and email to an issue and expiry time.
/// Timestamps are Unix seconds, as in RFC 7519.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user identifier)
    pub sub: String,

    /// Subject email address
    pub email: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Create claims for a subject.
    ///
    /// # Arguments
    /// * `subject_id` - Unique user identifier
    /// * `email` - Subject email address
    /// * `issued_at` - Unix timestamp of issuance
    /// * `expires_at` - Unix timestamp from which the token is no longer valid
    pub fn new(
        subject_id: impl ToString,
        email: impl ToString,
        issued_at: i64,
        expires_at: i64,
    ) -> Self {
        Self {
            sub: subject_id.to_string(),
            email: email.to_string(),
            iat: issued_at,
            exp: expires_at,
        }
    }

    /// Check if the claims are expired at `current_timestamp`.
    ///
    /// The expiry instant itself already counts as expired.
    pub fn is_expired(&self, current_timestamp: i64) -> bool {
        current_timestamp >= self.exp
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}
