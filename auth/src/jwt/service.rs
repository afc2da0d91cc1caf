use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use super::claims::Claims;
use super::errors::JwtError;
use super::handler::JwtHandler;

/// Issues and validates expiring identity tokens.
///
/// Secret and validity are fixed at construction. A zero or negative validity
/// is accepted and yields tokens that are already expired when issued.
#[derive(Clone)]
pub struct TokenService {
    handler: JwtHandler,
    validity: Duration,
}

impl TokenService {
    /// Create a new token service.
    ///
    /// # Arguments
    /// * `secret` - Shared HMAC secret
    /// * `validity` - Lifetime of every issued token
    pub fn new(secret: &[u8], validity: Duration) -> Self {
        Self {
            handler: JwtHandler::new(secret),
            validity,
        }
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Issue a token for a subject, valid from now for the configured duration.
    ///
    /// # Errors
    /// * `EncodingFailed` - Claims could not be serialized or signed
    pub fn issue(&self, subject_id: &str, subject_email: &str) -> Result<String, JwtError> {
        self.issue_at(subject_id, subject_email, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    ///
    /// # Errors
    /// * `EncodingFailed` - Expiry is out of range, or signing failed
    pub fn issue_at(
        &self,
        subject_id: &str,
        subject_email: &str,
        now: DateTime<Utc>,
    ) -> Result<String, JwtError> {
        let expires_at = now.checked_add_signed(self.validity).ok_or_else(|| {
            JwtError::EncodingFailed("token expiry is out of range".to_string())
        })?;

        let claims = Claims::new(
            subject_id,
            subject_email,
            now.timestamp(),
            expires_at.timestamp(),
        );

        self.handler.encode(&claims)
    }

    /// Verify a token's signature and expiry against the current time.
    ///
    /// # Errors
    /// * `InvalidToken` - Token is malformed
    /// * `InvalidSignature` - Token was not signed with this secret
    /// * `TokenExpired` - Current time is at or past `exp`
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token as if the current time were `now`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, JwtError> {
        let claims: Claims = self.handler.decode(token)?;

        if claims.is_expired(now.timestamp()) {
            return Err(JwtError::TokenExpired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const SECRET: &[u8] = b"test_secret_key_at_least_32_bytes!";

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let service = TokenService::new(SECRET, Duration::hours(24));

        let token = service
            .issue("user123", "test@example.com")
            .expect("Failed to issue token");
        let claims = service.verify(&token).expect("Failed to verify token");

        assert_eq!(claims.sub, "user123");
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
    }

    #[test]
    fn test_expiry_boundary() {
        let validity = Duration::minutes(30);
        let service = TokenService::new(SECRET, validity);
        let issued_at = fixed_now();

        let token = service
            .issue_at("user123", "test@example.com", issued_at)
            .expect("Failed to issue token");

        let just_before = issued_at + validity - Duration::seconds(1);
        assert!(service.verify_at(&token, just_before).is_ok());

        let at_expiry = issued_at + validity;
        assert_eq!(
            service.verify_at(&token, at_expiry),
            Err(JwtError::TokenExpired)
        );

        let just_after = issued_at + validity + Duration::seconds(1);
        assert_eq!(
            service.verify_at(&token, just_after),
            Err(JwtError::TokenExpired)
        );
    }

    #[test]
    fn test_zero_validity_is_immediately_expired() {
        let service = TokenService::new(SECRET, Duration::zero());

        let token = service
            .issue("user123", "test@example.com")
            .expect("Failed to issue token");

        assert_eq!(service.verify(&token), Err(JwtError::TokenExpired));
    }

    #[test]
    fn test_negative_validity_is_immediately_expired() {
        let service = TokenService::new(SECRET, Duration::hours(-1));

        let token = service
            .issue("user123", "test@example.com")
            .expect("Failed to issue token");

        assert_eq!(service.verify(&token), Err(JwtError::TokenExpired));
    }

    #[test]
    fn test_verify_with_other_secret() {
        let issuer = TokenService::new(b"secret1_at_least_32_bytes_long_key!", Duration::hours(1));
        let verifier = TokenService::new(b"secret2_at_least_32_bytes_long_key!", Duration::hours(1));

        let token = issuer
            .issue("user123", "test@example.com")
            .expect("Failed to issue token");

        assert_eq!(verifier.verify(&token), Err(JwtError::InvalidSignature));
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let service = TokenService::new(SECRET, Duration::hours(1));

        let victim = service
            .issue("user123", "test@example.com")
            .expect("Failed to issue token");
        let attacker = service
            .issue("attacker", "evil@example.com")
            .expect("Failed to issue token");

        let victim_parts: Vec<&str> = victim.split('.').collect();
        let attacker_parts: Vec<&str> = attacker.split('.').collect();
        let forged = format!(
            "{}.{}.{}",
            victim_parts[0], attacker_parts[1], victim_parts[2]
        );

        assert_eq!(service.verify(&forged), Err(JwtError::InvalidSignature));
    }

    #[test]
    fn test_malformed_token() {
        let service = TokenService::new(SECRET, Duration::hours(1));

        assert!(matches!(
            service.verify("garbage"),
            Err(JwtError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_token_without_identity_claims() {
        #[derive(serde::Serialize)]
        struct Partial {
            sub: &'static str,
        }

        let service = TokenService::new(SECRET, Duration::hours(1));
        let token = JwtHandler::new(SECRET)
            .encode(&Partial { sub: "user123" })
            .expect("Failed to encode token");

        assert!(matches!(
            service.verify(&token),
            Err(JwtError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_out_of_range_validity_fails_to_issue() {
        let service = TokenService::new(SECRET, Duration::MAX);

        assert!(matches!(
            service.issue("user123", "test@example.com"),
            Err(JwtError::EncodingFailed(_))
        ));
    }
}
