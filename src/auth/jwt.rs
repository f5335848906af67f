use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::AuthSettings;
use crate::errors::{LinkhubError, Result};

/// Access Token Claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// 用户 ID
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64> {
        self.sub
            .parse()
            .map_err(|_| LinkhubError::invalid_token("token subject is not a user id"))
    }
}

/// JWT Service for issuing and validating bearer tokens (HS256)
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_ttl_minutes: u64,
}

impl JwtService {
    pub fn new(secret: &str, token_ttl_minutes: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            token_ttl_minutes,
        }
    }

    /// Create JwtService from config
    pub fn from_settings(settings: &AuthSettings) -> Self {
        let secret = if settings.jwt_secret.is_empty() {
            warn!("JWT secret not configured or empty, generating secure random token");
            crate::utils::generate_secure_token(48)
        } else {
            settings.jwt_secret.clone()
        };

        Self::new(&secret, settings.token_ttl_minutes)
    }

    /// Issue a token for the given user
    pub fn issue_token(&self, user_id: i64, email: &str) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(self.token_ttl_minutes as i64)).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| LinkhubError::token_signing(e.to_string()))
    }

    /// Validate a token
    ///
    /// Expiry is reported as `ExpiredToken`; every other failure (bad
    /// signature, wrong algorithm, malformed input) as `InvalidToken`.
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(LinkhubError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret_key_32_bytes_long!!";

    fn create_test_service() -> JwtService {
        JwtService::new(SECRET, 15)
    }

    fn sign_with_offsets(iat_offset: Duration, exp_offset: Duration) -> String {
        let now = Utc::now();
        let claims = Claims {
            sub: "1".to_string(),
            email: "a@x.com".to_string(),
            iat: (now + iat_offset).timestamp(),
            exp: (now + exp_offset).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_issue_and_validate() {
        let service = create_test_service();
        let token = service.issue_token(42, "a@x.com").unwrap();
        let claims = service.validate_token(&token).unwrap();

        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.email, "a@x.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_tokens_are_unique() {
        let service = create_test_service();
        let a = service.issue_token(1, "a@x.com").unwrap();
        let b = service.issue_token(1, "a@x.com").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_expired_token_is_distinct() {
        let service = create_test_service();
        let token = sign_with_offsets(Duration::hours(-2), Duration::hours(-1));

        let err = service.validate_token(&token).unwrap_err();
        assert!(matches!(err, LinkhubError::ExpiredToken(_)), "{:?}", err);
    }

    #[test]
    fn test_malformed_token_is_invalid() {
        let service = create_test_service();
        let err = service.validate_token("invalid.token.here").unwrap_err();
        assert!(matches!(err, LinkhubError::InvalidToken(_)));
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let other = JwtService::new("different_secret_key_32_bytes!!", 15);
        let token = other.issue_token(1, "a@x.com").unwrap();

        let err = create_test_service().validate_token(&token).unwrap_err();
        assert!(matches!(err, LinkhubError::InvalidToken(_)));
    }

    #[test]
    fn test_expired_token_with_wrong_secret_is_invalid() {
        // 签名先于过期时间校验
        let token = sign_with_offsets(Duration::hours(-2), Duration::hours(-1));
        let other = JwtService::new("different_secret_key_32_bytes!!", 15);

        let err = other.validate_token(&token).unwrap_err();
        assert!(matches!(err, LinkhubError::InvalidToken(_)));
    }

    #[test]
    fn test_non_numeric_subject() {
        let claims = Claims {
            sub: "admin".to_string(),
            email: String::new(),
            iat: 0,
            exp: 0,
            jti: String::new(),
        };
        assert!(matches!(
            claims.user_id(),
            Err(LinkhubError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_empty_secret_falls_back_to_random() {
        let settings = AuthSettings::default();
        let a = JwtService::from_settings(&settings);
        let b = JwtService::from_settings(&settings);

        let token = a.issue_token(1, "a@x.com").unwrap();
        assert!(a.validate_token(&token).is_ok());
        assert!(b.validate_token(&token).is_err());
    }
}
