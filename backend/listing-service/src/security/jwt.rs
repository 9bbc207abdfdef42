//! JWT token issuance and validation (HS256).
//!
//! Access and refresh tokens are signed with distinct secrets. The issuer is
//! owned by the application state rather than a process global, so tests can
//! construct one with throwaway secrets.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::error::{AppError, Result};

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

/// JWT claims carried by both token kinds.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Email address
    pub email: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Token type: "access" or "refresh"
    pub token_type: String,
}

/// A freshly issued token pair. `refresh_expires_at` is persisted on the
/// user row for server-side revocation checks.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(skip)]
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenIssuer {
    access_secret: String,
    refresh_secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            access_secret: config.access_secret.clone(),
            refresh_secret: config.refresh_secret.clone(),
            access_ttl: Duration::seconds(config.access_token_ttl),
            refresh_ttl: Duration::seconds(config.refresh_token_ttl),
        }
    }

    /// Issue an access/refresh pair for a user.
    pub fn issue_pair(&self, user_id: Uuid, email: &str) -> Result<TokenPair> {
        let now = Utc::now();
        let refresh_expires_at = now + self.refresh_ttl;

        let access_token = self.sign(
            user_id,
            email,
            now,
            now + self.access_ttl,
            TOKEN_TYPE_ACCESS,
            &self.access_secret,
        )?;
        let refresh_token = self.sign(
            user_id,
            email,
            now,
            refresh_expires_at,
            TOKEN_TYPE_REFRESH,
            &self.refresh_secret,
        )?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            refresh_expires_at,
        })
    }

    /// Validate an access token and return its claims.
    pub fn validate_access(&self, token: &str) -> Result<Claims> {
        self.validate(token, &self.access_secret, TOKEN_TYPE_ACCESS)
    }

    /// Validate a refresh token and return its claims.
    pub fn validate_refresh(&self, token: &str) -> Result<Claims> {
        self.validate(token, &self.refresh_secret, TOKEN_TYPE_REFRESH)
    }

    fn sign(
        &self,
        user_id: Uuid,
        email: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        token_type: &str,
        secret: &str,
    ) -> Result<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            token_type: token_type.to_string(),
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?)
    }

    fn validate(&self, token: &str, secret: &str, expected_type: &str) -> Result<Claims> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;

        if data.claims.token_type != expected_type {
            return Err(AppError::Authentication(
                "Invalid token type".to_string(),
            ));
        }

        Ok(data.claims)
    }
}

/// Parse the subject claim back into a user id.
pub fn subject_id(claims: &Claims) -> Result<Uuid> {
    Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Authentication("Invalid subject in token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&JwtConfig {
            access_secret: "access-secret-for-tests".to_string(),
            refresh_secret: "refresh-secret-for-tests".to_string(),
            access_token_ttl: 900,
            refresh_token_ttl: 604800,
        })
    }

    #[test]
    fn issued_pair_round_trips() {
        let issuer = issuer();
        let user_id = Uuid::new_v4();
        let pair = issuer.issue_pair(user_id, "user@example.com").unwrap();

        let access = issuer.validate_access(&pair.access_token).unwrap();
        assert_eq!(access.sub, user_id.to_string());
        assert_eq!(access.email, "user@example.com");
        assert_eq!(access.token_type, TOKEN_TYPE_ACCESS);

        let refresh = issuer.validate_refresh(&pair.refresh_token).unwrap();
        assert_eq!(refresh.token_type, TOKEN_TYPE_REFRESH);
        assert_eq!(subject_id(&refresh).unwrap(), user_id);
    }

    #[test]
    fn refresh_token_rejected_as_access_token() {
        let issuer = issuer();
        let pair = issuer.issue_pair(Uuid::new_v4(), "user@example.com").unwrap();

        // Signed with a different secret, so the signature check fails before
        // the token-type check does.
        assert!(issuer.validate_access(&pair.refresh_token).is_err());
        assert!(issuer.validate_refresh(&pair.access_token).is_err());
    }

    #[test]
    fn refresh_expiry_is_later_than_access_expiry() {
        let issuer = issuer();
        let pair = issuer.issue_pair(Uuid::new_v4(), "user@example.com").unwrap();

        let access = issuer.validate_access(&pair.access_token).unwrap();
        let refresh = issuer.validate_refresh(&pair.refresh_token).unwrap();
        assert!(refresh.exp > access.exp);
        assert_eq!(refresh.exp, pair.refresh_expires_at.timestamp());
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(issuer().validate_access("not.a.token").is_err());
    }
}
