use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{RefreshToken, User, UserRole};
use crate::utils::error::{AppError, Result};

const REFRESH_TOKEN_LEN: usize = 64;

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub signing_key: String,
    pub issuer: String,
    pub audience: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub given_name: String,
    pub family_name: String,
    pub role: UserRole,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| AppError::AuthError("Token subject is not a user id".to_string()))
    }
}

/// Signs and verifies HS256 bearer tokens and mints opaque refresh tokens.
pub struct TokenIssuer {
    config: TokenConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(config: TokenConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_audience(&[config.audience.as_str()]);

        Self {
            encoding_key: EncodingKey::from_secret(config.signing_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.signing_key.as_bytes()),
            validation,
            config,
        }
    }

    /// Returns the signed access token and its expiry.
    pub fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<(String, DateTime<Utc>)> {
        let expires_at = now + self.config.access_token_ttl;
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            given_name: user.first_name.clone(),
            family_name: user.second_name.clone(),
            role: user.role,
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalServerError(format!("token signing failed: {}", e)))?;
        // Drop sub-second precision so the reported expiry matches the claim.
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .unwrap_or(expires_at);
        Ok((token, expires_at))
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Bearer token rejected");
                AppError::AuthError("Invalid or expired token".to_string())
            })
    }

    pub fn refresh_token_for(&self, user_id: Uuid, now: DateTime<Utc>) -> RefreshToken {
        RefreshToken {
            id: Uuid::new_v4(),
            user_id,
            token: generate_refresh_value(),
            expires_at: now + self.config.refresh_token_ttl,
            created_at: now,
            revoked_at: None,
            replaced_by: None,
        }
    }
}

fn generate_refresh_value() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFRESH_TOKEN_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
pub(crate) fn test_config() -> TokenConfig {
    TokenConfig {
        signing_key: "test-signing-key-that-is-long-enough".to_string(),
        issuer: "eventdesk".to_string(),
        audience: "eventdesk-clients".to_string(),
        access_token_ttl: Duration::minutes(30),
        refresh_token_ttl: Duration::days(14),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            username: "ada".to_string(),
            first_name: "Ada".to_string(),
            second_name: "Lovelace".to_string(),
            profile_image: None,
            role,
            password_hash: String::new(),
            registered_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_issue_then_verify_carries_identity() {
        let issuer = TokenIssuer::new(test_config());
        let admin = user(UserRole::Admin);
        let now = Utc::now();
        let (token, expires_at) = issuer.issue(&admin, now).unwrap();

        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), admin.id);
        assert_eq!(claims.role, UserRole::Admin);
        assert_eq!(claims.given_name, "Ada");
        assert_eq!(claims.family_name, "Lovelace");
        assert_eq!(claims.exp, expires_at.timestamp());
        assert_eq!(claims.exp - claims.iat, 30 * 60);
    }

    #[test]
    fn test_wrong_key_or_audience_is_rejected() {
        let issuer = TokenIssuer::new(test_config());
        let (token, _) = issuer.issue(&user(UserRole::User), Utc::now()).unwrap();

        let other_key = TokenIssuer::new(TokenConfig {
            signing_key: "a-completely-different-signing-key".to_string(),
            ..test_config()
        });
        assert!(matches!(other_key.verify(&token), Err(AppError::AuthError(_))));

        let other_audience = TokenIssuer::new(TokenConfig {
            audience: "someone-else".to_string(),
            ..test_config()
        });
        assert!(other_audience.verify(&token).is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let issuer = TokenIssuer::new(test_config());
        let (token, _) = issuer
            .issue(&user(UserRole::User), Utc::now() - Duration::hours(2))
            .unwrap();
        assert!(issuer.verify(&token).is_err());
    }

    #[test]
    fn test_refresh_tokens_are_random_and_expire() {
        let issuer = TokenIssuer::new(test_config());
        let now = Utc::now();
        let a = issuer.refresh_token_for(Uuid::new_v4(), now);
        let b = issuer.refresh_token_for(Uuid::new_v4(), now);
        assert_eq!(a.token.len(), REFRESH_TOKEN_LEN);
        assert!(a.token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a.token, b.token);
        assert_eq!(a.expires_at, now + Duration::days(14));
        assert!(a.is_active(now));
    }
}
