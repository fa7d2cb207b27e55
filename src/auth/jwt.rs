//! JWT issue and validation for full-account principals.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::data::models::{User, UserRole};

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: Uuid,
    pub email: Option<String>,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 keypair plus token lifetime.
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Issue a token for a user.
    pub fn issue(&self, user: &User) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// Validate a token and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::models::AccountType;
    use chrono::Utc;

    fn full_user() -> User {
        User {
            id: Uuid::new_v4(),
            display_name: "Alice".to_owned(),
            email: Some("alice@example.com".to_owned()),
            password_hash: Some("$argon2id$stub".to_owned()),
            avatar_url: None,
            about_me: None,
            account_type: AccountType::Full,
            role: UserRole::User,
            is_active: true,
            email_verified: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_active_at: None,
        }
    }

    #[test]
    fn issue_then_verify_preserves_claims() {
        let keys = JwtKeys::new("test-secret", Duration::from_secs(3600));
        let user = full_user();

        let token = keys.issue(&user).unwrap();
        let claims = keys.verify(&token).unwrap();

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.role, user.role);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let keys = JwtKeys::new("test-secret", Duration::from_secs(3600));
        let other = JwtKeys::new("other-secret", Duration::from_secs(3600));

        let token = keys.issue(&full_user()).unwrap();
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn garbage_token_is_rejected() {
        let keys = JwtKeys::new("test-secret", Duration::from_secs(3600));
        assert!(keys.verify("not.a.jwt").is_err());
    }
}
