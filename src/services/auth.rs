use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::db::{User, UserRepository};
use crate::error::{AppError, AppResult};

/// Access-token claims issued by the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub exp: usize,
    pub iat: usize,
}

pub struct AuthService;

impl AuthService {
    /// Create a signed access token. The identity provider uses the same
    /// secret; this is what tests and local tooling use to mint tokens.
    pub fn create_jwt(secret: &str, user_id: &str, email: &str, ttl: Duration) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            iat: now.timestamp() as usize,
            exp: (now + ttl).timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?)
    }

    pub fn decode_jwt(secret: &str, token: &str) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Resolve a bearer token to the local user row, mirroring the principal
    /// on first sight.
    pub async fn user_from_token(pool: &SqlitePool, secret: &str, token: &str) -> AppResult<User> {
        let claims = Self::decode_jwt(secret, token)?;
        if claims.sub.is_empty() {
            return Err(AppError::Unauthorized);
        }
        UserRepository::upsert(pool, &claims.sub, &claims.email).await
    }

    /// Random code from an alphabet without look-alike characters.
    pub fn generate_code(length: usize) -> String {
        use rand::Rng;
        const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
        let mut rng = rand::thread_rng();
        (0..length)
            .map(|_| {
                let idx = rng.gen_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::test_pool;

    #[test]
    fn token_round_trip() {
        let token = AuthService::create_jwt("s3cret", "user-1", "u@example.com", Duration::hours(1)).unwrap();
        let claims = AuthService::decode_jwt("s3cret", &token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email, "u@example.com");
    }

    #[test]
    fn wrong_secret_or_expired_token_is_rejected() {
        let token = AuthService::create_jwt("s3cret", "user-1", "u@example.com", Duration::hours(1)).unwrap();
        assert!(matches!(AuthService::decode_jwt("other", &token), Err(AppError::Jwt(_))));

        let expired =
            AuthService::create_jwt("s3cret", "user-1", "u@example.com", Duration::hours(-2)).unwrap();
        assert!(AuthService::decode_jwt("s3cret", &expired).is_err());
    }

    #[test]
    fn codes_use_unambiguous_alphabet() {
        let code = AuthService::generate_code(32);
        assert_eq!(code.len(), 32);
        assert!(!code.contains(['0', 'O', '1', 'I']));
    }

    #[tokio::test]
    async fn first_request_mirrors_the_user() {
        let pool = test_pool().await;
        let token = AuthService::create_jwt("s3cret", "new-user", "new@example.com", Duration::hours(1)).unwrap();

        let user = AuthService::user_from_token(&pool, "s3cret", &token).await.unwrap();
        assert_eq!(user.id, "new-user");
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE id = ?")
            .bind("new-user")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
