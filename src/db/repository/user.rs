use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::models::User;
use crate::error::{AppError, AppResult};

// ============================================================================
// User Repository
// ============================================================================

pub struct UserRepository;

impl UserRepository {
    /// Mirror an identity-provider principal locally. The email is refreshed
    /// when the provider reports a new one.
    pub async fn upsert(pool: &SqlitePool, id: &str, email: &str) -> AppResult<User> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                updated_at = CASE
                    WHEN users.email = excluded.email THEN users.updated_at
                    ELSE excluded.updated_at
                END
            RETURNING id, email, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }
}
