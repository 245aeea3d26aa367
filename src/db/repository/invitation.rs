use chrono::{NaiveDateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{MembershipStatus, Role, SiteInvitation};
use crate::db::repository::MembershipRepository;
use crate::error::{AppError, AppResult};

// ============================================================================
// Site Invitation Repository
// ============================================================================

const INVITATION_COLUMNS: &str = r#"
    id, site_id, invite_code, role, max_uses, uses_count,
    expires_at, is_active, created_by, created_at
"#;

pub struct InvitationRepository;

impl InvitationRepository {
    pub async fn create(
        pool: &SqlitePool,
        site_id: &str,
        invite_code: &str,
        role: Role,
        max_uses: i64,
        expires_at: Option<NaiveDateTime>,
        created_by: &str,
    ) -> AppResult<SiteInvitation> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, SiteInvitation>(&format!(
            r#"
            INSERT INTO site_invitations (
                id, site_id, invite_code, role, max_uses, uses_count,
                expires_at, is_active, created_by, created_at
            ) VALUES (?, ?, ?, ?, ?, 0, ?, 1, ?, ?)
            RETURNING {}
            "#,
            INVITATION_COLUMNS
        ))
        .bind(id)
        .bind(site_id)
        .bind(invite_code)
        .bind(role)
        .bind(max_uses)
        .bind(expires_at)
        .bind(created_by)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict("Invite code already in use".to_string())
            }
            _ => AppError::Database(e),
        })
    }

    /// Active codes of a site, newest first.
    pub async fn list_active_for_site(
        pool: &SqlitePool,
        site_id: &str,
    ) -> AppResult<Vec<SiteInvitation>> {
        sqlx::query_as::<_, SiteInvitation>(&format!(
            r#"
            SELECT {} FROM site_invitations
            WHERE site_id = ? AND is_active = 1
            ORDER BY created_at DESC
            "#,
            INVITATION_COLUMNS
        ))
        .bind(site_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Deactivate a code. Returns false when no code of that site matched.
    pub async fn revoke(pool: &SqlitePool, site_id: &str, invitation_id: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE site_invitations SET is_active = 0 WHERE id = ? AND site_id = ?",
        )
        .bind(invitation_id)
        .bind(site_id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Redeem a code for `user_id`: consume one use and create an active
    /// membership with the invitation's role, atomically.
    ///
    /// A pending membership of the same user is promoted instead of
    /// duplicated. Returns `None` when the code is unknown or no longer
    /// redeemable.
    pub async fn redeem(
        pool: &SqlitePool,
        code: &str,
        user_id: &str,
    ) -> AppResult<Option<SiteInvitation>> {
        let now = Utc::now().naive_utc();
        let mut tx = pool.begin().await.map_err(AppError::Database)?;

        // The guarded update takes the write lock first so two redemptions of
        // a single-use code cannot both succeed.
        let consumed = sqlx::query_as::<_, SiteInvitation>(&format!(
            r#"
            UPDATE site_invitations
            SET uses_count = uses_count + 1
            WHERE invite_code = ?
              AND is_active = 1
              AND uses_count < max_uses
              AND (expires_at IS NULL OR expires_at > ?)
            RETURNING {}
            "#,
            INVITATION_COLUMNS
        ))
        .bind(code)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        let Some(invitation) = consumed else {
            tx.rollback().await.map_err(AppError::Database)?;
            return Ok(None);
        };

        let existing: Option<(String, MembershipStatus)> = sqlx::query_as(
            "SELECT id, status FROM memberships WHERE user_id = ? AND site_id = ?",
        )
        .bind(user_id)
        .bind(&invitation.site_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        match existing {
            Some((_, MembershipStatus::Active)) => {
                tx.rollback().await.map_err(AppError::Database)?;
                return Err(AppError::Conflict(
                    "You are already a member of this site".to_string(),
                ));
            }
            Some((membership_id, MembershipStatus::Pending)) => {
                MembershipRepository::activate(&mut tx, &membership_id, invitation.role).await?;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO memberships (id, user_id, site_id, role, status, created_at, updated_at)
                    VALUES (?, ?, ?, ?, 'active', ?, ?)
                    "#,
                )
                .bind(Uuid::new_v4().to_string())
                .bind(user_id)
                .bind(&invitation.site_id)
                .bind(invitation.role)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(AppError::Database)?;
            }
        }

        tx.commit().await.map_err(AppError::Database)?;
        Ok(Some(invitation))
    }

    /// Deactivate codes that expired or ran out of uses. Returns the number
    /// of codes touched.
    pub async fn deactivate_stale(pool: &SqlitePool) -> AppResult<u64> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE site_invitations
            SET is_active = 0
            WHERE is_active = 1
              AND (uses_count >= max_uses OR (expires_at IS NOT NULL AND expires_at <= ?))
            "#,
        )
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }
}
