use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::db::models::{Membership, MembershipStatus, Role, Site, SiteWithRole};
use crate::error::{AppError, AppResult};

// ============================================================================
// Membership Repository (membership directory)
// ============================================================================

const MEMBERSHIP_COLUMNS: &str =
    "id, user_id, site_id, role, status, created_at, updated_at";

pub struct MembershipRepository;

impl MembershipRepository {
    /// Every site the user actively belongs to, oldest site first.
    ///
    /// The order is the tie-breaker for "first site" fallbacks on both the
    /// server and the client, so it must stay deterministic.
    pub async fn list_active_for_user(
        pool: &SqlitePool,
        user_id: &str,
    ) -> AppResult<Vec<SiteWithRole>> {
        let rows = sqlx::query(
            r#"
            SELECT
                m.id AS membership_id,
                m.role AS role,
                s.id, s.name, s.owner_id, s.timezone, s.units, s.theme, s.language,
                s.ha_url, s.ha_token, s.ha_connected, s.created_at, s.updated_at
            FROM memberships m
            JOIN sites s ON s.id = m.site_id
            WHERE m.user_id = ? AND m.status = 'active'
            ORDER BY s.created_at ASC, m.created_at ASC, s.id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows.iter().map(site_with_role_from_row).collect())
    }

    /// Active membership of `user_id` in `site_id`, if any.
    pub async fn find_active(
        pool: &SqlitePool,
        user_id: &str,
        site_id: &str,
    ) -> AppResult<Option<Membership>> {
        sqlx::query_as::<_, Membership>(&format!(
            r#"
            SELECT {} FROM memberships
            WHERE user_id = ? AND site_id = ? AND status = 'active'
            "#,
            MEMBERSHIP_COLUMNS
        ))
        .bind(user_id)
        .bind(site_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Membership>> {
        sqlx::query_as::<_, Membership>(&format!(
            "SELECT {} FROM memberships WHERE id = ?",
            MEMBERSHIP_COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn create(
        pool: &SqlitePool,
        user_id: &str,
        site_id: &str,
        role: Role,
        status: MembershipStatus,
    ) -> AppResult<Membership> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Membership>(&format!(
            r#"
            INSERT INTO memberships (id, user_id, site_id, role, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            MEMBERSHIP_COLUMNS
        ))
        .bind(&id)
        .bind(user_id)
        .bind(site_id)
        .bind(role)
        .bind(status)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(
                "User already has a membership in this site".to_string(),
            ),
            _ => AppError::Database(e),
        })
    }

    /// Flip a pending membership to active with `role`. Runs on the caller's
    /// connection so it can join an invitation redemption transaction.
    pub async fn activate(conn: &mut SqliteConnection, id: &str, role: Role) -> AppResult<()> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            "UPDATE memberships SET status = 'active', role = ?, updated_at = ? WHERE id = ?",
        )
        .bind(role)
        .bind(now)
        .bind(id)
        .execute(conn)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    /// Remove a membership. Its page permissions are removed by cascade.
    pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM memberships WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// All memberships of a site with the member's email, owner first.
    pub async fn list_for_site(
        pool: &SqlitePool,
        site_id: &str,
    ) -> AppResult<Vec<(Membership, String)>> {
        let rows = sqlx::query(
            r#"
            SELECT
                m.id, m.user_id, m.site_id, m.role, m.status, m.created_at, m.updated_at,
                u.email AS email
            FROM memberships m
            JOIN users u ON u.id = m.user_id
            WHERE m.site_id = ?
            ORDER BY CASE m.role WHEN 'owner' THEN 0 WHEN 'admin' THEN 1 ELSE 2 END,
                     m.created_at ASC
            "#,
        )
        .bind(site_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            let membership = Membership {
                id: r.get("id"),
                user_id: r.get("user_id"),
                site_id: r.get("site_id"),
                role: r.get("role"),
                status: r.get("status"),
                created_at: r.get("created_at"),
                updated_at: r.get("updated_at"),
            };
            out.push((membership, r.get("email")));
        }

        Ok(out)
    }
}

fn site_with_role_from_row(r: &SqliteRow) -> SiteWithRole {
    SiteWithRole {
        site: Site {
            id: r.get("id"),
            name: r.get("name"),
            owner_id: r.get("owner_id"),
            timezone: r.get("timezone"),
            units: r.get("units"),
            theme: r.get("theme"),
            language: r.get("language"),
            ha_url: r.get("ha_url"),
            ha_token: r.get("ha_token"),
            ha_connected: r.get("ha_connected"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        },
        role: r.get("role"),
        membership_id: r.get("membership_id"),
    }
}
