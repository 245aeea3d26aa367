use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{AccessLevel, PageName, PagePermission};
use crate::error::{AppError, AppResult};

// ============================================================================
// Page Permission Repository (permission table)
// ============================================================================

pub struct PagePermissionRepository;

impl PagePermissionRepository {
    /// Stored level for (membership, page). `None` means no override exists.
    pub async fn find_level(
        pool: &SqlitePool,
        membership_id: &str,
        page: PageName,
    ) -> AppResult<Option<AccessLevel>> {
        let level: Option<AccessLevel> = sqlx::query_scalar(
            "SELECT access_level FROM page_permissions WHERE membership_id = ? AND page = ?",
        )
        .bind(membership_id)
        .bind(page)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(level)
    }

    /// Insert or replace the level for (membership, page).
    pub async fn upsert(
        pool: &SqlitePool,
        membership_id: &str,
        page: PageName,
        level: AccessLevel,
    ) -> AppResult<PagePermission> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, PagePermission>(
            r#"
            INSERT INTO page_permissions (id, membership_id, page, access_level, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(membership_id, page) DO UPDATE SET
                access_level = excluded.access_level,
                updated_at = excluded.updated_at
            RETURNING id, membership_id, page, access_level, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(membership_id)
        .bind(page)
        .bind(level)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    pub async fn list_for_membership(
        pool: &SqlitePool,
        membership_id: &str,
    ) -> AppResult<Vec<PagePermission>> {
        sqlx::query_as::<_, PagePermission>(
            r#"
            SELECT id, membership_id, page, access_level, created_at, updated_at
            FROM page_permissions
            WHERE membership_id = ?
            "#,
        )
        .bind(membership_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{MembershipStatus, Role};
    use crate::db::test_support::{test_pool, user};
    use crate::db::{MembershipRepository, SiteRepository};

    #[tokio::test]
    async fn upsert_keeps_one_row_per_page() {
        let pool = test_pool().await;
        user(&pool, "alice").await;
        user(&pool, "bob").await;
        let site = SiteRepository::create_with_owner(&pool, "alice", "Home", 2).await.unwrap();
        let bob = MembershipRepository::create(&pool, "bob", site.id(), Role::Member, MembershipStatus::Active)
            .await
            .unwrap();

        assert_eq!(
            PagePermissionRepository::find_level(&pool, &bob.id, PageName::Finance).await.unwrap(),
            None
        );

        PagePermissionRepository::upsert(&pool, &bob.id, PageName::Finance, AccessLevel::View)
            .await
            .unwrap();
        PagePermissionRepository::upsert(&pool, &bob.id, PageName::Finance, AccessLevel::Limited)
            .await
            .unwrap();

        let rows = PagePermissionRepository::list_for_membership(&pool, &bob.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].access_level, AccessLevel::Limited);
    }

    #[tokio::test]
    async fn rows_disappear_with_the_membership() {
        let pool = test_pool().await;
        user(&pool, "alice").await;
        user(&pool, "bob").await;
        let site = SiteRepository::create_with_owner(&pool, "alice", "Home", 2).await.unwrap();
        let bob = MembershipRepository::create(&pool, "bob", site.id(), Role::Member, MembershipStatus::Active)
            .await
            .unwrap();
        PagePermissionRepository::upsert(&pool, &bob.id, PageName::Health, AccessLevel::Full)
            .await
            .unwrap();

        MembershipRepository::delete(&pool, &bob.id).await.unwrap();
        assert!(PagePermissionRepository::list_for_membership(&pool, &bob.id)
            .await
            .unwrap()
            .is_empty());
    }
}
