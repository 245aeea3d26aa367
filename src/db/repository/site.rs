use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{Role, Site, SiteWithRole, UpdateSite};
use crate::error::{AppError, AppResult};

// ============================================================================
// Site Repository
// ============================================================================

const SITE_COLUMNS: &str = r#"
    id, name, owner_id, timezone, units, theme, language,
    ha_url, ha_token, ha_connected, created_at, updated_at
"#;

pub struct SiteRepository;

impl SiteRepository {
    /// Create a site together with its owner membership.
    ///
    /// The owned-site cap is checked inside the same statement that inserts
    /// the site row, so concurrent creations from several devices cannot push
    /// a user past `max_owned`.
    pub async fn create_with_owner(
        pool: &SqlitePool,
        owner_id: &str,
        name: &str,
        max_owned: u32,
    ) -> AppResult<SiteWithRole> {
        let site_id = Uuid::new_v4().to_string();
        let membership_id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let mut tx = pool.begin().await.map_err(AppError::Database)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO sites (id, name, owner_id, created_at, updated_at)
            SELECT ?, ?, ?, ?, ?
            WHERE (
                SELECT COUNT(*) FROM memberships
                WHERE user_id = ? AND role = 'owner'
            ) < ?
            "#,
        )
        .bind(&site_id)
        .bind(name)
        .bind(owner_id)
        .bind(now)
        .bind(now)
        .bind(owner_id)
        .bind(i64::from(max_owned))
        .execute(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await.map_err(AppError::Database)?;
            return Err(AppError::SiteLimitReached(max_owned));
        }

        sqlx::query(
            r#"
            INSERT INTO memberships (id, user_id, site_id, role, status, created_at, updated_at)
            VALUES (?, ?, ?, 'owner', 'active', ?, ?)
            "#,
        )
        .bind(&membership_id)
        .bind(owner_id)
        .bind(&site_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        let site = sqlx::query_as::<_, Site>(&format!(
            "SELECT {} FROM sites WHERE id = ?",
            SITE_COLUMNS
        ))
        .bind(&site_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;

        Ok(SiteWithRole {
            site,
            role: Role::Owner,
            membership_id,
        })
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> AppResult<Option<Site>> {
        sqlx::query_as::<_, Site>(&format!("SELECT {} FROM sites WHERE id = ?", SITE_COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Apply a partial settings update. Absent fields keep their value.
    pub async fn update(pool: &SqlitePool, id: &str, update: UpdateSite) -> AppResult<Site> {
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, Site>(&format!(
            r#"
            UPDATE sites SET
                name = COALESCE(?, name),
                timezone = COALESCE(?, timezone),
                units = COALESCE(?, units),
                theme = COALESCE(?, theme),
                language = COALESCE(?, language),
                ha_url = COALESCE(?, ha_url),
                ha_token = COALESCE(?, ha_token),
                ha_connected = COALESCE(?, ha_connected),
                updated_at = ?
            WHERE id = ?
            RETURNING {}
            "#,
            SITE_COLUMNS
        ))
        .bind(update.name)
        .bind(update.timezone)
        .bind(update.units)
        .bind(update.theme)
        .bind(update.language)
        .bind(update.ha_url)
        .bind(update.ha_token)
        .bind(update.ha_connected)
        .bind(now)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::NotFound(format!("Site {} not found", id)))
    }

    /// Delete a site. Memberships, page permissions and invitations go with it
    /// through `ON DELETE CASCADE`.
    pub async fn delete(pool: &SqlitePool, id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM sites WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete `id` only if it still has no active membership. A membership
    /// activated after the site was listed as orphaned keeps it alive.
    pub async fn delete_if_orphaned(pool: &SqlitePool, id: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM sites
            WHERE id = ?
              AND NOT EXISTS (
                SELECT 1 FROM memberships
                WHERE site_id = ? AND status = 'active'
              )
            "#,
        )
        .bind(id)
        .bind(id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Sites that no longer have a single active membership.
    pub async fn list_orphaned(pool: &SqlitePool) -> AppResult<Vec<Site>> {
        sqlx::query_as::<_, Site>(&format!(
            r#"
            SELECT {} FROM sites s
            WHERE NOT EXISTS (
                SELECT 1 FROM memberships m
                WHERE m.site_id = s.id AND m.status = 'active'
            )
            ORDER BY created_at ASC
            "#,
            SITE_COLUMNS
        ))
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{MembershipStatus, Theme};
    use crate::db::test_support::{test_pool, user};
    use crate::db::MembershipRepository;

    #[tokio::test]
    async fn create_enforces_owned_site_cap() {
        let pool = test_pool().await;
        user(&pool, "alice").await;

        SiteRepository::create_with_owner(&pool, "alice", "Home", 2).await.unwrap();
        SiteRepository::create_with_owner(&pool, "alice", "Cabin", 2).await.unwrap();

        let err = SiteRepository::create_with_owner(&pool, "alice", "Third", 2)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SiteLimitReached(2)));

        let sites = MembershipRepository::list_active_for_user(&pool, "alice").await.unwrap();
        assert_eq!(sites.len(), 2);
        assert!(sites.iter().all(|s| s.role == Role::Owner));
    }

    #[tokio::test]
    async fn concurrent_creates_never_exceed_cap() {
        use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
        use std::time::Duration;

        let path = std::env::temp_dir().join(format!("household-sites-cap-{}.db", Uuid::new_v4()));
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(30));
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        user(&pool, "alice").await;

        let attempts: Vec<_> = (0..16)
            .map(|i| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    SiteRepository::create_with_owner(&pool, "alice", &format!("Site {}", i), 2).await
                })
            })
            .collect();

        let mut created = 0;
        let mut limited = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => created += 1,
                Err(AppError::SiteLimitReached(2)) => limited += 1,
                Err(e) => panic!("unexpected error: {:?}", e),
            }
        }
        assert_eq!(created, 2);
        assert_eq!(limited, 14);

        let owned = MembershipRepository::list_active_for_user(&pool, "alice").await.unwrap();
        assert_eq!(owned.len(), 2);

        pool.close().await;
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn orphan_delete_skips_sites_that_gained_a_member() {
        let pool = test_pool().await;
        user(&pool, "alice").await;
        user(&pool, "bob").await;
        let site = SiteRepository::create_with_owner(&pool, "alice", "Home", 2).await.unwrap();
        MembershipRepository::delete(&pool, &site.membership_id).await.unwrap();
        assert_eq!(SiteRepository::list_orphaned(&pool).await.unwrap().len(), 1);

        // Someone joins between the listing and the delete.
        MembershipRepository::create(&pool, "bob", site.id(), Role::Member, MembershipStatus::Active)
            .await
            .unwrap();
        assert!(!SiteRepository::delete_if_orphaned(&pool, site.id()).await.unwrap());
        assert!(SiteRepository::find_by_id(&pool, site.id()).await.unwrap().is_some());

        MembershipRepository::delete(
            &pool,
            &MembershipRepository::find_active(&pool, "bob", site.id()).await.unwrap().unwrap().id,
        )
        .await
        .unwrap();
        assert!(SiteRepository::delete_if_orphaned(&pool, site.id()).await.unwrap());
    }

    #[tokio::test]
    async fn admin_memberships_do_not_count_towards_cap() {
        let pool = test_pool().await;
        user(&pool, "alice").await;
        user(&pool, "bob").await;

        let bobs = SiteRepository::create_with_owner(&pool, "bob", "Bob's", 2).await.unwrap();
        MembershipRepository::create(&pool, "alice", bobs.id(), Role::Admin, MembershipStatus::Active)
            .await
            .unwrap();

        SiteRepository::create_with_owner(&pool, "alice", "One", 1).await.unwrap();
        assert!(SiteRepository::create_with_owner(&pool, "alice", "Two", 1).await.is_err());
    }

    #[tokio::test]
    async fn update_keeps_untouched_fields() {
        let pool = test_pool().await;
        user(&pool, "alice").await;
        let created = SiteRepository::create_with_owner(&pool, "alice", "Home", 2).await.unwrap();

        let updated = SiteRepository::update(
            &pool,
            created.id(),
            UpdateSite {
                theme: Some(Theme::Dark),
                ha_token: Some("secret".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.name, "Home");
        assert_eq!(updated.theme, Theme::Dark);
        assert_eq!(updated.timezone, "UTC");
        assert_eq!(updated.ha_token.as_deref(), Some("secret"));

        // The token never leaves the server in API payloads.
        let json = serde_json::to_value(&updated).unwrap();
        assert!(json.get("ha_token").is_none());
    }

    #[tokio::test]
    async fn delete_cascades_to_memberships() {
        let pool = test_pool().await;
        user(&pool, "alice").await;
        user(&pool, "bob").await;
        let site = SiteRepository::create_with_owner(&pool, "alice", "Home", 2).await.unwrap();
        MembershipRepository::create(&pool, "bob", site.id(), Role::Member, MembershipStatus::Active)
            .await
            .unwrap();

        assert!(SiteRepository::delete(&pool, site.id()).await.unwrap());
        assert!(MembershipRepository::list_active_for_user(&pool, "bob").await.unwrap().is_empty());
        assert!(MembershipRepository::list_for_site(&pool, site.id()).await.unwrap().is_empty());
        assert!(!SiteRepository::delete(&pool, site.id()).await.unwrap());
    }

    #[tokio::test]
    async fn orphaned_sites_have_no_active_members() {
        let pool = test_pool().await;
        user(&pool, "alice").await;
        let kept = SiteRepository::create_with_owner(&pool, "alice", "Kept", 2).await.unwrap();
        let orphan = SiteRepository::create_with_owner(&pool, "alice", "Orphan", 2).await.unwrap();
        MembershipRepository::delete(&pool, &orphan.membership_id).await.unwrap();

        let orphans = SiteRepository::list_orphaned(&pool).await.unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].id, orphan.site.id);
        assert_ne!(orphans[0].id, kept.site.id);
    }
}
