use sqlx::SqlitePool;

use crate::db::models::PageName;
use crate::db::{MembershipRepository, PagePermissionRepository};
use crate::permissions::{effective_level, Permission};

pub struct PermissionResolver;

impl PermissionResolver {
    /// Effective permission of `user_id` on `page` of `site_id`.
    ///
    /// Never fails: a missing site, a missing membership or any storage error
    /// yields `close`.
    pub async fn resolve(
        pool: &SqlitePool,
        user_id: &str,
        site_id: Option<&str>,
        page: PageName,
    ) -> Permission {
        let Some(site_id) = site_id else {
            return Permission::closed();
        };

        let membership = match MembershipRepository::find_active(pool, user_id, site_id).await {
            Ok(Some(membership)) => membership,
            Ok(None) => return Permission::closed(),
            Err(e) => {
                tracing::warn!(user_id, site_id, "Membership lookup failed, denying access: {:?}", e);
                return Permission::closed();
            }
        };

        if membership.role.is_privileged() {
            return Permission::from_level(effective_level(Some(membership.role), None));
        }

        let stored = match PagePermissionRepository::find_level(pool, &membership.id, page).await {
            Ok(level) => level,
            Err(e) => {
                tracing::warn!(
                    membership_id = %membership.id,
                    page = page.as_str(),
                    "Permission lookup failed, denying access: {:?}",
                    e
                );
                return Permission::closed();
            }
        };

        Permission::from_level(effective_level(Some(membership.role), stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{AccessLevel, MembershipStatus, Role};
    use crate::db::test_support::{test_pool, user};
    use crate::db::SiteRepository;

    #[tokio::test]
    async fn non_members_get_close_on_every_page() {
        let pool = test_pool().await;
        user(&pool, "alice").await;
        user(&pool, "eve").await;
        let home = SiteRepository::create_with_owner(&pool, "alice", "Home", 2).await.unwrap();

        for page in PageName::ALL {
            let perm = PermissionResolver::resolve(&pool, "eve", Some(home.id()), page).await;
            assert_eq!(perm, Permission::closed());
        }
        let unbound = PermissionResolver::resolve(&pool, "alice", None, PageName::Home).await;
        assert_eq!(unbound.level, AccessLevel::Close);
    }

    #[tokio::test]
    async fn admins_override_explicit_close_rows() {
        let pool = test_pool().await;
        user(&pool, "alice").await;
        user(&pool, "bob").await;
        let home = SiteRepository::create_with_owner(&pool, "alice", "Home", 2).await.unwrap();
        let bob = MembershipRepository::create(&pool, "bob", home.id(), Role::Admin, MembershipStatus::Active)
            .await
            .unwrap();
        PagePermissionRepository::upsert(&pool, &bob.id, PageName::Finance, AccessLevel::Close)
            .await
            .unwrap();
        PagePermissionRepository::upsert(&pool, &home.membership_id, PageName::Finance, AccessLevel::Close)
            .await
            .unwrap();

        for who in ["alice", "bob"] {
            let perm = PermissionResolver::resolve(&pool, who, Some(home.id()), PageName::Finance).await;
            assert_eq!(perm.level, AccessLevel::Full);
            assert!(perm.can_manage);
        }
    }

    #[tokio::test]
    async fn members_read_their_rows() {
        let pool = test_pool().await;
        user(&pool, "alice").await;
        user(&pool, "carol").await;
        let home = SiteRepository::create_with_owner(&pool, "alice", "Home", 2).await.unwrap();
        let carol = MembershipRepository::create(&pool, "carol", home.id(), Role::Member, MembershipStatus::Active)
            .await
            .unwrap();
        PagePermissionRepository::upsert(&pool, &carol.id, PageName::Finance, AccessLevel::View)
            .await
            .unwrap();

        let finance = PermissionResolver::resolve(&pool, "carol", Some(home.id()), PageName::Finance).await;
        assert!(finance.can_view && !finance.can_edit && !finance.can_delete);

        let devices = PermissionResolver::resolve(&pool, "carol", Some(home.id()), PageName::Devices).await;
        assert_eq!(devices, Permission::closed());
    }

    #[tokio::test]
    async fn storage_failure_fails_closed() {
        let pool = test_pool().await;
        user(&pool, "alice").await;
        let home = SiteRepository::create_with_owner(&pool, "alice", "Home", 2).await.unwrap();
        pool.close().await;

        let perm = PermissionResolver::resolve(&pool, "alice", Some(home.id()), PageName::Home).await;
        assert_eq!(perm, Permission::closed());
    }
}
