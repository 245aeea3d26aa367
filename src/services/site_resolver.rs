use sqlx::SqlitePool;

use crate::db::{MembershipRepository, SiteWithRole};
use crate::error::AppResult;

/// Outcome of binding a request to a site.
#[derive(Debug, Clone, PartialEq)]
pub enum SiteResolution {
    Resolved(SiteWithRole),
    /// Authenticated, but not a member of any site yet (onboarding).
    NoSites,
    NotAuthenticated,
}

/// Pick the membership the pointer names, or the first one.
///
/// Shared by the request path and the client registry so both contexts fall
/// back to the same site.
pub fn select_site<'a>(sites: &'a [SiteWithRole], pointer: Option<&str>) -> Option<&'a SiteWithRole> {
    pointer
        .and_then(|id| sites.iter().find(|s| s.id() == id))
        .or_else(|| sites.first())
}

pub struct SiteResolver;

impl SiteResolver {
    /// Resolve the current site for one request.
    ///
    /// Read-only: a stale or missing pointer falls back to the first site
    /// without rewriting the cookie. Storage errors propagate as errors and
    /// never turn into `NoSites`.
    pub async fn resolve_current_site(
        pool: &SqlitePool,
        user_id: Option<&str>,
        pointer: Option<&str>,
    ) -> AppResult<SiteResolution> {
        let Some(user_id) = user_id else {
            return Ok(SiteResolution::NotAuthenticated);
        };

        let sites = MembershipRepository::list_active_for_user(pool, user_id).await?;
        match select_site(&sites, pointer) {
            Some(site) => {
                if pointer.is_some_and(|p| p != site.id()) {
                    tracing::debug!(
                        user_id,
                        site_id = site.id(),
                        "Session pointer is stale, falling back to first site"
                    );
                }
                Ok(SiteResolution::Resolved(site.clone()))
            }
            None => Ok(SiteResolution::NoSites),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{MembershipStatus, Role};
    use crate::db::test_support::{test_pool, user};
    use crate::db::SiteRepository;

    #[tokio::test]
    async fn anonymous_requests_are_not_authenticated() {
        let pool = test_pool().await;
        let res = SiteResolver::resolve_current_site(&pool, None, Some("whatever")).await.unwrap();
        assert_eq!(res, SiteResolution::NotAuthenticated);
    }

    #[tokio::test]
    async fn users_without_memberships_go_to_onboarding() {
        let pool = test_pool().await;
        user(&pool, "alice").await;
        let res = SiteResolver::resolve_current_site(&pool, Some("alice"), None).await.unwrap();
        assert_eq!(res, SiteResolution::NoSites);
    }

    #[tokio::test]
    async fn pointer_selects_matching_membership() {
        let pool = test_pool().await;
        user(&pool, "alice").await;
        SiteRepository::create_with_owner(&pool, "alice", "Home", 2).await.unwrap();
        let cabin = SiteRepository::create_with_owner(&pool, "alice", "Cabin", 2).await.unwrap();

        let res = SiteResolver::resolve_current_site(&pool, Some("alice"), Some(cabin.id()))
            .await
            .unwrap();
        assert_eq!(res, SiteResolution::Resolved(cabin));
    }

    #[tokio::test]
    async fn foreign_or_stale_pointer_falls_back_to_first_site() {
        let pool = test_pool().await;
        user(&pool, "alice").await;
        user(&pool, "mallory").await;
        let home = SiteRepository::create_with_owner(&pool, "alice", "Home", 2).await.unwrap();
        let foreign = SiteRepository::create_with_owner(&pool, "mallory", "Elsewhere", 2).await.unwrap();

        for pointer in [Some(foreign.id()), Some("deleted-site"), None] {
            let res = SiteResolver::resolve_current_site(&pool, Some("alice"), pointer)
                .await
                .unwrap();
            assert_eq!(res, SiteResolution::Resolved(home.clone()));
        }
    }

    #[tokio::test]
    async fn pending_memberships_do_not_bind() {
        let pool = test_pool().await;
        user(&pool, "alice").await;
        user(&pool, "bob").await;
        let home = SiteRepository::create_with_owner(&pool, "alice", "Home", 2).await.unwrap();
        MembershipRepository::create(&pool, "bob", home.id(), Role::Member, MembershipStatus::Pending)
            .await
            .unwrap();

        let res = SiteResolver::resolve_current_site(&pool, Some("bob"), Some(home.id()))
            .await
            .unwrap();
        assert_eq!(res, SiteResolution::NoSites);
    }

    #[test]
    fn select_site_on_empty_list() {
        assert!(select_site(&[], Some("x")).is_none());
    }
}
