use crate::db::models::{Membership, Role, Site, SiteWithRole, UpdateSite};
use crate::db::{MembershipRepository, SiteRepository};
use crate::error::{AppError, AppResult};
use crate::AppState;

const MAX_SITE_NAME_LEN: usize = 100;

pub struct SiteService;

impl SiteService {
    pub async fn list(state: &AppState, user_id: &str) -> AppResult<Vec<SiteWithRole>> {
        MembershipRepository::list_active_for_user(&state.db, user_id).await
    }

    /// Create a site owned by `user_id`, enforcing the owned-site cap.
    pub async fn create(state: &AppState, user_id: &str, name: &str) -> AppResult<SiteWithRole> {
        let name = validate_name(name)?;
        let max_owned = state.config.sites.max_owned;

        let created = SiteRepository::create_with_owner(&state.db, user_id, name, max_owned).await;
        match &created {
            Ok(site) => tracing::info!(user_id, site_id = site.id(), "Site created"),
            Err(AppError::SiteLimitReached(max)) => {
                tracing::info!(user_id, max, "Site creation rejected: owned-site limit reached")
            }
            Err(_) => {}
        }
        created
    }

    /// Update site-level settings. Owners and admins only.
    pub async fn update(
        state: &AppState,
        user_id: &str,
        site_id: &str,
        mut update: UpdateSite,
    ) -> AppResult<Site> {
        let membership = require_membership(state, user_id, site_id).await?;
        if !membership.role.is_privileged() {
            return Err(AppError::Forbidden);
        }

        if let Some(name) = update.name.take() {
            update.name = Some(validate_name(&name)?.to_string());
        }
        if let Some(tz) = &update.timezone {
            if tz.trim().is_empty() {
                return Err(AppError::Validation("Timezone must not be empty".to_string()));
            }
        }
        if update.is_empty() {
            return Err(AppError::BadRequest("Nothing to update".to_string()));
        }

        SiteRepository::update(&state.db, site_id, update).await
    }

    /// Delete a site and everything hanging off it. Owner only.
    pub async fn delete(state: &AppState, user_id: &str, site_id: &str) -> AppResult<()> {
        let membership = MembershipRepository::find_active(&state.db, user_id, site_id).await?;
        match membership {
            Some(m) if m.role == Role::Owner => {}
            _ => return Err(AppError::NotOwner),
        }

        if !SiteRepository::delete(&state.db, site_id).await? {
            return Err(AppError::NotFound(format!("Site {} not found", site_id)));
        }
        tracing::info!(user_id, site_id, "Site deleted");
        Ok(())
    }

    /// Leave a site. Owners must delete the site instead.
    pub async fn leave(state: &AppState, user_id: &str, site_id: &str) -> AppResult<()> {
        let membership = require_membership(state, user_id, site_id).await?;
        if membership.role == Role::Owner {
            return Err(AppError::NotOwner);
        }

        MembershipRepository::delete(&state.db, &membership.id).await?;
        tracing::info!(user_id, site_id, "Member left site");
        Ok(())
    }
}

pub(crate) async fn require_membership(
    state: &AppState,
    user_id: &str,
    site_id: &str,
) -> AppResult<Membership> {
    MembershipRepository::find_active(&state.db, user_id, site_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Site {} not found", site_id)))
}

fn validate_name(name: &str) -> AppResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Site name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_SITE_NAME_LEN {
        return Err(AppError::Validation(format!(
            "Site name must be at most {} characters",
            MAX_SITE_NAME_LEN
        )));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{MembershipStatus, Theme};
    use crate::db::test_support::user;
    use crate::services::test_support::test_state;

    #[tokio::test]
    async fn create_trims_and_counts_towards_cap() {
        let state = test_state().await;
        user(&state.db, "alice").await;

        let site = SiteService::create(&state, "alice", "  Home  ").await.unwrap();
        assert_eq!(site.site.name, "Home");
        SiteService::create(&state, "alice", "Cabin").await.unwrap();

        let err = SiteService::create(&state, "alice", "C").await.unwrap_err();
        assert!(matches!(err, AppError::SiteLimitReached(2)));
        assert_eq!(SiteService::list(&state, "alice").await.unwrap().len(), 2);

        assert!(matches!(
            SiteService::create(&state, "alice", "   ").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn owner_cannot_leave_and_member_cannot_delete() {
        let state = test_state().await;
        user(&state.db, "alice").await;
        user(&state.db, "bob").await;
        let home = SiteService::create(&state, "alice", "Home").await.unwrap();
        MembershipRepository::create(&state.db, "bob", home.id(), Role::Member, MembershipStatus::Active)
            .await
            .unwrap();

        assert!(matches!(
            SiteService::leave(&state, "alice", home.id()).await,
            Err(AppError::NotOwner)
        ));
        assert!(matches!(
            SiteService::delete(&state, "bob", home.id()).await,
            Err(AppError::NotOwner)
        ));
        assert_eq!(MembershipRepository::list_for_site(&state.db, home.id()).await.unwrap().len(), 2);

        SiteService::leave(&state, "bob", home.id()).await.unwrap();
        assert!(SiteService::list(&state, "bob").await.unwrap().is_empty());

        SiteService::delete(&state, "alice", home.id()).await.unwrap();
        assert!(SiteService::list(&state, "alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn settings_require_privileged_role() {
        let state = test_state().await;
        user(&state.db, "alice").await;
        user(&state.db, "bob").await;
        let home = SiteService::create(&state, "alice", "Home").await.unwrap();
        MembershipRepository::create(&state.db, "bob", home.id(), Role::Member, MembershipStatus::Active)
            .await
            .unwrap();

        let change = UpdateSite {
            theme: Some(Theme::Dark),
            ..Default::default()
        };
        assert!(matches!(
            SiteService::update(&state, "bob", home.id(), change.clone()).await,
            Err(AppError::Forbidden)
        ));

        let site = SiteService::update(&state, "alice", home.id(), change).await.unwrap();
        assert_eq!(site.theme, Theme::Dark);

        assert!(matches!(
            SiteService::update(&state, "alice", home.id(), UpdateSite::default()).await,
            Err(AppError::BadRequest(_))
        ));
    }
}
