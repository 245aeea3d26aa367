use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::db::models::{AccessLevel, Membership, MembershipStatus, PageName, PagePermission, Role};
use crate::db::{MembershipRepository, PagePermissionRepository};
use crate::error::{AppError, AppResult};
use crate::permissions::effective_level;
use crate::services::sites::require_membership;
use crate::AppState;

/// A member row with the effective level for every page.
#[derive(Debug, Clone, Serialize)]
pub struct MemberView {
    pub membership_id: String,
    pub user_id: String,
    pub email: String,
    pub role: Role,
    pub status: MembershipStatus,
    pub joined_at: NaiveDateTime,
    pub permissions: BTreeMap<PageName, AccessLevel>,
}

pub struct MemberService;

impl MemberService {
    pub async fn list(state: &AppState, actor_id: &str, site_id: &str) -> AppResult<Vec<MemberView>> {
        require_manager(state, actor_id, site_id).await?;

        let mut members = Vec::new();
        for (membership, email) in MembershipRepository::list_for_site(&state.db, site_id).await? {
            let rows = PagePermissionRepository::list_for_membership(&state.db, &membership.id).await?;
            let permissions = permission_matrix(membership.role, &rows);
            members.push(MemberView {
                membership_id: membership.id,
                user_id: membership.user_id,
                email,
                role: membership.role,
                status: membership.status,
                joined_at: membership.created_at,
                permissions,
            });
        }
        Ok(members)
    }

    /// Set a member's level for one page. Owners and admins always have full
    /// access, so only `member` rows can be changed.
    pub async fn set_permission(
        state: &AppState,
        actor_id: &str,
        site_id: &str,
        membership_id: &str,
        page: PageName,
        level: AccessLevel,
    ) -> AppResult<PagePermission> {
        require_manager(state, actor_id, site_id).await?;
        let target = find_in_site(state, site_id, membership_id).await?;

        if target.role.is_privileged() {
            return Err(AppError::BadRequest(
                "Owners and admins always have full access".to_string(),
            ));
        }

        let row = PagePermissionRepository::upsert(&state.db, &target.id, page, level).await?;
        tracing::info!(
            site_id,
            membership_id,
            page = page.as_str(),
            level = level.as_str(),
            "Page permission updated"
        );
        Ok(row)
    }

    /// Remove someone from a site. The owner cannot be removed, and only the
    /// owner may remove an admin.
    pub async fn remove(
        state: &AppState,
        actor_id: &str,
        site_id: &str,
        membership_id: &str,
    ) -> AppResult<()> {
        let actor = require_manager(state, actor_id, site_id).await?;
        let target = find_in_site(state, site_id, membership_id).await?;

        match target.role {
            Role::Owner => {
                return Err(AppError::BadRequest("The site owner cannot be removed".to_string()))
            }
            Role::Admin if actor.role != Role::Owner => return Err(AppError::NotOwner),
            _ => {}
        }

        MembershipRepository::delete(&state.db, &target.id).await?;
        tracing::info!(site_id, membership_id, "Member removed");
        Ok(())
    }
}

/// Owners and admins manage members, permissions and invitations.
pub(crate) async fn require_manager(
    state: &AppState,
    user_id: &str,
    site_id: &str,
) -> AppResult<Membership> {
    let membership = require_membership(state, user_id, site_id).await?;
    if !membership.role.is_privileged() {
        return Err(AppError::Forbidden);
    }
    Ok(membership)
}

async fn find_in_site(state: &AppState, site_id: &str, membership_id: &str) -> AppResult<Membership> {
    MembershipRepository::find_by_id(&state.db, membership_id)
        .await?
        .filter(|m| m.site_id == site_id)
        .ok_or_else(|| AppError::NotFound(format!("Member {} not found", membership_id)))
}

fn permission_matrix(role: Role, rows: &[PagePermission]) -> BTreeMap<PageName, AccessLevel> {
    PageName::ALL
        .into_iter()
        .map(|page| {
            let stored = rows.iter().find(|r| r.page == page).map(|r| r.access_level);
            (page, effective_level(Some(role), stored))
        })
        .collect()
}
