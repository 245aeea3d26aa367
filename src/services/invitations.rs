use chrono::{Duration, Utc};
use serde::Serialize;

use crate::db::models::{CreateInvitation, Role, SiteInvitation};
use crate::db::{InvitationRepository, SiteRepository};
use crate::error::{AppError, AppResult};
use crate::services::auth::AuthService;
use crate::services::members::require_manager;
use crate::AppState;

const CODE_LENGTH: usize = 8;
const CODE_ATTEMPTS: usize = 3;
const DEFAULT_MAX_USES: i64 = 1;
const MAX_USES_LIMIT: i64 = 100;
const MAX_EXPIRY_DAYS: i64 = 365;

#[derive(Debug, Clone, Serialize)]
pub struct AcceptedInvitation {
    pub site_id: String,
    pub site_name: String,
    pub role: Role,
}

pub struct InvitationService;

impl InvitationService {
    pub async fn create(
        state: &AppState,
        actor_id: &str,
        site_id: &str,
        request: CreateInvitation,
    ) -> AppResult<SiteInvitation> {
        require_manager(state, actor_id, site_id).await?;

        if request.role == Role::Owner {
            return Err(AppError::Validation(
                "Invitations can grant admin or member only".to_string(),
            ));
        }
        let max_uses = request.max_uses.unwrap_or(DEFAULT_MAX_USES);
        if !(1..=MAX_USES_LIMIT).contains(&max_uses) {
            return Err(AppError::Validation(format!(
                "max_uses must be between 1 and {}",
                MAX_USES_LIMIT
            )));
        }
        let expires_at = match request.expires_in_days {
            None => None,
            Some(days) if (1..=MAX_EXPIRY_DAYS).contains(&days) => {
                Some(Utc::now().naive_utc() + Duration::days(days))
            }
            Some(_) => {
                return Err(AppError::Validation(format!(
                    "expires_in_days must be between 1 and {}",
                    MAX_EXPIRY_DAYS
                )))
            }
        };

        // Codes are random; retry the rare collision with the unique index.
        let mut last_err = None;
        for _ in 0..CODE_ATTEMPTS {
            let code = AuthService::generate_code(CODE_LENGTH);
            match InvitationRepository::create(
                &state.db,
                site_id,
                &code,
                request.role,
                max_uses,
                expires_at,
                actor_id,
            )
            .await
            {
                Ok(invitation) => {
                    tracing::info!(site_id, invitation_id = %invitation.id, "Invitation created");
                    return Ok(invitation);
                }
                Err(AppError::Conflict(msg)) => last_err = Some(AppError::Conflict(msg)),
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            AppError::Internal(anyhow::anyhow!("Could not generate an invite code"))
        }))
    }

    pub async fn list(state: &AppState, actor_id: &str, site_id: &str) -> AppResult<Vec<SiteInvitation>> {
        require_manager(state, actor_id, site_id).await?;
        InvitationRepository::list_active_for_site(&state.db, site_id).await
    }

    pub async fn revoke(
        state: &AppState,
        actor_id: &str,
        site_id: &str,
        invitation_id: &str,
    ) -> AppResult<()> {
        require_manager(state, actor_id, site_id).await?;
        if !InvitationRepository::revoke(&state.db, site_id, invitation_id).await? {
            return Err(AppError::NotFound(format!("Invitation {} not found", invitation_id)));
        }
        Ok(())
    }

    /// Join a site with an invite code.
    pub async fn accept(state: &AppState, user_id: &str, code: &str) -> AppResult<AcceptedInvitation> {
        let code = code.trim().to_uppercase();
        let invitation = InvitationRepository::redeem(&state.db, &code, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Invite code is invalid or expired".to_string()))?;

        let site = SiteRepository::find_by_id(&state.db, &invitation.site_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Site {} not found", invitation.site_id)))?;

        tracing::info!(user_id, site_id = %site.id, role = invitation.role.as_str(), "Invitation accepted");
        Ok(AcceptedInvitation {
            site_id: site.id,
            site_name: site.name,
            role: invitation.role,
        })
    }
}
