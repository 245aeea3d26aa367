use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::membership::Role;

// ============================================================================
// Invite Code Models
// ============================================================================

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SiteInvitation {
    pub id: String,
    pub site_id: String,
    pub invite_code: String,
    pub role: Role,
    pub max_uses: i64,
    pub uses_count: i64,
    pub expires_at: Option<NaiveDateTime>,
    pub is_active: bool,
    pub created_by: String,
    pub created_at: NaiveDateTime,
}

impl SiteInvitation {
    /// Whether the code can still be redeemed at `now`.
    pub fn is_redeemable(&self, now: NaiveDateTime) -> bool {
        self.is_active
            && self.uses_count < self.max_uses
            && self.expires_at.map_or(true, |exp| exp > now)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateInvitation {
    pub role: Role,
    pub max_uses: Option<i64>,
    pub expires_in_days: Option<i64>,
}
