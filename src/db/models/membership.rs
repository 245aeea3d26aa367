use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::site::Site;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Member,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }

    /// Owners and admins see every page and may manage members.
    pub fn is_privileged(self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MembershipStatus {
    Active,
    Pending,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Membership {
    pub id: String,
    pub user_id: String,
    pub site_id: String,
    pub role: Role,
    pub status: MembershipStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A site as seen by one of its members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteWithRole {
    #[serde(flatten)]
    pub site: Site,
    pub role: Role,
    pub membership_id: String,
}

impl SiteWithRole {
    pub fn id(&self) -> &str {
        &self.site.id
    }

    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }
}
