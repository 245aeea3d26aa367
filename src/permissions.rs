//! Access rules shared by the server resolver and the client registry.
//!
//! Every UI gate and every handler derives its capabilities from
//! [`Permission::from_level`]; the thresholds live nowhere else.

use serde::{Deserialize, Serialize};

use crate::db::models::{AccessLevel, Role};

/// Effective access to one page of one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub level: AccessLevel,
    pub can_view: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    /// Manage categories, accounts and membership settings of the page's module.
    pub can_manage: bool,
}

impl Permission {
    pub fn from_level(level: AccessLevel) -> Self {
        Self {
            level,
            can_view: level != AccessLevel::Close,
            can_edit: matches!(level, AccessLevel::Limited | AccessLevel::Full),
            can_delete: level == AccessLevel::Full,
            can_manage: level == AccessLevel::Full,
        }
    }

    pub fn closed() -> Self {
        Self::from_level(AccessLevel::Close)
    }
}

/// Combine a membership role with the stored page row.
///
/// `role` is `None` when there is no bound site or no active membership.
/// Owners and admins get `full` regardless of rows, even an explicit `close`.
pub fn effective_level(role: Option<Role>, stored: Option<AccessLevel>) -> AccessLevel {
    match role {
        None => AccessLevel::Close,
        Some(role) if role.is_privileged() => AccessLevel::Full,
        Some(_) => stored.unwrap_or(AccessLevel::Close),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_thresholds() {
        let close = Permission::from_level(AccessLevel::Close);
        assert!(!close.can_view && !close.can_edit && !close.can_delete && !close.can_manage);

        let view = Permission::from_level(AccessLevel::View);
        assert!(view.can_view && !view.can_edit && !view.can_delete);

        let limited = Permission::from_level(AccessLevel::Limited);
        assert!(limited.can_view && limited.can_edit && !limited.can_delete && !limited.can_manage);

        let full = Permission::from_level(AccessLevel::Full);
        assert!(full.can_view && full.can_edit && full.can_delete && full.can_manage);
    }

    #[test]
    fn privileged_roles_override_rows() {
        for role in [Role::Owner, Role::Admin] {
            assert_eq!(effective_level(Some(role), Some(AccessLevel::Close)), AccessLevel::Full);
            assert_eq!(effective_level(Some(role), None), AccessLevel::Full);
        }
    }

    #[test]
    fn members_fall_back_to_close() {
        assert_eq!(effective_level(Some(Role::Member), None), AccessLevel::Close);
        assert_eq!(
            effective_level(Some(Role::Member), Some(AccessLevel::View)),
            AccessLevel::View
        );
        assert_eq!(effective_level(None, Some(AccessLevel::Full)), AccessLevel::Close);
    }
}
