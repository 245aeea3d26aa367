use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AccessLevel {
    Close,
    View,
    Limited,
    Full,
}

impl AccessLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessLevel::Close => "close",
            AccessLevel::View => "view",
            AccessLevel::Limited => "limited",
            AccessLevel::Full => "full",
        }
    }
}

impl Default for AccessLevel {
    fn default() -> Self {
        AccessLevel::Close
    }
}

/// Pages that can be gated per member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PageName {
    Home,
    Health,
    Finance,
    Productivity,
    Devices,
    Settings,
}

impl PageName {
    pub const ALL: [PageName; 6] = [
        PageName::Home,
        PageName::Health,
        PageName::Finance,
        PageName::Productivity,
        PageName::Devices,
        PageName::Settings,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "home" => Some(PageName::Home),
            "health" => Some(PageName::Health),
            "finance" => Some(PageName::Finance),
            "productivity" => Some(PageName::Productivity),
            "devices" => Some(PageName::Devices),
            "settings" => Some(PageName::Settings),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PageName::Home => "home",
            PageName::Health => "health",
            PageName::Finance => "finance",
            PageName::Productivity => "productivity",
            PageName::Devices => "devices",
            PageName::Settings => "settings",
        }
    }
}

impl TryFrom<&str> for PageName {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value).ok_or_else(|| format!("Invalid page: {}", value))
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PagePermission {
    pub id: String,
    pub membership_id: String,
    pub page: PageName,
    pub access_level: AccessLevel,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
