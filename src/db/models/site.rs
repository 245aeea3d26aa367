use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Site (household) Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Units {
    Metric,
    Imperial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum Language {
    #[serde(rename = "en")]
    #[sqlx(rename = "en")]
    En,
    #[serde(rename = "zh-CN")]
    #[sqlx(rename = "zh-CN")]
    ZhCn,
    #[serde(rename = "zh-TW")]
    #[sqlx(rename = "zh-TW")]
    ZhTw,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Site {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub timezone: String,
    pub units: Units,
    pub theme: Theme,
    pub language: Language,
    // Home Assistant integration
    pub ha_url: Option<String>,
    /// Integration credential; stored but never sent back over the API.
    #[serde(skip_serializing, default)]
    pub ha_token: Option<String>,
    pub ha_connected: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Partial update of site-level settings. Identity fields and timestamps are
/// not editable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSite {
    pub name: Option<String>,
    pub timezone: Option<String>,
    pub units: Option<Units>,
    pub theme: Option<Theme>,
    pub language: Option<Language>,
    pub ha_url: Option<String>,
    pub ha_token: Option<String>,
    pub ha_connected: Option<bool>,
}

impl UpdateSite {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.timezone.is_none()
            && self.units.is_none()
            && self.theme.is_none()
            && self.language.is_none()
            && self.ha_url.is_none()
            && self.ha_token.is_none()
            && self.ha_connected.is_none()
    }
}
