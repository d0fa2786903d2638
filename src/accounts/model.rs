//! User and family records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::text::is_blank;

/// Role of a user within their family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "admin" => Self::Admin,
            _ => Self::Member,
        }
    }
}

/// A household — the billing/settings unit users belong to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Family {
    pub id: Uuid,
    pub name: String,
    pub locale: Option<String>,
    pub currency: Option<String>,
    pub country: Option<String>,
    pub date_format: Option<String>,
    pub timezone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Family {
    pub fn new(name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            locale: None,
            currency: None,
            country: None,
            date_format: None,
            timezone: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An end user. Onboarding progress is tracked through the three timestamp
/// fields; a step counts as complete once its field is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub family_id: Uuid,
    pub email: String,
    pub role: Role,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub theme: Option<String>,
    pub ui_layout: Option<String>,
    pub ai_enabled: Option<bool>,
    pub partner_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_metadata: Option<Value>,
    pub set_onboarding_preferences_at: Option<DateTime<Utc>>,
    pub set_onboarding_goals_at: Option<DateTime<Utc>>,
    pub onboarded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(family_id: Uuid, email: &str, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            family_id,
            email: email.to_string(),
            role,
            first_name: None,
            last_name: None,
            theme: None,
            ui_layout: None,
            ai_enabled: None,
            partner_key: None,
            partner_metadata: None,
            set_onboarding_preferences_at: None,
            set_onboarding_goals_at: None,
            onboarded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn first_name_blank(&self) -> bool {
        is_blank(self.first_name.as_deref())
    }

    pub fn theme_blank(&self) -> bool {
        is_blank(self.theme.as_deref())
    }

    pub fn onboarded(&self) -> bool {
        self.onboarded_at.is_some()
    }

    /// The user's stored partner key, if non-blank.
    pub fn partner_key(&self) -> Option<&str> {
        self.partner_key.as_deref().filter(|key| !key.trim().is_empty())
    }

    /// The `country` attribute from the user's partner metadata, if present
    /// and non-blank.
    pub fn partner_country(&self) -> Option<&str> {
        self.partner_metadata
            .as_ref()?
            .get("country")?
            .as_str()
            .filter(|s| !s.trim().is_empty())
    }
}
