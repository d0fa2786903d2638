//! Auto-completion of skipped onboarding steps.
//!
//! When a partner's step list omits `setup` and/or `preferences`, the user
//! never sees those pages, so the fields they would have filled in are
//! populated with derived defaults before the user is routed to whatever
//! step comes first. Planning is pure; applying the plan is a single
//! transaction serialized per user.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::accounts::model::{Family, User};
use crate::error::DatabaseError;
use crate::partners::PartnerDefinition;
use crate::store::Database;
use crate::text::{is_blank, name_from_email};

use super::steps::{StepKey, step_enabled};

/// Fallback values for family fields when neither the partner defaults nor
/// the user's partner metadata provide one.
pub const FALLBACK_LOCALE: &str = "en";
pub const FALLBACK_CURRENCY: &str = "USD";
pub const FALLBACK_DATE_FORMAT: &str = "%Y-%m-%d";
pub const FALLBACK_COUNTRY: &str = "US";

/// Staged updates to a user record. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub theme: Option<String>,
    pub ui_layout: Option<String>,
    pub ai_enabled: Option<bool>,
    pub set_onboarding_preferences_at: Option<DateTime<Utc>>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.theme.is_none()
            && self.ui_layout.is_none()
            && self.ai_enabled.is_none()
            && self.set_onboarding_preferences_at.is_none()
    }
}

/// Staged updates to a family record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FamilyChanges {
    pub locale: Option<String>,
    pub currency: Option<String>,
    pub date_format: Option<String>,
    pub country: Option<String>,
}

impl FamilyChanges {
    pub fn is_empty(&self) -> bool {
        self.locale.is_none()
            && self.currency.is_none()
            && self.date_format.is_none()
            && self.country.is_none()
    }
}

/// The full staged update for one auto-completion pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutoCompletePlan {
    pub user: UserChanges,
    pub family: FamilyChanges,
}

impl AutoCompletePlan {
    pub fn is_empty(&self) -> bool {
        self.user.is_empty() && self.family.is_empty()
    }
}

/// Compute the staged changes for a user/family under a partner.
///
/// Every assignment is conditioned on the target field being currently
/// blank (except the user-defaults pass, which stages only actual
/// differences), so re-planning an already-completed user yields an empty
/// plan.
pub fn plan(
    partner: &PartnerDefinition,
    user: &User,
    family: &Family,
    now: DateTime<Utc>,
) -> AutoCompletePlan {
    let mut changes = AutoCompletePlan::default();

    apply_user_defaults(partner, user, &mut changes.user);

    if !step_enabled(partner, StepKey::Setup) && user.first_name_blank() {
        changes.user.first_name = name_from_email(&user.email);
    }

    if !step_enabled(partner, StepKey::Preferences) {
        if user.set_onboarding_preferences_at.is_none() {
            changes.user.set_onboarding_preferences_at = Some(now);
        }
        if user.theme_blank() {
            changes.user.theme = Some("system".to_string());
        }
        plan_family_defaults(partner, user, family, &mut changes.family);
    }

    changes
}

/// Stage partner user-level defaults that differ from the user's current
/// values. Only the known attributes are mapped; unknown keys are ignored.
fn apply_user_defaults(partner: &PartnerDefinition, user: &User, changes: &mut UserChanges) {
    for (key, value) in partner.user_defaults() {
        match key.as_str() {
            "ui_layout" => {
                if let Some(layout) = value.as_str().filter(|s| !s.trim().is_empty())
                    && user.ui_layout.as_deref() != Some(layout)
                {
                    changes.ui_layout = Some(layout.to_string());
                }
            }
            "ai_enabled" => {
                if let Some(enabled) = value.as_bool()
                    && user.ai_enabled != Some(enabled)
                {
                    changes.ai_enabled = Some(enabled);
                }
            }
            _ => {}
        }
    }
}

fn plan_family_defaults(
    partner: &PartnerDefinition,
    user: &User,
    family: &Family,
    changes: &mut FamilyChanges,
) {
    if is_blank(family.locale.as_deref()) {
        changes.locale = Some(
            partner
                .default_metadata_str("locale")
                .unwrap_or_else(|| FALLBACK_LOCALE.to_string()),
        );
    }
    if is_blank(family.currency.as_deref()) {
        changes.currency = Some(
            partner
                .default_metadata_str("currency")
                .unwrap_or_else(|| FALLBACK_CURRENCY.to_string()),
        );
    }
    if is_blank(family.date_format.as_deref()) {
        changes.date_format = Some(
            partner
                .default_metadata_str("date_format")
                .unwrap_or_else(|| FALLBACK_DATE_FORMAT.to_string()),
        );
    }
    if is_blank(family.country.as_deref()) {
        // Country alone also falls back to the user's own partner metadata.
        changes.country = Some(
            partner
                .default_metadata_str("country")
                .or_else(|| user.partner_country().map(str::to_string))
                .unwrap_or_else(|| FALLBACK_COUNTRY.to_string()),
        );
    }
}

/// Per-user exclusive locks serializing concurrent auto-completion requests
/// (e.g. double-submitted navigation) for the same user.
#[derive(Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, user_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("user locks poisoned");
        Arc::clone(locks.entry(user_id).or_default())
    }

    /// Drop the map entry once no other task holds or awaits the lock, so
    /// the map does not grow with every user ever seen. The count check runs
    /// under the map mutex, which also guards every `lock_for` clone.
    fn release(&self, user_id: Uuid, lock: &Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().expect("user locks poisoned");
        // Two handles remain: the map's and the caller's.
        if Arc::strong_count(lock) == 2 {
            locks.remove(&user_id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().expect("user locks poisoned").len()
    }
}

/// Plan and persist auto-completion for a user, holding the user's lock for
/// the duration of the read-plan-write cycle. All staged assignments are
/// written as one transaction; any persistence failure propagates with no
/// partial completion.
pub async fn auto_complete_missing_steps(
    db: &dyn Database,
    locks: &UserLocks,
    partner: &PartnerDefinition,
    user_id: Uuid,
) -> Result<AutoCompletePlan, DatabaseError> {
    let lock = locks.lock_for(user_id);
    let result = {
        let _guard = lock.lock().await;
        locked_auto_complete(db, partner, user_id).await
    };
    locks.release(user_id, &lock);
    result
}

async fn locked_auto_complete(
    db: &dyn Database,
    partner: &PartnerDefinition,
    user_id: Uuid,
) -> Result<AutoCompletePlan, DatabaseError> {
    let user = db.get_user(user_id).await?.ok_or(DatabaseError::NotFound {
        entity: "user".to_string(),
        id: user_id.to_string(),
    })?;
    let family = db
        .get_family(user.family_id)
        .await?
        .ok_or(DatabaseError::NotFound {
            entity: "family".to_string(),
            id: user.family_id.to_string(),
        })?;

    let changes = plan(partner, &user, &family, Utc::now());
    if changes.is_empty() {
        return Ok(changes);
    }

    db.apply_onboarding_updates(user.id, family.id, &changes)
        .await?;
    debug!(
        user_id = %user.id,
        partner = partner.key(),
        "Auto-completed skipped onboarding steps"
    );
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::model::Role;
    use serde_json::json;

    fn partner(config: serde_json::Value) -> PartnerDefinition {
        PartnerDefinition::new("streamlined", &config)
    }

    fn blank_user() -> User {
        User::new(Uuid::new_v4(), "jamie.lee@example.com", Role::Admin)
    }

    fn blank_family() -> Family {
        Family::new("Lee Household")
    }

    #[test]
    fn skipped_setup_and_preferences_stage_all_defaults() {
        // Concrete scenario: steps [goals, trial], partner supplies family
        // defaults; everything blank on the user/family side.
        let partner = partner(json!({
            "metadata": {"defaults": {
                "currency": "CAD", "locale": "fr",
                "country": "ca", "date_format": "%d/%m/%Y"
            }},
            "onboarding": {"steps": ["goals", "trial"]}
        }));
        let user = blank_user();
        let family = blank_family();
        let now = Utc::now();

        let changes = plan(&partner, &user, &family, now);

        assert_eq!(changes.user.first_name.as_deref(), Some("Jamie Lee"));
        assert_eq!(changes.user.theme.as_deref(), Some("system"));
        assert_eq!(changes.user.set_onboarding_preferences_at, Some(now));
        assert_eq!(changes.family.locale.as_deref(), Some("fr"));
        assert_eq!(changes.family.currency.as_deref(), Some("CAD"));
        assert_eq!(changes.family.country.as_deref(), Some("ca"));
        assert_eq!(changes.family.date_format.as_deref(), Some("%d/%m/%Y"));
    }

    #[test]
    fn family_defaults_fall_back_to_globals() {
        let partner = partner(json!({"onboarding": {"steps": ["goals", "trial"]}}));
        let changes = plan(&partner, &blank_user(), &blank_family(), Utc::now());

        assert_eq!(changes.family.locale.as_deref(), Some(FALLBACK_LOCALE));
        assert_eq!(changes.family.currency.as_deref(), Some(FALLBACK_CURRENCY));
        assert_eq!(changes.family.country.as_deref(), Some(FALLBACK_COUNTRY));
        assert_eq!(
            changes.family.date_format.as_deref(),
            Some(FALLBACK_DATE_FORMAT)
        );
    }

    #[test]
    fn country_falls_back_to_user_partner_metadata() {
        let partner = partner(json!({"onboarding": {"steps": ["goals"]}}));
        let mut user = blank_user();
        user.partner_metadata = Some(json!({"country": "de"}));

        let changes = plan(&partner, &user, &blank_family(), Utc::now());
        assert_eq!(changes.family.country.as_deref(), Some("de"));
    }

    #[test]
    fn enabled_steps_are_never_auto_completed() {
        // Setup and preferences both enabled: nothing derived or defaulted.
        let partner = partner(json!({"onboarding": {"steps": ["setup", "preferences"]}}));
        let changes = plan(&partner, &blank_user(), &blank_family(), Utc::now());
        assert!(changes.is_empty());
    }

    #[test]
    fn setup_enabled_preferences_skipped() {
        let partner = partner(json!({"onboarding": {"steps": ["setup", "goals"]}}));
        let changes = plan(&partner, &blank_user(), &blank_family(), Utc::now());

        assert_eq!(changes.user.first_name, None, "setup owns first_name");
        assert!(changes.user.set_onboarding_preferences_at.is_some());
        assert_eq!(changes.user.theme.as_deref(), Some("system"));
    }

    #[test]
    fn planning_is_idempotent() {
        let partner = partner(json!({
            "metadata": {"defaults": {"currency": "CAD", "ui_layout": "compact"}},
            "onboarding": {"steps": ["goals", "trial"]}
        }));
        let mut user = blank_user();
        let mut family = blank_family();
        let now = Utc::now();

        let first = plan(&partner, &user, &family, now);

        // Apply the staged changes, then re-plan.
        user.first_name = first.user.first_name.clone();
        user.theme = first.user.theme.clone();
        user.ui_layout = first.user.ui_layout.clone();
        user.set_onboarding_preferences_at = first.user.set_onboarding_preferences_at;
        family.locale = first.family.locale.clone();
        family.currency = first.family.currency.clone();
        family.country = first.family.country.clone();
        family.date_format = first.family.date_format.clone();

        let second = plan(&partner, &user, &family, Utc::now());
        assert!(second.is_empty(), "second pass stages nothing: {second:?}");
    }

    #[test]
    fn user_defaults_apply_only_differences() {
        let partner = partner(json!({
            "metadata": {"defaults": {"ui_layout": "compact", "ai_enabled": true}},
            "onboarding": {"steps": ["setup", "preferences", "goals", "trial"]}
        }));

        let mut user = blank_user();
        let changes = plan(&partner, &user, &blank_family(), Utc::now());
        assert_eq!(changes.user.ui_layout.as_deref(), Some("compact"));
        assert_eq!(changes.user.ai_enabled, Some(true));

        user.ui_layout = Some("compact".into());
        user.ai_enabled = Some(true);
        let changes = plan(&partner, &user, &blank_family(), Utc::now());
        assert!(changes.is_empty());
    }

    #[test]
    fn unknown_user_default_keys_are_ignored() {
        let partner = partner(json!({
            "metadata": {"defaults": {"mystery_flag": true}},
            "onboarding": {"steps": ["setup", "preferences"]}
        }));
        let changes = plan(&partner, &blank_user(), &blank_family(), Utc::now());
        assert!(changes.is_empty());
    }

    #[test]
    fn unusable_email_leaves_first_name_unset() {
        let partner = partner(json!({"onboarding": {"steps": ["goals"]}}));
        let mut user = blank_user();
        user.email = "12345@example.com".to_string();

        let changes = plan(&partner, &user, &blank_family(), Utc::now());
        assert_eq!(changes.user.first_name, None);
    }

    #[test]
    fn last_name_is_never_derived() {
        let partner = partner(json!({"onboarding": {"steps": ["goals"]}}));
        let changes = plan(&partner, &blank_user(), &blank_family(), Utc::now());
        // UserChanges has no last_name field at all; assert the derivation
        // only produced a first name.
        assert_eq!(changes.user.first_name.as_deref(), Some("Jamie Lee"));
    }

    #[tokio::test]
    async fn user_lock_is_evicted_after_last_release() {
        let locks = UserLocks::new();
        let user_id = Uuid::new_v4();

        let lock = locks.lock_for(user_id);
        {
            let _guard = lock.lock().await;
        }
        assert_eq!(locks.len(), 1);

        locks.release(user_id, &lock);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn user_lock_survives_while_another_holder_remains() {
        let locks = UserLocks::new();
        let user_id = Uuid::new_v4();

        let first = locks.lock_for(user_id);
        let second = locks.lock_for(user_id);

        locks.release(user_id, &first);
        assert_eq!(locks.len(), 1);
        // The surviving handle still maps to the same lock.
        assert!(Arc::ptr_eq(&second, &locks.lock_for(user_id)));

        drop(first);
        locks.release(user_id, &second);
        assert_eq!(locks.len(), 0);
    }
}
