//! Step catalog and sequencer.
//!
//! The catalog is a fixed set of four wizard steps. A partner may declare a
//! subset (in its own order); an empty declaration means the full default
//! order. Navigation always follows the partner's declared order, never the
//! catalog order.

use serde::{Deserialize, Serialize};

use crate::accounts::model::User;
use crate::partners::PartnerDefinition;

/// One page of the onboarding wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKey {
    Setup,
    Preferences,
    Goals,
    Trial,
}

/// The global catalog order, used when a partner declares no steps.
pub const DEFAULT_ORDER: [StepKey; 4] = [
    StepKey::Setup,
    StepKey::Preferences,
    StepKey::Goals,
    StepKey::Trial,
];

impl StepKey {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "setup" => Some(Self::Setup),
            "preferences" => Some(Self::Preferences),
            "goals" => Some(Self::Goals),
            "trial" => Some(Self::Trial),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Preferences => "preferences",
            Self::Goals => "goals",
            Self::Trial => "trial",
        }
    }

    /// URL of this step's wizard page.
    pub fn path(&self, params: &RouteParams) -> String {
        let base = format!("/partners/{}/onboarding", params.partner_key);
        match self {
            Self::Setup => base,
            Self::Preferences => format!("{base}/preferences"),
            Self::Goals => format!("{base}/goals"),
            Self::Trial => format!("{base}/trial"),
        }
    }

    /// Whether the user has completed this step.
    pub fn is_complete(&self, user: &User) -> bool {
        match self {
            Self::Setup => !user.first_name_blank(),
            Self::Preferences => user.set_onboarding_preferences_at.is_some(),
            Self::Goals => user.set_onboarding_goals_at.is_some(),
            Self::Trial => user.onboarded(),
        }
    }

    /// Global nav label, used when the partner configures no override.
    pub fn default_label(&self) -> &'static str {
        match self {
            Self::Setup => "Account setup",
            Self::Preferences => "Preferences",
            Self::Goals => "Goals",
            Self::Trial => "Free trial",
        }
    }
}

impl std::fmt::Display for StepKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Route parameters threaded into step path builders.
#[derive(Debug, Clone)]
pub struct RouteParams {
    pub partner_key: String,
}

impl RouteParams {
    pub fn new(partner_key: &str) -> Self {
        Self {
            partner_key: partner_key.to_string(),
        }
    }
}

/// One entry of the wizard view model.
#[derive(Debug, Clone, Serialize)]
pub struct StepView {
    pub key: StepKey,
    pub name: String,
    pub path: String,
    pub is_complete: bool,
    pub step_number: usize,
}

/// The partner's effective step list: declared keys intersected with the
/// catalog (unknown keys silently dropped, duplicates collapsed to their
/// first occurrence, declared order preserved), or the full default order
/// when the declaration is empty.
pub fn enabled_keys(partner: &PartnerDefinition) -> Vec<StepKey> {
    let declared = partner.onboarding_steps();
    if declared.is_empty() {
        return DEFAULT_ORDER.to_vec();
    }
    let mut keys = Vec::new();
    for key in declared.iter().filter_map(|key| StepKey::parse(key)) {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

pub fn step_enabled(partner: &PartnerDefinition, key: StepKey) -> bool {
    enabled_keys(partner).contains(&key)
}

/// Nav label for a step: partner override, falling back to the global label.
pub fn step_name(partner: &PartnerDefinition, key: StepKey) -> String {
    partner
        .nav_label(key.as_str())
        .unwrap_or_else(|| key.default_label().to_string())
}

/// Build the 1-indexed wizard view model for the partner's enabled steps.
pub fn build_steps(
    partner: &PartnerDefinition,
    user: &User,
    params: &RouteParams,
) -> Vec<StepView> {
    enabled_keys(partner)
        .into_iter()
        .enumerate()
        .map(|(index, key)| StepView {
            key,
            name: step_name(partner, key),
            path: key.path(params),
            is_complete: key.is_complete(user),
            step_number: index + 1,
        })
        .collect()
}

/// Path of the first enabled step, or `None` when no steps are enabled.
pub fn first_step_path(partner: &PartnerDefinition, params: &RouteParams) -> Option<String> {
    enabled_keys(partner).first().map(|key| key.path(params))
}

/// The step after `current` in the partner's declared order. `None` at the
/// end of the list or when `current` is not enabled.
pub fn next_step_key(partner: &PartnerDefinition, current: StepKey) -> Option<StepKey> {
    let keys = enabled_keys(partner);
    let position = keys.iter().position(|key| *key == current)?;
    keys.get(position + 1).copied()
}

/// The step before `current` in the partner's declared order. `None` at the
/// start of the list or when `current` is not enabled.
pub fn previous_step_key(partner: &PartnerDefinition, current: StepKey) -> Option<StepKey> {
    let keys = enabled_keys(partner);
    let position = keys.iter().position(|key| *key == current)?;
    position.checked_sub(1).map(|prev| keys[prev])
}

pub fn next_step_path(
    partner: &PartnerDefinition,
    current: StepKey,
    params: &RouteParams,
) -> Option<String> {
    next_step_key(partner, current).map(|key| key.path(params))
}

pub fn previous_step_path(
    partner: &PartnerDefinition,
    current: StepKey,
    params: &RouteParams,
) -> Option<String> {
    previous_step_key(partner, current).map(|key| key.path(params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::model::Role;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn partner_with_steps(steps: serde_json::Value) -> PartnerDefinition {
        PartnerDefinition::new(
            "chancen",
            &json!({"name": "Chancen", "onboarding": {"steps": steps}}),
        )
    }

    fn user() -> User {
        User::new(Uuid::new_v4(), "jamie@example.com", Role::Admin)
    }

    #[test]
    fn enabled_keys_falls_back_to_default_order() {
        let partner = partner_with_steps(json!([]));
        assert_eq!(enabled_keys(&partner), DEFAULT_ORDER.to_vec());

        let bare = PartnerDefinition::new("bare", &json!({}));
        assert_eq!(enabled_keys(&bare), DEFAULT_ORDER.to_vec());
    }

    #[test]
    fn enabled_keys_preserves_declared_order_and_drops_unknown() {
        let partner = partner_with_steps(json!(["goals", "bogus", "setup"]));
        assert_eq!(enabled_keys(&partner), vec![StepKey::Goals, StepKey::Setup]);
    }

    #[test]
    fn enabled_keys_collapses_repeated_declarations() {
        let partner = partner_with_steps(json!(["goals", "goals", "trial", "goals"]));
        assert_eq!(enabled_keys(&partner), vec![StepKey::Goals, StepKey::Trial]);
    }

    #[test]
    fn step_enabled_matches_membership() {
        let partner = partner_with_steps(json!(["setup", "goals"]));
        assert!(step_enabled(&partner, StepKey::Setup));
        assert!(step_enabled(&partner, StepKey::Goals));
        assert!(!step_enabled(&partner, StepKey::Preferences));
        assert!(!step_enabled(&partner, StepKey::Trial));
    }

    #[test]
    fn build_steps_numbers_and_completion() {
        let partner = partner_with_steps(json!([]));
        let mut user = user();
        user.first_name = Some("Jamie".into());
        user.set_onboarding_goals_at = Some(Utc::now());

        let params = RouteParams::new("chancen");
        let steps = build_steps(&partner, &user, &params);

        assert_eq!(steps.len(), 4);
        let numbers: Vec<usize> = steps.iter().map(|s| s.step_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);

        assert!(steps[0].is_complete, "setup complete via first_name");
        assert!(!steps[1].is_complete);
        assert!(steps[2].is_complete, "goals complete via timestamp");
        assert!(!steps[3].is_complete);

        assert_eq!(steps[0].path, "/partners/chancen/onboarding");
        assert_eq!(steps[1].path, "/partners/chancen/onboarding/preferences");
        assert!(steps.iter().all(|s| !s.name.is_empty()));
    }

    #[test]
    fn step_name_prefers_partner_override() {
        let partner = PartnerDefinition::new(
            "chancen",
            &json!({"onboarding": {"nav": {"goals": "Your goals"}}}),
        );
        assert_eq!(step_name(&partner, StepKey::Goals), "Your goals");
        assert_eq!(step_name(&partner, StepKey::Trial), "Free trial");
    }

    #[test]
    fn navigation_is_inverse_at_interior_positions() {
        let partner = partner_with_steps(json!([]));
        let keys = enabled_keys(&partner);
        for (i, key) in keys.iter().enumerate() {
            if i + 1 < keys.len() {
                assert_eq!(next_step_key(&partner, *key), Some(keys[i + 1]));
                assert_eq!(previous_step_key(&partner, keys[i + 1]), Some(*key));
            }
        }
        assert_eq!(next_step_key(&partner, *keys.last().unwrap()), None);
        assert_eq!(previous_step_key(&partner, keys[0]), None);
    }

    #[test]
    fn navigation_follows_partner_order_not_catalog_order() {
        // Declared order deliberately reversed from the catalog.
        let partner = partner_with_steps(json!(["goals", "setup"]));
        assert_eq!(next_step_key(&partner, StepKey::Goals), Some(StepKey::Setup));
        assert_eq!(next_step_key(&partner, StepKey::Setup), None);
        assert_eq!(
            previous_step_key(&partner, StepKey::Setup),
            Some(StepKey::Goals)
        );
    }

    #[test]
    fn navigation_treats_disabled_steps_as_absent() {
        let partner = partner_with_steps(json!(["goals", "trial"]));
        assert_eq!(next_step_key(&partner, StepKey::Setup), None);
        assert_eq!(previous_step_key(&partner, StepKey::Preferences), None);
        let params = RouteParams::new("chancen");
        assert_eq!(next_step_path(&partner, StepKey::Setup, &params), None);
    }

    #[test]
    fn next_step_path_from_last_step_is_absent() {
        let partner = partner_with_steps(json!(["goals", "trial"]));
        let params = RouteParams::new("chancen");
        assert_eq!(next_step_path(&partner, StepKey::Trial, &params), None);
        assert_eq!(
            next_step_path(&partner, StepKey::Goals, &params).as_deref(),
            Some("/partners/chancen/onboarding/trial")
        );
    }

    #[test]
    fn first_step_path_uses_declared_order() {
        let partner = partner_with_steps(json!(["goals", "trial"]));
        let params = RouteParams::new("chancen");
        assert_eq!(
            first_step_path(&partner, &params).as_deref(),
            Some("/partners/chancen/onboarding/goals")
        );

        let none_enabled = partner_with_steps(json!(["bogus"]));
        assert_eq!(first_step_path(&none_enabled, &params), None);
    }
}
