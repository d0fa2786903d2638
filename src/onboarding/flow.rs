//! OnboardingFlow — resolves a request to either a step view model or a
//! redirect target.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::accounts::model::User;
use crate::error::DatabaseError;
use crate::partners::{PartnerDefinition, Partners};
use crate::store::Database;

use super::autocomplete::{UserLocks, auto_complete_missing_steps};
use super::steps::{
    self, RouteParams, StepKey, StepView, build_steps, first_step_path, step_enabled,
};

/// Where users land once no onboarding steps remain.
pub const COMPLETION_PATH: &str = "/dashboard";

/// Wizard entry for users without any partner association.
pub const GENERIC_ONBOARDING_PATH: &str = "/onboarding";

/// View model for one rendered wizard page.
#[derive(Debug, Clone, Serialize)]
pub struct StepPage {
    pub partner_key: String,
    pub partner_name: String,
    pub steps: Vec<StepView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<StepKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_step_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step_path: Option<String>,
}

/// Outcome of resolving a step request.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// Render this page.
    View(Box<StepPage>),
    /// The requested step is not enabled (or unknown) — send the user here.
    Redirect(String),
}

/// Coordinates partner resolution, auto-completion, and step navigation for
/// inbound requests.
pub struct OnboardingFlow {
    db: Arc<dyn Database>,
    partners: Arc<Partners>,
    locks: UserLocks,
}

impl OnboardingFlow {
    pub fn new(db: Arc<dyn Database>, partners: Arc<Partners>) -> Self {
        Self {
            db,
            partners,
            locks: UserLocks::new(),
        }
    }

    pub fn partners(&self) -> &Partners {
        &self.partners
    }

    /// Resolve the partner for a request: explicit key, then the user's
    /// stored key, then the registry default.
    pub fn resolve_partner(
        &self,
        explicit_key: Option<&str>,
        user: &User,
    ) -> Option<PartnerDefinition> {
        explicit_key
            .and_then(|key| self.partners.find(key))
            .or_else(|| user.partner_key().and_then(|key| self.partners.find(key)))
            .or_else(|| self.partners.default_partner())
    }

    /// Entry point for a user who still needs onboarding: auto-complete the
    /// skippable steps, then redirect to the first enabled step — or the
    /// completion path when nothing remains.
    pub async fn entry_redirect(&self, user_id: Uuid) -> Result<String, DatabaseError> {
        let user = self.load_user(user_id).await?;
        let Some(partner) = self.resolve_partner(None, &user) else {
            return Ok(GENERIC_ONBOARDING_PATH.to_string());
        };

        auto_complete_missing_steps(self.db.as_ref(), &self.locks, &partner, user.id).await?;

        let params = RouteParams::new(partner.key());
        let target =
            first_step_path(&partner, &params).unwrap_or_else(|| COMPLETION_PATH.to_string());
        debug!(user_id = %user.id, partner = partner.key(), redirect = %target, "Onboarding entry resolved");
        Ok(target)
    }

    /// Resolve a step request to a view model, or to a redirect when the
    /// requested step is not enabled for the resolved partner.
    pub async fn step_view(
        &self,
        user_id: Uuid,
        partner_key: Option<&str>,
        current_step: Option<StepKey>,
    ) -> Result<StepOutcome, DatabaseError> {
        let user = self.load_user(user_id).await?;
        let Some(partner) = self.resolve_partner(partner_key, &user) else {
            return Ok(StepOutcome::Redirect(GENERIC_ONBOARDING_PATH.to_string()));
        };

        let params = RouteParams::new(partner.key());

        if let Some(step) = current_step
            && !step_enabled(&partner, step)
        {
            let target =
                first_step_path(&partner, &params).unwrap_or_else(|| COMPLETION_PATH.to_string());
            return Ok(StepOutcome::Redirect(target));
        }

        let page = StepPage {
            partner_key: partner.key().to_string(),
            partner_name: partner.name(),
            steps: build_steps(&partner, &user, &params),
            current_step,
            previous_step_path: current_step
                .and_then(|step| steps::previous_step_path(&partner, step, &params)),
            next_step_path: current_step
                .and_then(|step| steps::next_step_path(&partner, step, &params)),
        };
        Ok(StepOutcome::View(Box::new(page)))
    }

    /// Redirect target for a request naming a step that does not exist in
    /// the catalog: the partner's first enabled step, or the completion path.
    pub async fn fallback_redirect(
        &self,
        user_id: Uuid,
        partner_key: Option<&str>,
    ) -> Result<String, DatabaseError> {
        let user = self.load_user(user_id).await?;
        let Some(partner) = self.resolve_partner(partner_key, &user) else {
            return Ok(GENERIC_ONBOARDING_PATH.to_string());
        };
        let params = RouteParams::new(partner.key());
        Ok(first_step_path(&partner, &params).unwrap_or_else(|| COMPLETION_PATH.to_string()))
    }

    async fn load_user(&self, user_id: Uuid) -> Result<User, DatabaseError> {
        self.db
            .get_user(user_id)
            .await?
            .ok_or(DatabaseError::NotFound {
                entity: "user".to_string(),
                id: user_id.to_string(),
            })
    }
}
