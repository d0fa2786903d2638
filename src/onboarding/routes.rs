//! REST endpoints for the onboarding wizard.
//!
//! The resolver either returns a step view model or a redirect to wherever
//! the user should be — a disabled or unknown step is a redirect, never an
//! error.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::DatabaseError;

use super::flow::{OnboardingFlow, StepOutcome};
use super::steps::StepKey;

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub flow: Arc<OnboardingFlow>,
}

#[derive(Debug, Deserialize)]
struct EntryParams {
    user_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct StepParams {
    user_id: Uuid,
    partner_key: Option<String>,
    step: Option<String>,
}

/// GET /api/onboarding/entry?user_id=
///
/// Auto-completes skipped steps, then redirects to the first enabled step
/// (or the completion path when no steps remain).
async fn get_entry(
    State(state): State<OnboardingRouteState>,
    Query(params): Query<EntryParams>,
) -> Response {
    match state.flow.entry_redirect(params.user_id).await {
        Ok(target) => Redirect::to(&target).into_response(),
        Err(e) => db_error_response(e),
    }
}

/// GET /api/onboarding/steps?user_id=&partner_key=&step=
///
/// Returns the wizard view model for the resolved partner. When `step`
/// names a step that is unknown or not enabled, responds with a redirect to
/// the first enabled step instead.
async fn get_steps(
    State(state): State<OnboardingRouteState>,
    Query(params): Query<StepParams>,
) -> Response {
    let requested = match params.step.as_deref() {
        Some(raw) => match StepKey::parse(raw) {
            Some(key) => Some(key),
            None => {
                // Unknown step keys redirect the same way disabled ones do.
                return match state
                    .flow
                    .fallback_redirect(params.user_id, params.partner_key.as_deref())
                    .await
                {
                    Ok(target) => Redirect::to(&target).into_response(),
                    Err(e) => db_error_response(e),
                };
            }
        },
        None => None,
    };

    let outcome = state
        .flow
        .step_view(params.user_id, params.partner_key.as_deref(), requested)
        .await;

    match outcome {
        Ok(StepOutcome::View(page)) => Json(*page).into_response(),
        Ok(StepOutcome::Redirect(target)) => Redirect::to(&target).into_response(),
        Err(e) => db_error_response(e),
    }
}

/// GET /api/partners
///
/// Lists registered partners (key, name, type, enabled steps).
async fn get_partners(State(state): State<OnboardingRouteState>) -> Response {
    let registry = state.flow.partners().all();
    let partners: Vec<serde_json::Value> = registry
        .iter()
        .map(|partner| {
            serde_json::json!({
                "key": partner.key(),
                "name": partner.name(),
                "type": partner.partner_type(),
                "onboarding_steps": super::steps::enabled_keys(partner),
            })
        })
        .collect();
    Json(serde_json::json!({ "partners": partners })).into_response()
}

fn db_error_response(error: DatabaseError) -> Response {
    let status = match &error {
        DatabaseError::NotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::warn!(%error, "Onboarding request failed");
    (
        status,
        Json(serde_json::json!({"error": error.to_string()})),
    )
        .into_response()
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/api/onboarding/entry", get(get_entry))
        .route("/api/onboarding/steps", get(get_steps))
        .route("/api/partners", get(get_partners))
        .with_state(state)
}
