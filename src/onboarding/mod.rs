//! Partner onboarding — step catalog, sequencing, auto-completion, and the
//! request-facing flow resolver.
//!
//! A partner declares which wizard steps its users see and in what order.
//! The resolver computes the effective step list, navigates through it, and
//! silently completes the steps a partner chose to skip so downstream logic
//! always sees consistent user/family data.

pub mod autocomplete;
pub mod flow;
pub mod routes;
pub mod steps;

pub use autocomplete::{AutoCompletePlan, UserLocks, auto_complete_missing_steps};
pub use flow::{COMPLETION_PATH, OnboardingFlow, StepOutcome, StepPage};
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use steps::{DEFAULT_ORDER, RouteParams, StepKey, StepView};
