//! Sure onboarding — partner onboarding step resolver for the Sure
//! personal-finance app.

pub mod accounts;
pub mod config;
pub mod error;
pub mod onboarding;
pub mod partners;
pub mod store;
pub mod text;
