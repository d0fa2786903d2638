//! Partner configuration — branded tenants with their own defaults and
//! onboarding step subsets.
//!
//! Partners are loaded once from a JSON document at startup. The registry is
//! an immutable snapshot; `configure`/`reset` replace it wholesale, so
//! readers never observe a half-built state.

pub mod definition;
pub mod registry;

pub use definition::{PartnerDefinition, USER_DEFAULT_KEYS};
pub use registry::{PartnerRegistry, Partners};
