//! Account domain — users, families, and partner provisioning.

pub mod model;
pub mod provision;

pub use model::{Family, Role, User};
pub use provision::{AccountCreator, CreationOutcome};
