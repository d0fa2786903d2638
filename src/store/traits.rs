//! `Database` trait — async interface for user/family persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::accounts::model::{Family, User};
use crate::error::DatabaseError;
use crate::onboarding::autocomplete::AutoCompletePlan;

/// Backend-agnostic database trait covering accounts and onboarding state.
#[async_trait]
pub trait Database: Send + Sync {
    /// Load a user by id.
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;

    /// Load a user by (normalized) email.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;

    /// Load a family by id.
    async fn get_family(&self, id: Uuid) -> Result<Option<Family>, DatabaseError>;

    /// Insert a family and its first user in one transaction.
    async fn create_account(
        &self,
        family: &Family,
        user: &User,
        password: &str,
    ) -> Result<(), DatabaseError>;

    /// Persist the staged auto-completion changes for a user and their
    /// family as one transaction. Skips fields the plan leaves unset.
    async fn apply_onboarding_updates(
        &self,
        user_id: Uuid,
        family_id: Uuid,
        plan: &AutoCompletePlan,
    ) -> Result<(), DatabaseError>;
}
