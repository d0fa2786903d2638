//! Partner account provisioning — creates a family plus its admin user from
//! an email address, seeded with the partner's default metadata.

use std::sync::Arc;
use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::info;

use crate::accounts::model::{Family, Role, User};
use crate::error::{ConfigError, DatabaseError};
use crate::partners::PartnerDefinition;
use crate::store::Database;
use crate::text::title_case;

/// Metadata keys copied onto the family record when present.
const FAMILY_ATTRIBUTE_KEYS: &[&str] =
    &["currency", "locale", "country", "date_format", "timezone"];

static EMAIL_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"));

/// Outcome of provisioning a single email address.
#[derive(Debug)]
pub enum CreationOutcome {
    Created(Box<User>),
    Skipped { email: String, reason: &'static str },
    Invalid { email: String },
}

/// Creates partner-branded accounts.
///
/// Construction validates that the partner's computed default metadata
/// covers every required metadata key; a missing key is a configuration
/// error and fails fast before any account is touched.
pub struct AccountCreator {
    db: Arc<dyn Database>,
    partner: PartnerDefinition,
}

impl AccountCreator {
    pub fn new(db: Arc<dyn Database>, partner: PartnerDefinition) -> Result<Self, ConfigError> {
        let metadata = metadata_for_user(&partner);
        let missing: Vec<String> = partner
            .required_metadata_keys()
            .into_iter()
            .filter(|key| !metadata.contains_key(key))
            .collect();

        if !missing.is_empty() {
            return Err(ConfigError::MissingMetadataKeys {
                partner: partner.key().to_string(),
                keys: missing.join(", "),
            });
        }

        Ok(Self { db, partner })
    }

    /// Provision an account for one email address.
    ///
    /// Blank emails and existing users are skipped, malformed addresses are
    /// rejected; otherwise the family and admin user are created in one
    /// transaction.
    pub async fn create(&self, email: &str) -> Result<CreationOutcome, DatabaseError> {
        let normalized = email.trim().to_lowercase();

        if normalized.is_empty() {
            return Ok(CreationOutcome::Skipped {
                email: normalized,
                reason: "Email is blank",
            });
        }

        if !EMAIL_FORMAT.is_match(&normalized) {
            return Ok(CreationOutcome::Invalid { email: normalized });
        }

        if self.db.get_user_by_email(&normalized).await?.is_some() {
            return Ok(CreationOutcome::Skipped {
                email: normalized,
                reason: "User already exists",
            });
        }

        let family = self.build_family(&normalized);
        let user = self.build_user(&family, &normalized);
        let password = random_password();

        self.db.create_account(&family, &user, &password).await?;
        info!(
            user_id = %user.id,
            partner = self.partner.key(),
            "Partner account provisioned"
        );
        Ok(CreationOutcome::Created(Box::new(user)))
    }

    fn build_family(&self, email: &str) -> Family {
        let mut family = Family::new(&family_name_for(email));
        let metadata = self.partner.default_metadata();
        for key in FAMILY_ATTRIBUTE_KEYS {
            let value = metadata
                .get(*key)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string);
            if value.is_none() {
                continue;
            }
            match *key {
                "currency" => family.currency = value,
                "locale" => family.locale = value,
                "country" => family.country = value,
                "date_format" => family.date_format = value,
                "timezone" => family.timezone = value,
                _ => {}
            }
        }
        family
    }

    fn build_user(&self, family: &Family, email: &str) -> User {
        let mut user = User::new(family.id, email, Role::Admin);
        user.partner_key = Some(self.partner.key().to_string());

        let mut metadata = metadata_for_user(&self.partner);

        // ui_layout moves from the metadata bundle to the user record.
        if let Some(layout) = metadata
            .remove("ui_layout")
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.trim().is_empty())
        {
            user.ui_layout = Some(layout);
        }

        // Remaining user-level defaults through the explicit attribute map.
        for (key, value) in self.partner.user_defaults() {
            match key.as_str() {
                "ui_layout" => {
                    if let Some(layout) = value.as_str().filter(|s| !s.trim().is_empty()) {
                        user.ui_layout = Some(layout.to_string());
                    }
                }
                "ai_enabled" => {
                    if let Some(enabled) = value.as_bool() {
                        user.ai_enabled = Some(enabled);
                    }
                }
                _ => {}
            }
        }

        user.partner_metadata = Some(Value::Object(metadata));
        user
    }
}

/// The metadata bundle a provisioned user receives: partner defaults with
/// `key`/`name`/`type` filled in when absent.
fn metadata_for_user(partner: &PartnerDefinition) -> Map<String, Value> {
    let mut metadata = partner.default_metadata();
    metadata
        .entry("key".to_string())
        .or_insert_with(|| Value::String(partner.key().to_string()));
    metadata
        .entry("name".to_string())
        .or_insert_with(|| Value::String(partner.name()));
    if let Some(partner_type) = partner.partner_type() {
        metadata
            .entry("type".to_string())
            .or_insert_with(|| Value::String(partner_type.to_string()));
    }
    metadata
}

/// "jamie.lee@x.test" → "Jamie Lee Household"; falls back to the raw email
/// when the local part has nothing usable.
fn family_name_for(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let normalized = local.replace(['.', '_', '-'], " ");
    let name = title_case(normalized.trim());
    if name.is_empty() {
        email.to_string()
    } else {
        format!("{name} Household")
    }
}

fn random_password() -> String {
    let bytes: [u8; 16] = rand::thread_rng().r#gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
