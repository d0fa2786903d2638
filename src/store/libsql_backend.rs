//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. Timestamps are stored as
//! RFC 3339 text, JSON columns as serialized text.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::accounts::model::{Family, Role, User};
use crate::error::DatabaseError;
use crate::onboarding::autocomplete::AutoCompletePlan;
use crate::store::migrations;
use crate::store::traits::Database;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::init_schema(backend.conn()).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        migrations::init_schema(backend.conn()).await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<String>` to libsql Value.
fn opt_text_owned(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

/// Convert an optional timestamp to libsql Value (RFC 3339 text).
fn opt_datetime(dt: Option<DateTime<Utc>>) -> libsql::Value {
    match dt {
        Some(dt) => libsql::Value::Text(dt.to_rfc3339()),
        None => libsql::Value::Null,
    }
}

/// Convert an optional bool to libsql Value (0/1 integer).
fn opt_bool(b: Option<bool>) -> libsql::Value {
    match b {
        Some(b) => libsql::Value::Integer(b as i64),
        None => libsql::Value::Null,
    }
}

const USER_COLUMNS: &str = "id, family_id, email, role, first_name, last_name, theme, ui_layout, ai_enabled, partner_key, partner_metadata, set_onboarding_preferences_at, set_onboarding_goals_at, onboarded_at, created_at, updated_at";

const FAMILY_COLUMNS: &str =
    "id, name, locale, currency, country, date_format, timezone, created_at, updated_at";

/// Map a libsql Row to a User. Column order matches USER_COLUMNS.
fn row_to_user(row: &libsql::Row) -> Result<User, libsql::Error> {
    let id_str: String = row.get(0)?;
    let family_id_str: String = row.get(1)?;
    let role_str: String = row.get(3)?;
    let metadata_str: Option<String> = row.get::<String>(10).ok();
    let prefs_at: Option<String> = row.get::<String>(11).ok();
    let goals_at: Option<String> = row.get::<String>(12).ok();
    let onboarded_at: Option<String> = row.get::<String>(13).ok();
    let created_str: String = row.get(14)?;
    let updated_str: String = row.get(15)?;

    Ok(User {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        family_id: Uuid::parse_str(&family_id_str).unwrap_or_else(|_| Uuid::nil()),
        email: row.get(2)?,
        role: Role::parse(&role_str),
        first_name: row.get::<String>(4).ok(),
        last_name: row.get::<String>(5).ok(),
        theme: row.get::<String>(6).ok(),
        ui_layout: row.get::<String>(7).ok(),
        ai_enabled: row.get::<i64>(8).ok().map(|v| v != 0),
        partner_key: row.get::<String>(9).ok(),
        partner_metadata: metadata_str.and_then(|s| serde_json::from_str(&s).ok()),
        set_onboarding_preferences_at: prefs_at.map(|s| parse_datetime(&s)),
        set_onboarding_goals_at: goals_at.map(|s| parse_datetime(&s)),
        onboarded_at: onboarded_at.map(|s| parse_datetime(&s)),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

/// Map a libsql Row to a Family. Column order matches FAMILY_COLUMNS.
fn row_to_family(row: &libsql::Row) -> Result<Family, libsql::Error> {
    let id_str: String = row.get(0)?;
    let created_str: String = row.get(7)?;
    let updated_str: String = row.get(8)?;

    Ok(Family {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        name: row.get(1)?,
        locale: row.get::<String>(2).ok(),
        currency: row.get::<String>(3).ok(),
        country: row.get::<String>(4).ok(),
        date_format: row.get::<String>(5).ok(),
        timezone: row.get::<String>(6).ok(),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_user: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let user = row_to_user(&row)
                    .map_err(|e| DatabaseError::Query(format!("get_user row parse: {e}")))?;
                Ok(Some(user))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_user: {e}"))),
        }
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_user_by_email: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let user = row_to_user(&row).map_err(|e| {
                    DatabaseError::Query(format!("get_user_by_email row parse: {e}"))
                })?;
                Ok(Some(user))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_user_by_email: {e}"))),
        }
    }

    async fn get_family(&self, id: Uuid) -> Result<Option<Family>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {FAMILY_COLUMNS} FROM families WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_family: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let family = row_to_family(&row)
                    .map_err(|e| DatabaseError::Query(format!("get_family row parse: {e}")))?;
                Ok(Some(family))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_family: {e}"))),
        }
    }

    async fn create_account(
        &self,
        family: &Family,
        user: &User,
        password: &str,
    ) -> Result<(), DatabaseError> {
        let metadata_str = match &user.partner_metadata {
            Some(value) => Some(
                serde_json::to_string(value)
                    .map_err(|e| DatabaseError::Serialization(e.to_string()))?,
            ),
            None => None,
        };

        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("create_account begin: {e}")))?;

        tx.execute(
            "INSERT INTO families (id, name, locale, currency, country, date_format, timezone, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                family.id.to_string(),
                family.name.clone(),
                opt_text_owned(family.locale.clone()),
                opt_text_owned(family.currency.clone()),
                opt_text_owned(family.country.clone()),
                opt_text_owned(family.date_format.clone()),
                opt_text_owned(family.timezone.clone()),
                family.created_at.to_rfc3339(),
                family.updated_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("create_account family: {e}")))?;

        tx.execute(
            &format!(
                "INSERT INTO users ({USER_COLUMNS}, password)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
            ),
            params![
                user.id.to_string(),
                user.family_id.to_string(),
                user.email.clone(),
                user.role.as_str(),
                opt_text_owned(user.first_name.clone()),
                opt_text_owned(user.last_name.clone()),
                opt_text_owned(user.theme.clone()),
                opt_text_owned(user.ui_layout.clone()),
                opt_bool(user.ai_enabled),
                opt_text_owned(user.partner_key.clone()),
                opt_text_owned(metadata_str),
                opt_datetime(user.set_onboarding_preferences_at),
                opt_datetime(user.set_onboarding_goals_at),
                opt_datetime(user.onboarded_at),
                user.created_at.to_rfc3339(),
                user.updated_at.to_rfc3339(),
                password,
            ],
        )
        .await
        .map_err(|e| match e {
            libsql::Error::SqliteFailure(code, _) if code == 2067 || code == 1555 => {
                DatabaseError::Constraint(format!("user {} already exists", user.email))
            }
            e => DatabaseError::Query(format!("create_account user: {e}")),
        })?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("create_account commit: {e}")))?;

        debug!(user_id = %user.id, family_id = %family.id, "Account created");
        Ok(())
    }

    async fn apply_onboarding_updates(
        &self,
        user_id: Uuid,
        family_id: Uuid,
        plan: &AutoCompletePlan,
    ) -> Result<(), DatabaseError> {
        if plan.is_empty() {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("apply_onboarding_updates begin: {e}")))?;

        let user_id_str = user_id.to_string();
        let mut user_updates: Vec<(&str, libsql::Value)> = Vec::new();
        if let Some(ref name) = plan.user.first_name {
            user_updates.push(("first_name", libsql::Value::Text(name.clone())));
        }
        if let Some(ref theme) = plan.user.theme {
            user_updates.push(("theme", libsql::Value::Text(theme.clone())));
        }
        if let Some(ref layout) = plan.user.ui_layout {
            user_updates.push(("ui_layout", libsql::Value::Text(layout.clone())));
        }
        if let Some(enabled) = plan.user.ai_enabled {
            user_updates.push(("ai_enabled", libsql::Value::Integer(enabled as i64)));
        }
        if let Some(at) = plan.user.set_onboarding_preferences_at {
            user_updates.push((
                "set_onboarding_preferences_at",
                libsql::Value::Text(at.to_rfc3339()),
            ));
        }
        for (column, value) in user_updates {
            tx.execute(
                &format!("UPDATE users SET {column} = ?1, updated_at = ?2 WHERE id = ?3"),
                params![value, now.clone(), user_id_str.clone()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update users.{column}: {e}")))?;
        }

        let family_id_str = family_id.to_string();
        let mut family_updates: Vec<(&str, libsql::Value)> = Vec::new();
        if let Some(ref locale) = plan.family.locale {
            family_updates.push(("locale", libsql::Value::Text(locale.clone())));
        }
        if let Some(ref currency) = plan.family.currency {
            family_updates.push(("currency", libsql::Value::Text(currency.clone())));
        }
        if let Some(ref format) = plan.family.date_format {
            family_updates.push(("date_format", libsql::Value::Text(format.clone())));
        }
        if let Some(ref country) = plan.family.country {
            family_updates.push(("country", libsql::Value::Text(country.clone())));
        }
        for (column, value) in family_updates {
            tx.execute(
                &format!("UPDATE families SET {column} = ?1, updated_at = ?2 WHERE id = ?3"),
                params![value, now.clone(), family_id_str.clone()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update families.{column}: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("apply_onboarding_updates commit: {e}")))?;

        debug!(user_id = %user_id, "Onboarding updates applied");
        Ok(())
    }
}
