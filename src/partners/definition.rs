//! Partner definition — one branded tenant's static configuration.

use serde_json::{Map, Value};

use crate::text::titleize_key;

/// Metadata keys that apply to the user record rather than the metadata
/// bundle (UI layout, AI flag). These are stripped from `default_metadata`
/// and surfaced through `user_defaults` instead.
pub const USER_DEFAULT_KEYS: &[&str] = &["ai_enabled", "ui_layout"];

/// A single partner's configuration, normalized from arbitrary JSON.
///
/// Construction never fails: non-mapping sections are treated as empty,
/// unknown keys are carried but ignored.
#[derive(Debug, Clone)]
pub struct PartnerDefinition {
    key: String,
    config: Map<String, Value>,
}

impl PartnerDefinition {
    pub fn new(key: &str, config: &Value) -> Self {
        let config = match config {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        Self {
            key: key.to_string(),
            config,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Display name, falling back to a titleized key.
    pub fn name(&self) -> String {
        match self.config.get("name").and_then(Value::as_str) {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => titleize_key(&self.key),
        }
    }

    /// Partner type label ("fintech", "education", ...), if configured.
    pub fn partner_type(&self) -> Option<&str> {
        self.config.get("type").and_then(Value::as_str)
    }

    /// Keys that must be present in any user's partner metadata bundle.
    pub fn required_metadata_keys(&self) -> Vec<String> {
        match self.dig(&["metadata", "required"]) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Deep copy of the configured default metadata, with user-level keys
    /// stripped (those travel through `user_defaults`).
    pub fn default_metadata(&self) -> Map<String, Value> {
        let mut defaults = match self.dig(&["metadata", "defaults"]) {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        for key in USER_DEFAULT_KEYS {
            defaults.remove(*key);
        }
        defaults
    }

    /// User-level defaults (`ai_enabled`, `ui_layout`), in key order.
    pub fn user_defaults(&self) -> Vec<(String, Value)> {
        let source = match self.dig(&["metadata", "defaults"]) {
            Some(Value::Object(map)) => map,
            _ => return Vec::new(),
        };
        USER_DEFAULT_KEYS
            .iter()
            .filter_map(|key| source.get(*key).map(|value| (key.to_string(), value.clone())))
            .collect()
    }

    /// Convenience accessor for a single string-valued default metadata key.
    pub fn default_metadata_str(&self, key: &str) -> Option<String> {
        match self.dig(&["metadata", "defaults"]) {
            Some(Value::Object(map)) => map
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string),
            _ => None,
        }
    }

    /// The partner's declared onboarding step keys, in declared order.
    ///
    /// Entries may be plain strings or `{ "key": "..." }` mappings. An empty
    /// list means "use the global default order".
    pub fn onboarding_steps(&self) -> Vec<String> {
        match self.dig(&["onboarding", "steps"]) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(map) => {
                        map.get("key").and_then(Value::as_str).map(str::to_string)
                    }
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Partner-specific nav label for a step key, if configured under
    /// `onboarding.nav.<step>`.
    pub fn nav_label(&self, step: &str) -> Option<String> {
        match self.dig(&["onboarding", "nav"]) {
            Some(Value::Object(map)) => map
                .get(step)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string),
            _ => None,
        }
    }

    fn dig(&self, path: &[&str]) -> Option<&Value> {
        let mut current = self.config.get(path[0])?;
        for segment in &path[1..] {
            current = current.as_object()?.get(*segment)?;
        }
        Some(current)
    }
}
