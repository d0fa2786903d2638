//! Partner registry — immutable snapshot of all configured partners, plus
//! the `Partners` handle that owns the current snapshot.

use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::info;

use super::definition::PartnerDefinition;

/// Immutable mapping of partner key → definition, preserving the order the
/// partners appear in configuration.
#[derive(Debug, Default)]
pub struct PartnerRegistry {
    definitions: Vec<PartnerDefinition>,
}

impl PartnerRegistry {
    /// Build a registry from the `partners` section of the config document.
    /// Non-mapping input yields an empty registry.
    pub fn new(config: &Value) -> Self {
        let definitions = match config {
            Value::Object(map) => map
                .iter()
                .map(|(key, value)| PartnerDefinition::new(key, value))
                .collect(),
            _ => Vec::new(),
        };
        Self { definitions }
    }

    /// Exact-match lookup. Blank or unknown keys yield `None`.
    pub fn find(&self, key: &str) -> Option<&PartnerDefinition> {
        if key.trim().is_empty() {
            return None;
        }
        self.definitions.iter().find(|def| def.key() == key)
    }

    /// The first-registered partner, if any.
    pub fn default_partner(&self) -> Option<&PartnerDefinition> {
        self.definitions.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PartnerDefinition> {
        self.definitions.iter()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.definitions.iter().map(|def| def.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Handle owning the partner configuration and the lazily built registry
/// snapshot. Constructed once in `main` and injected into request state —
/// there is no ambient global registry.
///
/// The registry is rebuilt wholesale on `configure`/`reset`; readers clone
/// an `Arc` and always observe a fully-formed snapshot.
pub struct Partners {
    raw: RwLock<Value>,
    cache: RwLock<Option<Arc<PartnerRegistry>>>,
}

impl Partners {
    /// Create a handle from a full config document (`{ "partners": {...} }`).
    pub fn from_config(config: Value) -> Self {
        Self {
            raw: RwLock::new(config),
            cache: RwLock::new(None),
        }
    }

    /// Replace the configuration and rebuild the registry snapshot.
    pub fn configure(&self, config: Value) {
        let registry = Arc::new(PartnerRegistry::new(partners_section(&config)));
        info!(partners = registry.len(), "Partner registry configured");
        *self.raw.write().expect("partners raw lock poisoned") = config;
        *self.cache.write().expect("partners cache lock poisoned") = Some(registry);
    }

    /// Current registry snapshot, built from the stored config on first use.
    pub fn all(&self) -> Arc<PartnerRegistry> {
        if let Some(registry) = self
            .cache
            .read()
            .expect("partners cache lock poisoned")
            .as_ref()
        {
            return Arc::clone(registry);
        }

        let mut cache = self.cache.write().expect("partners cache lock poisoned");
        // Another caller may have built it while we waited for the lock.
        if let Some(registry) = cache.as_ref() {
            return Arc::clone(registry);
        }
        let raw = self.raw.read().expect("partners raw lock poisoned");
        let registry = Arc::new(PartnerRegistry::new(partners_section(&raw)));
        *cache = Some(Arc::clone(&registry));
        registry
    }

    pub fn find(&self, key: &str) -> Option<PartnerDefinition> {
        self.all().find(key).cloned()
    }

    pub fn default_partner(&self) -> Option<PartnerDefinition> {
        self.all().default_partner().cloned()
    }

    /// Drop the cached snapshot, forcing a rebuild from the stored config on
    /// next access. Intended for test isolation.
    pub fn reset(&self) {
        *self.cache.write().expect("partners cache lock poisoned") = None;
    }
}

fn partners_section(config: &Value) -> &Value {
    config.get("partners").unwrap_or(&Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_config() -> Value {
        json!({
            "partners": {
                "chancen": {
                    "name": "Chancen",
                    "onboarding": {"steps": ["goals", "trial"]}
                },
                "acme_bank": {
                    "name": "Acme Bank"
                }
            }
        })
    }

    #[test]
    fn registry_preserves_config_order() {
        let partners = Partners::from_config(sample_config());
        let registry = partners.all();
        assert_eq!(registry.keys(), vec!["chancen", "acme_bank"]);
        assert_eq!(
            registry.default_partner().map(|def| def.key()),
            Some("chancen")
        );
    }

    #[test]
    fn find_requires_exact_match() {
        let partners = Partners::from_config(sample_config());
        assert!(partners.find("chancen").is_some());
        assert!(partners.find("Chancen").is_none());
        assert!(partners.find("").is_none());
        assert!(partners.find("  ").is_none());
        assert!(partners.find("unknown").is_none());
    }

    #[test]
    fn configure_replaces_snapshot() {
        let partners = Partners::from_config(sample_config());
        assert_eq!(partners.all().len(), 2);

        partners.configure(json!({"partners": {"solo": {"name": "Solo"}}}));
        let registry = partners.all();
        assert_eq!(registry.keys(), vec!["solo"]);
    }

    #[test]
    fn reset_forces_rebuild_from_stored_config() {
        let partners = Partners::from_config(sample_config());
        let before = partners.all();
        partners.reset();
        let after = partners.all();
        assert_eq!(before.keys(), after.keys());
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn malformed_config_yields_empty_registry() {
        let partners = Partners::from_config(json!({"partners": ["not", "a", "map"]}));
        assert!(partners.all().is_empty());
        assert!(partners.default_partner().is_none());

        let missing = Partners::from_config(json!({}));
        assert!(missing.all().is_empty());
    }
}
