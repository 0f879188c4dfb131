use crate::core::cache::{CacheKey, LookupMode, RecordCache};
use crate::domain::model::{IntegrationRecord, Provider, Rule};
use crate::domain::ports::{IntegrationSource, ProviderLookup};
use crate::utils::error::{IntegrationError, Result};
use async_trait::async_trait;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupTier {
    Override,
    Reserve,
    Classifier,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupPlan {
    pub tier: LookupTier,
    pub key: String,
}

impl LookupPlan {
    pub fn mode(&self) -> LookupMode {
        match self.tier {
            LookupTier::Override | LookupTier::Reserve => LookupMode::ExactKey,
            LookupTier::Classifier => LookupMode::Classifier,
        }
    }
}

/// 規則名稱到平台查詢鍵的靜態對照表。Override 優先於 Reserve。
#[derive(Debug, Clone, Default)]
pub struct MappingTables {
    overrides: HashMap<String, String>,
    reserves: HashMap<String, String>,
}

impl MappingTables {
    pub fn from_static(overrides: &[(&str, &str)], reserves: &[(&str, &str)]) -> Self {
        let to_map = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(rule, key)| (rule.to_string(), key.to_string()))
                .collect::<HashMap<_, _>>()
        };
        Self {
            overrides: to_map(overrides),
            reserves: to_map(reserves),
        }
    }

    pub fn with_override(mut self, rule_name: &str, key: &str) -> Self {
        self.overrides.insert(rule_name.to_string(), key.to_string());
        self
    }

    pub fn with_reserve(mut self, rule_name: &str, key: &str) -> Self {
        self.reserves.insert(rule_name.to_string(), key.to_string());
        self
    }

    pub fn plan(&self, rule: &Rule) -> LookupPlan {
        if let Some(key) = self.overrides.get(&rule.name) {
            return LookupPlan {
                tier: LookupTier::Override,
                key: key.clone(),
            };
        }
        if let Some(key) = self.reserves.get(&rule.name) {
            return LookupPlan {
                tier: LookupTier::Reserve,
                key: key.clone(),
            };
        }
        LookupPlan {
            tier: LookupTier::Classifier,
            key: rule.classifier(),
        }
    }
}

/// 依對照表決定查詢方式，再向平台查詢
pub struct MappedResolver<L: ProviderLookup> {
    lookup: L,
    tables: MappingTables,
}

impl<L: ProviderLookup> MappedResolver<L> {
    pub fn new(lookup: L, tables: MappingTables) -> Self {
        Self { lookup, tables }
    }

    async fn fetch(&self, plan: &LookupPlan) -> Result<Option<IntegrationRecord>> {
        match plan.mode() {
            LookupMode::ExactKey => self.lookup.by_key(&plan.key).await,
            LookupMode::Classifier if plan.key.is_empty() => Ok(None),
            LookupMode::Classifier => self.lookup.by_classifier(&plan.key).await,
        }
    }
}

#[async_trait]
impl<L: ProviderLookup> IntegrationSource for MappedResolver<L> {
    fn provider(&self) -> Provider {
        self.lookup.provider()
    }

    async fn resolve(&self, rule: &Rule, cache: &mut RecordCache) -> Result<IntegrationRecord> {
        let provider = self.provider();
        let plan = self.tables.plan(rule);
        match plan.tier {
            LookupTier::Override => tracing::info!(
                "🔀 Using {} override '{}' for rule '{}'",
                provider,
                plan.key,
                rule.name
            ),
            LookupTier::Reserve => tracing::debug!(
                "Using {} reserve mapping '{}' for rule '{}'",
                provider,
                plan.key,
                rule.name
            ),
            LookupTier::Classifier => tracing::debug!(
                "Looking up {} data for rule '{}' by CWE '{}'",
                provider,
                rule.name,
                plan.key
            ),
        }

        let cache_key = CacheKey {
            provider,
            mode: plan.mode(),
            key: plan.key.clone(),
        };
        let found = match cache.get(&cache_key) {
            Some(cached) => cached,
            None => {
                let fetched = self.fetch(&plan).await?;
                cache.insert(cache_key, fetched.clone());
                fetched
            }
        };

        found.ok_or_else(|| IntegrationError::NoIntegrationData {
            provider: provider.to_string(),
            rule: rule.name.clone(),
            classifier: rule.classifier(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct MockLookup {
        calls: Arc<Mutex<Vec<(LookupMode, String)>>>,
        known: Vec<String>,
        fail: bool,
    }

    impl MockLookup {
        fn knowing(keys: &[&str]) -> Self {
            Self {
                known: keys.iter().map(|k| k.to_string()).collect(),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<(LookupMode, String)> {
            self.calls.lock().unwrap().clone()
        }

        fn answer(&self, mode: LookupMode, key: &str) -> Result<Option<IntegrationRecord>> {
            self.calls.lock().unwrap().push((mode, key.to_string()));
            if self.fail {
                return Err(IntegrationError::UnexpectedStatus {
                    url: "http://provider".to_string(),
                    status: 502,
                });
            }
            Ok(self.known.iter().any(|k| k == key).then(|| IntegrationRecord {
                provider: Provider::SecureCodeWarrior,
                name: key.to_string(),
                description: String::new(),
                url: None,
                references: vec![],
                media: vec![],
                other_languages: vec![],
            }))
        }
    }

    #[async_trait]
    impl ProviderLookup for MockLookup {
        fn provider(&self) -> Provider {
            Provider::SecureCodeWarrior
        }

        async fn by_key(&self, key: &str) -> Result<Option<IntegrationRecord>> {
            self.answer(LookupMode::ExactKey, key)
        }

        async fn by_classifier(&self, classifier: &str) -> Result<Option<IntegrationRecord>> {
            self.answer(LookupMode::Classifier, classifier)
        }
    }

    fn rule(name: &str, cwe: &str) -> Rule {
        serde_json::from_value(serde_json::json!({
            "name": name,
            "title": name,
            "cwe": format!("https://cwe.mitre.org/data/definitions/{}.html", cwe),
        }))
        .unwrap()
    }

    #[test]
    fn test_override_wins_over_reserve() {
        let tables = MappingTables::default()
            .with_reserve("redos", "Reserve:Key")
            .with_override("redos", "Override:Key");
        let plan = tables.plan(&rule("redos", "1333"));
        assert_eq!(plan.tier, LookupTier::Override);
        assert_eq!(plan.key, "Override:Key");
        assert_eq!(plan.mode(), LookupMode::ExactKey);
    }

    #[test]
    fn test_falls_back_to_classifier() {
        let tables = MappingTables::from_static(&[], &[("redos", "DenialofService:RegularExpressionDoS")]);
        let plan = tables.plan(&rule("sql-injection", "89"));
        assert_eq!(plan.tier, LookupTier::Classifier);
        assert_eq!(plan.key, "89");
    }

    #[tokio::test]
    async fn test_resolve_uses_only_the_override_key() {
        let lookup = MockLookup::knowing(&["Override:Key", "Reserve:Key", "1333"]);
        let tables = MappingTables::default()
            .with_reserve("redos", "Reserve:Key")
            .with_override("redos", "Override:Key");
        let resolver = MappedResolver::new(lookup.clone(), tables);

        let record = resolver
            .resolve(&rule("redos", "1333"), &mut RecordCache::new())
            .await
            .unwrap();

        assert_eq!(record.name, "Override:Key");
        assert_eq!(lookup.calls(), vec![(LookupMode::ExactKey, "Override:Key".to_string())]);
    }

    #[tokio::test]
    async fn test_not_found_is_no_integration_data() {
        let lookup = MockLookup::knowing(&[]);
        let resolver = MappedResolver::new(lookup, MappingTables::default());

        let err = resolver
            .resolve(&rule("sql-injection", "89"), &mut RecordCache::new())
            .await
            .unwrap_err();

        assert!(err.is_no_data());
    }

    #[tokio::test]
    async fn test_transport_failure_propagates_and_is_not_cached() {
        let lookup = MockLookup {
            fail: true,
            ..MockLookup::default()
        };
        let resolver = MappedResolver::new(lookup.clone(), MappingTables::default());
        let mut cache = RecordCache::new();

        let err = resolver.resolve(&rule("sql-injection", "89"), &mut cache).await.unwrap_err();

        assert!(err.is_transport());
        assert!(!err.is_no_data());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_serves_repeated_classifiers() {
        let lookup = MockLookup::knowing(&["79"]);
        let resolver = MappedResolver::new(lookup.clone(), MappingTables::default());
        let mut cache = RecordCache::new();

        tokio_test::block_on(async {
            resolver.resolve(&rule("reflected-xss", "79"), &mut cache).await.unwrap();
            resolver.resolve(&rule("stored-xss", "79"), &mut cache).await.unwrap();
        });

        assert_eq!(lookup.calls().len(), 1);
        assert_eq!(cache.hits(), 1);
    }

    #[tokio::test]
    async fn test_rule_without_cwe_skips_the_lookup() {
        let lookup = MockLookup::knowing(&[""]);
        let resolver = MappedResolver::new(lookup.clone(), MappingTables::default());
        let no_cwe: Rule = serde_json::from_value(serde_json::json!({"name": "custom-rule"})).unwrap();

        let err = resolver.resolve(&no_cwe, &mut RecordCache::new()).await.unwrap_err();

        assert!(err.is_no_data());
        assert!(lookup.calls().is_empty());
    }
}
