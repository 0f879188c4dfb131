use crate::core::cache::RecordCache;
use crate::domain::model::{IntegrationRecord, Policy, Provider, Rule, RuleCustomizations, UpdateOutcome};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 遠端規則服務（Contrast TeamServer）的邊界
#[async_trait]
pub trait RuleGateway: Send + Sync {
    async fn get_org_policy(&self) -> Result<Policy>;
    async fn get_rule(&self, rule_name: &str) -> Result<Rule>;
    async fn update_rule(
        &self,
        rule_name: &str,
        customizations: &RuleCustomizations,
    ) -> Result<UpdateOutcome>;
    async fn reset_rule(&self, rule_name: &str) -> Result<UpdateOutcome>;
}

/// 平台資料查詢的兩種模式；`Ok(None)` 表示平台明確回報查無資料
#[async_trait]
pub trait ProviderLookup: Send + Sync {
    fn provider(&self) -> Provider;
    async fn by_key(&self, key: &str) -> Result<Option<IntegrationRecord>>;
    async fn by_classifier(&self, classifier: &str) -> Result<Option<IntegrationRecord>>;
}

#[async_trait]
pub trait IntegrationSource: Send + Sync {
    fn provider(&self) -> Provider;
    async fn resolve(&self, rule: &Rule, cache: &mut RecordCache) -> Result<IntegrationRecord>;
}
