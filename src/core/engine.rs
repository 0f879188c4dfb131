use crate::core::cache::RecordCache;
use crate::core::composer::{add_block, merge_risk, remove_block};
use crate::core::integration::Integration;
use crate::domain::model::{Provider, Rule, RuleCustomizations};
use crate::domain::ports::RuleGateway;
use crate::utils::error::{IntegrationError, Result};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, Default)]
pub struct EnableOptions {
    /// 同時把平台提供的參考連結加到規則
    pub with_references: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    Updated,
    Unchanged,
    Reset,
    NoData(String),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct RuleReport {
    pub rule_name: String,
    pub outcome: RuleOutcome,
}

/// 批次操作結果：單一規則失敗不影響其他規則
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub operation: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub rules: Vec<RuleReport>,
}

impl BatchReport {
    fn count(&self, predicate: impl Fn(&RuleOutcome) -> bool) -> usize {
        self.rules.iter().filter(|r| predicate(&r.outcome)).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, RuleOutcome::Updated | RuleOutcome::Unchanged | RuleOutcome::Reset))
    }

    pub fn no_data(&self) -> usize {
        self.count(|o| matches!(o, RuleOutcome::NoData(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RuleOutcome::Failed(_)))
    }

    pub fn failures(&self) -> impl Iterator<Item = &RuleReport> {
        self.rules
            .iter()
            .filter(|r| matches!(r.outcome, RuleOutcome::Failed(_)))
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {} rules, {} succeeded, {} without data, {} failed in {}s",
            self.operation,
            self.rules.len(),
            self.succeeded(),
            self.no_data(),
            self.failed(),
            (self.finished_at - self.started_at).num_seconds()
        )
    }
}

pub struct IntegrationEngine<G: RuleGateway> {
    gateway: G,
}

impl<G: RuleGateway> IntegrationEngine<G> {
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub async fn get_rule(&self, rule_name: &str) -> Result<Rule> {
        self.gateway.get_rule(rule_name).await
    }

    pub async fn enable_for_rule(
        &self,
        rule_name: &str,
        integration: &Integration,
        options: EnableOptions,
        cache: &mut RecordCache,
    ) -> Result<RuleOutcome> {
        let provider = integration.provider();
        tracing::debug!("Adding {} block to rule '{}'", provider, rule_name);

        // 每次都重新讀取規則，避免用過期的內容覆蓋
        let rule = self.gateway.get_rule(rule_name).await?;
        let prepared = integration.prepare(&rule, cache).await?;

        let mut customizations = RuleCustomizations::from_rule(&rule)
            .with_recommendation(add_block(&rule.recommendation, provider, &prepared.rendered))
            .with_risk(merge_risk(&rule.risk, None));
        if options.with_references {
            let extra = integration.extra_references(&rule, &prepared.record);
            tracing::debug!("Merging {} {} references into '{}'", extra.len(), provider, rule_name);
            customizations = customizations.with_extra_references(&extra);
        }

        self.write(&rule, customizations).await
    }

    pub async fn remove_for_rule(&self, rule_name: &str, provider: Provider) -> Result<RuleOutcome> {
        tracing::debug!("Removing {} block from rule '{}'", provider, rule_name);

        let rule = self.gateway.get_rule(rule_name).await?;
        let customizations = RuleCustomizations::from_rule(&rule)
            .with_recommendation(remove_block(&rule.recommendation, provider))
            .with_risk(merge_risk(&rule.risk, None));

        self.write(&rule, customizations).await
    }

    /// 手動修改 recommendation / risk；未提供的欄位保留原值
    pub async fn update_rule_text(
        &self,
        rule_name: &str,
        recommendation: Option<&str>,
        risk: Option<&str>,
    ) -> Result<RuleOutcome> {
        let rule = self.gateway.get_rule(rule_name).await?;
        let mut customizations =
            RuleCustomizations::from_rule(&rule).with_risk(merge_risk(&rule.risk, risk));
        if let Some(recommendation) = recommendation {
            customizations = customizations.with_recommendation(recommendation.to_string());
        }

        self.write(&rule, customizations).await
    }

    pub async fn reset_rule(&self, rule_name: &str) -> Result<RuleOutcome> {
        let outcome = self.gateway.reset_rule(rule_name).await?;
        if !outcome.success {
            return Err(IntegrationError::UpdateRejected {
                rule: rule_name.to_string(),
                message: outcome.message(),
            });
        }
        tracing::info!("♻️ Reset rule '{}'", rule_name);
        Ok(RuleOutcome::Reset)
    }

    pub async fn enable_for_all(&self, integration: &Integration, options: EnableOptions) -> Result<BatchReport> {
        let mut batch = self
            .start_batch(&format!("Enable {}", integration.provider().display_name()))
            .await?;
        let mut cache = RecordCache::new();
        for rule_name in batch.pending() {
            let result = self
                .enable_for_rule(&rule_name, integration, options, &mut cache)
                .await;
            batch.record(rule_name, result);
        }
        tracing::debug!("Record cache: {} entries, {} hits", cache.len(), cache.hits());
        Ok(batch.finish())
    }

    pub async fn remove_for_all(&self, provider: Provider) -> Result<BatchReport> {
        let mut batch = self
            .start_batch(&format!("Remove {}", provider.display_name()))
            .await?;
        for rule_name in batch.pending() {
            let result = self.remove_for_rule(&rule_name, provider).await;
            batch.record(rule_name, result);
        }
        Ok(batch.finish())
    }

    pub async fn reset_all_rules(&self) -> Result<BatchReport> {
        let mut batch = self.start_batch("Reset all rules").await?;
        for rule_name in batch.pending() {
            let result = self.reset_rule(&rule_name).await;
            batch.record(rule_name, result);
        }
        Ok(batch.finish())
    }

    /// 只有列出規則失敗才會中止整個批次
    async fn start_batch(&self, operation: &str) -> Result<Batch> {
        let started_at = Utc::now();
        let policy = self.gateway.get_org_policy().await?;
        tracing::info!("🚀 {}: processing {} rules", operation, policy.rules.len());
        Ok(Batch {
            operation: operation.to_string(),
            started_at,
            names: policy.rules.into_iter().map(|r| r.name).collect(),
            rules: Vec::new(),
        })
    }

    async fn write(&self, rule: &Rule, customizations: RuleCustomizations) -> Result<RuleOutcome> {
        if customizations == RuleCustomizations::from_rule(rule) {
            tracing::info!("➖ Rule '{}' already up to date", rule.name);
            return Ok(RuleOutcome::Unchanged);
        }

        let outcome = self.gateway.update_rule(&rule.name, &customizations).await?;
        if !outcome.success {
            return Err(IntegrationError::UpdateRejected {
                rule: rule.name.clone(),
                message: outcome.message(),
            });
        }

        tracing::info!("✏️ Updated rule '{}'", rule.name);
        Ok(RuleOutcome::Updated)
    }
}

struct Batch {
    operation: String,
    started_at: DateTime<Utc>,
    names: Vec<String>,
    rules: Vec<RuleReport>,
}

impl Batch {
    fn pending(&self) -> Vec<String> {
        self.names.clone()
    }

    fn record(&mut self, rule_name: String, result: Result<RuleOutcome>) {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) if e.is_no_data() => {
                tracing::info!("⏭️ {}", e);
                RuleOutcome::NoData(e.to_string())
            }
            Err(e) => {
                tracing::error!("❌ Rule '{}' failed: {}", rule_name, e);
                RuleOutcome::Failed(e.to_string())
            }
        };
        tracing::debug!(
            "[{}/{}] {} -> {:?}",
            self.rules.len() + 1,
            self.names.len(),
            rule_name,
            outcome
        );
        self.rules.push(RuleReport { rule_name, outcome });
    }

    fn finish(self) -> BatchReport {
        let report = BatchReport {
            operation: self.operation,
            started_at: self.started_at,
            finished_at: Utc::now(),
            rules: self.rules,
        };
        tracing::info!("✅ {}", report.summary());
        report
    }
}
