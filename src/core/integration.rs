use crate::core::block_codec::render_block;
use crate::core::cache::RecordCache;
use crate::core::template::Template;
use crate::domain::model::{IntegrationRecord, Provider, Rule};
use crate::domain::ports::IntegrationSource;
use crate::utils::error::Result;

/// 已解析並渲染好的區塊
#[derive(Debug, Clone)]
pub struct PreparedBlock {
    pub record: IntegrationRecord,
    pub rendered: String,
}

/// 一個學習平台整合：資料來源 + 區塊模板
pub struct Integration {
    source: Box<dyn IntegrationSource>,
    template: Template,
    reference_exclusions: Vec<String>,
}

impl Integration {
    pub fn new(source: Box<dyn IntegrationSource>, template: Template) -> Self {
        Self {
            source,
            template,
            reference_exclusions: Vec::new(),
        }
    }

    pub fn with_reference_exclusions(mut self, urls: &[&str]) -> Self {
        self.reference_exclusions = urls.iter().map(|u| u.to_string()).collect();
        self
    }

    pub fn provider(&self) -> Provider {
        self.source.provider()
    }

    pub async fn prepare(&self, rule: &Rule, cache: &mut RecordCache) -> Result<PreparedBlock> {
        let record = self.source.resolve(rule, cache).await?;
        let rendered = render_block(self.provider(), &self.template, &record, &rule.policy_context())?;
        Ok(PreparedBlock { record, rendered })
    }

    /// 可附加到規則參考連結的網址：只取與語言無關的連結，
    /// 排除固定清單與規則本身的 OWASP 連結
    pub fn extra_references(&self, rule: &Rule, record: &IntegrationRecord) -> Vec<String> {
        let mut exclusions: Vec<&str> = self.reference_exclusions.iter().map(String::as_str).collect();
        if !rule.owasp.is_empty() {
            exclusions.push(rule.owasp.as_str());
        }
        record.agnostic_reference_urls(&exclusions)
    }
}
