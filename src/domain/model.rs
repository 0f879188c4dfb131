use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// 已註冊的學習平台整合，順序即為區塊的固定優先順序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "SCW")]
    SecureCodeWarrior,
    #[serde(rename = "SecureFlag")]
    SecureFlag,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::SecureCodeWarrior, Provider::SecureFlag];

    /// 寫入 recommendation 標記中的名稱，不可更改
    pub fn block_name(&self) -> &'static str {
        match self {
            Provider::SecureCodeWarrior => "SCW",
            Provider::SecureFlag => "SecureFlag",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::SecureCodeWarrior => "Secure Code Warrior",
            Provider::SecureFlag => "Secure Flag",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.block_name())
    }
}

/// 組織政策中的規則列表項目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSummary {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub rules: Vec<RuleSummary>,
}

/// 遠端服務上的規則（實際上是規則客製化內容）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, deserialize_with = "nullable_string")]
    pub recommendation: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub risk: String,
    #[serde(default, deserialize_with = "nullable_list")]
    pub references: Vec<String>,
    #[serde(default, deserialize_with = "nullable_string")]
    pub cwe: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub owasp: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub category: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub severity: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub likelihood: String,
    #[serde(default, deserialize_with = "custom_level")]
    pub likelihood_custom: Option<String>,
    #[serde(default, deserialize_with = "nullable_string")]
    pub impact: String,
    #[serde(default, deserialize_with = "custom_level")]
    pub impact_custom: Option<String>,
    #[serde(default, deserialize_with = "nullable_string")]
    pub confidence_level: String,
    #[serde(default, deserialize_with = "custom_level")]
    pub confidence_level_custom: Option<String>,
}

impl Rule {
    /// 從 CWE 網址取出編號，例如 `.../definitions/79.html` -> `79`
    pub fn classifier(&self) -> String {
        self.cwe
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .trim_end_matches(".html")
            .to_string()
    }

    pub fn has_custom_levels(&self) -> bool {
        self.likelihood_custom.is_some()
            || self.impact_custom.is_some()
            || self.confidence_level_custom.is_some()
    }

    pub fn has_custom_guidance(&self) -> bool {
        !self.recommendation.is_empty() || !self.risk.is_empty() || !self.references.is_empty()
    }

    pub fn has_customizations(&self) -> bool {
        self.has_custom_levels() || self.has_custom_guidance()
    }

    pub fn policy_context(&self) -> PolicyContext {
        PolicyContext {
            name: self.name.clone(),
            title: self.title.clone(),
            classifier: self.classifier(),
        }
    }
}

/// 遠端 API 會把未送出的欄位重設為預設值，所以每次更新都送出完整內容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCustomizations {
    pub recommendation: String,
    pub risk: String,
    pub references: Vec<String>,
    /// 未自訂的等級照規則原樣送回 `false`
    #[serde(default, serialize_with = "level_or_false", deserialize_with = "custom_level")]
    pub confidence_level: Option<String>,
    #[serde(default, serialize_with = "level_or_false", deserialize_with = "custom_level")]
    pub impact: Option<String>,
    #[serde(default, serialize_with = "level_or_false", deserialize_with = "custom_level")]
    pub likelihood: Option<String>,
}

impl RuleCustomizations {
    pub fn from_rule(rule: &Rule) -> Self {
        Self {
            recommendation: rule.recommendation.clone(),
            risk: rule.risk.clone(),
            references: rule.references.clone(),
            confidence_level: rule.confidence_level_custom.clone(),
            impact: rule.impact_custom.clone(),
            likelihood: rule.likelihood_custom.clone(),
        }
    }

    pub fn with_recommendation(mut self, recommendation: String) -> Self {
        self.recommendation = recommendation;
        self
    }

    pub fn with_risk(mut self, risk: String) -> Self {
        self.risk = risk;
        self
    }

    /// 合併參考連結，去除重複並保留原本順序
    pub fn with_extra_references(mut self, extra: &[String]) -> Self {
        for reference in extra {
            if !self.references.contains(reference) {
                self.references.push(reference.clone());
            }
        }
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateOutcome {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub messages: Vec<String>,
}

impl UpdateOutcome {
    pub fn message(&self) -> String {
        self.messages.join("; ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceLink {
    pub url: String,
    #[serde(default)]
    pub language_frameworks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaLink {
    pub title: String,
    pub url: String,
}

/// 某個分類（CWE）在某個平台上的整合資料
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationRecord {
    pub provider: Provider,
    pub name: String,
    pub description: String,
    pub url: Option<String>,
    #[serde(default)]
    pub references: Vec<ReferenceLink>,
    #[serde(default)]
    pub media: Vec<MediaLink>,
    #[serde(default)]
    pub other_languages: Vec<String>,
}

impl IntegrationRecord {
    /// 與語言無關的參考連結，排除指定網址
    pub fn agnostic_reference_urls(&self, exclusions: &[&str]) -> Vec<String> {
        self.references
            .iter()
            .filter(|r| r.language_frameworks.is_empty())
            .filter(|r| !exclusions.contains(&r.url.as_str()))
            .map(|r| r.url.clone())
            .collect()
    }
}

/// `GET profile` 回應中的使用者
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub superadmin_role: String,
}

impl UserProfile {
    pub fn is_superadmin(&self) -> bool {
        self.superadmin_role == "SUPERADMIN"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub organization_uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Organization {
    /// 修改規則需要 ADMIN 或 RULES_ADMIN
    pub fn can_edit_rules(&self) -> bool {
        self.roles
            .iter()
            .any(|role| role == "ROLE_ADMIN" || role == "ROLE_RULES_ADMIN")
    }
}

/// 模板中可用的 `policy.*` 欄位
#[derive(Debug, Clone, Serialize)]
pub struct PolicyContext {
    pub name: String,
    pub title: String,
    pub classifier: String,
}

fn nullable_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

// API 對未覆寫的等級可能回傳 null、false 或空字串
fn custom_level<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    })
}

fn level_or_false<S: Serializer>(level: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    match level {
        Some(level) => serializer.serialize_str(level),
        None => serializer.serialize_bool(false),
    }
}
