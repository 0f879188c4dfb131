use crate::adapters::request::RequestHandler;
use crate::config::app_config::ScwConfig;
use crate::core::integration::Integration;
use crate::core::resolver::{MappedResolver, MappingTables};
use crate::core::template::Template;
use crate::domain::model::{IntegrationRecord, MediaLink, Provider, ReferenceLink};
use crate::domain::ports::ProviderLookup;
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// 比 CWE 對照更合適的 SCW 分類（目前沒有）
pub const OVERRIDES: &[(&str, &str)] = &[];

/// CWE 對照查不到時改用的 SCW `default` MappingKey
pub const RESERVES: &[(&str, &str)] = &[
    ("unvalidated-forward", "UnvalidatedRedirectsandForwards:UnvalidatedRedirectsandForwards"),
    ("session-regenerate", "ImproperSessionHandling:ImproperTimeoutOfSessionID"),
    ("hql-injection", "InjectionFlaws:SQLInjection"),
    ("insecure-jsp-access", "SecurityMisconfiguration:InformationExposure"),
    ("overly-permissive-cross-domain-policy", "SecurityMisconfiguration:DisabledSecurityFeatures"),
    ("clickjacking-control-missing", "SecurityMisconfiguration:Clickjacking"),
    ("parameter-pollution", "BusinessLogic:InsufficientValidation"),
    ("reflection-injection", "InjectionFlaws:CodeInjection"),
    ("redos", "DenialofService:RegularExpressionDoS"),
    ("viewstate-mac-disabled", "SecurityMisconfiguration:DisabledSecurityFeatures"),
    ("csp-header-missing", "SecurityMisconfiguration:DisabledSecurityFeatures"),
    ("csp-header-insecure", "SecurityMisconfiguration:DisabledSecurityFeatures"),
    ("request-validation-disabled", "SecurityMisconfiguration:DisabledSecurityFeatures"),
    ("request-validation-control-disabled", "SecurityMisconfiguration:DisabledSecurityFeatures"),
    ("event-validation-disabled", "SecurityMisconfiguration:DisabledSecurityFeatures"),
    ("xcontenttype-header-missing", "SecurityMisconfiguration:DisabledSecurityFeatures"),
    ("session-rewriting", "SessionHandling:ExposedSessionTokens"),
    ("trace-enabled", "InformationExposure:ErrorDetails"),
    ("trace-enabled-aspx", "InformationExposure:ErrorDetails"),
    ("trust-boundary-violation", "BusinessLogic:LogicalError"),
    ("plaintext-conn-strings", "InsecureAuthentication:HardcodedAPIKeys"),
    ("unsafe-code-execution", "InjectionFlaws:CodeInjection"),
    ("verb-tampering", "SecurityMisconfiguration:DisabledSecurityFeatures"),
    ("wcf-metadata-enabled", "SecurityMisconfiguration:InformationExposure"),
];

/// 規則本身已經有的通用參考連結，不重複加入
pub const REF_EXCLUSIONS: &[&str] = &[
    "https://cheatsheetseries.owasp.org/cheatsheets/SQL_Injection_Prevention_Cheat_Sheet.html",
    "https://cheatsheetseries.owasp.org/cheatsheets/Unvalidated_Redirects_and_Forwards_Cheat_Sheet.html",
    "https://cheatsheetseries.owasp.org/cheatsheets/Cross-Site_Request_Forgery_Prevention_Cheat_Sheet.html",
    "https://cheatsheetseries.owasp.org/cheatsheets/Cryptographic_Storage_Cheat_Sheet.html",
    "https://owasp.org/www-community/attacks/Command_Injection",
    "https://cheatsheetseries.owasp.org/cheatsheets/Cross_Site_Scripting_Prevention_Cheat_Sheet.html",
    "https://owasp.org/www-community/attacks/Code_Injection",
    "https://owasp.org/www-project-top-ten/2017/A8_2017-Insecure_Deserialization",
    "https://cheatsheetseries.owasp.org/cheatsheets/XML_External_Entity_Prevention_Cheat_Sheet.html",
    "https://owasp.org/www-community/attacks/XPATH_Injection",
];

pub const TEMPLATE: &str = r#"
{{#header}}Secure Code Warrior {{#omitted}} Integration{{/omitted}}{{/header}}
{{#paragraph}}Learn more about {{#focus}}${policy.title}{{/focus}} vulnerabilities over on the Secure Code Warrior platform by watching videos and completing training exercises and missions that focus on secure coding.{{/paragraph}}
{{#unorderedList}}
[% if integration.url %]
    {{#listElement}}
        {{#linkExternal}}${integration.url}$$LINK_DELIM$$Secure Code Warrior: ${policy.title} Training{{/linkExternal}}
    {{/listElement}}
[% endif %]
[% if integration.media %]
    {{#listElement}}
        {{#linkExternal}}${integration.media.0.url}$$LINK_DELIM$$Secure Code Warrior: ${policy.title} Video{{/linkExternal}}
    {{/listElement}}
[% endif %]
{{/unorderedList}}
[% if integration.name %][% if integration.description %]
    {{#blockQuote}}
        {{#grayedData}}
            {{#focus}}${integration.name}{{/focus}}{{{nl}}}
            ${integration.description}
        {{/grayedData}}
    {{/blockQuote}}
[% endif %][% endif %]
"#;

#[derive(Debug, Deserialize)]
struct TrialLink {
    url: String,
    #[serde(default, rename = "languageFrameworks")]
    language_frameworks: Vec<String>,
}

/// `api/v1/trial` 回應；查無資料時只有 `{"name": "Not Found"}`
#[derive(Debug, Deserialize)]
struct TrialResponse {
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    videos: Vec<String>,
    #[serde(default)]
    links: Vec<TrialLink>,
}

impl TrialResponse {
    fn into_record(self) -> Option<IntegrationRecord> {
        if self.name == "Not Found" || (self.name.is_empty() && self.url.is_none()) {
            return None;
        }
        let media = self
            .videos
            .into_iter()
            .map(|url| MediaLink {
                title: self.name.clone(),
                url,
            })
            .collect();
        Some(IntegrationRecord {
            provider: Provider::SecureCodeWarrior,
            name: self.name,
            description: self.description.unwrap_or_default(),
            url: self.url.filter(|u| !u.is_empty()),
            references: self
                .links
                .into_iter()
                .map(|link| ReferenceLink {
                    url: link.url,
                    language_frameworks: link.language_frameworks,
                })
                .collect(),
            media,
            other_languages: Vec::new(),
        })
    }
}

/// Secure Code Warrior 試用整合 API
pub struct ScwClient {
    requests: RequestHandler,
    trial_url: String,
}

impl ScwClient {
    pub fn new(client: Client, config: &ScwConfig) -> Self {
        Self {
            requests: RequestHandler::new(client),
            trial_url: format!("{}/api/v1/trial", config.base_url.trim_end_matches('/')),
        }
    }

    pub fn with_timeout(mut self, seconds: Option<u64>) -> Self {
        self.requests = self.requests.with_timeout(seconds);
        self
    }

    async fn trial(&self, mapping_list: &str, mapping_key: &str) -> Result<Option<IntegrationRecord>> {
        tracing::debug!("Getting SCW info for {} '{}'", mapping_list, mapping_key);
        let query = [
            ("Id", "contrast"),
            ("MappingList", mapping_list),
            ("MappingKey", mapping_key),
            ("redirect", "false"),
        ];
        let response: TrialResponse = self.requests.get_json(&self.trial_url, &query).await?;
        Ok(response.into_record())
    }
}

#[async_trait]
impl ProviderLookup for ScwClient {
    fn provider(&self) -> Provider {
        Provider::SecureCodeWarrior
    }

    async fn by_key(&self, key: &str) -> Result<Option<IntegrationRecord>> {
        self.trial("default", key).await
    }

    async fn by_classifier(&self, classifier: &str) -> Result<Option<IntegrationRecord>> {
        self.trial("cwe", classifier).await
    }
}

/// 組出 SCW 整合：內建對照表，模板可由設定檔覆寫
pub fn integration(client: Client, config: &ScwConfig, timeout: Option<u64>) -> Result<Integration> {
    let template = match &config.template_file {
        Some(path) => Template::from_file(path)?,
        None => Template::parse(TEMPLATE)?,
    };
    let lookup = ScwClient::new(client, config).with_timeout(timeout);
    let resolver = MappedResolver::new(lookup, MappingTables::from_static(OVERRIDES, RESERVES));

    Ok(Integration::new(Box::new(resolver), template).with_reference_exclusions(REF_EXCLUSIONS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_response_has_no_record() {
        let response: TrialResponse = serde_json::from_value(serde_json::json!({"name": "Not Found"})).unwrap();
        assert!(response.into_record().is_none());
    }

    #[test]
    fn test_trial_response_maps_to_record() {
        let response: TrialResponse = serde_json::from_value(serde_json::json!({
            "name": "Cross-Site Scripting",
            "description": "Untrusted data in pages",
            "url": "https://portal.securecodewarrior.com/xss",
            "videos": ["https://media.securecodewarrior.com/xss.mp4"],
            "links": [
                {"url": "https://owasp.org/xss", "languageFrameworks": []},
                {"url": "https://docs.example/java", "languageFrameworks": ["java:spring"]}
            ]
        }))
        .unwrap();

        let record = response.into_record().unwrap();
        assert_eq!(record.url.as_deref(), Some("https://portal.securecodewarrior.com/xss"));
        assert_eq!(record.media[0].url, "https://media.securecodewarrior.com/xss.mp4");
        assert_eq!(record.agnostic_reference_urls(&[]), vec!["https://owasp.org/xss"]);
    }

    #[test]
    fn test_builtin_template_renders_without_newlines() {
        let template = Template::parse(TEMPLATE).unwrap();
        let record = IntegrationRecord {
            provider: Provider::SecureCodeWarrior,
            name: "SQL Injection".to_string(),
            description: "Queries built from input".to_string(),
            url: Some("https://portal.example/sqli".to_string()),
            references: vec![],
            media: vec![],
            other_languages: vec![],
        };
        let policy = crate::domain::model::PolicyContext {
            name: "sql-injection".to_string(),
            title: "SQL Injection".to_string(),
            classifier: "89".to_string(),
        };

        let block =
            crate::core::block_codec::render_block(Provider::SecureCodeWarrior, &template, &record, &policy).unwrap();

        assert!(block.starts_with("{{!-- begin SCW integration block --}}"));
        assert!(block.ends_with("{{!-- end SCW integration block --}}"));
        assert!(!block.contains('\n'));
        assert!(block.contains("https://portal.example/sqli$$LINK_DELIM$$Secure Code Warrior: SQL Injection Training"));
        assert!(!block.contains("Video"));
    }

    #[test]
    fn test_builtin_template_skips_quote_without_name() {
        let template = Template::parse(TEMPLATE).unwrap();
        let policy = crate::domain::model::PolicyContext {
            name: "sql-injection".to_string(),
            title: "SQL Injection".to_string(),
            classifier: "89".to_string(),
        };
        let mut record = IntegrationRecord {
            provider: Provider::SecureCodeWarrior,
            name: String::new(),
            description: "Queries built from input".to_string(),
            url: None,
            references: vec![],
            media: vec![],
            other_languages: vec![],
        };

        let render = |record: &IntegrationRecord| {
            crate::core::block_codec::render_block(Provider::SecureCodeWarrior, &template, record, &policy).unwrap()
        };

        let without_name = render(&record);
        assert!(!without_name.contains("{{#blockQuote}}"));
        assert!(!without_name.contains("Queries built from input"));

        record.name = "Injection Flaws".to_string();
        let with_name = render(&record);
        assert!(with_name.contains("{{#blockQuote}}"));
        assert!(with_name.contains("{{#focus}}Injection Flaws{{/focus}}"));
        assert!(with_name.contains("Queries built from input"));
    }

    #[test]
    fn test_reserve_table_has_unique_rules() {
        let mut names: Vec<&str> = RESERVES.iter().map(|(rule, _)| *rule).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), RESERVES.len());
    }
}
