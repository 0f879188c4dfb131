use crate::adapters::request::RequestHandler;
use crate::config::app_config::SecureFlagConfig;
use crate::core::integration::Integration;
use crate::core::resolver::{MappedResolver, MappingTables};
use crate::core::template::Template;
use crate::domain::model::{IntegrationRecord, MediaLink, Provider};
use crate::domain::ports::ProviderLookup;
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use tokio::sync::OnceCell;

pub const OVERRIDES: &[(&str, &str)] = &[];

/// CWE 查不到時改用的 SecureFlag 弱點名稱
pub const RESERVES: &[(&str, &str)] = &[
    ("cache-controls-missing", "Sensitive Information Disclosure"),
    ("cache-control-disabled", "Sensitive Information Disclosure"),
    ("cookie-flags-missing", "Insufficient Transport Layer Security"),
    ("cookie-header-missing-flags", "Insufficient Transport Layer Security"),
    ("unvalidated-forward", "Open Redirect"),
    ("authorization-rules-misordered", "Broken Authorization"),
    ("authorization-missing-deny", "Broken Authorization"),
    ("custom-errors-off", "Sensitive Information Disclosure"),
    ("expression-language-injection", "Insufficient Input Validation"),
    ("forms-auth-ssl", "Unchecked Origin in postMessage"),
    ("autocomplete-missing", "Incorrect Content Security Policy"),
    ("hardcoded-key", "Sensitive Information Disclosure"),
    ("hardcoded-password", "Sensitive Information Disclosure"),
    ("header-checking-disabled", "Incorrect Access-Control Headers"),
    ("hql-injection", "SQL Injection"),
    ("http-only-disabled", "Lack of Content Type Headers"),
    ("insecure-jsp-access", "Insecure Functionality Exposed"),
    ("insecure-socket-factory", "Weak Cipher"),
    ("jndi-injection", "Log Injection"),
    ("ldap-injection", "Insufficient Input Validation"),
    ("log-injection", "Log Injection"),
    ("smtp-injection", "Insufficient Input Validation"),
    ("overly-permissive-cross-domain-policy", "Incorrect Content Security Policy"),
    ("clickjacking-control-missing", "UI Redressing"),
    ("parameter-pollution", "Cross-Site Request Forgery"),
    ("prompt-injection", "Insufficient Input Validation"),
    ("plaintext-conn-strings", "Sensitive Information Disclosure"),
    ("rails-http-only-disabled", "Lack of Content Type Headers"),
    ("reflection-injection", "Insufficient Input Validation"),
    ("redos", "Lack of Resources and Rate Limiting"),
    ("hsts-header-missing", "Insufficient Transport Layer Security"),
    ("xcontenttype-header-missing", "Lack of Content Type Headers"),
    ("role-manager-protection", "Broken Authorization"),
    ("role-manager-ssl", "Insufficient Transport Layer Security"),
    ("httponly", "Lack of Content Type Headers"),
    ("crypto-weak-randomness", "Weak Cipher"),
    ("compilation-debug", "Insecure Functionality Exposed"),
    ("secure-flag-missing", "Insufficient Transport Layer Security"),
    ("trace-enabled", "Sensitive Information Disclosure"),
    ("trace-enabled-aspx", "Sensitive Information Disclosure"),
    ("trust-boundary-violation", "Broken Session Management"),
    ("verb-tampering", "HTTP Response Splitting"),
    ("wcf-exception-details", "Sensitive Information Disclosure"),
    ("wcf-metadata-enabled", "Sensitive Information Disclosure"),
    ("unsafe-xml-decode", "XML Entity Expansion"),
    ("xpath-injection", "XML Entity Expansion"),
];

pub const TEMPLATE: &str = r#"
{{#header}}Secure Flag {{#omitted}} Integration{{/omitted}}{{/header}}
{{#paragraph}}Learn more about {{#focus}}${policy.title}{{/focus}} vulnerabilities over on the Secure Flag platform by reading knowledge base articles and completing training labs that focus on secure coding.{{/paragraph}}
{{#unorderedList}}
[% if integration.url %]
    {{#listElement}}
        {{#linkExternal}}${integration.url}$$LINK_DELIM$$Secure Flag Knowledge Base: ${integration.name}{{/linkExternal}}
    {{/listElement}}
[% endif %]
[% for lab in integration.media %]
    {{#listElement}}
        {{#linkExternal}}${lab.url}$$LINK_DELIM$$Secure Flag Lab: ${lab.title}{{/linkExternal}}
    {{/listElement}}
[% endfor %]
{{/unorderedList}}
"#;

const AGNOSTIC: &str = "Agnostic";

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct Lab {
    #[serde(default)]
    title: String,
    #[serde(default)]
    lab_url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct CatalogEntry {
    #[serde(default)]
    vulnerability: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    technology: String,
    #[serde(default, rename = "CWE", deserialize_with = "cwe_list")]
    cwe: Vec<String>,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    labs: Vec<Lab>,
}

// 目錄中的 CWE 可能是數字、字串或陣列
fn cwe_list<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    fn scalar(value: &serde_json::Value) -> Option<String> {
        match value {
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::String(s) if !s.is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
    }

    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match &value {
        serde_json::Value::Array(items) => items.iter().filter_map(scalar).collect(),
        other => scalar(other).into_iter().collect(),
    })
}

/// 與語言無關的項目才是候選資料，其餘技術整理成 other_languages
#[derive(Debug, Clone, PartialEq)]
struct Candidate {
    entry: CatalogEntry,
    other_languages: Vec<String>,
}

impl Candidate {
    fn to_record(&self) -> IntegrationRecord {
        IntegrationRecord {
            provider: Provider::SecureFlag,
            name: self.entry.vulnerability.clone(),
            description: self.entry.category.clone(),
            url: Some(self.entry.html_url.clone()).filter(|u| !u.is_empty()),
            references: Vec::new(),
            media: self
                .entry
                .labs
                .iter()
                .map(|lab| MediaLink {
                    title: lab.title.clone(),
                    url: lab.lab_url.clone(),
                })
                .collect(),
            other_languages: self.other_languages.clone(),
        }
    }
}

fn build_candidates(entries: Vec<CatalogEntry>) -> Vec<Candidate> {
    let mut parents: Vec<CatalogEntry> = Vec::new();
    let mut children: Vec<CatalogEntry> = Vec::new();

    // 目錄裡有完全重複的項目
    for entry in entries {
        let bucket = if entry.technology == AGNOSTIC {
            &mut parents
        } else {
            &mut children
        };
        if !bucket.contains(&entry) {
            bucket.push(entry);
        }
    }

    parents
        .into_iter()
        .map(|entry| {
            let mut other_languages: Vec<String> = Vec::new();
            for child in children.iter().filter(|c| c.vulnerability == entry.vulnerability) {
                if !other_languages.contains(&child.technology) {
                    other_languages.push(child.technology.clone());
                }
            }
            Candidate {
                entry,
                other_languages,
            }
        })
        .collect()
}

/// SecureFlag 知識庫。整份目錄一次取回，同一個 client 內只下載一次
pub struct SecureFlagClient {
    requests: RequestHandler,
    catalog_url: String,
    catalog: OnceCell<Vec<Candidate>>,
}

impl SecureFlagClient {
    pub fn new(client: Client, config: &SecureFlagConfig) -> Self {
        Self {
            requests: RequestHandler::new(client),
            catalog_url: config.catalog_url.clone(),
            catalog: OnceCell::new(),
        }
    }

    pub fn with_timeout(mut self, seconds: Option<u64>) -> Self {
        self.requests = self.requests.with_timeout(seconds);
        self
    }

    async fn catalog(&self) -> Result<&[Candidate]> {
        let candidates = self
            .catalog
            .get_or_try_init(|| async {
                tracing::debug!("Downloading SecureFlag catalog from {}", self.catalog_url);
                let entries: Vec<CatalogEntry> = self.requests.get_json(&self.catalog_url, &[]).await?;
                let candidates = build_candidates(entries);
                tracing::info!("📚 Loaded {} SecureFlag vulnerabilities", candidates.len());
                Ok::<_, crate::utils::error::IntegrationError>(candidates)
            })
            .await?;
        Ok(candidates.as_slice())
    }
}

#[async_trait]
impl ProviderLookup for SecureFlagClient {
    fn provider(&self) -> Provider {
        Provider::SecureFlag
    }

    async fn by_key(&self, key: &str) -> Result<Option<IntegrationRecord>> {
        let found = self
            .catalog()
            .await?
            .iter()
            .find(|c| c.entry.vulnerability == key)
            .map(Candidate::to_record);
        if found.is_some() {
            tracing::debug!("Found SecureFlag info by vulnerability name '{}'", key);
        }
        Ok(found)
    }

    async fn by_classifier(&self, classifier: &str) -> Result<Option<IntegrationRecord>> {
        let found = self
            .catalog()
            .await?
            .iter()
            .find(|c| c.entry.cwe.iter().any(|cwe| cwe == classifier))
            .map(Candidate::to_record);
        if found.is_some() {
            tracing::debug!("Found SecureFlag info by CWE {}", classifier);
        }
        Ok(found)
    }
}

pub fn integration(client: Client, config: &SecureFlagConfig, timeout: Option<u64>) -> Result<Integration> {
    let template = match &config.template_file {
        Some(path) => Template::from_file(path)?,
        None => Template::parse(TEMPLATE)?,
    };
    let lookup = SecureFlagClient::new(client, config).with_timeout(timeout);
    let resolver = MappedResolver::new(lookup, MappingTables::from_static(OVERRIDES, RESERVES));

    Ok(Integration::new(Box::new(resolver), template))
}
