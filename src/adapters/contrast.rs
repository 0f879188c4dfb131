use crate::adapters::request::RequestHandler;
use crate::config::app_config::AppConfig;
use crate::domain::model::{Organization, Policy, Rule, RuleCustomizations, UpdateOutcome, UserProfile};
use crate::domain::ports::RuleGateway;
use crate::utils::error::{IntegrationError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;

const API_VERSION: &str = "api/ng";

#[derive(Deserialize)]
struct ProfileResponse {
    user: UserProfile,
}

#[derive(Deserialize)]
struct OrganizationResponse {
    organization: Organization,
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Deserialize)]
struct OrganizationsResponse {
    #[serde(default)]
    organizations: Vec<Organization>,
}

/// Contrast TeamServer REST API
pub struct ContrastClient {
    requests: RequestHandler,
    base_url: String,
    org_uuid: Option<String>,
}

impl ContrastClient {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(HeaderName::from_static("api-key"), header_value("api_key", config.effective_api_key())?);
        headers.insert(AUTHORIZATION, header_value("auth_header", &config.auth_header)?);

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            requests: RequestHandler::new(client).with_timeout(config.request_timeout()),
            base_url: format!("{}/{}", config.teamserver_url.trim_end_matches('/'), API_VERSION),
            org_uuid: config.org_uuid().ok().map(str::to_string),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    fn org(&self) -> Result<&str> {
        self.org_uuid
            .as_deref()
            .ok_or_else(|| IntegrationError::MissingConfigError {
                field: "default_profile.org_uuid".to_string(),
            })
    }

    fn rule_url(&self, rule_name: &str) -> Result<String> {
        Ok(self.url(&format!("{}/rules/{}", self.org()?, rule_name)))
    }

    pub async fn get_profile(&self) -> Result<UserProfile> {
        let response: ProfileResponse = self
            .requests
            .get_json(&self.url("profile"), &[("expand", "email,preferences,login,signup")])
            .await?;
        Ok(response.user)
    }

    pub async fn get_default_org(&self) -> Result<Organization> {
        let response: OrganizationResponse = self
            .requests
            .get_json(&self.url("profile/organizations/default"), &[])
            .await?;
        Ok(with_roles(response))
    }

    pub async fn get_organizations(&self) -> Result<Vec<Organization>> {
        let response: OrganizationsResponse = self
            .requests
            .get_json(&self.url("profile/organizations"), &[("expand", "role")])
            .await?;
        Ok(response.organizations)
    }
}

fn with_roles(response: OrganizationResponse) -> Organization {
    let mut organization = response.organization;
    if organization.roles.is_empty() {
        organization.roles = response.roles;
    }
    organization
}

fn header_value(field: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| IntegrationError::InvalidConfigValueError {
        field: field.to_string(),
        value: "<redacted>".to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl RuleGateway for ContrastClient {
    async fn get_org_policy(&self) -> Result<Policy> {
        let url = self.url(&format!("{}/rules", self.org()?));
        self.requests.get_json(&url, &[("expand", "skip_links")]).await
    }

    async fn get_rule(&self, rule_name: &str) -> Result<Rule> {
        self.requests.get_json(&self.rule_url(rule_name)?, &[]).await
    }

    async fn update_rule(
        &self,
        rule_name: &str,
        customizations: &RuleCustomizations,
    ) -> Result<UpdateOutcome> {
        self.requests
            .post_json(&self.rule_url(rule_name)?, customizations)
            .await
    }

    async fn reset_rule(&self, rule_name: &str) -> Result<UpdateOutcome> {
        let body = serde_json::json!({ "override": "false" });
        self.requests.post_json(&self.rule_url(rule_name)?, &body).await
    }
}
