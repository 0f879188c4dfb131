use anyhow::Result;
use contrast_integrations::domain::model::RuleCustomizations;
use contrast_integrations::domain::ports::RuleGateway;
use contrast_integrations::utils::validation::Validate;
use contrast_integrations::{AppConfig, ContrastClient, IntegrationError};
use httpmock::prelude::*;
use tempfile::TempDir;

fn config_for(server: &MockServer) -> AppConfig {
    let mut config = AppConfig::new(&server.url("/Contrast"), "test-api-key", "dGVzdDp0ZXN0");
    config.set_default_profile("org-1", Some("Acme"));
    config
}

/// 每個請求都要帶上認證標頭，規則列表要加 expand=skip_links
#[tokio::test]
async fn test_org_policy_request_carries_auth_headers() -> Result<()> {
    let server = MockServer::start();
    let policy_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/Contrast/api/ng/org-1/rules")
            .query_param("expand", "skip_links")
            .header("api-key", "test-api-key")
            .header("authorization", "dGVzdDp0ZXN0")
            .header("accept", "application/json");
        then.status(200).json_body(serde_json::json!({
            "count": 2,
            "rules": [
                {"name": "sql-injection", "title": "SQL Injection"},
                {"name": "reflected-xss", "title": "Cross-Site Scripting"}
            ]
        }));
    });

    let client = ContrastClient::from_config(&config_for(&server))?;
    let policy = client.get_org_policy().await?;

    policy_mock.assert();
    assert_eq!(policy.count, 2);
    assert_eq!(policy.rules[1].name, "reflected-xss");
    Ok(())
}

#[tokio::test]
async fn test_update_posts_full_customization_payload() -> Result<()> {
    let server = MockServer::start();
    let update_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/Contrast/api/ng/org-1/rules/sql-injection")
            .json_body(serde_json::json!({
                "recommendation": "Use binds",
                "risk": "",
                "references": ["https://owasp.org/sqli"],
                "confidence_level": false,
                "impact": "LOW",
                "likelihood": false
            }));
        then.status(200)
            .json_body(serde_json::json!({"success": true, "messages": ["Rule updated"]}));
    });

    let client = ContrastClient::from_config(&config_for(&server))?;
    let payload = RuleCustomizations {
        recommendation: "Use binds".to_string(),
        risk: String::new(),
        references: vec!["https://owasp.org/sqli".to_string()],
        confidence_level: None,
        impact: Some("LOW".to_string()),
        likelihood: None,
    };
    let outcome = client.update_rule("sql-injection", &payload).await?;

    update_mock.assert();
    assert!(outcome.success);
    assert_eq!(outcome.message(), "Rule updated");
    Ok(())
}

#[tokio::test]
async fn test_reset_sends_override_false() -> Result<()> {
    let server = MockServer::start();
    let reset_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/Contrast/api/ng/org-1/rules/redos")
            .json_body(serde_json::json!({"override": "false"}));
        then.status(200).json_body(serde_json::json!({"success": true, "messages": []}));
    });

    let client = ContrastClient::from_config(&config_for(&server))?;
    let outcome = client.reset_rule("redos").await?;

    reset_mock.assert();
    assert!(outcome.success);
    Ok(())
}

#[tokio::test]
async fn test_error_status_and_bad_json_are_transport_failures() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/Contrast/api/ng/org-1/rules/forbidden");
        then.status(403).json_body(serde_json::json!({"success": false}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/Contrast/api/ng/org-1/rules/garbled");
        then.status(200).body("<html>maintenance</html>");
    });

    let client = ContrastClient::from_config(&config_for(&server))?;

    let forbidden = client.get_rule("forbidden").await.unwrap_err();
    assert!(matches!(forbidden, IntegrationError::UnexpectedStatus { status: 403, .. }));
    assert!(forbidden.is_transport());

    let garbled = client.get_rule("garbled").await.unwrap_err();
    assert!(matches!(garbled, IntegrationError::MalformedResponse { .. }));
    assert!(garbled.is_transport());
    Ok(())
}

#[tokio::test]
async fn test_profile_and_default_org() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/Contrast/api/ng/profile");
        then.status(200).json_body(serde_json::json!({
            "user": {"first_name": "Ada", "last_name": "Lovelace", "superadmin_role": "SUPERADMIN"}
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/Contrast/api/ng/profile/organizations/default");
        then.status(200).json_body(serde_json::json!({
            "organization": {"organization_uuid": "org-1", "name": "Acme"},
            "roles": ["ROLE_EDIT", "ROLE_RULES_ADMIN"]
        }));
    });

    let client = ContrastClient::from_config(&config_for(&server))?;
    let profile = client.get_profile().await?;
    let org = client.get_default_org().await?;

    assert!(profile.is_superadmin());
    assert_eq!(org.organization_uuid, "org-1");
    assert!(org.can_edit_rules());
    Ok(())
}

/// 從 TOML 設定檔建立 client（含 `${VAR}` 替換）
#[tokio::test]
async fn test_client_from_config_file() -> Result<()> {
    let server = MockServer::start();
    let rule_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/Contrast/api/ng/org-9/rules/redos")
            .header("api-key", "env-key");
        then.status(200).json_body(serde_json::json!({
            "name": "redos",
            "title": "Regular Expression DoS",
            "cwe": "https://cwe.mitre.org/data/definitions/1333.html",
            "recommendation": null,
            "likelihood_custom": false
        }));
    });

    std::env::set_var("CI_GATEWAY_TEST_API_KEY", "env-key");
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("config.toml");
    let config_content = format!(
        r#"
teamserver_url = "{}"
api_key = "${{CI_GATEWAY_TEST_API_KEY}}"
auth_header = "header"
request_timeout = 10

[default_profile]
org_uuid = "org-9"
api_key = "${{CI_GATEWAY_TEST_API_KEY}}"
"#,
        server.url("/Contrast")
    );
    tokio::fs::write(&config_path, config_content).await?;

    let config = AppConfig::from_file(&config_path)?;
    std::env::remove_var("CI_GATEWAY_TEST_API_KEY");
    config.validate()?;

    let client = ContrastClient::from_config(&config)?;
    let rule = client.get_rule("redos").await?;

    rule_mock.assert();
    assert_eq!(rule.classifier(), "1333");
    assert!(!rule.has_customizations());
    Ok(())
}
