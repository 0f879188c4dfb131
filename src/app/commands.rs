use crate::adapters::contrast::ContrastClient;
use crate::adapters::{scw, secure_flag};
use crate::app::output::{self, PolicyRow};
use crate::app::prompt::confirm_stdin;
use crate::config::app_config::AppConfig;
use crate::config::cli::{AuthCommand, Cli, Command, ProviderCommand};
use crate::core::cache::RecordCache;
use crate::core::engine::{BatchReport, EnableOptions, IntegrationEngine, RuleOutcome};
use crate::core::integration::Integration;
use crate::domain::model::Provider;
use crate::domain::ports::RuleGateway;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use reqwest::Client;
use std::path::Path;

/// 指令執行結果；`Partial` 表示批次中有規則失敗
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Partial,
    Aborted,
}

impl RunStatus {
    fn from_report(report: &BatchReport) -> Self {
        if report.failed() > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Completed
        }
    }
}

pub async fn run(cli: &Cli) -> Result<RunStatus> {
    let config_path = AppConfig::resolve_path(cli.config.as_deref())?;

    if let Command::Auth { command } = &cli.command {
        return match command {
            AuthCommand::Init {
                api_key,
                auth_header,
                teamserver_url,
            } => auth_init(&config_path, teamserver_url, api_key, auth_header).await,
            AuthCommand::Test => {
                let config = load_config(&config_path)?;
                auth_test(&config).await?;
                Ok(RunStatus::Completed)
            }
        };
    }

    let config = load_config(&config_path)?;
    let engine = IntegrationEngine::new(ContrastClient::from_config(&config)?);

    if let Some((provider, command)) = cli.command.provider() {
        return run_provider(&engine, &config, provider, command).await;
    }

    match &cli.command {
        Command::GetRule { rule_name } => {
            let rule = engine.get_rule(rule_name).await?;
            println!("{}", output::describe_rule(&rule));
            Ok(RunStatus::Completed)
        }
        Command::UpdateRule {
            rule_name,
            recommendation,
            risk,
            confirm,
        } => {
            if recommendation.is_none() && risk.is_none() {
                println!("Nothing to update: pass --recommendation and/or --risk");
                return Ok(RunStatus::Completed);
            }
            if !confirm_stdin(&format!("Update the '{}' rule?", rule_name), confirm.confirm)? {
                return Ok(aborted());
            }
            let outcome = engine
                .update_rule_text(rule_name, recommendation.as_deref(), risk.as_deref())
                .await?;
            println!("{}", output::describe_outcome(rule_name, &outcome));
            Ok(RunStatus::Completed)
        }
        Command::ListOrgPolicy { details, csv } => {
            list_org_policy(&engine, *details, *csv).await?;
            Ok(RunStatus::Completed)
        }
        Command::ResetRule { rule_name, confirm } => {
            let question = format!(
                "Reset the '{}' rule? All customizations will be lost.",
                rule_name
            );
            if !confirm_stdin(&question, confirm.confirm)? {
                return Ok(aborted());
            }
            let outcome = engine.reset_rule(rule_name).await?;
            println!("{}", output::describe_outcome(rule_name, &outcome));
            Ok(RunStatus::Completed)
        }
        Command::ResetAllRules { confirm } => {
            let question = "Reset EVERY rule in the policy? All customizations will be lost.";
            if !confirm_stdin(question, confirm.confirm)? {
                return Ok(aborted());
            }
            let report = engine.reset_all_rules().await?;
            println!("{}", output::describe_report(&report));
            Ok(RunStatus::from_report(&report))
        }
        Command::Auth { .. } | Command::SecureCodeWarrior { .. } | Command::SecureFlag { .. } => {
            Ok(RunStatus::Completed)
        }
    }
}

fn aborted() -> RunStatus {
    println!("Aborted, nothing was changed");
    RunStatus::Aborted
}

fn load_config(path: &Path) -> Result<AppConfig> {
    let config = AppConfig::from_file(path)?;
    config.validate()?;
    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}

pub fn build_integration(config: &AppConfig, provider: Provider) -> Result<Integration> {
    let client = Client::builder().build()?;
    let timeout = config.request_timeout();
    match provider {
        Provider::SecureCodeWarrior => scw::integration(client, &config.providers.scw, timeout),
        Provider::SecureFlag => secure_flag::integration(client, &config.providers.secure_flag, timeout),
    }
}

async fn run_provider<G: RuleGateway>(
    engine: &IntegrationEngine<G>,
    config: &AppConfig,
    provider: Provider,
    command: &ProviderCommand,
) -> Result<RunStatus> {
    let name = provider.display_name();
    match command {
        ProviderCommand::EnableForRule { rule_name, options } => {
            let question = format!("Add the {} block to the '{}' rule?", name, rule_name);
            if !confirm_stdin(&question, options.confirm.confirm)? {
                return Ok(aborted());
            }
            let integration = build_integration(config, provider)?;
            let enable = EnableOptions {
                with_references: options.with_references,
            };
            let result = engine
                .enable_for_rule(rule_name, &integration, enable, &mut RecordCache::new())
                .await;
            match result {
                Ok(outcome) => println!("{}", output::describe_outcome(rule_name, &outcome)),
                Err(e) if e.is_no_data() => {
                    println!(
                        "{}",
                        output::describe_outcome(rule_name, &RuleOutcome::NoData(e.to_string()))
                    )
                }
                Err(e) => return Err(e),
            }
            Ok(RunStatus::Completed)
        }
        ProviderCommand::EnableForAll { options } => {
            let question = format!("Add the {} block to EVERY rule in the policy?", name);
            if !confirm_stdin(&question, options.confirm.confirm)? {
                return Ok(aborted());
            }
            let integration = build_integration(config, provider)?;
            let enable = EnableOptions {
                with_references: options.with_references,
            };
            let report = engine.enable_for_all(&integration, enable).await?;
            println!("{}", output::describe_report(&report));
            Ok(RunStatus::from_report(&report))
        }
        ProviderCommand::RemoveForRule { rule_name, confirm } => {
            let question = format!("Remove the {} block from the '{}' rule?", name, rule_name);
            if !confirm_stdin(&question, confirm.confirm)? {
                return Ok(aborted());
            }
            let outcome = engine.remove_for_rule(rule_name, provider).await?;
            println!("{}", output::describe_outcome(rule_name, &outcome));
            Ok(RunStatus::Completed)
        }
        ProviderCommand::RemoveForAll { confirm } => {
            let question = format!("Remove the {} block from EVERY rule in the policy?", name);
            if !confirm_stdin(&question, confirm.confirm)? {
                return Ok(aborted());
            }
            let report = engine.remove_for_all(provider).await?;
            println!("{}", output::describe_report(&report));
            Ok(RunStatus::from_report(&report))
        }
    }
}

async fn list_org_policy<G: RuleGateway>(engine: &IntegrationEngine<G>, details: bool, csv: bool) -> Result<()> {
    let policy = engine.gateway().get_org_policy().await?;

    let mut rows = Vec::with_capacity(policy.rules.len());
    for summary in &policy.rules {
        if details {
            let rule = engine.get_rule(&summary.name).await?;
            rows.push(PolicyRow::detailed(&rule));
        } else {
            rows.push(PolicyRow::summary(summary));
        }
    }

    if csv {
        output::write_policy_csv(&rows, std::io::stdout().lock())?;
    } else {
        print!("{}", output::format_policy_table(&rows));
    }
    Ok(())
}

/// 呼叫 profile API 驗證憑證，回傳預設組織與是否為 superadmin
pub async fn auth_test(config: &AppConfig) -> Result<AuthDetails> {
    let client = ContrastClient::from_config(config)?;

    let profile = client.get_profile().await?;
    println!("✅ Authenticated to {}", config.teamserver_url);
    println!("  - Welcome {} {}!", profile.first_name, profile.last_name);
    if profile.is_superadmin() {
        println!("  - You are a superadmin and can run this tool for other organizations");
    }

    let default_org = client.get_default_org().await?;
    println!(
        "  - Your default org is '{}' ({})",
        default_org.name, default_org.organization_uuid
    );
    println!(
        "  - You {} ADMIN or RULES_ADMIN for '{}'",
        if default_org.can_edit_rules() { "have" } else { "DO NOT have" },
        default_org.name
    );

    let organizations = client.get_organizations().await?;
    println!("\nOrganizations in your profile:");
    for org in &organizations {
        println!("  {}  {}", org.organization_uuid, org.name);
    }

    Ok(AuthDetails {
        is_superadmin: profile.is_superadmin(),
        default_org_uuid: default_org.organization_uuid,
        default_org_name: default_org.name,
    })
}

#[derive(Debug, Clone)]
pub struct AuthDetails {
    pub is_superadmin: bool,
    pub default_org_uuid: String,
    pub default_org_name: String,
}

async fn auth_init(path: &Path, teamserver_url: &str, api_key: &str, auth_header: &str) -> Result<RunStatus> {
    let mut config = AppConfig::new(teamserver_url, api_key, auth_header);
    config.validate()?;

    let details = auth_test(&config).await?;
    config.is_superadmin = details.is_superadmin;
    config.set_default_profile(&details.default_org_uuid, Some(&details.default_org_name));
    config.to_file(path)?;

    tracing::info!("💾 Saved config to {}", path.display());
    println!("\nSaved your credentials to {}", path.display());
    Ok(RunStatus::Completed)
}
