use crate::config::app_config::DEFAULT_TEAMSERVER_URL;
use crate::domain::model::Provider;
use clap::{Args, Parser, Subcommand};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "contrast-integrations")]
#[command(version, about = "Add learning-platform guidance to Contrast policy rules")]
pub struct Cli {
    /// 設定檔路徑，預設讀取 $CONTRAST_INTEGRATIONS_CONFIG 或使用者設定目錄
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage authentication with the Contrast API
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
    /// Show the current customizations of a rule
    GetRule { rule_name: String },
    /// Set a rule's recommendation and/or risk text
    UpdateRule {
        rule_name: String,
        #[arg(long)]
        recommendation: Option<String>,
        #[arg(long)]
        risk: Option<String>,
        #[command(flatten)]
        confirm: Confirm,
    },
    /// List the rules in the organization policy
    ListOrgPolicy {
        #[arg(long, help = "Fetch every rule and show which customizations are set")]
        details: bool,
        #[arg(long, help = "Write CSV to stdout")]
        csv: bool,
    },
    /// Reset a rule back to its default guidance
    ResetRule {
        rule_name: String,
        #[command(flatten)]
        confirm: Confirm,
    },
    /// Reset every rule in the policy back to its default guidance
    ResetAllRules {
        #[command(flatten)]
        confirm: Confirm,
    },
    /// Secure Code Warrior integration
    #[command(name = "secure-code-warrior", alias = "scw")]
    SecureCodeWarrior {
        #[command(subcommand)]
        command: ProviderCommand,
    },
    /// Secure Flag integration
    SecureFlag {
        #[command(subcommand)]
        command: ProviderCommand,
    },
}

impl Command {
    pub fn provider(&self) -> Option<(Provider, &ProviderCommand)> {
        match self {
            Command::SecureCodeWarrior { command } => Some((Provider::SecureCodeWarrior, command)),
            Command::SecureFlag { command } => Some((Provider::SecureFlag, command)),
            _ => None,
        }
    }

    /// 只含指令名稱，可安全寫入日誌
    pub fn name(&self) -> &'static str {
        match self {
            Command::Auth {
                command: AuthCommand::Init { .. },
            } => "auth init",
            Command::Auth {
                command: AuthCommand::Test,
            } => "auth test",
            Command::GetRule { .. } => "get-rule",
            Command::UpdateRule { .. } => "update-rule",
            Command::ListOrgPolicy { .. } => "list-org-policy",
            Command::ResetRule { .. } => "reset-rule",
            Command::ResetAllRules { .. } => "reset-all-rules",
            Command::SecureCodeWarrior { command } | Command::SecureFlag { command } => {
                command.name()
            }
        }
    }
}

#[derive(Subcommand)]
pub enum AuthCommand {
    /// Save credentials to the config file and test them
    Init {
        #[arg(long, help = "Your Contrast user API key")]
        api_key: String,
        #[arg(long, help = "Your Contrast user Authorization header")]
        auth_header: String,
        #[arg(long, default_value = DEFAULT_TEAMSERVER_URL)]
        teamserver_url: String,
    },
    /// Test the saved credentials against the Contrast API
    Test,
}

// 憑證不可出現在 debug 輸出
impl fmt::Debug for AuthCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthCommand::Init { teamserver_url, .. } => f
                .debug_struct("Init")
                .field("api_key", &"<redacted>")
                .field("auth_header", &"<redacted>")
                .field("teamserver_url", teamserver_url)
                .finish(),
            AuthCommand::Test => f.write_str("Test"),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum ProviderCommand {
    /// Add or refresh the integration block on one rule
    EnableForRule {
        rule_name: String,
        #[command(flatten)]
        options: EnableArgs,
    },
    /// Add or refresh the integration block on every rule
    EnableForAll {
        #[command(flatten)]
        options: EnableArgs,
    },
    /// Remove the integration block from one rule
    RemoveForRule {
        rule_name: String,
        #[command(flatten)]
        confirm: Confirm,
    },
    /// Remove the integration block from every rule
    RemoveForAll {
        #[command(flatten)]
        confirm: Confirm,
    },
}

impl ProviderCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ProviderCommand::EnableForRule { .. } => "enable-for-rule",
            ProviderCommand::EnableForAll { .. } => "enable-for-all",
            ProviderCommand::RemoveForRule { .. } => "remove-for-rule",
            ProviderCommand::RemoveForAll { .. } => "remove-for-all",
        }
    }
}

#[derive(Debug, Clone, Copy, Args)]
pub struct EnableArgs {
    #[arg(long, help = "Also add the platform's language-agnostic reference links")]
    pub with_references: bool,
    #[command(flatten)]
    pub confirm: Confirm,
}

#[derive(Debug, Clone, Copy, Args)]
pub struct Confirm {
    #[arg(long, help = "Skip the confirmation prompt")]
    pub confirm: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_command() {
        let cli = Cli::try_parse_from([
            "contrast-integrations",
            "scw",
            "enable-for-rule",
            "sql-injection",
            "--with-references",
            "--confirm",
        ])
        .unwrap();

        let (provider, command) = cli.command.provider().unwrap();
        assert_eq!(provider, Provider::SecureCodeWarrior);
        match command {
            ProviderCommand::EnableForRule { rule_name, options } => {
                assert_eq!(rule_name, "sql-injection");
                assert!(options.with_references);
                assert!(options.confirm.confirm);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "contrast-integrations",
            "list-org-policy",
            "--csv",
            "-v",
            "--config",
            "/tmp/c.toml",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        assert!(matches!(cli.command, Command::ListOrgPolicy { csv: true, details: false }));
    }

    #[test]
    fn test_auth_init_defaults_teamserver_url() {
        let cli = Cli::try_parse_from([
            "contrast-integrations",
            "auth",
            "init",
            "--api-key",
            "key",
            "--auth-header",
            "header",
        ])
        .unwrap();

        match cli.command {
            Command::Auth {
                command: AuthCommand::Init { teamserver_url, .. },
            } => assert_eq!(teamserver_url, DEFAULT_TEAMSERVER_URL),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_auth_init_credentials_stay_out_of_debug_output() {
        let cli = Cli::try_parse_from([
            "contrast-integrations",
            "auth",
            "init",
            "--api-key",
            "super-secret-key",
            "--auth-header",
            "c2VjcmV0OmhlYWRlcg==",
        ])
        .unwrap();

        let debug = format!("{:?}", cli);
        assert!(!debug.contains("super-secret-key"));
        assert!(!debug.contains("c2VjcmV0OmhlYWRlcg=="));
        assert!(debug.contains("<redacted>"));
        assert_eq!(cli.command.name(), "auth init");
    }

    #[test]
    fn test_provider_command_name() {
        let cli = Cli::try_parse_from(["contrast-integrations", "secure-flag", "remove-for-all"]).unwrap();
        assert_eq!(cli.command.name(), "remove-for-all");
    }

    #[test]
    fn test_command_tree_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
