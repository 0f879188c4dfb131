use clap::Parser;
use contrast_integrations::app::commands::{self, RunStatus};
use contrast_integrations::config::cli::Cli;
use contrast_integrations::utils::error::ErrorSeverity;
use contrast_integrations::utils::logger;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::debug!("Running '{}' (config: {:?})", cli.command.name(), cli.config);

    match commands::run(&cli).await {
        Ok(RunStatus::Completed) | Ok(RunStatus::Aborted) => {}
        Ok(RunStatus::Partial) => {
            tracing::warn!("⚠️ Some rules could not be updated, see the report above");
            std::process::exit(2);
        }
        Err(e) => {
            tracing::error!(
                "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }
}
