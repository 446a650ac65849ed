use clap::Parser;
use console::style;
use repeat_viewer::browser::resolve_browser;
use repeat_viewer::commands::{cleanup, run, Cli, Commands};
use repeat_viewer::config::UserDefaults;
use repeat_viewer::logging::init_logger;
use repeat_viewer::{ConfigError, StopReason};
use std::process::ExitCode;

const EXIT_FAILED: u8 = 1;
const EXIT_INVALID_CONFIG: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logger(cli.log_level.as_deref(), cli.log_file.clone()) {
        eprintln!("Failed to initialise logging: {}", err);
    }

    match main_impl(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {:#}", style("error:").red().bold(), err);
            ExitCode::from(EXIT_FAILED)
        }
    }
}

async fn main_impl(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Run(args) => {
            let request = args.to_request(&UserDefaults::load());
            let settings = match request.validate() {
                Ok(settings) => settings,
                Err(err) => return Ok(invalid(&err)),
            };
            tracing::debug!(?settings, "starting run");

            match run::execute(settings, args.json).await? {
                StopReason::Completed | StopReason::Cancelled => Ok(ExitCode::SUCCESS),
                StopReason::Failed => Ok(ExitCode::from(EXIT_FAILED)),
            }
        }
        Commands::DetectBrowser { browser } => match resolve_browser(browser.as_deref()) {
            Ok(path) => {
                println!("{}", path.display());
                Ok(ExitCode::SUCCESS)
            }
            Err(err) => Ok(invalid(&err)),
        },
        Commands::Cleanup { browser } => {
            let report = cleanup::execute(browser.as_deref()).await?;
            println!(
                "Stopped {} incognito process(es)",
                report.targeted.len().saturating_sub(report.unreached.len())
            );
            if report.unreached.is_empty() {
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!(
                    "{} still running: {:?}",
                    style("warning:").yellow(),
                    report.unreached
                );
                Ok(ExitCode::from(EXIT_FAILED))
            }
        }
    }
}

fn invalid(err: &ConfigError) -> ExitCode {
    eprintln!("{} {}", style("invalid input:").red().bold(), err);
    ExitCode::from(EXIT_INVALID_CONFIG)
}
