pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use specwright_core::config::{AppConfig, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "specwright",
    about = "Specwright requirement resolution CLI",
    long_about = "Resolve credit-risk modeling requirements into a machine-readable contract, and inspect the schema registry and runtime configuration.",
    after_help = "Examples:\n  specwright schemas\n  specwright interview --model-type PD --portfolio Retail --purpose AIRB\n  specwright interview --resume <session-id>\n  specwright doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Explicit path to a specwright.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "List the registered requirement schema configurations")]
    Schemas {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run a line-oriented requirements interview and write the final contract")]
    Interview(commands::interview::InterviewArgs),
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, registry loading and output directory readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions { config_path: cli.config, ..LoadOptions::default() };

    let result = match cli.command {
        Command::Schemas { json } => commands::schemas::run(&options, json),
        Command::Interview(args) => {
            if let Ok(config) = AppConfig::load(options.clone()) {
                init_logging(&config);
            }
            commands::interview::run(&options, &args)
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(&options) }
        }
        Command::Doctor { json } => commands::doctor::run(&options, json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout stays reserved for command output.
pub fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    // A subscriber may already be installed when embedded in tests.
    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
