pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "voicepay",
    about = "Voicepay operator CLI",
    long_about = "Inspect configuration, check the account store, prepare demo data, and print the agent descriptor.",
    after_help = "Examples:\n  voicepay doctor --json\n  voicepay config\n  voicepay descriptor"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Create the customer table on a scratch or development database")]
    Migrate,
    #[command(about = "Load the demo customer accounts (idempotent)")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution"
    )]
    Config,
    #[command(about = "Validate config, database connectivity, and customer table presence")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Print the agent descriptor document served at /ai")]
    Descriptor,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Descriptor => commands::descriptor::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
