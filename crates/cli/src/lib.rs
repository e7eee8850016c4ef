pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "courtside",
    about = "Courtside operator CLI",
    long_about = "Operate the Courtside booking service: migrations, demo catalog, config inspection, readiness checks and local conversations.",
    after_help = "Examples:\n  courtside doctor --json\n  courtside seed\n  courtside chat --phone +5551999990000 reservar futsal amanhã 19h"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Insert the demo court catalog; courts already present are left untouched")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, WhatsApp and LLM readiness, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run one conversation turn against the configured database")]
    Chat {
        #[arg(long, help = "Sender phone number, e.g. +5551999990000")]
        phone: String,
        #[arg(required = true, num_args = 1.., help = "Message text")]
        text: Vec<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Chat { phone, text } => commands::chat::run(&phone, &text.join(" ")),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
