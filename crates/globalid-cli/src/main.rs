#![doc = include_str!("../README.md")]

mod cli;

use clap::Parser;
use cli::commands;
use cli::config::{CliArgs, Command, DecodeConfig, GenerateConfig};
use cli::telemetry::init_telemetry;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();

    init_telemetry()?;

    match args.command {
        Command::Generate(args) => {
            let config = GenerateConfig::try_from(args)?;
            log_startup_info(&config);
            commands::generate(&config)
        }
        Command::Decode(args) => {
            let config = DecodeConfig::try_from(args)?;
            commands::decode(&config)
        }
    }
}

fn log_startup_info(config: &GenerateConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Generating IDs with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Generating {} IDs for node {} on {} threads",
            config.count,
            config.node_id,
            config.threads
        );
    }
}
