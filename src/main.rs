//! AQI Forecast - Main Entry Point

use aqi_forecast::cli::{cmd_config, cmd_run, cmd_score, Cli, Commands};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aqi_forecast=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { aqi, meteo, output_dir, config } => {
            cmd_run(aqi, meteo, output_dir, config)?;
        }
        Commands::Score { no2, pm10, pm25 } => {
            cmd_score(no2, pm10, pm25)?;
        }
        Commands::Config => {
            cmd_config()?;
        }
    }

    Ok(())
}
