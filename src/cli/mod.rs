//! AQI Forecast CLI Module
//!
//! Command-line interface for the batch pipeline and one-off AQI scoring.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::time::Instant;

use crate::aqi::{AqiScorer, Pollutant};
use crate::config::PipelineConfig;
use crate::forecast::ModelRun;
use crate::pipeline::AqiPipeline;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<22} {}", muted(key), val.white());
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "aqi-forecast")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Air-quality cleaning, daily AQI scoring and next-day AQI regression")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full batch pipeline
    Run {
        /// Hourly pollutant CSV
        #[arg(long)]
        aqi: Option<PathBuf>,

        /// 5-minute weather CSV
        #[arg(long)]
        meteo: Option<PathBuf>,

        /// Directory receiving the output tables
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// JSON configuration overriding the defaults
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Score one day's concentrations
    Score {
        /// Daily NO2 (µg/m³)
        #[arg(long)]
        no2: f64,

        /// Daily PM10 (µg/m³)
        #[arg(long)]
        pm10: f64,

        /// Daily PM2.5 (µg/m³)
        #[arg(long)]
        pm25: f64,
    },

    /// Print the default configuration as JSON
    Config,
}

// ─── Commands ──────────────────────────────────────────────────────────────────

/// Build the run configuration: file first, then command-line overrides
pub fn resolve_config(
    aqi: Option<PathBuf>,
    meteo: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    config: Option<PathBuf>,
) -> anyhow::Result<PipelineConfig> {
    let mut resolved = match config {
        Some(path) => PipelineConfig::from_json_file(&path)?,
        None => PipelineConfig::default(),
    };
    if let Some(path) = aqi {
        resolved.io.aqi_hourly_path = path;
    }
    if let Some(path) = meteo {
        resolved.io.meteo_path = path;
    }
    if let Some(dir) = output_dir {
        resolved = resolved.with_output_dir(dir);
    }
    resolved.validate()?;
    Ok(resolved)
}

pub fn cmd_run(
    aqi: Option<PathBuf>,
    meteo: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    config: Option<PathBuf>,
) -> anyhow::Result<()> {
    section("Run");

    let config = resolve_config(aqi, meteo, output_dir, config)?;
    kv("Pollutants", &config.io.aqi_hourly_path.display().to_string());
    kv("Weather", &config.io.meteo_path.display().to_string());
    kv("Output", &config.io.output_dir.display().to_string());
    println!();

    step_run("Running pipeline");
    let start = Instant::now();
    let report = AqiPipeline::new(config).run()?;
    step_done(&format!("{:?}", start.elapsed()));

    section("Cleaning");
    for imp in &report.imputation {
        let detail = match (&imp.best_params, &imp.test_metrics) {
            (Some((c, eps)), Some(m)) => {
                format!("{} filled · C={} ε={} · R² {:.4} · MSE {:.4}", imp.n_filled, c, eps, m.r2, m.mse)
            }
            (Some((c, eps)), None) => format!("{} filled · C={} ε={}", imp.n_filled, c, eps),
            _ => "nothing to fill".to_string(),
        };
        kv(&imp.target, &detail);
    }
    kv(
        "Outlier rows removed",
        &format!("{} of {}", report.outliers.rows_removed, report.outliers.rows_in),
    );
    kv("Daily rows", &format!("{} weather · {} AQI · {} merged", report.weather_days, report.aqi_days, report.merged_days));

    section("Forecast");
    print_run("With weather", &report.with_weather);
    print_run("Without weather", &report.without_weather);

    section("Artifacts");
    for path in &report.artifacts {
        step_ok(&path.display().to_string());
    }
    println!();
    Ok(())
}

fn print_run(label: &str, run: &ModelRun) {
    println!("  {}", label.cyan());
    kv("  Best parameters", &run.params.to_string());
    kv("  R²", &format!("{:.4}", run.r2));
    kv("  MSE", &format!("{:.4}", run.mse));
    kv("  Test days", &run.truth.len().to_string());
}

pub fn cmd_score(no2: f64, pm10: f64, pm25: f64) -> anyhow::Result<()> {
    section("Score");
    let scorer = AqiScorer::new();
    for (pollutant, c) in Pollutant::ALL.iter().zip([no2, pm10, pm25]) {
        kv(pollutant.name(), &format!("{:.2}", scorer.sub_index(*pollutant, c)));
    }
    println!();
    match scorer.score(no2, pm10, pm25) {
        Some(score) => {
            println!("  {:<22} {}", muted("AQI"), format!("{:.2}", score.value).white().bold());
            kv("Dominant pollutant", score.dominant.name());
        }
        None => println!("  {}", "No concentrations given".yellow()),
    }
    println!();
    Ok(())
}

pub fn cmd_config() -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&PipelineConfig::default())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "aqi-forecast", "run", "--aqi", "a.csv", "--meteo", "m.csv", "--output-dir", "out",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { aqi, meteo, output_dir, config } => {
                assert_eq!(aqi, Some(PathBuf::from("a.csv")));
                assert_eq!(meteo, Some(PathBuf::from("m.csv")));
                assert_eq!(output_dir, Some(PathBuf::from("out")));
                assert_eq!(config, None);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_flags_override_file() {
        let path = std::env::temp_dir().join("aqi_forecast_cli_config.json");
        std::fs::write(&path, r#"{ "io": { "output_dir": "from_file", "meteo_path": "w.csv" } }"#).unwrap();
        let config = resolve_config(None, None, Some(PathBuf::from("from_flag")), Some(path.clone())).unwrap();
        assert_eq!(config.io.output_dir, PathBuf::from("from_flag"));
        assert_eq!(config.io.meteo_path, PathBuf::from("w.csv"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_score_requires_all_pollutants() {
        assert!(Cli::try_parse_from(["aqi-forecast", "score", "--no2", "10"]).is_err());
    }
}
