mod cli;

use std::io::{Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use disagg_compute::{DisaggEngine, ThresholdMode};
use disagg_core::{DisaggConfig, PowerSample, PowerSeries};

use crate::cli::CliArgs;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();

    let config = DisaggConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    config.log_summary();

    let samples = read_samples(&args.input)?;
    let series = PowerSeries::from_samples(&samples)
        .with_context(|| format!("invalid samples in {}", args.input.display()))?;
    info!(samples = series.len(), "Loaded power series");

    let mode = match args.noise_threshold {
        Some(watts) if !watts.is_finite() || watts < 0.0 => {
            bail!("--noise-threshold must be a non-negative number of watts, got {watts}")
        }
        Some(watts) => ThresholdMode::Fixed(watts),
        None => ThresholdMode::Auto,
    };

    let engine = DisaggEngine::new(config)
        .context("invalid configuration")?
        .with_threshold_mode(mode);
    let report = engine.run(&series);

    let json = match (args.events_only, args.pretty) {
        (true, true) => serde_json::to_string_pretty(&report.events),
        (true, false) => serde_json::to_string(&report.events),
        (false, true) => serde_json::to_string_pretty(&report),
        (false, false) => serde_json::to_string(&report),
    }
    .context("failed to serialize report")?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, json + "\n")
                .with_context(|| format!("failed to write report: {}", path.display()))?;
            info!(path = %path.display(), "Report written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}").context("failed to write report to stdout")?;
        }
    }

    Ok(())
}

fn read_samples(path: &Path) -> Result<Vec<PowerSample>> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read samples from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read samples: {}", path.display()))?
    };
    serde_json::from_str(&content).with_context(|| format!("failed to parse samples: {}", path.display()))
}
