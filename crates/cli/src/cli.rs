use std::path::PathBuf;

use clap::Parser;

/// Disaggregate a whole-installation power series into appliance cycles.
///
/// Reads time-ordered `{index, active, reactive}` samples as a JSON array and
/// writes one summary per detected event as JSON.
#[derive(Parser, Debug)]
#[command(name = "disagg", version, about = "Non-intrusive load disaggregation")]
pub struct CliArgs {
    /// Samples file (JSON array); `-` reads standard input
    #[arg(long, short, env = "DISAGG_INPUT")]
    pub input: PathBuf,

    /// TOML config file; defaults apply when omitted
    #[arg(long, short, env = "DISAGG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Fixed noise threshold in watts (tuned per event when omitted)
    #[arg(long)]
    pub noise_threshold: Option<f64>,

    /// Write the report here instead of standard output
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pub pretty: bool,

    /// Only print per-event summaries, without run metrics
    #[arg(long)]
    pub events_only: bool,
}
