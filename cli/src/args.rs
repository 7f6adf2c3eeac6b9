//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "cogscreen")]
#[command(about = "Adaptive N-back working-memory engine", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// YAML file merged over the built-in defaults
    #[arg(short, long, global = true, env = "COGSCREEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Default log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one assessment against a simulated participant
    Run(RunArgs),

    /// Print a generated stimulus sequence
    Sequence(SequenceArgs),

    /// Print the effective configuration as YAML
    Config,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Seed for both the stimulus sequence and the participant
    #[arg(short, long, default_value = "1")]
    pub seed: u64,

    /// Probability that the participant answers a trial correctly
    #[arg(long, default_value = "0.9")]
    pub accuracy: f64,

    /// Fastest simulated reaction time (ms)
    #[arg(long, default_value = "350")]
    pub rt_min_ms: u64,

    /// Slowest simulated reaction time (ms)
    #[arg(long, default_value = "900")]
    pub rt_max_ms: u64,

    /// Abort after this many resolved trials (practice included)
    #[arg(long)]
    pub abort_after: Option<usize>,

    /// Drive the session on wall-clock timers instead of synthetic time
    #[arg(long)]
    pub realtime: bool,

    #[arg(short, long, value_enum, default_value = "summary")]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct SequenceArgs {
    #[arg(short, long, default_value = "15")]
    pub length: usize,

    #[arg(short, long, default_value = "2")]
    pub n_back: usize,

    /// Repeat probability; defaults to the configured value
    #[arg(short, long)]
    pub probability: Option<f64>,

    #[arg(short, long, default_value = "1")]
    pub seed: u64,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Summary record with the full result as JSON
    Json,
    /// Human-readable digest
    Summary,
    /// Backend test-item payload
    Item,
}
