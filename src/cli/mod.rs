//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quantfolio")]
#[command(author, version, about = "Systematic multi-asset strategy pipeline")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Log level
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a backtest
    Backtest(BacktestArgs),
    /// Run all allocation methods over the same data in parallel
    Compare(CompareArgs),
    /// Print the latest signal table
    Signals(SignalsArgs),
    /// List available allocation methods
    Methods,
    /// Validate configuration
    ValidateConfig,
}

#[derive(clap::Args)]
pub struct BacktestArgs {
    /// Symbols to trade (comma-separated)
    #[arg(short = 'S', long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Directory of {SYMBOL}.csv price files
    #[arg(long)]
    pub data: PathBuf,

    /// Allocation method override (hrp, mean_variance, risk_parity)
    #[arg(short, long)]
    pub method: Option<String>,

    /// Number of strategy variations tried, for deflated-Sharpe validation
    #[arg(long, default_value = "1")]
    pub trials: usize,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub output: String,

    /// Save the result JSON to a file
    #[arg(long)]
    pub save: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct CompareArgs {
    /// Symbols to trade (comma-separated)
    #[arg(short = 'S', long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Directory of {SYMBOL}.csv price files
    #[arg(long)]
    pub data: PathBuf,
}

#[derive(clap::Args)]
pub struct SignalsArgs {
    /// Symbols to score (comma-separated)
    #[arg(short = 'S', long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Directory of {SYMBOL}.csv price files
    #[arg(long)]
    pub data: PathBuf,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    pub output: String,
}
