//! Command line arguments.

use crate::app::RunOptions;
use chrono::NaiveDate;
use clap::Parser;
use ny511_config::Config;
use std::path::PathBuf;

/// Render the 511 NY event dashboard for a date range.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path (YAML or TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level, overrides the configuration file
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// First day of the range (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last day of the range, inclusive (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Directory for the datasets and images
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Only write the JSON datasets
    #[arg(long)]
    pub no_charts: bool,
}

impl Args {
    /// Run options from the configuration with these flags applied on top.
    pub fn run_options(&self, config: &Config) -> RunOptions {
        let mut options = RunOptions::from_config(config);
        options.start = self.start;
        options.end = self.end;
        if let Some(output) = &self.output {
            options.output_dir = output.clone();
        }
        options.render_charts = !self.no_charts;
        options
    }
}
