use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "jma-backfill")]
#[command(about = "Backfill daily JMA station temperatures into per-year CSV files")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(
        short,
        long,
        global = true,
        help = "Configuration file (TOML, YAML or JSON)"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch every station from the current year back to the cutoff year
    Backfill {
        #[arg(short, long, help = "Output directory [default: csv]")]
        output_dir: Option<PathBuf>,

        #[arg(long, help = "Station table CSV (name,region_code,station_code)")]
        stations_file: Option<PathBuf>,

        #[arg(short, long = "station", help = "Limit to these stations (repeatable)")]
        stations: Vec<String>,

        #[arg(long, help = "Most recent year to fetch [default: this year]")]
        current_year: Option<i32>,

        #[arg(long, help = "Oldest year to fetch [default: 1872]")]
        cutoff_year: Option<i32>,

        #[arg(long, help = "Concurrent station-years in flight")]
        max_workers: Option<usize>,

        #[arg(long, default_value = "false", help = "Persist years with failed months")]
        allow_incomplete: bool,

        #[arg(long, default_value = "false", help = "Re-fetch the current year even if present")]
        refresh_current: bool,

        #[arg(long, default_value = "false", help = "Remove lock files left by a crashed run")]
        clear_locks: bool,

        #[arg(long, help = "Write the run report as JSON to this path")]
        report_json: Option<PathBuf>,

        #[arg(long, default_value = "false", help = "Disable the progress bar")]
        quiet: bool,
    },

    /// List the configured stations
    Stations {
        #[arg(long, help = "Station table CSV (name,region_code,station_code)")]
        stations_file: Option<PathBuf>,
    },

    /// Summarise the persisted daily series of a station
    Series {
        #[arg(short, long)]
        station: String,

        #[arg(short, long, help = "Output directory [default: csv]")]
        output_dir: Option<PathBuf>,
    },
}
