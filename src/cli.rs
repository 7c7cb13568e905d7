use std::{path::PathBuf, time::Duration};

use bambu_status::ClassifiedStatus;
use clap::{Parser, Subcommand};

// ///////////// //
// CLI interface //
// ///////////// //

/// bambu-status - Asks a Bambu Lab printer over MQTT how its current print job is doing.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Settings file, merged below BAMBU_* environment variables.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// How long to wait for a report, e.g. "10s". Overrides session.timeout.
    #[arg(short, long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Fetches the status once and prints it.
    Status,
    /// Dumps the raw printer report to stdout.
    Dump,
    /// Keeps polling on the configured schedule.
    Watch,
}

pub fn render_title(status: &ClassifiedStatus) -> String {
    match status {
        ClassifiedStatus::Done => format!("3D ✅ {status}"),
        ClassifiedStatus::Remaining { .. } => format!("3D ⏳ {status}"),
        ClassifiedStatus::Unknown => format!("3D ❓ {status}"),
    }
}
