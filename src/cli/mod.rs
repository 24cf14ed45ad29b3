use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "navgate")]
#[command(about = "Per-navigation access control - site filtering with schedules and temporary overrides")]
#[command(version)]
pub struct Cli {
    /// Path to settings file
    #[arg(short, long, default_value = "navgate.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the engine with the HTTP control API
    Start {
        /// Address for the control API to listen on
        #[arg(long, default_value = "127.0.0.1:8799")]
        listen: String,
    },
    /// Evaluate a single URL against the current settings
    Check {
        /// URL to evaluate
        url: String,
    },
    /// Show the current settings
    Show,
    /// View the decision log
    Logs {
        /// Show last N entries
        #[arg(long, default_value = "50")]
        tail: usize,
        /// Export the full log
        #[arg(long)]
        export: bool,
        /// Export format (json or csv)
        #[arg(long, default_value = "json")]
        format: String,
    },
    /// Initialize the settings file and decision database
    Init,
}
