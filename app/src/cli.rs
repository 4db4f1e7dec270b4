//! Command-line interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Record pointer gestures and replay them with jitter.
#[derive(Parser, Debug)]
#[command(name = "autotouch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Scripts directory (defaults to the app data directory)
    #[arg(long, global = true)]
    pub scripts_dir: Option<PathBuf>,

    /// Settings file (defaults to the app data directory)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List stored scripts
    List {
        /// Only scripts with their shortcut enabled
        #[arg(short, long)]
        enabled: bool,
    },

    /// Record gestures into a new script
    Record {
        /// Recording length in seconds
        #[arg(short, long, default_value = "30")]
        seconds: u64,

        /// Script name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Play a stored script
    Play {
        /// Script id
        id: String,

        /// Stop after this many seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Log strokes instead of injecting them
        #[arg(long)]
        dry_run: bool,
    },

    /// Show or change global randomization settings
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },

    /// Show or hide a script's shortcut
    Enable {
        id: String,
        #[arg(long)]
        off: bool,
    },

    /// Delete a stored script
    Delete { id: String },

    /// Print a script as YAML
    Export { id: String },

    /// Import a script from a YAML file
    Import { file: PathBuf },
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Print current settings
    Show,

    /// Update one or more settings
    Set {
        #[arg(long)]
        randomization: Option<bool>,
        #[arg(long)]
        offset_radius: Option<u32>,
        #[arg(long)]
        duration_variance: Option<u64>,
        #[arg(long)]
        delay_variance: Option<u64>,
    },
}
