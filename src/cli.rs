use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "autoaccept",
    version,
    about = "Watches for the Dota 2 match-ready dialog and accepts it."
)]
pub struct Args {
    /// Settings file (created with defaults when missing)
    #[arg(long, env = "AUTOACCEPT_CONFIG", default_value = "config.json")]
    pub config: PathBuf,

    /// Directory holding the reference images and the alert sound
    #[arg(long, env = "AUTOACCEPT_ASSETS", default_value = "bin")]
    pub assets: PathBuf,

    /// Override the detection threshold for this run only
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Watch this monitor (1-based) instead of following the game window
    #[arg(long, short = 'm')]
    pub monitor: Option<u32>,

    #[command(subcommand)]
    pub cmd: Option<Cmd>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Cmd {
    /// Start detection and wait for a match, a halt screen or Ctrl-C (default)
    Run,

    /// List monitors and show which one hosts the game window
    Monitors,

    /// Bring the game window to the foreground once
    Focus,

    /// Play the match-found alert on the configured device
    TestSound,

    /// Score a saved screenshot against every reference pattern
    Classify {
        /// Image file to classify
        image: PathBuf,
    },
}
