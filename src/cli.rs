use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::report::ExitPolicy;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcribe and translate every video under the root, skipping finished work
    Run {
        /// Root directory scanned recursively for videos
        #[arg(short, long, env = "SUBSWEEP_ROOT")]
        root: Option<PathBuf>,

        /// Target language code for translated subtitles
        #[arg(short, long, env = "TARGET_LANGUAGE")]
        target_lang: Option<String>,

        /// When to exit with a non-zero status after the batch
        #[arg(long, value_enum)]
        exit_policy: Option<ExitPolicy>,

        /// Write the batch report as JSON to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show what a run would do for every video without loading any model
    Plan {
        /// Root directory scanned recursively for videos
        #[arg(short, long, env = "SUBSWEEP_ROOT")]
        root: Option<PathBuf>,

        /// Target language code for translated subtitles
        #[arg(short, long, env = "TARGET_LANGUAGE")]
        target_lang: Option<String>,
    },

    /// Transcribe a single video to a subtitle file
    Transcribe {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Output subtitle file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Translate a single subtitle file
    Translate {
        /// Input subtitle file
        #[arg(short, long)]
        input: PathBuf,

        /// Output subtitle file
        #[arg(short, long)]
        output: PathBuf,

        /// Target language code
        #[arg(short, long, env = "TARGET_LANGUAGE")]
        target_lang: Option<String>,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Destination of the configuration file
        #[arg(short, long, default_value = "subsweep.toml")]
        output: PathBuf,
    },
}
