//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::convert::ConvertArgs;
use crate::commands::inspect::InspectArgs;

/// Live-stream chat to subtitle converter.
///
/// Reads the XML chat log written by a stream recorder and emits an ASS
/// subtitle track that replays the chat alongside the recorded video.
#[derive(Debug, Parser)]
#[command(name = "dmass", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Convert a session log into an ASS subtitle file.
    Convert(ConvertArgs),

    /// Summarise a session log, including gifts.
    Inspect(InspectArgs),
}
