//! CLI parse: clap types for Layover. No behavior; definitions only.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Layover CLI - manage the overlays composited on a live stream
#[derive(Parser, Debug)]
#[command(name = "layover")]
#[command(about = "Manage and watch live-stream overlays")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Overlay store base URL (overrides configuration)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Enable verbose logging
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the overlays on a stream
    List {
        stream: String,
        /// Output format
        #[arg(long, value_enum, default_value_t = ListFormat::Table)]
        format: ListFormat,
    },
    /// Add a text overlay
    AddText {
        stream: String,
        text: String,
        #[arg(long)]
        x: Option<i32>,
        #[arg(long)]
        y: Option<i32>,
        #[arg(long)]
        width: Option<i32>,
        #[arg(long)]
        height: Option<i32>,
    },
    /// Add an image overlay
    AddImage {
        stream: String,
        url: String,
        #[arg(long)]
        x: Option<i32>,
        #[arg(long)]
        y: Option<i32>,
        #[arg(long)]
        width: Option<i32>,
        #[arg(long)]
        height: Option<i32>,
    },
    /// Move an overlay
    Move {
        id: String,
        #[arg(allow_negative_numbers = true)]
        x: i32,
        #[arg(allow_negative_numbers = true)]
        y: i32,
    },
    /// Resize an overlay, optionally moving it as well
    Resize {
        id: String,
        width: i32,
        height: i32,
        /// New left edge; requires --y
        #[arg(long, allow_negative_numbers = true, requires = "y")]
        x: Option<i32>,
        /// New top edge; requires --x
        #[arg(long, allow_negative_numbers = true, requires = "x")]
        y: Option<i32>,
    },
    /// Replace an overlay's text or image URL
    Edit { id: String, content: String },
    /// Delete an overlay
    Delete { id: String },
    /// Follow a stream's overlays and print the draw list when it changes
    Watch {
        stream: String,
        /// Surface width in pixels
        #[arg(long, default_value = "1280")]
        width: u32,
        /// Surface height in pixels
        #[arg(long, default_value = "720")]
        height: u32,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    Table,
    Json,
}
