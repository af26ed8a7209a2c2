use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "audiopress", version, about = "Batch audio conversion and tagging")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Run(RunArgs),
    Inspect(InspectArgs),
    /// List the recognized file extensions and target codecs.
    Formats,
}

#[derive(Parser, Debug, Clone, Default)]
pub struct RunArgs {
    /// Root directory to scan; may be given multiple times.
    #[arg(long = "root", env = "INPUT_DIR")]
    pub roots: Vec<PathBuf>,
    /// Target bitrate in kbps.
    #[arg(long, env = "BITRATE")]
    pub bitrate: Option<u32>,
    /// Endpoint for the end-of-run summary.
    #[arg(long, env = "WEBHOOK_URL")]
    pub webhook: Option<String>,
    /// Worker threads; defaults to the number of cores.
    #[arg(long)]
    pub jobs: Option<usize>,
}

#[derive(Parser, Debug, Clone)]
pub struct InspectArgs {
    #[arg(long)]
    pub input: PathBuf,
}
