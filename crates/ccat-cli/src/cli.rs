use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ccat",
    about = "Build and query compact content catalogs",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Store configuration (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build a catalog from a JSON manifest
    Build(BuildArgs),
    /// Show catalog metadata
    Inspect(InspectArgs),
    /// List every lookup key
    Keys(KeysArgs),
    /// Resolve a key to its locations
    Locate(LocateArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    pub manifest: PathBuf,
    #[arg(short, long)]
    pub output: PathBuf,
    /// Store the blob zstd-compressed
    #[arg(long)]
    pub compress: bool,
}

#[derive(Args)]
pub struct InspectArgs {
    pub file: PathBuf,
}

#[derive(Args)]
pub struct KeysArgs {
    pub file: PathBuf,
}

#[derive(Args)]
pub struct LocateArgs {
    pub file: PathBuf,
    pub key: String,
}
