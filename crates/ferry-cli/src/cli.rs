use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ferry",
    about = "Resumable chunked uploads with content dedup",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the ferry HTTP server
    Serve(ServeArgs),
    /// Upload a local file in parts through a local coordinator
    Upload(UploadArgs),
    /// Look up a previously assembled upload
    Lookup(LookupArgs),
    /// Print the effective configuration
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Override `server.bind_addr`
    #[arg(long)]
    pub bind: Option<String>,
}

#[derive(Args)]
pub struct UploadArgs {
    /// File to upload
    pub file: PathBuf,
    /// Target bucket
    #[arg(short, long)]
    pub bucket: String,
    /// Object name (defaults to the file name)
    #[arg(short, long)]
    pub name: Option<String>,
    /// Part size in bytes
    #[arg(long, default_value_t = 5 * 1024 * 1024)]
    pub part_size: u64,
    /// Create the bucket if it does not exist
    #[arg(long)]
    pub create_bucket: bool,
    /// Data directory holding objects and metadata
    #[arg(long, default_value = "./data")]
    pub root: PathBuf,
}

#[derive(Args)]
pub struct LookupArgs {
    /// Content identifier (hex digest)
    #[arg(required_unless_present = "bucket")]
    pub identifier: Option<String>,
    /// Look up by location instead: bucket
    #[arg(short, long, requires = "name", conflicts_with = "identifier")]
    pub bucket: Option<String>,
    /// Look up by location instead: object name
    #[arg(short, long, requires = "bucket")]
    pub name: Option<String>,
    /// Data directory holding objects and metadata
    #[arg(long, default_value = "./data")]
    pub root: PathBuf,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Config file to validate and print; defaults are printed without one
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
