use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "vcl",
    about = "VCL -- class loading from virtual file systems",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Registry configuration (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

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
    /// Build an archive from a directory tree
    Pack(PackArgs),
    /// List a directory of a store
    Ls(LsArgs),
    /// Print the content of a file
    Cat(CatArgs),
    /// Load a class through a loader over the given roots
    Load(LoadArgs),
    /// Load one class from many loaders and threads at once
    Stress(StressArgs),
}

#[derive(Args)]
pub struct PackArgs {
    pub dir: PathBuf,
    pub out: PathBuf,
    /// Store entries without compression
    #[arg(long)]
    pub store: bool,
    /// zstd compression level
    #[arg(long, default_value = "3")]
    pub level: i32,
}

#[derive(Args)]
pub struct LsArgs {
    pub uri: String,
}

#[derive(Args)]
pub struct CatArgs {
    pub uri: String,
}

#[derive(Args)]
pub struct LoadArgs {
    /// Root directory URI; repeat to search several roots in order
    #[arg(long = "root", required = true)]
    pub roots: Vec<String>,
    pub class: String,
    /// Fail unless the class bytes hash to this BLAKE3 digest (hex)
    #[arg(long)]
    pub expect_digest: Option<String>,
}

#[derive(Args)]
pub struct StressArgs {
    #[arg(long)]
    pub root: String,
    #[arg(long)]
    pub class: String,
    #[arg(long, default_value = "3")]
    pub loaders: usize,
    #[arg(long, default_value = "2")]
    pub threads: usize,
    /// Loads per loader in each run
    #[arg(long, default_value = "3")]
    pub rounds: usize,
    /// Runs, each with a fresh registry
    #[arg(long, default_value = "5")]
    pub repeat: usize,
}
