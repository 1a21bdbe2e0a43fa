//! Apriori CLI - a Go module proxy with special care for pre-existing modules.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod generate;
mod serve;

#[derive(Parser)]
#[command(name = "apriori")]
#[command(version)]
#[command(about = "A go proxy with special care for pre-existing modules", long_about = None)]
struct Cli {
    /// Upstream goproxy used to fetch modules
    #[arg(
        long,
        global = true,
        env = "GOPROXY",
        default_value = "https://proxy.golang.org"
    )]
    goproxy: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate apriori data for given modules
    Generate {
        /// Modules list source (defaults to stdin)
        #[arg(long)]
        source: Option<PathBuf>,

        /// File to save apriori info to (defaults to stdout)
        #[arg(long)]
        dest: Option<PathBuf>,

        /// Directory to save go.mod files in
        #[arg(long = "gomod-dir")]
        gomod_dir: PathBuf,

        /// Directory to save source archives in
        #[arg(long = "source-dir")]
        source_dir: PathBuf,

        /// Download dependencies as well
        #[arg(short, long)]
        recursive: bool,
    },

    /// Serve a go module proxy from a given apriori file
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0:7979")]
        listen: String,

        /// File to read apriori info from
        #[arg(long)]
        apriori: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Generate {
            source,
            dest,
            gomod_dir,
            source_dir,
            recursive,
        } => generate::run(&generate::GenerateOptions {
            goproxy: cli.goproxy,
            source,
            dest,
            gomod_dir,
            source_dir,
            recursive,
        }),
        Commands::Serve { listen, apriori } => serve::run(&serve::ServeOptions {
            goproxy: cli.goproxy,
            listen,
            apriori,
        }),
    }
}
