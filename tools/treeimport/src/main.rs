mod commands;
mod compression;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{import::ImportArgs, schema::SchemaArgs};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "treeimport", about = "Import trees from tree files into Parquet datasets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import one tree into <dest-dir>/<tree>.parquet
    Import(ImportArgs),
    /// Print the destination schema derived for a tree
    Schema(SchemaArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Import(args) => args.run(),
        Commands::Schema(args) => args.run(),
    }
}
