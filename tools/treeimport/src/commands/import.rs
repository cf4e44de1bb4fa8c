use std::{io::IsTerminal, path::PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tree2arrow::{
    Importer, ProgressObserver,
    arrow::{DEFAULT_CLUSTER_SIZE, WriteOptions},
};

use crate::compression::CompressionArg;

#[derive(Args)]
pub struct ImportArgs {
    /// Path to the tree file
    source: PathBuf,

    /// Name of the tree to import
    #[arg(short, long)]
    tree: String,

    /// Directory receiving the Parquet dataset
    dest_dir: PathBuf,

    /// Dataset name (defaults to the tree name)
    #[arg(long)]
    name: Option<String>,

    /// Import at most this many entries
    #[arg(short = 'n', long)]
    max_entries: Option<u64>,

    /// Suppress the schema report and progress output
    #[arg(short, long)]
    quiet: bool,

    /// Parquet compression codec
    #[arg(long, value_enum, default_value_t = CompressionArg::Zstd)]
    compression: CompressionArg,

    /// Rows per row group
    #[arg(long, default_value_t = DEFAULT_CLUSTER_SIZE)]
    cluster_size: usize,
}

impl ImportArgs {
    pub fn run(self) -> Result<()> {
        let mut importer = Importer::create(&self.source, &self.tree, &self.dest_dir)
            .with_context(|| format!("failed to open tree '{}'", self.tree))?;
        importer.set_quiet(self.quiet);
        importer.set_write_options(
            WriteOptions::default()
                .with_compression(self.compression.to_compression())
                .with_cluster_size(self.cluster_size),
        );
        if let Some(max) = self.max_entries {
            importer.set_max_entries(max);
        }
        if let Some(name) = self.name {
            importer.set_dataset_name(name);
        }

        // Without a terminal the importer keeps its line-based reporter.
        if draws_bar(self.quiet, std::io::stderr().is_terminal()) {
            let pb = ProgressBar::new(importer.entry_count());
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, ETA: {eta})",
                )?
                .progress_chars("=>-"),
            );
            importer.set_progress_observer(Box::new(BarProgress(pb)));
        }

        let summary = importer
            .import()
            .with_context(|| format!("failed to import tree '{}'", self.tree))?;
        tracing::info!(
            "Done, wrote {}MB, {} entries to {}",
            summary.bytes_written / 1000 / 1000,
            summary.rows,
            self.dest_dir.display()
        );
        Ok(())
    }
}

fn draws_bar(quiet: bool, stderr_is_terminal: bool) -> bool {
    !quiet && stderr_is_terminal
}

struct BarProgress(ProgressBar);

impl ProgressObserver for BarProgress {
    fn on_progress(&mut self, _bytes: u64, rows: u64) {
        self.0.set_position(rows);
    }

    fn on_finish(&mut self, _bytes: u64, rows: u64) {
        self.0.set_position(rows);
        self.0.finish_with_message("done");
    }
}
