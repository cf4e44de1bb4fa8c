use std::{fs, path::PathBuf};

use anyhow::Result;
use clap::Args;
use tree2arrow::{
    Importer,
    arrow::MemoryStore,
    core::{format_field_defs, read_tree},
};

#[derive(Args)]
pub struct SchemaArgs {
    /// Path to the tree file
    source: PathBuf,

    /// Name of the tree
    #[arg(short, long)]
    tree: String,

    /// Output file path (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl SchemaArgs {
    pub fn run(self) -> Result<()> {
        let tree = read_tree(&self.source, &self.tree)?;
        let classes = tree.classes().to_vec();

        let mut importer = Importer::from_tree(Box::new(tree), Box::new(MemoryStore::new()));
        importer.set_quiet(true);
        importer.registry_mut().register_classes(classes);
        importer.prepare_schema()?;

        let Some(fields) = importer.schema() else {
            anyhow::bail!("no schema prepared for tree '{}'", self.tree);
        };
        let text = format_field_defs(&fields)?;

        match self.output {
            Some(path) => fs::write(path, format!("{text}\n"))?,
            None => println!("{text}"),
        }
        Ok(())
    }
}
