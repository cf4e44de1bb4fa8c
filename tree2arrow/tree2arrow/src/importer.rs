//! Streaming tree importer.

use std::path::{Path, PathBuf};

use tree2arrow_arrow::{
    DestinationStore, ParquetStore, RowWriter, WriteOptions, WriteSummary,
};
use tree2arrow_core::{FieldDefs, SourceTree, TypeRegistry, read_tree};

use crate::{
    buffers::{BranchBuffers, EntryValues, ImportField},
    error::{ImportError, TransformError},
    mapper::{ImportPlan, map_schema},
    progress::{DefaultProgress, ProgressObserver},
    transform::Transformation,
    walker::classify_branches,
};

/// Lifecycle of an [`Importer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    Idle,
    SchemaPrepared,
    Writing,
    Finished,
    Failed,
}

/// Settings of an import run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Import at most this many entries.
    pub max_entries: Option<u64>,
    /// Suppress the schema report and the default progress output.
    pub quiet: bool,
    pub write_options: WriteOptions,
}

impl ImportOptions {
    pub fn with_max_entries(mut self, max_entries: u64) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn with_write_options(mut self, write_options: WriteOptions) -> Self {
        self.write_options = write_options;
        self
    }
}

/// Converts one source tree into one destination dataset.
///
/// The dataset is named after the tree unless
/// [`Importer::set_dataset_name`] is called. Entries are copied one at a
/// time through buffers shared by the source and the destination, so the
/// source's parallel reading is disabled on construction.
pub struct Importer {
    source: Box<dyn SourceTree>,
    store: Box<dyn DestinationStore>,
    dataset_name: String,
    registry: TypeRegistry,
    options: ImportOptions,
    progress: Option<Box<dyn ProgressObserver>>,
    state: ImportState,
    plan: Option<ImportPlan>,
}

impl Importer {
    /// Open tree `tree` of the tree file at `source_path` and import it into a
    /// Parquet dataset under `dest_dir`.
    ///
    /// Classes declared in the tree file are registered with the importer's
    /// type registry. Fails with [`ImportError::DatasetExists`] if `dest_dir`
    /// already holds a dataset named after the tree.
    pub fn create(
        source_path: impl AsRef<Path>,
        tree: &str,
        dest_dir: impl Into<PathBuf>,
    ) -> Result<Self, ImportError> {
        let store = ParquetStore::new(dest_dir);
        if store.contains(tree)? {
            return Err(ImportError::DatasetExists {
                name: tree.to_string(),
                destination: store.describe(),
            });
        }

        let source = read_tree(source_path.as_ref(), tree)?;
        let mut registry = TypeRegistry::new();
        registry.register_classes(source.classes().iter().cloned());

        let mut importer = Self::from_tree(Box::new(source), Box::new(store));
        importer.registry = registry;
        Ok(importer)
    }

    /// Import an already opened source into `store`.
    pub fn from_tree(mut source: Box<dyn SourceTree>, store: Box<dyn DestinationStore>) -> Self {
        source.set_implicit_mt(false);
        Self {
            dataset_name: source.name().to_string(),
            source,
            store,
            registry: TypeRegistry::new(),
            options: ImportOptions::default(),
            progress: None,
            state: ImportState::Idle,
            plan: None,
        }
    }

    pub fn with_options(mut self, options: ImportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn set_max_entries(&mut self, max_entries: u64) {
        self.options.max_entries = Some(max_entries);
    }

    pub fn set_quiet(&mut self, quiet: bool) {
        self.options.quiet = quiet;
    }

    pub fn set_write_options(&mut self, write_options: WriteOptions) {
        self.options.write_options = write_options;
    }

    pub fn set_dataset_name(&mut self, name: impl Into<String>) {
        self.dataset_name = name.into();
    }

    /// Replace the progress observer. Custom observers are called even in
    /// quiet mode.
    pub fn set_progress_observer(&mut self, observer: Box<dyn ProgressObserver>) {
        self.progress = Some(observer);
    }

    /// Type registry used to resolve leaf and class type names.
    pub fn registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    pub fn state(&self) -> ImportState {
        self.state
    }

    pub fn dataset_name(&self) -> &str {
        &self.dataset_name
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Number of entries an import copies: all of them, or the configured
    /// maximum if smaller.
    pub fn entry_count(&self) -> u64 {
        let total = self.source.entry_count();
        self.options.max_entries.map_or(total, |max| max.min(total))
    }

    /// Destination fields, stored then projected, once the schema is
    /// prepared.
    pub fn schema(&self) -> Option<FieldDefs> {
        self.plan.as_ref().map(|p| p.model.describe())
    }

    /// Import fields of the prepared schema.
    pub fn import_fields(&self) -> &[ImportField] {
        self.plan.as_ref().map(|p| p.fields.as_slice()).unwrap_or_default()
    }

    /// Derive the destination schema and bind all source buffers.
    ///
    /// Calling it again after success is a no-op.
    pub fn prepare_schema(&mut self) -> Result<(), ImportError> {
        match self.state {
            ImportState::Idle => {}
            ImportState::SchemaPrepared => return Ok(()),
            state => {
                return Err(ImportError::InvalidState {
                    operation: "prepare schema",
                    state,
                });
            }
        }

        let plan = match self.build_plan() {
            Ok(plan) => plan,
            Err(e) => {
                self.state = ImportState::Failed;
                return Err(e);
            }
        };
        if !self.options.quiet {
            report_schema(&plan);
        }
        self.plan = Some(plan);
        self.state = ImportState::SchemaPrepared;
        Ok(())
    }

    /// Copy all entries, up to the configured maximum, into the destination.
    ///
    /// On failure the rows committed so far are kept; the dataset is closed
    /// but not removed.
    pub fn import(&mut self) -> Result<WriteSummary, ImportError> {
        if self.state == ImportState::Idle {
            self.prepare_schema()?;
        }
        if self.state != ImportState::SchemaPrepared {
            return Err(ImportError::InvalidState {
                operation: "import",
                state: self.state,
            });
        }

        let result = self.write_entries();
        self.state = match result {
            Ok(_) => ImportState::Finished,
            Err(_) => ImportState::Failed,
        };
        result
    }

    fn build_plan(&mut self) -> Result<ImportPlan, ImportError> {
        let plan = {
            let classified = classify_branches(self.source.branches())?;
            map_schema(&classified, &self.registry)?
        };
        plan.branches.bind_all(self.source.as_mut())?;
        Ok(plan)
    }

    fn write_entries(&mut self) -> Result<WriteSummary, ImportError> {
        let entries = self.entry_count();
        let Some(plan) = self.plan.as_mut() else {
            return Err(ImportError::InvalidState {
                operation: "import",
                state: self.state,
            });
        };

        let mut writer = self.store.create_writer(
            &self.dataset_name,
            &plan.model,
            &self.options.write_options,
        )?;
        self.state = ImportState::Writing;

        if self.progress.is_none() && !self.options.quiet {
            self.progress = Some(Box::new(DefaultProgress::new()));
        }

        tracing::debug!(
            dataset = %self.dataset_name,
            destination = %self.store.describe(),
            entries,
            "importing entries"
        );

        for i in 0..entries {
            if let Err(e) = copy_entry(self.source.as_mut(), plan, &mut writer, i) {
                writer.discard_row();
                if let Err(close) = writer.finish() {
                    tracing::warn!(error = %close, "failed to close partially written dataset");
                }
                return Err(e);
            }
            if let Some(progress) = self.progress.as_deref_mut() {
                progress.on_progress(writer.bytes_written(), i + 1);
            }
        }

        let summary = writer.finish()?;
        if let Some(progress) = self.progress.as_deref_mut() {
            progress.on_finish(summary.bytes_written, summary.rows);
        }
        Ok(summary)
    }
}

/// Copy entry `entry` from the source into one destination row.
fn copy_entry(
    source: &mut dyn SourceTree,
    plan: &mut ImportPlan,
    writer: &mut RowWriter,
    entry: u64,
) -> Result<(), ImportError> {
    let ImportPlan {
        entry: top_entry,
        branches,
        fields,
        collections,
        transformations,
        ..
    } = plan;

    branches.read_entry(source, entry)?;
    let branches = &*branches;

    for c in collections.iter_mut() {
        let count = c
            .read_count(branches)
            .ok_or_else(|| ImportError::Transform {
                branch: c.count_leaf.clone(),
                entry,
                source: TransformError::UndecodableCount,
            })?;
        let count = usize::try_from(count)
            .ok()
            .filter(|&n| n <= c.max_len)
            .ok_or_else(|| ImportError::CountOutOfRange {
                count_leaf: c.count_leaf.clone(),
                entry,
                count,
                max: c.max_len,
            })?;

        for _ in 0..count {
            for t in c.transformations.iter_mut() {
                run_transformation(t, branches, fields, entry)?;
            }
            let values = EntryValues {
                branches,
                fields: fields.as_slice(),
            };
            writer.fill_collection(c.id, &c.entry, &values)?;
        }
        c.reset_cursors();
    }

    for t in transformations.iter_mut() {
        run_transformation(t, branches, fields, entry)?;
        t.reset_entry();
    }

    let values = EntryValues {
        branches,
        fields: fields.as_slice(),
    };
    writer.fill(top_entry, &values)?;
    Ok(())
}

fn run_transformation(
    t: &mut impl Transformation,
    branches: &BranchBuffers,
    fields: &mut [ImportField],
    entry: u64,
) -> Result<(), ImportError> {
    let branch = |index: usize| {
        branches
            .branch(index)
            .map(|b| b.name.clone())
            .unwrap_or_default()
    };
    let Some(field) = fields.get_mut(t.field()) else {
        return Err(ImportError::Transform {
            branch: branch(t.branch()),
            entry,
            source: TransformError::MissingField { field: t.field() },
        });
    };
    t.transform(branches, field)
        .map_err(|source| ImportError::Transform {
            branch: branch(t.branch()),
            entry,
            source,
        })
}

fn report_schema(plan: &ImportPlan) {
    for f in &plan.fields {
        tracing::info!("Importing '{}' [{}]", f.field.name, f.field.type_name);
    }
}
