//! Destination stores and the page sinks they hand record batches to.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use arrow::{datatypes::SchemaRef, record_batch::RecordBatch};
use parquet::{
    arrow::ArrowWriter,
    basic::{Compression, ZstdLevel},
    file::properties::WriterProperties,
};

use crate::{
    error::{ModelError, WriteError},
    model::Model,
    writer::{RowWriter, schema_for},
};

/// Default number of rows per record batch (and parquet row group).
pub const DEFAULT_CLUSTER_SIZE: usize = 8192;

/// Options applied when a dataset is created.
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    pub compression: Compression,
    /// Rows buffered before a record batch is handed to the sink.
    pub cluster_size: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compression: Compression::ZSTD(ZstdLevel::try_new(5).unwrap_or_default()),
            cluster_size: DEFAULT_CLUSTER_SIZE,
        }
    }
}

impl WriteOptions {
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_cluster_size(mut self, cluster_size: usize) -> Self {
        self.cluster_size = cluster_size;
        self
    }
}

/// Physical storage of one dataset.
pub trait PageSink {
    fn write_batch(&mut self, batch: RecordBatch) -> Result<(), WriteError>;

    /// Bytes persisted so far, after compression.
    fn bytes_written(&self) -> u64;

    /// Close the dataset and return the final byte count.
    fn finish(&mut self) -> Result<u64, WriteError>;
}

/// A named collection of datasets.
pub trait DestinationStore {
    /// Human readable location, used in error messages.
    fn describe(&self) -> String;

    fn contains(&self, name: &str) -> Result<bool, WriteError>;

    fn create_sink(
        &mut self,
        name: &str,
        schema: SchemaRef,
        options: &WriteOptions,
    ) -> Result<Box<dyn PageSink>, WriteError>;

    /// Create dataset `name` for a frozen `model` and return its row writer.
    ///
    /// Fails with [`WriteError::DatasetExists`] without touching the store if
    /// the name is taken.
    fn create_writer(
        &mut self,
        name: &str,
        model: &Model,
        options: &WriteOptions,
    ) -> Result<RowWriter, WriteError> {
        if !model.is_frozen() {
            return Err(ModelError::NotFrozen.into());
        }
        if self.contains(name)? {
            return Err(WriteError::DatasetExists {
                name: name.to_string(),
                destination: self.describe(),
            });
        }
        let schema = schema_for(model);
        let sink = self.create_sink(name, schema, options)?;
        tracing::debug!(dataset = name, destination = %self.describe(), "created dataset");
        RowWriter::new(name, model, sink, options.cluster_size)
    }
}

impl<T: DestinationStore + ?Sized> DestinationStore for Box<T> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn contains(&self, name: &str) -> Result<bool, WriteError> {
        (**self).contains(name)
    }

    fn create_sink(
        &mut self,
        name: &str,
        schema: SchemaRef,
        options: &WriteOptions,
    ) -> Result<Box<dyn PageSink>, WriteError> {
        (**self).create_sink(name, schema, options)
    }
}

type Catalog = Arc<Mutex<BTreeMap<String, Vec<RecordBatch>>>>;

/// In-memory store. Clones share the same catalog.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    datasets: Catalog,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a dataset directly, replacing any existing one.
    pub fn insert(&self, name: &str, batches: Vec<RecordBatch>) {
        self.datasets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), batches);
    }

    pub fn batches(&self, name: &str) -> Option<Vec<RecordBatch>> {
        self.datasets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn dataset_names(&self) -> Vec<String> {
        self.datasets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl DestinationStore for MemoryStore {
    fn describe(&self) -> String {
        "memory store".to_string()
    }

    fn contains(&self, name: &str) -> Result<bool, WriteError> {
        Ok(self
            .datasets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name))
    }

    fn create_sink(
        &mut self,
        name: &str,
        _schema: SchemaRef,
        _options: &WriteOptions,
    ) -> Result<Box<dyn PageSink>, WriteError> {
        self.insert(name, Vec::new());
        Ok(Box::new(MemorySink {
            name: name.to_string(),
            datasets: self.datasets.clone(),
            bytes: 0,
        }))
    }
}

struct MemorySink {
    name: String,
    datasets: Catalog,
    bytes: u64,
}

impl PageSink for MemorySink {
    fn write_batch(&mut self, batch: RecordBatch) -> Result<(), WriteError> {
        self.bytes += batch.get_array_memory_size() as u64;
        self.datasets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(self.name.clone())
            .or_default()
            .push(batch);
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }

    fn finish(&mut self) -> Result<u64, WriteError> {
        Ok(self.bytes)
    }
}

/// Store writing each dataset to `<root>/<name>.parquet`.
#[derive(Debug, Clone)]
pub struct ParquetStore {
    root: PathBuf,
}

impl ParquetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn dataset_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.parquet"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DestinationStore for ParquetStore {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn contains(&self, name: &str) -> Result<bool, WriteError> {
        Ok(self.dataset_path(name).try_exists()?)
    }

    fn create_sink(
        &mut self,
        name: &str,
        schema: SchemaRef,
        options: &WriteOptions,
    ) -> Result<Box<dyn PageSink>, WriteError> {
        fs::create_dir_all(&self.root)?;
        let path = self.dataset_path(name);
        let file = fs::File::create_new(&path)?;
        let props = WriterProperties::builder()
            .set_compression(options.compression)
            .set_max_row_group_size(options.cluster_size.max(1))
            .build();
        let writer = ArrowWriter::try_new(file, schema, Some(props))?;
        Ok(Box::new(ParquetSink {
            path,
            inner: Some(writer),
            closed_bytes: 0,
        }))
    }
}

struct ParquetSink {
    path: PathBuf,
    inner: Option<ArrowWriter<fs::File>>,
    closed_bytes: u64,
}

impl PageSink for ParquetSink {
    fn write_batch(&mut self, batch: RecordBatch) -> Result<(), WriteError> {
        match self.inner.as_mut() {
            Some(writer) => Ok(writer.write(&batch)?),
            None => Err(WriteError::Io(std::io::Error::other(format!(
                "{} is already closed",
                self.path.display()
            )))),
        }
    }

    fn bytes_written(&self) -> u64 {
        match &self.inner {
            Some(writer) => writer.bytes_written() as u64,
            None => self.closed_bytes,
        }
    }

    fn finish(&mut self) -> Result<u64, WriteError> {
        if let Some(writer) = self.inner.take() {
            writer.close()?;
            self.closed_bytes = fs::metadata(&self.path)?.len();
        }
        Ok(self.closed_bytes)
    }
}
