//! Column-oriented destination store for `tree2arrow`.
//!
//! This crate turns frozen destination schemas into Arrow record batches:
//! 1. Build a [`Model`] of stored and projected fields and freeze it.
//! 2. Bind field names to buffers with [`Entry::capture_value`].
//! 3. Commit rows through a [`RowWriter`] obtained from a
//!    [`DestinationStore`].
//!
//! Collections are stored as `List<Struct>` columns. Projected fields are
//! views over them and are only recorded in the schema metadata;
//! [`project_record_batch`] materializes them on demand.
//!
//! # Typical Flow
//! ```rust
//! use tree2arrow_arrow::{DestinationStore, MemoryStore, Model, WriteOptions};
//! use tree2arrow_core::{DataTypeDef, FieldDef};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut model = Model::create_bare();
//! model.add_field(FieldDef::new("run", DataTypeDef::I32))?;
//! model.freeze();
//!
//! let mut store = MemoryStore::new();
//! let writer = store.create_writer("events", &model, &WriteOptions::default())?;
//! let summary = writer.finish()?;
//! assert_eq!(summary.rows, 0);
//! # Ok(())
//! # }
//! ```
mod arrow_convert;
pub mod entry;
pub mod error;
pub mod model;
pub mod projection;
pub mod schema_convert;
pub mod store;
pub mod writer;

pub use entry::{BufferId, Entry, ValueRef, ValueSource};
pub use error::{ModelError, WriteError};
pub use model::{CollectionId, Model, ProjectedField};
pub use projection::project_record_batch;
pub use schema_convert::{PROJECTIONS_METADATA_KEY, field_defs_to_arrow_schema};
pub use store::{
    DEFAULT_CLUSTER_SIZE, DestinationStore, MemoryStore, PageSink, ParquetStore, WriteOptions,
};
pub use writer::{RowWriter, WriteSummary};
