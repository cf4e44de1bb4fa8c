//! Error types for the tree importer.

use tree2arrow_arrow::{ModelError, WriteError};
use tree2arrow_core::{SourceError, TypeError};

use crate::importer::ImportState;

/// Errors produced by [`Importer`](crate::Importer).
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// Opening, binding or reading the source tree failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The source schema has a shape that cannot be mapped to the destination.
    #[error("unsupported: {detail}, branch: {branch}")]
    UnsupportedSchema { branch: String, detail: String },

    /// A type name could not be turned into a destination field.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// The destination model rejected a field, projection or binding.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The destination store already holds a dataset of the requested name.
    #[error("Key '{name}' already exists in {destination}")]
    DatasetExists { name: String, destination: String },

    /// A value transformation failed while copying a row.
    #[error("cannot transform entry {entry} of branch '{branch}': {source}")]
    Transform {
        branch: String,
        entry: u64,
        #[source]
        source: TransformError,
    },

    /// A count leaf carried a value outside `[0, max]`.
    #[error("count leaf '{count_leaf}' has value {count} in entry {entry}, maximum is {max}")]
    CountOutOfRange {
        count_leaf: String,
        entry: u64,
        count: i64,
        max: usize,
    },

    /// Writing to the destination store failed.
    #[error(transparent)]
    Write(WriteError),

    /// An operation was called in a state that does not allow it.
    #[error("cannot {operation} while importer is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: ImportState,
    },
}

/// Reasons a single value could not be copied out of its branch buffer.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// The branch buffer index is not part of the import plan.
    #[error("no buffer for branch #{branch}")]
    MissingBuffer { branch: usize },

    /// The import field index is not part of the import plan.
    #[error("no import field #{field}")]
    MissingField { field: usize },

    /// A C string is not valid UTF-8.
    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// A variable array element lies past the end of its branch buffer.
    #[error("element {element} lies beyond the {size}-byte branch buffer")]
    OutOfBounds { element: usize, size: usize },

    /// The field does not own a buffer of the kind the transformation writes.
    #[error("field '{field}' has no {expected} buffer")]
    BufferKind {
        field: String,
        expected: &'static str,
    },

    /// The count leaf of a collection cannot be decoded.
    #[error("cannot decode count")]
    UndecodableCount,
}

impl From<WriteError> for ImportError {
    fn from(e: WriteError) -> Self {
        match e {
            WriteError::DatasetExists { name, destination } => {
                ImportError::DatasetExists { name, destination }
            }
            WriteError::Model(e) => ImportError::Model(e),
            e => ImportError::Write(e),
        }
    }
}
