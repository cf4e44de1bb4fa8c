use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use thiserror::Error;

/// Errors raised while building or freezing a [`Model`](crate::Model) and
/// binding [`Entry`](crate::Entry) values.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The model was already frozen.
    #[error("model is frozen")]
    Frozen,
    /// The operation requires a frozen model.
    #[error("model is not frozen")]
    NotFrozen,
    /// A field (stored or projected) with the same name already exists.
    #[error("duplicate field '{name}'")]
    DuplicateField { name: String },
    /// No stored field with this name exists.
    #[error("unknown field '{name}'")]
    UnknownField { name: String },
    /// A projected field does not map onto a compatible source field.
    #[error("invalid projection '{field}': {detail}")]
    InvalidProjection { field: String, detail: String },
    /// A buffer id of the wrong kind was bound to a field.
    #[error("cannot bind {binding} to field '{field}'")]
    InvalidBinding { field: String, binding: String },
}

/// Errors raised while writing rows into a destination store.
#[derive(Debug, Error)]
pub enum WriteError {
    /// A field of the entry was never bound to a buffer.
    #[error("field '{field}' has no bound buffer")]
    MissingBinding { field: String },
    /// The bound buffer could not be resolved by the value source.
    #[error("buffer for field '{field}' is not available")]
    UnresolvedBuffer { field: String },
    /// A raw buffer is smaller than one value of the field.
    #[error("buffer for field '{field}' holds {actual} bytes, {expected} expected")]
    ValueSizeMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },
    /// A buffer holds a value of the wrong representation.
    #[error("field '{field}' expects {expected} value")]
    TypeMismatch {
        field: String,
        expected: &'static str,
    },
    /// The entry was built for a different model.
    #[error("entry with {actual} fields does not match model with {expected} fields")]
    EntryMismatch { expected: usize, actual: usize },
    /// The collection id was not created by this writer's model.
    #[error("unknown collection #{id}")]
    UnknownCollection { id: usize },
    /// The destination already holds a dataset of this name.
    #[error("Key '{name}' already exists in {destination}")]
    DatasetExists { name: String, destination: String },
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Arrow(#[from] ArrowError),
    #[error(transparent)]
    Parquet(#[from] ParquetError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
