//! Error types for source trees and type resolution.

/// Errors produced by [`SourceTree`](crate::SourceTree) implementations and
/// the tree file codec.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// I/O error while opening, mapping or writing a tree file.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The file does not start with the tree file magic line.
    #[error("not a tree file: {path}")]
    NotATreeFile { path: String },

    /// The requested tree is not stored in the source.
    #[error("cannot read tree '{tree}' from {path}")]
    TreeNotFound { tree: String, path: String },

    /// The tree file header or body is structurally invalid.
    #[error("malformed tree file {path}: {detail}")]
    Malformed { path: String, detail: String },

    /// A leaf-list descriptor such as `"x/F:y/F"` could not be parsed.
    #[error("invalid leaf list '{leaflist}' for branch '{branch}': {detail}")]
    InvalidLeafList {
        branch: String,
        leaflist: String,
        detail: String,
    },

    /// A buffer was bound to a branch that does not exist.
    #[error("branch '{branch}' not found")]
    BranchNotFound { branch: String },

    /// A bound buffer cannot hold the largest value of its branch.
    #[error("buffer for branch '{branch}' holds {actual} bytes, {required} required")]
    BufferTooSmall {
        branch: String,
        required: usize,
        actual: usize,
    },

    /// An entry index beyond the end of the tree was requested.
    #[error("entry {entry} out of range, tree has {entries} entries")]
    EntryOutOfRange { entry: u64, entries: u64 },

    /// Two branches of a tree share a name.
    #[error("duplicate branch '{branch}'")]
    DuplicateBranch { branch: String },

    /// A class branch uses a class whose members cannot be laid out.
    #[error("unsupported class '{class_name}': {detail}")]
    UnsupportedClass { class_name: String, detail: String },

    /// A value passed to an in-memory tree does not match the branch layout.
    #[error("value for branch '{branch}' does not match its leaves: {detail}")]
    ValueMismatch { branch: String, detail: String },
}

/// Errors produced by the [`TypeRegistry`](crate::TypeRegistry).
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    /// The type name is neither a known primitive, template nor class.
    #[error("unknown type '{type_name}' for field '{field}'")]
    UnknownType { field: String, type_name: String },

    /// No class dictionary entry exists for the class name.
    #[error("unable to load class '{class_name}'")]
    UnknownClass { class_name: String },

    /// A class member has a type that cannot be stored in a packed record.
    #[error("class '{class_name}' member '{member}' has unsupported type '{type_name}'")]
    UnsupportedMember {
        class_name: String,
        member: String,
        type_name: String,
    },
}
