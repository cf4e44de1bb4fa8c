//! Destination-independent core types for `tree2arrow`.
//!
//! This crate provides the row-oriented source model ([`SourceTree`],
//! [`BranchDef`] / [`LeafDef`]), the field schema ([`DataTypeDef`] /
//! [`FieldDef`]) and the [`TypeRegistry`] that turns type names into fields.

mod error;
mod leaf;
mod leaflist;
mod memory;
mod primitive;
mod registry;
mod schema;
mod source;
mod tree_file;
mod value;

pub use error::{SourceError, TypeError};
pub use leaf::{BranchDef, LeafDef, LeafKind};
pub use leaflist::parse_leaflist;
pub use memory::{BranchSpec, MemoryTree, MemoryTreeBuilder};
pub use primitive::PrimitiveType;
pub use registry::{ClassDef, ClassMember, TypeRegistry, ValueBuffer};
pub use schema::{DataTypeDef, FieldDef, FieldDefs, format_field_defs};
pub use source::{BufferSlot, BufferTable, SourceTree};
pub use tree_file::{read_tree, write_tree};
pub use value::Value;
