//! Field-to-buffer bindings used to commit rows.

use tree2arrow_core::{DataTypeDef, FieldDefs};

use crate::{error::ModelError, model::CollectionId};

/// Identifies the buffer an entry reads a field value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferId {
    /// Raw read buffer of source branch `i`.
    Branch(usize),
    /// Private buffer owned by import field `i`.
    Field(usize),
    /// Running element offset of a collection, owned by the row writer.
    CollectionOffset(CollectionId),
}

/// Borrowed view of one field value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueRef<'a> {
    /// Packed native-endian bytes.
    Raw(&'a [u8]),
    Text(&'a str),
}

/// Resolves [`BufferId`]s to the current value of the buffer.
///
/// `CollectionOffset` ids are resolved by the writer itself and never reach
/// the value source.
pub trait ValueSource {
    fn resolve(&self, id: BufferId) -> Option<ValueRef<'_>>;
}

/// Set of field name to buffer bindings for one model.
///
/// Built once after the model is frozen and reused for every row.
#[derive(Debug, Clone)]
pub struct Entry {
    fields: FieldDefs,
    bindings: Vec<Option<BufferId>>,
}

impl Entry {
    pub(crate) fn new(fields: FieldDefs) -> Self {
        let bindings = vec![None; fields.len()];
        Self { fields, bindings }
    }

    /// Bind field `name` to buffer `id`.
    ///
    /// Collection fields only accept [`BufferId::CollectionOffset`], all other
    /// fields only accept value buffers.
    pub fn capture_value(&mut self, name: &str, id: BufferId) -> Result<(), ModelError> {
        let index = self
            .fields
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| ModelError::UnknownField {
                name: name.to_string(),
            })?;
        let is_collection = matches!(self.fields[index].data_type, DataTypeDef::Collection(_));
        let is_offset = matches!(id, BufferId::CollectionOffset(_));
        if is_collection != is_offset {
            return Err(ModelError::InvalidBinding {
                field: name.to_string(),
                binding: format!("{id:?}"),
            });
        }
        self.bindings[index] = Some(id);
        Ok(())
    }

    pub fn fields(&self) -> &FieldDefs {
        &self.fields
    }

    pub fn binding(&self, index: usize) -> Option<BufferId> {
        self.bindings.get(index).copied().flatten()
    }

    /// Names of fields that have not been bound yet.
    pub fn unbound_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .zip(&self.bindings)
            .filter(|(_, b)| b.is_none())
            .map(|(f, _)| f.name.as_str())
    }
}
