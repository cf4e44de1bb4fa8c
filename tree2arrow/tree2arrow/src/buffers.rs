//! Read buffers of the source branches and the destination values bound to
//! them.

use tree2arrow_arrow::{BufferId, ValueRef, ValueSource};
use tree2arrow_core::{BufferSlot, BufferTable, FieldDef, SourceTree, ValueBuffer};

use crate::error::ImportError;

/// One source branch read by the importer.
#[derive(Debug, Clone)]
pub struct ImportBranch {
    pub name: String,
    pub slot: BufferSlot,
    pub size: usize,
}

/// Owner of every branch read buffer.
///
/// Buffers are allocated while the schema is prepared and bound to the source
/// once; reading an entry only overwrites their contents.
#[derive(Debug, Default)]
pub struct BranchBuffers {
    table: BufferTable,
    branches: Vec<ImportBranch>,
}

impl BranchBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a zeroed buffer of `size` bytes for `name` and return its
    /// index.
    pub fn add(&mut self, name: &str, size: usize) -> usize {
        let slot = self.table.allocate(size);
        self.branches.push(ImportBranch {
            name: name.to_string(),
            slot,
            size,
        });
        self.branches.len() - 1
    }

    /// Bind every buffer to its branch in `source`.
    pub fn bind_all(&self, source: &mut dyn SourceTree) -> Result<(), ImportError> {
        for b in &self.branches {
            source.bind(&b.name, b.slot, b.size)?;
        }
        Ok(())
    }

    /// Materialize entry `entry` into all buffers.
    pub fn read_entry(&mut self, source: &mut dyn SourceTree, entry: u64) -> Result<(), ImportError> {
        source.read_entry(entry, &mut self.table)?;
        Ok(())
    }

    pub fn bytes(&self, index: usize) -> Option<&[u8]> {
        self.branches.get(index).map(|b| self.table.get(b.slot))
    }

    pub fn branch(&self, index: usize) -> Option<&ImportBranch> {
        self.branches.get(index)
    }

    pub fn branches(&self) -> &[ImportBranch] {
        &self.branches
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

/// Where the value of an [`ImportField`] lives.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldBuffer {
    /// The branch read buffer is used as is.
    Aliased(usize),
    /// A private buffer filled by a transformation.
    Owned(ValueBuffer),
}

/// A destination field and the buffer it is written from.
#[derive(Debug, Clone)]
pub struct ImportField {
    pub field: FieldDef,
    pub buffer: FieldBuffer,
    /// Member of a leaf-count collection rather than of the top-level entry.
    pub in_collection: bool,
}

impl ImportField {
    pub fn aliased(field: FieldDef, branch: usize) -> Self {
        Self {
            field,
            buffer: FieldBuffer::Aliased(branch),
            in_collection: false,
        }
    }

    pub fn owned(field: FieldDef, value: ValueBuffer) -> Self {
        Self {
            field,
            buffer: FieldBuffer::Owned(value),
            in_collection: false,
        }
    }

    pub fn with_in_collection(mut self, in_collection: bool) -> Self {
        self.in_collection = in_collection;
        self
    }
}

/// Resolves entry bindings against the importer's buffers.
pub(crate) struct EntryValues<'a> {
    pub branches: &'a BranchBuffers,
    pub fields: &'a [ImportField],
}

impl ValueSource for EntryValues<'_> {
    fn resolve(&self, id: BufferId) -> Option<ValueRef<'_>> {
        match id {
            BufferId::Branch(i) => self.branches.bytes(i).map(ValueRef::Raw),
            BufferId::Field(i) => match &self.fields.get(i)?.buffer {
                FieldBuffer::Aliased(b) => self.branches.bytes(*b).map(ValueRef::Raw),
                FieldBuffer::Owned(ValueBuffer::Raw(bytes)) => Some(ValueRef::Raw(bytes)),
                FieldBuffer::Owned(ValueBuffer::Text(text)) => Some(ValueRef::Text(text)),
            },
            BufferId::CollectionOffset(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use tree2arrow_core::{DataTypeDef, MemoryTree, Value};

    use super::*;

    #[test]
    fn buffers_are_refreshed_per_entry() {
        let mut tree = MemoryTree::builder("t")
            .branch("run", "run/I")
            .unwrap()
            .build()
            .unwrap();
        tree.fill(vec![Value::I32(5)]).unwrap();
        tree.fill(vec![Value::I32(9)]).unwrap();

        let mut buffers = BranchBuffers::new();
        let run = buffers.add("run", 4);
        buffers.bind_all(&mut tree).unwrap();

        buffers.read_entry(&mut tree, 1).unwrap();
        assert_eq!(buffers.bytes(run), Some(&9_i32.to_ne_bytes()[..]));
        buffers.read_entry(&mut tree, 0).unwrap();
        assert_eq!(buffers.bytes(run), Some(&5_i32.to_ne_bytes()[..]));
    }

    #[test]
    fn resolves_aliased_and_owned_fields() {
        let mut buffers = BranchBuffers::new();
        let b = buffers.add("run", 4);
        let fields = vec![
            ImportField::aliased(FieldDef::new("run", DataTypeDef::I32), b),
            ImportField::owned(
                FieldDef::new("label", DataTypeDef::String),
                ValueBuffer::Text("abc".to_string()),
            ),
        ];
        let values = EntryValues {
            branches: &buffers,
            fields: &fields,
        };

        assert!(matches!(values.resolve(BufferId::Field(0)), Some(ValueRef::Raw(b)) if b.len() == 4));
        assert!(matches!(values.resolve(BufferId::Field(1)), Some(ValueRef::Text("abc"))));
        assert!(values.resolve(BufferId::Field(2)).is_none());
        assert!(values.resolve(BufferId::Branch(3)).is_none());
    }
}
