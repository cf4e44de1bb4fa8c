//! Row writer committing entries into record batches.

use std::sync::Arc;

use arrow::{
    array::{ArrayBuilder, ArrayRef},
    datatypes::SchemaRef,
    record_batch::RecordBatch,
};
use tree2arrow_core::{DataTypeDef, FieldDefs};

use crate::{
    arrow_convert::{
        append_collection_element, append_value, check_value, close_collection_row, make_builder,
    },
    entry::{BufferId, Entry, ValueRef, ValueSource},
    error::{ModelError, WriteError},
    model::{CollectionId, Model},
    schema_convert::field_defs_to_arrow_schema,
    store::PageSink,
};

/// Totals reported by [`RowWriter::finish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteSummary {
    pub rows: u64,
    pub bytes_written: u64,
}

struct CollectionState {
    column: usize,
    members: FieldDefs,
    /// Elements appended since the dataset was created, staged ones included.
    offset: u64,
    /// Member values of the row being built, element after element. Reused
    /// across rows; only the first `staged_elements * members.len()` are live.
    staged: Vec<StagedValue>,
    staged_elements: usize,
}

impl CollectionState {
    fn stage(&mut self, values: &[ValueRef<'_>]) {
        let start = self.staged_elements * self.members.len();
        for (i, value) in values.iter().enumerate() {
            match self.staged.get_mut(start + i) {
                Some(slot) => slot.set(*value),
                None => self.staged.push(StagedValue::from(*value)),
            }
        }
        self.staged_elements += 1;
        self.offset += 1;
    }

    fn discard_staged(&mut self) -> usize {
        let discarded = self.staged_elements;
        self.offset -= discarded as u64;
        self.staged_elements = 0;
        discarded
    }
}

/// Owned copy of a collection member value.
enum StagedValue {
    Raw(Vec<u8>),
    Text(String),
}

impl StagedValue {
    fn set(&mut self, value: ValueRef<'_>) {
        match (self, value) {
            (StagedValue::Raw(buf), ValueRef::Raw(bytes)) => {
                buf.clear();
                buf.extend_from_slice(bytes);
            }
            (StagedValue::Text(buf), ValueRef::Text(text)) => {
                buf.clear();
                buf.push_str(text);
            }
            (slot, value) => *slot = StagedValue::from(value),
        }
    }

    fn as_value(&self) -> ValueRef<'_> {
        match self {
            StagedValue::Raw(bytes) => ValueRef::Raw(bytes),
            StagedValue::Text(text) => ValueRef::Text(text),
        }
    }
}

impl From<ValueRef<'_>> for StagedValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Raw(bytes) => StagedValue::Raw(bytes.to_vec()),
            ValueRef::Text(text) => StagedValue::Text(text.to_string()),
        }
    }
}

enum RowValue<'a> {
    Value(ValueRef<'a>),
    Collection(usize),
}

/// Writes rows of a frozen [`Model`] into a [`PageSink`].
///
/// Rows are buffered in Arrow builders and handed to the sink as one record
/// batch per `cluster_size` rows.
pub struct RowWriter {
    name: String,
    schema: SchemaRef,
    fields: FieldDefs,
    builders: Vec<Box<dyn ArrayBuilder>>,
    collections: Vec<CollectionState>,
    sink: Box<dyn PageSink>,
    cluster_size: usize,
    pending_rows: usize,
    rows: u64,
}

impl RowWriter {
    pub(crate) fn new(
        name: &str,
        model: &Model,
        sink: Box<dyn PageSink>,
        cluster_size: usize,
    ) -> Result<Self, WriteError> {
        let fields = FieldDefs::new(model.fields().to_vec());
        let schema = schema_for(model);
        let cluster_size = cluster_size.max(1);
        let builders = schema
            .fields()
            .iter()
            .map(|f| make_builder(f.data_type(), cluster_size))
            .collect();

        let mut collections = Vec::new();
        for collection in model.collection_names() {
            let column = fields
                .iter()
                .position(|f| f.name == collection)
                .ok_or_else(|| ModelError::UnknownField {
                    name: collection.to_string(),
                })?;
            let DataTypeDef::Collection(members) = &fields[column].data_type else {
                return Err(ModelError::UnknownField {
                    name: collection.to_string(),
                }
                .into());
            };
            collections.push(CollectionState {
                column,
                members: members.clone(),
                offset: 0,
                staged: Vec::new(),
                staged_elements: 0,
            });
        }

        Ok(Self {
            name: name.to_string(),
            schema,
            fields,
            builders,
            collections,
            sink,
            cluster_size,
            pending_rows: 0,
            rows: 0,
        })
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    /// Commit one row. Every field of `entry` must be bound.
    ///
    /// Collection fields capture the collection's running offset: the row owns
    /// every element staged since the previous row. Nothing is appended if the
    /// row is rejected; its staged elements stay until [`RowWriter::discard_row`]
    /// or the next successful `fill`.
    pub fn fill(&mut self, entry: &Entry, source: &dyn ValueSource) -> Result<(), WriteError> {
        if entry.fields().len() != self.fields.len() {
            return Err(WriteError::EntryMismatch {
                expected: self.fields.len(),
                actual: entry.fields().len(),
            });
        }

        let mut values = Vec::with_capacity(self.fields.len());
        for (i, field) in entry.fields().iter().enumerate() {
            let id = entry.binding(i).ok_or_else(|| WriteError::MissingBinding {
                field: field.name.clone(),
            })?;
            match id {
                BufferId::CollectionOffset(cid) => {
                    let state = self.collection_state(cid)?;
                    if state.column != i {
                        return Err(ModelError::InvalidBinding {
                            field: field.name.clone(),
                            binding: format!("{id:?}"),
                        }
                        .into());
                    }
                    values.push(RowValue::Collection(cid.index()));
                }
                _ => {
                    let value = resolve(source, id, &field.name)?;
                    check_value(field, value)?;
                    values.push(RowValue::Value(value));
                }
            }
        }

        let columns = self.builders.iter_mut().zip(self.fields.iter());
        for ((builder, field), value) in columns.zip(values) {
            match value {
                RowValue::Value(value) => append_value(builder, &field.data_type, value),
                RowValue::Collection(index) => {
                    let state = &mut self.collections[index];
                    let width = state.members.len();
                    let live = &state.staged[..state.staged_elements * width];
                    for element in live.chunks(width.max(1)) {
                        append_collection_element(
                            builder,
                            &state.members,
                            element.iter().map(StagedValue::as_value),
                        );
                    }
                    state.staged_elements = 0;
                    close_collection_row(builder);
                }
            }
        }

        self.pending_rows += 1;
        self.rows += 1;
        if self.pending_rows >= self.cluster_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Stage one element of collection `id` for the current row using its
    /// nested `entry`.
    pub fn fill_collection(
        &mut self,
        id: CollectionId,
        entry: &Entry,
        source: &dyn ValueSource,
    ) -> Result<(), WriteError> {
        let index = id.index();
        let state = self
            .collections
            .get(index)
            .ok_or(WriteError::UnknownCollection { id: index })?;
        if entry.fields().len() != state.members.len() {
            return Err(WriteError::EntryMismatch {
                expected: state.members.len(),
                actual: entry.fields().len(),
            });
        }

        let mut values = Vec::with_capacity(state.members.len());
        for (i, field) in entry.fields().iter().enumerate() {
            let buffer = entry.binding(i).ok_or_else(|| WriteError::MissingBinding {
                field: field.name.clone(),
            })?;
            let value = resolve(source, buffer, &field.name)?;
            check_value(field, value)?;
            values.push(value);
        }

        self.collections[index].stage(&values);
        Ok(())
    }

    /// Drop the collection elements staged for a row that will not be
    /// committed.
    pub fn discard_row(&mut self) {
        for state in &mut self.collections {
            let discarded = state.discard_staged();
            if discarded > 0 {
                tracing::debug!(
                    dataset = %self.name,
                    discarded,
                    "discarded uncommitted collection elements"
                );
            }
        }
    }

    /// Number of elements appended to collection `id` so far, including those
    /// staged for the current row.
    pub fn collection_offset(&self, id: CollectionId) -> Option<u64> {
        self.collections.get(id.index()).map(|c| c.offset)
    }

    /// Hand buffered rows to the sink as one record batch.
    pub fn flush(&mut self) -> Result<(), WriteError> {
        if self.pending_rows == 0 {
            return Ok(());
        }
        let arrays: Vec<ArrayRef> = self.builders.iter_mut().map(|b| b.finish()).collect();
        let batch = RecordBatch::try_new(self.schema.clone(), arrays)?;
        tracing::debug!(
            dataset = %self.name,
            rows = batch.num_rows(),
            "flushing cluster"
        );
        self.sink.write_batch(batch)?;
        self.pending_rows = 0;
        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    /// Bytes handed to the underlying storage so far.
    pub fn bytes_written(&self) -> u64 {
        self.sink.bytes_written()
    }

    /// Flush remaining rows and close the sink. Elements staged for an
    /// uncommitted row are dropped.
    pub fn finish(mut self) -> Result<WriteSummary, WriteError> {
        self.discard_row();
        self.flush()?;
        let bytes_written = self.sink.finish()?;
        Ok(WriteSummary {
            rows: self.rows,
            bytes_written,
        })
    }

    fn collection_state(&self, id: CollectionId) -> Result<&CollectionState, WriteError> {
        self.collections
            .get(id.index())
            .ok_or(WriteError::UnknownCollection { id: id.index() })
    }
}

/// Arrow schema of the datasets written for `model`.
pub(crate) fn schema_for(model: &Model) -> SchemaRef {
    let fields = FieldDefs::new(model.fields().to_vec());
    Arc::new(field_defs_to_arrow_schema(&fields, model.projected_fields()))
}

fn resolve<'a>(
    source: &'a dyn ValueSource,
    id: BufferId,
    field: &str,
) -> Result<ValueRef<'a>, WriteError> {
    source.resolve(id).ok_or_else(|| WriteError::UnresolvedBuffer {
        field: field.to_string(),
    })
}
