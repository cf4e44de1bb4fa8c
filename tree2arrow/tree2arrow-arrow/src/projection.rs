use std::sync::Arc;

use arrow::array::{Array, ArrayRef, ListArray, StructArray, UInt64Array};
use arrow::datatypes::{Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use crate::{
    model::ProjectedField,
    schema_convert::{ITEM_FIELD, PROJECTIONS_METADATA_KEY},
};

/// Append the projected fields recorded in the schema metadata of `batch` as
/// materialized columns.
///
/// A member projection becomes a `List` column sharing the offsets of its
/// collection; a cardinality projection becomes a `UInt64` column holding the
/// per-row element count. Batches without projections are returned unchanged.
///
/// # Errors
///
/// Returns [`ArrowError::InvalidArgumentError`] if a projection refers to a
/// missing collection or member, or collides with an existing column.
pub fn project_record_batch(batch: &RecordBatch) -> Result<RecordBatch, ArrowError> {
    let schema = batch.schema();
    let Some(encoded) = schema.metadata().get(PROJECTIONS_METADATA_KEY) else {
        return Ok(batch.clone());
    };

    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();

    for item in encoded.split(';').filter(|s| !s.is_empty()) {
        let (name, collection, member) = ProjectedField::decode(item).ok_or_else(|| {
            ArrowError::InvalidArgumentError(format!("invalid projection '{item}'"))
        })?;
        if fields.iter().any(|f| f.name() == name) {
            return Err(ArrowError::InvalidArgumentError(format!(
                "projection '{name}' collides with an existing column"
            )));
        }

        let list = batch
            .column_by_name(collection)
            .and_then(|c| c.as_any().downcast_ref::<ListArray>())
            .ok_or_else(|| {
                ArrowError::InvalidArgumentError(format!(
                    "projection '{name}': '{collection}' is not a collection column"
                ))
            })?;

        let (field, column) = match member {
            Some(member) => project_member(name, list, member)?,
            None => project_cardinality(name, list),
        };
        fields.push(field);
        columns.push(column);
    }

    let schema = Schema::new(fields).with_metadata(schema.metadata().clone());
    RecordBatch::try_new(Arc::new(schema), columns)
}

fn project_member(
    name: &str,
    list: &ListArray,
    member: &str,
) -> Result<(Field, ArrayRef), ArrowError> {
    let elements = list
        .values()
        .as_any()
        .downcast_ref::<StructArray>()
        .ok_or_else(|| {
            ArrowError::InvalidArgumentError(format!("projection '{name}': items are not records"))
        })?;
    let values = elements.column_by_name(member).ok_or_else(|| {
        ArrowError::InvalidArgumentError(format!("projection '{name}': no member '{member}'"))
    })?;

    let item = Arc::new(Field::new(
        ITEM_FIELD,
        values.data_type().clone(),
        values.null_count() > 0,
    ));
    let projected = ListArray::try_new(
        item,
        list.offsets().clone(),
        values.clone(),
        list.nulls().cloned(),
    )?;
    let field = Field::new(name, projected.data_type().clone(), list.null_count() > 0);
    Ok((field, Arc::new(projected)))
}

fn project_cardinality(name: &str, list: &ListArray) -> (Field, ArrayRef) {
    let counts =
        UInt64Array::from_iter_values(list.offsets().windows(2).map(|w| (w[1] - w[0]) as u64));
    (
        Field::new(name, counts.data_type().clone(), false),
        Arc::new(counts),
    )
}
