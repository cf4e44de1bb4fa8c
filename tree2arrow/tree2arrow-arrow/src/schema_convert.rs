use std::{collections::HashMap, sync::Arc};

use arrow::datatypes::{DataType, Field, Schema};
use tree2arrow_core::{DataTypeDef, FieldDef, FieldDefs};

use crate::model::ProjectedField;

/// Schema metadata key listing the projected fields of a dataset.
pub const PROJECTIONS_METADATA_KEY: &str = "tree2arrow:projections";

/// Item field name of list-like Arrow types.
pub(crate) const ITEM_FIELD: &str = "item";

/// Converts stored field definitions into an Arrow `Schema`.
///
/// Projected fields are not stored; they are listed in the schema metadata
/// under [`PROJECTIONS_METADATA_KEY`] so that readers can rebuild the views
/// with [`project_record_batch`](crate::project_record_batch).
pub fn field_defs_to_arrow_schema(fields: &FieldDefs, projections: &[ProjectedField]) -> Schema {
    let arrow_fields: Vec<Field> = fields.iter().map(field_def_to_arrow_field).collect();
    let schema = Schema::new(arrow_fields);
    if projections.is_empty() {
        return schema;
    }
    let encoded = projections
        .iter()
        .map(ProjectedField::encode)
        .collect::<Vec<_>>()
        .join(";");
    schema.with_metadata(HashMap::from([(
        PROJECTIONS_METADATA_KEY.to_string(),
        encoded,
    )]))
}

pub(crate) fn field_def_to_arrow_field(f: &FieldDef) -> Field {
    Field::new(&f.name, data_type_def_to_datatype(&f.data_type), false)
}

pub(crate) fn data_type_def_to_datatype(dt: &DataTypeDef) -> DataType {
    match dt {
        DataTypeDef::Bool => DataType::Boolean,
        DataTypeDef::I8 => DataType::Int8,
        DataTypeDef::I16 => DataType::Int16,
        DataTypeDef::I32 => DataType::Int32,
        DataTypeDef::I64 => DataType::Int64,
        DataTypeDef::U8 => DataType::UInt8,
        DataTypeDef::U16 => DataType::UInt16,
        DataTypeDef::U32 => DataType::UInt32,
        DataTypeDef::U64 | DataTypeDef::Cardinality => DataType::UInt64,
        DataTypeDef::F32 => DataType::Float32,
        DataTypeDef::F64 => DataType::Float64,
        DataTypeDef::String => DataType::Utf8,
        DataTypeDef::Record(fields) => {
            let arrow_fields: Vec<Field> = fields.iter().map(field_def_to_arrow_field).collect();
            DataType::Struct(arrow_fields.into())
        }
        DataTypeDef::Collection(fields) => {
            let arrow_fields: Vec<Field> = fields.iter().map(field_def_to_arrow_field).collect();
            list_of(DataType::Struct(arrow_fields.into()))
        }
        DataTypeDef::Vec(elem) => list_of(data_type_def_to_datatype(elem)),
        DataTypeDef::Array(elem, size) => DataType::FixedSizeList(
            Arc::new(Field::new(ITEM_FIELD, data_type_def_to_datatype(elem), false)),
            *size as i32,
        ),
    }
}

pub(crate) fn list_of(item: DataType) -> DataType {
    DataType::List(Arc::new(Field::new(ITEM_FIELD, item, false)))
}
