use std::sync::Arc;

use arrow::datatypes::{DataType, Field};
use tree2arrow_arrow::{Model, PROJECTIONS_METADATA_KEY, field_defs_to_arrow_schema};
use tree2arrow_core::{DataTypeDef, FieldDef, FieldDefs};

fn item(dt: DataType) -> Arc<Field> {
    Arc::new(Field::new("item", dt, false))
}

#[test]
fn maps_primitive_array_and_record_types() {
    let fields: FieldDefs = vec![
        FieldDef::new("flag", DataTypeDef::Bool),
        FieldDef::new("run", DataTypeDef::I32),
        FieldDef::new("energy", DataTypeDef::F64),
        FieldDef::new("label", DataTypeDef::String),
        FieldDef::new("arr", DataTypeDef::Array(Box::new(DataTypeDef::U16), 5)),
        FieldDef::new(
            "pos",
            DataTypeDef::Record(
                vec![
                    FieldDef::new("x", DataTypeDef::F32),
                    FieldDef::new("y", DataTypeDef::F32),
                ]
                .into(),
            ),
        ),
    ]
    .into();

    let schema = field_defs_to_arrow_schema(&fields, &[]);
    let types: Vec<&DataType> = schema.fields().iter().map(|f| f.data_type()).collect();
    assert_eq!(types[0], &DataType::Boolean);
    assert_eq!(types[1], &DataType::Int32);
    assert_eq!(types[2], &DataType::Float64);
    assert_eq!(types[3], &DataType::Utf8);
    assert_eq!(types[4], &DataType::FixedSizeList(item(DataType::UInt16), 5));
    assert_eq!(
        types[5],
        &DataType::Struct(
            vec![
                Field::new("x", DataType::Float32, false),
                Field::new("y", DataType::Float32, false),
            ]
            .into()
        )
    );
    assert!(schema.fields().iter().all(|f| !f.is_nullable()));
    assert!(schema.metadata().is_empty());
}

#[test]
fn collection_is_list_of_struct_and_projections_go_to_metadata() {
    let mut sub = Model::create_bare();
    sub.add_field(FieldDef::new("vals", DataTypeDef::F32)).unwrap();
    sub.freeze();

    let mut model = Model::create_bare();
    model.make_collection("_collection0", sub).unwrap();
    model
        .add_projected_field(
            FieldDef::new("vals", DataTypeDef::Vec(Box::new(DataTypeDef::F32))),
            |name| {
                if name == "vals" {
                    "_collection0".to_string()
                } else {
                    "_collection0.vals".to_string()
                }
            },
        )
        .unwrap();
    model
        .add_projected_field(FieldDef::new("n", DataTypeDef::Cardinality), |_| {
            "_collection0".to_string()
        })
        .unwrap();
    model.freeze();

    let fields: FieldDefs = model.fields().to_vec().into();
    let schema = field_defs_to_arrow_schema(&fields, model.projected_fields());
    assert_eq!(schema.fields().len(), 1);
    assert_eq!(
        schema.field(0).data_type(),
        &DataType::List(item(DataType::Struct(
            vec![Field::new("vals", DataType::Float32, false)].into()
        )))
    );
    assert_eq!(
        schema.metadata().get(PROJECTIONS_METADATA_KEY).map(String::as_str),
        Some("vals=_collection0.vals;n=_collection0")
    );
}
