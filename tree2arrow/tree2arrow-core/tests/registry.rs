use tree2arrow_core::{
    ClassDef, ClassMember, DataTypeDef, FieldDef, TypeError, TypeRegistry, ValueBuffer,
};

fn point() -> ClassDef {
    ClassDef::new(
        "Point",
        vec![
            ClassMember::new("x", "float"),
            ClassMember::new("y", "float"),
            ClassMember::new("id", "Int_t"),
        ],
    )
}

#[test]
fn creates_primitive_fields_from_leaf_and_std_names() {
    let registry = TypeRegistry::new();
    let cases = [
        ("Int_t", DataTypeDef::I32),
        ("Float_t", DataTypeDef::F32),
        ("ULong64_t", DataTypeDef::U64),
        ("std::int16_t", DataTypeDef::I16),
        ("double", DataTypeDef::F64),
        ("Bool_t", DataTypeDef::Bool),
        ("std::string", DataTypeDef::String),
        (
            "ROOT::RNTupleCardinality<std::uint64_t>",
            DataTypeDef::Cardinality,
        ),
    ];
    for (type_name, expected) in cases {
        let field = registry.create_field("f", type_name).unwrap();
        assert_eq!(field.data_type, expected, "{type_name}");
    }
}

#[test]
fn creates_array_and_vec_fields() {
    let registry = TypeRegistry::new();

    let arr = registry.create_field("arr", "std::array<double,4>").unwrap();
    assert_eq!(arr.data_type, DataTypeDef::Array(Box::new(DataTypeDef::F64), 4));
    assert_eq!(arr.type_name, "std::array<double,4>");
    assert_eq!(registry.value_size(&arr), Some(32));

    let vals = registry.create_field("vals", "ROOT::RVec<Float_t>").unwrap();
    assert_eq!(vals.data_type, DataTypeDef::Vec(Box::new(DataTypeDef::F32)));
    assert_eq!(vals.type_name, "ROOT::RVec<float>");
    assert_eq!(registry.value_size(&vals), None);

    assert!(matches!(
        registry.create_field("bad", "std::array<double,0>"),
        Err(TypeError::UnknownType { .. })
    ));
    assert!(matches!(
        registry.create_field("bad", "std::array<std::string,2>"),
        Err(TypeError::UnknownType { .. })
    ));
}

#[test]
fn class_becomes_packed_record() {
    let mut registry = TypeRegistry::new();
    registry.register_class(point());

    let field = registry.create_field("p", "Point").unwrap();
    assert_eq!(field.type_name, "Point");
    let DataTypeDef::Record(members) = &field.data_type else {
        panic!("expected record, got {:?}", field.data_type);
    };
    let names: Vec<&str> = members.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["x", "y", "id"]);
    assert_eq!(registry.value_size(&field), Some(12));
    assert_eq!(
        registry.generate_value(&field),
        Some(ValueBuffer::Raw(vec![0; 12]))
    );

    let arr = registry.create_field("ps", "std::array<Point,2>").unwrap();
    assert_eq!(registry.value_size(&arr), Some(24));
}

#[test]
fn unknown_types_and_classes_are_rejected() {
    let mut registry = TypeRegistry::new();
    assert!(matches!(
        registry.create_field("p", "Point"),
        Err(TypeError::UnknownType { .. })
    ));
    assert!(matches!(
        registry.resolve_class("Point"),
        Err(TypeError::UnknownClass { .. })
    ));

    registry.register_class(ClassDef::new(
        "Track",
        vec![ClassMember::new("name", "std::string")],
    ));
    assert!(matches!(
        registry.create_field("t", "Track"),
        Err(TypeError::UnsupportedMember { .. })
    ));

    registry.register_class(ClassDef::new(
        "Node",
        vec![ClassMember::new("next", "Node")],
    ));
    assert!(matches!(
        registry.create_field("n", "Node"),
        Err(TypeError::UnsupportedMember { .. })
    ));
}

#[test]
fn generated_values_match_field_kind() {
    let registry = TypeRegistry::new();
    let text = FieldDef::new("s", DataTypeDef::String);
    assert_eq!(
        registry.generate_value(&text),
        Some(ValueBuffer::Text(String::new()))
    );
    let card = FieldDef::new("n", DataTypeDef::Cardinality);
    assert_eq!(registry.generate_value(&card), None);
}
