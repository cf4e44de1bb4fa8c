use std::{
    fmt::{Display, Formatter, Result},
    ops::Deref,
};

/// Destination data type of a field.
///
/// `Vec` and `Cardinality` only appear on projected fields: they describe a
/// view over a [`DataTypeDef::Collection`] and are never stored themselves.
#[derive(Debug, Clone, PartialEq)]
pub enum DataTypeDef {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    String,
    Array(Box<DataTypeDef>, usize),
    Record(FieldDefs),
    Collection(FieldDefs),
    Vec(Box<DataTypeDef>),
    Cardinality,
}

impl DataTypeDef {
    pub fn is_primitive(&self) -> bool {
        !matches!(
            self,
            DataTypeDef::Array(_, _)
                | DataTypeDef::Record(_)
                | DataTypeDef::Collection(_)
                | DataTypeDef::Vec(_)
        )
    }

    /// Whether values of this type are stored as raw fixed-size bytes.
    pub fn is_raw(&self) -> bool {
        self.value_size().is_some()
    }

    /// Size in bytes of one value in its packed in-memory layout.
    ///
    /// Records are packed without padding. Returns `None` for types that do
    /// not have a fixed raw representation.
    pub fn value_size(&self) -> Option<usize> {
        match self {
            DataTypeDef::Bool | DataTypeDef::I8 | DataTypeDef::U8 => Some(1),
            DataTypeDef::I16 | DataTypeDef::U16 => Some(2),
            DataTypeDef::I32 | DataTypeDef::U32 | DataTypeDef::F32 => Some(4),
            DataTypeDef::I64 | DataTypeDef::U64 | DataTypeDef::F64 => Some(8),
            DataTypeDef::Array(elem, n) => elem.value_size().map(|s| s * n),
            DataTypeDef::Record(fields) => fields
                .iter()
                .map(|f| f.data_type.value_size())
                .sum::<Option<usize>>(),
            DataTypeDef::String
            | DataTypeDef::Collection(_)
            | DataTypeDef::Vec(_)
            | DataTypeDef::Cardinality => None,
        }
    }

    /// Canonical type name, in the notation accepted by the type registry.
    pub fn type_name(&self) -> String {
        match self {
            DataTypeDef::Bool => "bool".to_string(),
            DataTypeDef::I8 => "std::int8_t".to_string(),
            DataTypeDef::I16 => "std::int16_t".to_string(),
            DataTypeDef::I32 => "std::int32_t".to_string(),
            DataTypeDef::I64 => "std::int64_t".to_string(),
            DataTypeDef::U8 => "std::uint8_t".to_string(),
            DataTypeDef::U16 => "std::uint16_t".to_string(),
            DataTypeDef::U32 => "std::uint32_t".to_string(),
            DataTypeDef::U64 => "std::uint64_t".to_string(),
            DataTypeDef::F32 => "float".to_string(),
            DataTypeDef::F64 => "double".to_string(),
            DataTypeDef::String => "std::string".to_string(),
            DataTypeDef::Array(elem, n) => format!("std::array<{},{n}>", elem.type_name()),
            DataTypeDef::Record(_) => "record".to_string(),
            DataTypeDef::Collection(_) => "collection".to_string(),
            DataTypeDef::Vec(elem) => format!("ROOT::RVec<{}>", elem.type_name()),
            DataTypeDef::Cardinality => "ROOT::RNTupleCardinality<std::uint64_t>".to_string(),
        }
    }
}

/// Typed collection of [`FieldDef`] used for schema bodies and record members.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldDefs(pub Vec<FieldDef>);

impl FieldDefs {
    pub fn new(fields: Vec<FieldDef>) -> Self {
        Self(fields)
    }

    pub fn as_slice(&self) -> &[FieldDef] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDef> {
        self.0.iter()
    }

    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.0.iter().find(|f| f.name == name)
    }
}

impl From<Vec<FieldDef>> for FieldDefs {
    fn from(value: Vec<FieldDef>) -> Self {
        Self(value)
    }
}

impl From<FieldDefs> for Vec<FieldDef> {
    fn from(value: FieldDefs) -> Self {
        value.0
    }
}

impl AsRef<[FieldDef]> for FieldDefs {
    fn as_ref(&self) -> &[FieldDef] {
        self.as_slice()
    }
}

impl Deref for FieldDefs {
    type Target = [FieldDef];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl Display for FieldDefs {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let text = super::format_field_defs(self.as_slice())?;
        f.write_str(&text)
    }
}

/// Named destination field.
///
/// `type_name` is what the field reports as its type; for class records it
/// carries the class name, otherwise it is the canonical name of `data_type`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub type_name: String,
    pub data_type: DataTypeDef,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, data_type: DataTypeDef) -> Self {
        Self {
            name: name.into(),
            type_name: data_type.type_name(),
            data_type,
        }
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    pub fn value_size(&self) -> Option<usize> {
        self.data_type.value_size()
    }
}
