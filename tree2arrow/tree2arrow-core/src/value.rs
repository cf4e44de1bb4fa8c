//! Typed values used to fill in-memory trees.

use std::sync::Arc;

use crate::primitive::PrimitiveType;

/// Value of one branch (or leaf) of an entry.
/// All types are explicit; no lossy conversions.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(Arc<str>),
    Array(Vec<Value>),
    Record(Vec<Value>),
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Self::String(Arc::from(s.as_ref()))
    }

    /// Build an array value from anything convertible into values.
    pub fn array<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }

    /// Interpret an integer value as an element count.
    pub fn as_count(&self) -> Option<i64> {
        match self {
            Value::I8(v) => Some(*v as i64),
            Value::I16(v) => Some(*v as i64),
            Value::I32(v) => Some(*v as i64),
            Value::I64(v) => Some(*v),
            Value::U8(v) => Some(*v as i64),
            Value::U16(v) => Some(*v as i64),
            Value::U32(v) => Some(*v as i64),
            Value::U64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Append the native-endian bytes of this value as primitive `p`.
    ///
    /// The value variant must match `p` exactly.
    pub fn encode_primitive(&self, p: PrimitiveType, out: &mut Vec<u8>) -> Result<(), String> {
        match (p, self) {
            (PrimitiveType::Bool, Value::Bool(v)) => out.push(u8::from(*v)),
            (PrimitiveType::I8, Value::I8(v)) => out.extend_from_slice(&v.to_ne_bytes()),
            (PrimitiveType::I16, Value::I16(v)) => out.extend_from_slice(&v.to_ne_bytes()),
            (PrimitiveType::I32, Value::I32(v)) => out.extend_from_slice(&v.to_ne_bytes()),
            (PrimitiveType::I64, Value::I64(v)) => out.extend_from_slice(&v.to_ne_bytes()),
            (PrimitiveType::U8, Value::U8(v)) => out.push(*v),
            (PrimitiveType::U16, Value::U16(v)) => out.extend_from_slice(&v.to_ne_bytes()),
            (PrimitiveType::U32, Value::U32(v)) => out.extend_from_slice(&v.to_ne_bytes()),
            (PrimitiveType::U64, Value::U64(v)) => out.extend_from_slice(&v.to_ne_bytes()),
            (PrimitiveType::F32, Value::F32(v)) => out.extend_from_slice(&v.to_ne_bytes()),
            (PrimitiveType::F64, Value::F64(v)) => out.extend_from_slice(&v.to_ne_bytes()),
            _ => {
                return Err(format!(
                    "expected {}, got {}",
                    p.leaf_type_name(),
                    self.variant_name()
                ));
            }
        }
        Ok(())
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::I8(_) => "I8",
            Value::I16(_) => "I16",
            Value::I32(_) => "I32",
            Value::I64(_) => "I64",
            Value::U8(_) => "U8",
            Value::U16(_) => "U16",
            Value::U32(_) => "U32",
            Value::U64(_) => "U64",
            Value::F32(_) => "F32",
            Value::F64(_) => "F64",
            Value::String(_) => "String",
            Value::Array(_) => "Array",
            Value::Record(_) => "Record",
        }
    }
}

macro_rules! impl_from_primitive {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_primitive!(
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::string(v)
    }
}
