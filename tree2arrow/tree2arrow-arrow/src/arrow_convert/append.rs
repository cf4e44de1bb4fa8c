use arrow::array::{
    ArrayBuilder, BooleanBuilder, FixedSizeListBuilder, Float32Builder, Float64Builder,
    Int8Builder, Int16Builder, Int32Builder, Int64Builder, ListBuilder, StringBuilder,
    StructBuilder, UInt8Builder, UInt16Builder, UInt32Builder, UInt64Builder,
};
use tree2arrow_core::{DataTypeDef, FieldDef, FieldDefs};

use crate::{entry::ValueRef, error::WriteError};

macro_rules! cast_builder {
    ($b:expr, $T:ty) => {
        $b.as_any_mut()
            .downcast_mut::<$T>()
            .expect(concat!("expected builder type: ", stringify!($T)))
    };
}

macro_rules! append_ne {
    ($b:expr, $B:ty, $T:ty, $bytes:expr) => {{
        let mut buf = [0u8; std::mem::size_of::<$T>()];
        buf.copy_from_slice(&$bytes[..std::mem::size_of::<$T>()]);
        cast_builder!($b, $B).append_value(<$T>::from_ne_bytes(buf))
    }};
}

/// Check that `value` can be appended as a value of `field`.
///
/// Raw buffers may be larger than one value; only the leading bytes are read.
pub(crate) fn check_value(field: &FieldDef, value: ValueRef<'_>) -> Result<(), WriteError> {
    let mismatch = |expected| WriteError::TypeMismatch {
        field: field.name.clone(),
        expected,
    };
    match (&field.data_type, value) {
        (DataTypeDef::String, ValueRef::Text(_)) => Ok(()),
        (DataTypeDef::String, ValueRef::Raw(_)) => Err(mismatch("text")),
        (dt, ValueRef::Raw(bytes)) => match dt.value_size() {
            Some(expected) if bytes.len() >= expected => Ok(()),
            Some(expected) => Err(WriteError::ValueSizeMismatch {
                field: field.name.clone(),
                expected,
                actual: bytes.len(),
            }),
            None => Err(mismatch("a stored")),
        },
        (_, ValueRef::Text(_)) => Err(mismatch("raw")),
    }
}

/// Append a value previously accepted by [`check_value`].
pub(crate) fn append_value(
    builder: &mut Box<dyn ArrayBuilder>,
    dt: &DataTypeDef,
    value: ValueRef<'_>,
) {
    match value {
        ValueRef::Text(s) => cast_builder!(builder, StringBuilder).append_value(s),
        ValueRef::Raw(bytes) => append_raw(builder, dt, bytes),
    }
}

/// Append one element to a `List<Struct>` collection column without closing
/// the current row.
pub(crate) fn append_collection_element<'a>(
    builder: &mut Box<dyn ArrayBuilder>,
    members: &FieldDefs,
    values: impl IntoIterator<Item = ValueRef<'a>>,
) {
    let list = cast_builder!(builder, ListBuilder<Box<dyn ArrayBuilder>>);
    let sb = cast_builder!(list.values(), StructBuilder);
    for (i, (member, value)) in members.iter().zip(values).enumerate() {
        append_value(&mut sb.field_builders_mut()[i], &member.data_type, value);
    }
    sb.append(true);
}

/// Close the current row of a collection column.
pub(crate) fn close_collection_row(builder: &mut Box<dyn ArrayBuilder>) {
    cast_builder!(builder, ListBuilder<Box<dyn ArrayBuilder>>).append(true);
}

fn append_raw(builder: &mut Box<dyn ArrayBuilder>, dt: &DataTypeDef, bytes: &[u8]) {
    match dt {
        DataTypeDef::Bool => cast_builder!(builder, BooleanBuilder).append_value(bytes[0] != 0),
        DataTypeDef::I8 => append_ne!(builder, Int8Builder, i8, bytes),
        DataTypeDef::I16 => append_ne!(builder, Int16Builder, i16, bytes),
        DataTypeDef::I32 => append_ne!(builder, Int32Builder, i32, bytes),
        DataTypeDef::I64 => append_ne!(builder, Int64Builder, i64, bytes),
        DataTypeDef::U8 => append_ne!(builder, UInt8Builder, u8, bytes),
        DataTypeDef::U16 => append_ne!(builder, UInt16Builder, u16, bytes),
        DataTypeDef::U32 => append_ne!(builder, UInt32Builder, u32, bytes),
        DataTypeDef::U64 => append_ne!(builder, UInt64Builder, u64, bytes),
        DataTypeDef::F32 => append_ne!(builder, Float32Builder, f32, bytes),
        DataTypeDef::F64 => append_ne!(builder, Float64Builder, f64, bytes),
        DataTypeDef::Array(elem, n) => {
            let b = cast_builder!(builder, FixedSizeListBuilder<Box<dyn ArrayBuilder>>);
            let size = elem.value_size().unwrap_or_default();
            for i in 0..*n {
                append_raw(b.values(), elem, &bytes[i * size..]);
            }
            b.append(true);
        }
        DataTypeDef::Record(fields) => {
            let b = cast_builder!(builder, StructBuilder);
            let mut offset = 0;
            for (i, f) in fields.iter().enumerate() {
                append_raw(&mut b.field_builders_mut()[i], &f.data_type, &bytes[offset..]);
                offset += f.value_size().unwrap_or_default();
            }
            b.append(true);
        }
        other => panic!("{other:?} has no raw representation"),
    }
}
