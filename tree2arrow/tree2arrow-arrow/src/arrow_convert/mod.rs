//! Appending bound field values to Arrow builders.
//!
//! Values arrive as [`ValueRef`](crate::ValueRef)s: packed native-endian bytes
//! laid out as described by the field's `DataTypeDef`, or owned text.

mod append;
mod builder;

pub(crate) use append::{
    append_collection_element, append_value, check_value, close_collection_row,
};
pub(crate) use builder::make_builder;
