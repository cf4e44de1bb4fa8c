//! Type-name based field factory and class dictionary.
//!
//! Every destination field is created from a type name string, the same way
//! the source reports its leaf types. Lookup order:
//!
//! 1. **Primitive** names (`Int_t`, `float`, `std::uint64_t`, ...).
//! 2. **Builtin** names: `std::string` and the cardinality type.
//! 3. **Templates**: `std::array<T,N>` and `ROOT::RVec<T>` / `std::vector<T>`.
//! 4. **Classes** registered with [`TypeRegistry::register_class`], which
//!    become packed records of their members.
//! 5. **Error**: [`TypeError::UnknownType`].

use std::collections::HashMap;

use crate::{
    error::TypeError,
    primitive::PrimitiveType,
    schema::{DataTypeDef, FieldDef, FieldDefs},
};

const CARDINALITY_TYPES: &[&str] = &[
    "ROOT::RNTupleCardinality<std::uint64_t>",
    "ROOT::RNTupleCardinality<std::uint32_t>",
    "ROOT::Experimental::RNTupleCardinality",
];
const VEC_PREFIXES: &[&str] = &["ROOT::RVec<", "ROOT::VecOps::RVec<", "std::vector<"];
const ARRAY_PREFIX: &str = "std::array<";

/// Member of a registered class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMember {
    pub name: String,
    pub type_name: String,
}

impl ClassMember {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Dictionary entry describing the in-memory layout of a class.
///
/// Members are laid out in declaration order without padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    pub name: String,
    pub members: Vec<ClassMember>,
}

impl ClassDef {
    pub fn new(name: impl Into<String>, members: Vec<ClassMember>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }
}

/// Freshly allocated storage for one value of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueBuffer {
    /// Packed native-endian bytes of a fixed-size value.
    Raw(Vec<u8>),
    /// Owned string value.
    Text(String),
}

/// Resolves type names to field descriptors.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    classes: HashMap<String, ClassDef>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a class dictionary entry.
    pub fn register_class(&mut self, class: ClassDef) {
        self.classes.insert(class.name.clone(), class);
    }

    pub fn register_classes(&mut self, classes: impl IntoIterator<Item = ClassDef>) {
        for class in classes {
            self.register_class(class);
        }
    }

    /// Resolve a loadable class descriptor by name.
    pub fn resolve_class(&self, class_name: &str) -> Result<&ClassDef, TypeError> {
        self.classes
            .get(class_name.trim())
            .ok_or_else(|| TypeError::UnknownClass {
                class_name: class_name.trim().to_string(),
            })
    }

    /// Create a field named `name` of type `type_name`.
    pub fn create_field(&self, name: &str, type_name: &str) -> Result<FieldDef, TypeError> {
        let mut visiting = Vec::new();
        self.create_field_inner(name, type_name, &mut visiting)
    }

    /// Size in bytes of one value of `field`, if it is stored as raw bytes.
    pub fn value_size(&self, field: &FieldDef) -> Option<usize> {
        field.value_size()
    }

    /// Allocate a zero-initialized value buffer for `field`.
    ///
    /// Returns `None` for projection-only and collection types, which have no
    /// value of their own.
    pub fn generate_value(&self, field: &FieldDef) -> Option<ValueBuffer> {
        match &field.data_type {
            DataTypeDef::String => Some(ValueBuffer::Text(String::new())),
            dt => dt.value_size().map(|n| ValueBuffer::Raw(vec![0; n])),
        }
    }

    fn create_field_inner(
        &self,
        name: &str,
        type_name: &str,
        visiting: &mut Vec<String>,
    ) -> Result<FieldDef, TypeError> {
        let type_name = type_name.trim();
        let unknown = || TypeError::UnknownType {
            field: name.to_string(),
            type_name: type_name.to_string(),
        };

        if let Some(p) = PrimitiveType::from_type_name(type_name) {
            return Ok(FieldDef::new(name, p.to_data_type()));
        }
        if type_name == "std::string" {
            return Ok(FieldDef::new(name, DataTypeDef::String));
        }
        if CARDINALITY_TYPES.contains(&type_name) {
            return Ok(FieldDef::new(name, DataTypeDef::Cardinality));
        }
        if let Some(args) = template_args(type_name, ARRAY_PREFIX) {
            let [elem, len] = args.as_slice() else {
                return Err(unknown());
            };
            let len: usize = len.trim().parse().map_err(|_| unknown())?;
            let elem = self.create_field_inner(name, elem, visiting)?;
            if !elem.data_type.is_raw() || len == 0 {
                return Err(unknown());
            }
            return Ok(FieldDef::new(
                name,
                DataTypeDef::Array(Box::new(elem.data_type), len),
            ));
        }
        for prefix in VEC_PREFIXES {
            if let Some(args) = template_args(type_name, prefix) {
                let [elem] = args.as_slice() else {
                    return Err(unknown());
                };
                let elem = self.create_field_inner(name, elem, visiting)?;
                return Ok(FieldDef::new(name, DataTypeDef::Vec(Box::new(elem.data_type))));
            }
        }

        let Some(class) = self.classes.get(type_name) else {
            return Err(unknown());
        };
        if visiting.iter().any(|c| c == type_name) {
            return Err(TypeError::UnsupportedMember {
                class_name: type_name.to_string(),
                member: name.to_string(),
                type_name: type_name.to_string(),
            });
        }
        visiting.push(type_name.to_string());
        let mut members = Vec::with_capacity(class.members.len());
        for m in &class.members {
            let member = self.create_field_inner(&m.name, &m.type_name, visiting)?;
            if !member.data_type.is_raw() {
                return Err(TypeError::UnsupportedMember {
                    class_name: class.name.clone(),
                    member: m.name.clone(),
                    type_name: m.type_name.clone(),
                });
            }
            members.push(member);
        }
        visiting.pop();

        Ok(
            FieldDef::new(name, DataTypeDef::Record(FieldDefs::new(members)))
                .with_type_name(&class.name),
        )
    }
}

/// Split the arguments of `prefix...>` at top-level commas.
fn template_args<'a>(type_name: &'a str, prefix: &str) -> Option<Vec<&'a str>> {
    let inner = type_name.strip_prefix(prefix)?.strip_suffix('>')?;
    let mut args = Vec::new();
    let mut depth = 0_usize;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => {
                args.push(inner[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    args.push(inner[start..].trim());
    Some(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_args_respect_nesting() {
        assert_eq!(
            template_args("std::array<std::array<float,2>,3>", ARRAY_PREFIX),
            Some(vec!["std::array<float,2>", "3"])
        );
        assert_eq!(template_args("std::array<float,2", ARRAY_PREFIX), None);
        assert_eq!(template_args("std::vector<int>", ARRAY_PREFIX), None);
    }
}
