//! Destination schema builder.
//!
//! A [`Model`] is an ordered list of stored fields plus projected fields that
//! only describe views over stored collections. It is mutable until
//! [`Model::freeze`] and immutable afterwards.

use tree2arrow_core::{DataTypeDef, FieldDef, FieldDefs};

use crate::{entry::Entry, error::ModelError};

/// Handle of a collection registered with [`Model::make_collection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionId(usize);

impl CollectionId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A field whose values are derived from a stored collection.
///
/// With `member` set the field is the flattened per-row list of that member;
/// without it the field is the per-row element count of the collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedField {
    pub field: FieldDef,
    pub collection: String,
    pub member: Option<String>,
}

impl ProjectedField {
    pub(crate) fn encode(&self) -> String {
        match &self.member {
            Some(member) => format!("{}={}.{member}", self.field.name, self.collection),
            None => format!("{}={}", self.field.name, self.collection),
        }
    }

    /// Inverse of [`ProjectedField::encode`]: `(name, collection, member)`.
    pub(crate) fn decode(item: &str) -> Option<(&str, &str, Option<&str>)> {
        let (name, source) = item.split_once('=')?;
        Some(match source.split_once('.') {
            Some((collection, member)) => (name, collection, Some(member)),
            None => (name, source, None),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Model {
    fields: Vec<FieldDef>,
    projected: Vec<ProjectedField>,
    collections: Vec<(String, Model)>,
    frozen: bool,
}

impl Model {
    /// Create an empty, unfrozen model.
    pub fn create_bare() -> Self {
        Self::default()
    }

    pub fn add_field(&mut self, field: FieldDef) -> Result<(), ModelError> {
        self.ensure_new_name(&field.name)?;
        self.fields.push(field);
        Ok(())
    }

    /// Register a projected field.
    ///
    /// `mapping` translates field names of the projected subtree into source
    /// paths: the field itself must map onto a collection, and for `Vec`
    /// fields the item name `<field>._0` must map onto `<collection>.<member>`
    /// with a member of the same type.
    pub fn add_projected_field(
        &mut self,
        field: FieldDef,
        mapping: impl Fn(&str) -> String,
    ) -> Result<(), ModelError> {
        self.ensure_new_name(&field.name)?;
        let invalid = |detail: String| ModelError::InvalidProjection {
            field: field.name.clone(),
            detail,
        };

        let collection = mapping(&field.name);
        let Some(DataTypeDef::Collection(members)) = self
            .fields
            .iter()
            .find(|f| f.name == collection)
            .map(|f| &f.data_type)
        else {
            return Err(invalid(format!("'{collection}' is not a collection")));
        };

        let member = match &field.data_type {
            DataTypeDef::Cardinality => None,
            DataTypeDef::Vec(elem) => {
                let item_source = mapping(&format!("{}._0", field.name));
                let member = item_source
                    .strip_prefix(&collection)
                    .and_then(|rest| rest.strip_prefix('.'))
                    .ok_or_else(|| {
                        invalid(format!("'{item_source}' is not a member of '{collection}'"))
                    })?;
                let source = members
                    .get(member)
                    .ok_or_else(|| invalid(format!("'{item_source}' not found")))?;
                if source.data_type != **elem {
                    return Err(invalid(format!(
                        "item type {} does not match '{item_source}' of type {}",
                        elem.type_name(),
                        source.type_name
                    )));
                }
                Some(member.to_string())
            }
            other => {
                return Err(invalid(format!(
                    "{} fields cannot be projected",
                    other.type_name()
                )));
            }
        };

        self.projected.push(ProjectedField {
            field,
            collection,
            member,
        });
        Ok(())
    }

    /// Register `sub_model` as a collection field named `name`.
    ///
    /// The sub-model must already be frozen.
    pub fn make_collection(
        &mut self,
        name: &str,
        sub_model: Model,
    ) -> Result<CollectionId, ModelError> {
        if !sub_model.frozen {
            return Err(ModelError::NotFrozen);
        }
        self.add_field(FieldDef::new(
            name,
            DataTypeDef::Collection(FieldDefs::new(sub_model.fields.clone())),
        ))?;
        self.collections.push((name.to_string(), sub_model));
        Ok(CollectionId(self.collections.len() - 1))
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Stored fields in declaration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn projected_fields(&self) -> &[ProjectedField] {
        &self.projected
    }

    pub fn collection(&self, id: CollectionId) -> Option<&Model> {
        self.collections.get(id.0).map(|(_, m)| m)
    }

    pub fn collection_id(&self, name: &str) -> Option<CollectionId> {
        self.collections
            .iter()
            .position(|(n, _)| n == name)
            .map(CollectionId)
    }

    pub(crate) fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.iter().map(|(n, _)| n.as_str())
    }

    /// Stored fields followed by projected fields, for display.
    pub fn describe(&self) -> FieldDefs {
        self.fields
            .iter()
            .cloned()
            .chain(self.projected.iter().map(|p| p.field.clone()))
            .collect::<Vec<_>>()
            .into()
    }

    /// Create an entry with one unbound slot per stored field.
    pub fn create_bare_entry(&self) -> Result<Entry, ModelError> {
        if !self.frozen {
            return Err(ModelError::NotFrozen);
        }
        Ok(Entry::new(FieldDefs::new(self.fields.clone())))
    }

    fn ensure_new_name(&self, name: &str) -> Result<(), ModelError> {
        if self.frozen {
            return Err(ModelError::Frozen);
        }
        let taken = self.fields.iter().any(|f| f.name == name)
            || self.projected.iter().any(|p| p.field.name == name);
        if taken {
            return Err(ModelError::DuplicateField {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}
