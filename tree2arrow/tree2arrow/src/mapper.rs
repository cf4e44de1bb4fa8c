//! Destination schema derivation.
//!
//! Turns classified branches into a frozen [`Model`], the import fields that
//! feed it, the leaf-count collections and the branch buffer plan. Scalars,
//! fixed arrays, leaf lists and class objects alias their branch buffer;
//! C strings and variable array elements go through a transformation.

use std::collections::BTreeMap;

use tree2arrow_arrow::{BufferId, CollectionId, Entry, Model};
use tree2arrow_core::{
    DataTypeDef, FieldDef, LeafDef, PrimitiveType, TypeError, TypeRegistry, ValueBuffer,
};

use crate::{
    buffers::{BranchBuffers, ImportField},
    error::ImportError,
    transform::{CStringTransformation, LeafArrayTransformation, Transformation},
    walker::{ClassifiedBranch, LeafClass},
};

const CARDINALITY_TYPE: &str = "ROOT::RNTupleCardinality<std::uint64_t>";

/// A count leaf and the variable arrays sharing it.
///
/// Every entry appends exactly `count` elements to the collection, built by
/// running each transformation once per element.
#[derive(Debug)]
pub struct LeafCountCollection {
    pub count_leaf: String,
    pub count_type: PrimitiveType,
    /// Branch buffer holding the count of the current entry.
    pub count_branch: usize,
    pub max_len: usize,
    /// Name of the collection field, `_collection<i>`.
    pub field_name: String,
    pub id: CollectionId,
    pub entry: Entry,
    pub field_indexes: Vec<usize>,
    pub transformations: Vec<LeafArrayTransformation>,
}

impl LeafCountCollection {
    /// Count of the current entry, or `None` if it cannot be decoded.
    pub fn read_count(&self, branches: &BranchBuffers) -> Option<i64> {
        branches
            .bytes(self.count_branch)
            .and_then(|bytes| self.count_type.read_count(bytes))
    }

    pub fn reset_cursors(&mut self) {
        for t in &mut self.transformations {
            t.reset_entry();
        }
    }
}

/// Everything the copier needs: frozen model, bound entries and buffers.
#[derive(Debug)]
pub struct ImportPlan {
    pub model: Model,
    pub entry: Entry,
    pub branches: BranchBuffers,
    pub fields: Vec<ImportField>,
    pub collections: Vec<LeafCountCollection>,
    /// Top-level C-string transformations.
    pub transformations: Vec<CStringTransformation>,
}

struct PendingCollection {
    count_type: PrimitiveType,
    count_branch: usize,
    max_len: usize,
    model: Model,
    field_indexes: Vec<usize>,
    transformations: Vec<LeafArrayTransformation>,
}

/// Build the import plan for `classified` branches.
///
/// Collections are created in count-leaf name order. Nothing is frozen if any
/// branch fails to map.
pub fn map_schema(
    classified: &[ClassifiedBranch<'_>],
    registry: &TypeRegistry,
) -> Result<ImportPlan, ImportError> {
    let mut model = Model::create_bare();
    let mut branches = BranchBuffers::new();
    let mut fields: Vec<ImportField> = Vec::new();
    let mut transformations = Vec::new();
    let mut pending: BTreeMap<String, PendingCollection> = BTreeMap::new();

    for c in classified {
        let name = c.name();
        let leaf = c.leaf().ok_or_else(|| ImportError::UnsupportedSchema {
            branch: name.to_string(),
            detail: "branch without leaves".to_string(),
        })?;

        match &c.class {
            LeafClass::Scalar | LeafClass::FixedArray(_) => {
                let field = leaf_field(registry, name, leaf)?;
                let b = branches.add(name, raw_size(name, &field)?);
                model.add_field(field.clone())?;
                fields.push(ImportField::aliased(field, b));
            }
            LeafClass::CString { capacity } => {
                let field = registry.create_field(name, "std::string")?;
                let value = generate_value(registry, name, &field)?;
                let b = branches.add(name, *capacity);
                model.add_field(field.clone())?;
                transformations.push(CStringTransformation::new(b, fields.len()));
                fields.push(ImportField::owned(field, value));
            }
            LeafClass::Record(leaves) => {
                let members = leaves
                    .iter()
                    .map(|l| leaf_field(registry, &l.name, l))
                    .collect::<Result<Vec<_>, _>>()?;
                let field = FieldDef::new(name, DataTypeDef::Record(members.into()));
                let b = branches.add(name, raw_size(name, &field)?);
                model.add_field(field.clone())?;
                fields.push(ImportField::aliased(field, b));
            }
            LeafClass::OpaqueObject { class_name, len } => {
                registry.resolve_class(class_name).map_err(|e| match e {
                    TypeError::UnknownClass { class_name } => ImportError::UnsupportedSchema {
                        branch: name.to_string(),
                        detail: format!("unable to load class {class_name}"),
                    },
                    e => e.into(),
                })?;
                let type_name = match len {
                    1 => class_name.clone(),
                    n => format!("std::array<{class_name},{n}>"),
                };
                let field = registry.create_field(name, &type_name)?;
                let b = branches.add(name, raw_size(name, &field)?);
                model.add_field(field.clone())?;
                fields.push(ImportField::aliased(field, b));
            }
            LeafClass::CountLeaf { count_type, max } => {
                let count_branch = branches.add(name, count_type.size());
                pending.insert(
                    leaf.name.clone(),
                    PendingCollection {
                        count_type: *count_type,
                        count_branch,
                        max_len: *max,
                        model: Model::create_bare(),
                        field_indexes: Vec::new(),
                        transformations: Vec::new(),
                    },
                );
            }
            LeafClass::VariableArray { count_leaf } => {
                let collection =
                    pending
                        .get_mut(count_leaf)
                        .ok_or_else(|| ImportError::UnsupportedSchema {
                            branch: name.to_string(),
                            detail: format!("count leaf '{count_leaf}' not found"),
                        })?;
                let field = registry.create_field(name, &leaf.type_name)?;
                let element_size = raw_size(name, &field)?;
                let value = generate_value(registry, name, &field)?;
                let b = branches.add(name, collection.max_len * element_size);

                collection.model.add_field(field.clone())?;
                let index = fields.len();
                collection.field_indexes.push(index);
                collection
                    .transformations
                    .push(LeafArrayTransformation::new(b, index, element_size));
                fields.push(ImportField::owned(field, value).with_in_collection(true));
            }
        }
    }

    let mut collections = Vec::with_capacity(pending.len());
    for (i, (count_leaf, mut p)) in pending.into_iter().enumerate() {
        if p.field_indexes.is_empty() {
            return Err(ImportError::UnsupportedSchema {
                branch: count_leaf,
                detail: "count leaf without arrays".to_string(),
            });
        }

        p.model.freeze();
        let mut entry = p.model.create_bare_entry()?;
        for &idx in &p.field_indexes {
            entry.capture_value(&fields[idx].field.name, BufferId::Field(idx))?;
        }

        let field_name = format!("_collection{i}");
        let id = model.make_collection(&field_name, p.model)?;

        for &idx in &p.field_indexes {
            let member = &fields[idx].field;
            let name = member.name.clone();
            let projected =
                registry.create_field(&name, &format!("ROOT::RVec<{}>", member.type_name))?;
            model.add_projected_field(projected, |n| {
                if n == name {
                    field_name.clone()
                } else {
                    format!("{field_name}.{name}")
                }
            })?;
        }
        let cardinality = registry.create_field(&count_leaf, CARDINALITY_TYPE)?;
        model.add_projected_field(cardinality, |_| field_name.clone())?;

        tracing::debug!(
            collection = %field_name,
            count_leaf = %count_leaf,
            members = p.field_indexes.len(),
            max_len = p.max_len,
            "created leaf count collection"
        );

        collections.push(LeafCountCollection {
            count_leaf,
            count_type: p.count_type,
            count_branch: p.count_branch,
            max_len: p.max_len,
            field_name,
            id,
            entry,
            field_indexes: p.field_indexes,
            transformations: p.transformations,
        });
    }

    model.freeze();
    let mut entry = model.create_bare_entry()?;
    for (idx, f) in fields.iter().enumerate() {
        if f.in_collection {
            continue;
        }
        entry.capture_value(&f.field.name, BufferId::Field(idx))?;
    }
    for c in &collections {
        entry.capture_value(&c.field_name, BufferId::CollectionOffset(c.id))?;
    }

    Ok(ImportPlan {
        model,
        entry,
        branches,
        fields,
        collections,
        transformations,
    })
}

/// Field for a scalar or fixed-array leaf, created from its type name.
fn leaf_field(registry: &TypeRegistry, name: &str, leaf: &LeafDef) -> Result<FieldDef, ImportError> {
    let field = match leaf.len {
        1 => registry.create_field(name, &leaf.type_name)?,
        n => registry.create_field(name, &format!("std::array<{},{n}>", leaf.type_name))?,
    };
    Ok(field)
}

fn raw_size(branch: &str, field: &FieldDef) -> Result<usize, ImportError> {
    field
        .value_size()
        .ok_or_else(|| ImportError::UnsupportedSchema {
            branch: branch.to_string(),
            detail: format!("field '{}' of type {} has no fixed size", field.name, field.type_name),
        })
}

fn generate_value(
    registry: &TypeRegistry,
    branch: &str,
    field: &FieldDef,
) -> Result<ValueBuffer, ImportError> {
    registry
        .generate_value(field)
        .ok_or_else(|| ImportError::UnsupportedSchema {
            branch: branch.to_string(),
            detail: format!("field '{}' of type {} has no value", field.name, field.type_name),
        })
}
