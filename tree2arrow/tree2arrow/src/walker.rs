//! Classification of source branches.
//!
//! The walker visits branches in storage order and turns each one into
//! exactly one [`LeafClass`]. Every shape the importer cannot handle is
//! rejected here, before any destination field exists.

use std::collections::HashSet;

use tree2arrow_core::{BranchDef, LeafDef, LeafKind, PrimitiveType};

use crate::error::ImportError;

/// Shape of a branch as seen by the schema mapper.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafClass {
    /// Single fundamental value.
    Scalar,
    /// Fixed-size array with a static length greater than one.
    FixedArray(usize),
    /// Array whose per-entry length is the value of `count_leaf`.
    VariableArray { count_leaf: String },
    /// Integer leaf used as the length of variable arrays.
    CountLeaf { count_type: PrimitiveType, max: usize },
    /// Null-terminated string with a buffer of `capacity` bytes.
    CString { capacity: usize },
    /// Leaf list; every leaf is a scalar or a fixed array.
    Record(Vec<LeafDef>),
    /// Class object resolved by name through the type registry.
    OpaqueObject { class_name: String, len: usize },
}

/// A branch together with its classification.
#[derive(Debug, Clone)]
pub struct ClassifiedBranch<'a> {
    /// Position of the branch in the source tree.
    pub index: usize,
    pub branch: &'a BranchDef,
    pub class: LeafClass,
}

impl ClassifiedBranch<'_> {
    pub fn name(&self) -> &str {
        &self.branch.name
    }

    /// The leaf that determined the classification.
    pub fn leaf(&self) -> Option<&LeafDef> {
        self.branch.first_leaf()
    }
}

/// Classify every branch of a tree.
///
/// Fails on the first branch with an unsupported shape.
pub fn classify_branches(branches: &[BranchDef]) -> Result<Vec<ClassifiedBranch<'_>>, ImportError> {
    let mut seen_counts = HashSet::new();
    let mut classified = Vec::with_capacity(branches.len());

    for (index, branch) in branches.iter().enumerate() {
        let class = classify_branch(branch, &seen_counts)?;
        if let (LeafClass::CountLeaf { .. }, Some(leaf)) = (&class, branch.first_leaf()) {
            seen_counts.insert(leaf.name.as_str());
        }
        classified.push(ClassifiedBranch {
            index,
            branch,
            class,
        });
    }

    Ok(classified)
}

fn classify_branch(branch: &BranchDef, seen_counts: &HashSet<&str>) -> Result<LeafClass, ImportError> {
    let unsupported = |detail: &str| ImportError::UnsupportedSchema {
        branch: branch.name.clone(),
        detail: detail.to_string(),
    };

    let Some(first) = branch.first_leaf() else {
        return Err(unsupported("branch without leaves"));
    };

    if branch.leaves.iter().any(|l| l.kind == LeafKind::Object) {
        return Err(unsupported("TObject branches"));
    }

    if branch.is_leaf_list() {
        for leaf in &branch.leaves {
            if leaf.kind == LeafKind::Element {
                return Err(unsupported("classes in leaf list"));
            }
            if leaf.is_count {
                return Err(unsupported("count leaf arrays in leaf list"));
            }
            if leaf.counter.is_some() {
                return Err(unsupported("variable arrays in leaf list"));
            }
            primitive_of(leaf).ok_or_else(|| unknown_leaf_type(branch, leaf))?;
        }
        return Ok(LeafClass::Record(branch.leaves.clone()));
    }

    match first.kind {
        LeafKind::Object => Err(unsupported("TObject branches")),
        LeafKind::Element => Ok(LeafClass::OpaqueObject {
            class_name: branch
                .class_name
                .clone()
                .unwrap_or_else(|| first.type_name.clone()),
            len: first.len,
        }),
        LeafKind::CString if first.counter.is_none() && first.len == 1 => Ok(LeafClass::CString {
            capacity: first.maximum.max(1),
        }),
        LeafKind::Basic | LeafKind::CString => {
            let p = primitive_of(first).ok_or_else(|| unknown_leaf_type(branch, first))?;
            if first.is_count {
                if !p.is_integer() {
                    return Err(unsupported(&format!(
                        "count leaf '{}' of non-integer type {}",
                        first.name, first.type_name
                    )));
                }
                return Ok(LeafClass::CountLeaf {
                    count_type: p,
                    max: first.maximum,
                });
            }
            match &first.counter {
                Some(counter) if seen_counts.contains(counter.as_str()) => {
                    Ok(LeafClass::VariableArray {
                        count_leaf: counter.clone(),
                    })
                }
                Some(counter) => Err(unsupported(&format!(
                    "count leaf '{counter}' must precede its arrays"
                ))),
                None if first.len > 1 => Ok(LeafClass::FixedArray(first.len)),
                None => Ok(LeafClass::Scalar),
            }
        }
    }
}

fn primitive_of(leaf: &LeafDef) -> Option<PrimitiveType> {
    PrimitiveType::from_type_name(&leaf.type_name)
}

fn unknown_leaf_type(branch: &BranchDef, leaf: &LeafDef) -> ImportError {
    ImportError::UnsupportedSchema {
        branch: branch.name.clone(),
        detail: format!("leaf '{}' of unknown type {}", leaf.name, leaf.type_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str, type_name: &str) -> LeafDef {
        LeafDef::new(name, type_name)
    }

    fn classes(branches: &[BranchDef]) -> Result<Vec<LeafClass>, ImportError> {
        Ok(classify_branches(branches)?
            .into_iter()
            .map(|c| c.class)
            .collect())
    }

    #[test]
    fn classifies_every_shape() {
        let mut count = leaf("n", "Int_t").with_maximum(4);
        count.is_count = true;
        let branches = vec![
            BranchDef::new("run", vec![leaf("run", "Int_t")]),
            BranchDef::new("arr", vec![leaf("arr", "Double_t").with_len(5)]),
            BranchDef::new("n", vec![count]),
            BranchDef::new("vals", vec![leaf("vals", "Float_t").with_counter("n")]),
            BranchDef::new(
                "label",
                vec![leaf("label", "Char_t").with_kind(LeafKind::CString).with_maximum(8)],
            ),
            BranchDef::new("pos", vec![leaf("x", "Float_t"), leaf("y", "Float_t")]),
            BranchDef::new("hit", vec![leaf("hit", "Hit").with_kind(LeafKind::Element)])
                .with_class("Hit"),
        ];

        let classes = classes(&branches).unwrap();
        assert_eq!(classes[0], LeafClass::Scalar);
        assert_eq!(classes[1], LeafClass::FixedArray(5));
        assert_eq!(
            classes[2],
            LeafClass::CountLeaf {
                count_type: PrimitiveType::I32,
                max: 4
            }
        );
        assert_eq!(
            classes[3],
            LeafClass::VariableArray {
                count_leaf: "n".to_string()
            }
        );
        assert_eq!(classes[4], LeafClass::CString { capacity: 8 });
        assert!(matches!(&classes[5], LeafClass::Record(leaves) if leaves.len() == 2));
        assert_eq!(
            classes[6],
            LeafClass::OpaqueObject {
                class_name: "Hit".to_string(),
                len: 1
            }
        );
    }

    #[test]
    fn character_arrays_are_not_strings() {
        let branches = vec![
            BranchDef::new(
                "tag",
                vec![leaf("tag", "Char_t").with_kind(LeafKind::CString).with_len(4)],
            ),
            BranchDef::new(
                "pair",
                vec![
                    leaf("a", "Char_t").with_kind(LeafKind::CString),
                    leaf("b", "Char_t").with_kind(LeafKind::CString),
                ],
            ),
        ];
        let classes = classes(&branches).unwrap();
        assert_eq!(classes[0], LeafClass::FixedArray(4));
        assert!(matches!(&classes[1], LeafClass::Record(_)));
    }

    #[test]
    fn rejects_unsupported_shapes() {
        let mut count = leaf("n", "Int_t");
        count.is_count = true;
        let count_in_list = vec![BranchDef::new("bad", vec![count, leaf("m", "Int_t")])];
        let err = classify_branches(&count_in_list).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unsupported: count leaf arrays in leaf list, branch: bad"
        );

        let object = vec![BranchDef::new(
            "obj",
            vec![leaf("obj", "TNamed").with_kind(LeafKind::Object)],
        )];
        assert!(matches!(
            classify_branches(&object),
            Err(ImportError::UnsupportedSchema { .. })
        ));

        let mut float_count = leaf("n", "Float_t");
        float_count.is_count = true;
        let float_count = vec![BranchDef::new("n", vec![float_count])];
        assert!(matches!(
            classify_branches(&float_count),
            Err(ImportError::UnsupportedSchema { .. })
        ));
    }

    #[test]
    fn count_leaf_must_come_first() {
        let mut count = leaf("n", "Int_t");
        count.is_count = true;
        let branches = vec![
            BranchDef::new("vals", vec![leaf("vals", "Float_t").with_counter("n")]),
            BranchDef::new("n", vec![count]),
        ];
        let err = classify_branches(&branches).unwrap_err();
        assert!(err.to_string().contains("must precede"));
    }
}
