//! In-memory row-oriented tree.
//!
//! Entries are stored already encoded in the layout a bound read buffer
//! receives: packed native-endian leaves, counted arrays holding exactly
//! `count` elements and C strings followed by their terminator. Reading an
//! entry copies those bytes into the front of the bound buffer and leaves the
//! rest of the buffer untouched.

use std::collections::HashMap;

use crate::{
    error::SourceError,
    leaf::{BranchDef, LeafDef, LeafKind},
    leaflist::parse_leaflist,
    primitive::PrimitiveType,
    registry::ClassDef,
    source::{BufferSlot, BufferTable, SourceTree},
    value::Value,
};

/// How a branch was declared, kept so the tree can be written back to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchSpec {
    LeafList(String),
    Class(String),
    Object(String),
}

#[derive(Debug, Clone)]
enum LeafLayout {
    Primitive { p: PrimitiveType, len: usize },
    Counted { p: PrimitiveType, counter: String },
    CString,
    Class { members: Vec<PrimitiveType>, len: usize },
    Object,
}

/// Builder for [`MemoryTree`].
pub struct MemoryTreeBuilder {
    name: String,
    branches: Vec<(BranchDef, BranchSpec)>,
    classes: Vec<ClassDef>,
}

impl MemoryTreeBuilder {
    /// Add a branch described by a leaf-list descriptor such as `"x/F:y/F"`.
    pub fn branch(mut self, name: &str, leaflist: &str) -> Result<Self, SourceError> {
        let leaves = parse_leaflist(name, leaflist)?;
        self.branches.push((
            BranchDef::new(name, leaves),
            BranchSpec::LeafList(leaflist.to_string()),
        ));
        Ok(self)
    }

    /// Add a branch holding one object of `class` per entry.
    pub fn class_branch(mut self, name: &str, class: &ClassDef) -> Self {
        let leaf = LeafDef::new(name, &class.name).with_kind(LeafKind::Element);
        self.branches.push((
            BranchDef::new(name, vec![leaf]).with_class(&class.name),
            BranchSpec::Class(class.name.clone()),
        ));
        if !self.classes.iter().any(|c| c.name == class.name) {
            self.classes.push(class.clone());
        }
        self
    }

    /// Add a legacy object branch. Its entries carry no data.
    pub fn object_branch(mut self, name: &str, class_name: &str) -> Self {
        let leaf = LeafDef::new(name, class_name).with_kind(LeafKind::Object);
        self.branches.push((
            BranchDef::new(name, vec![leaf]).with_class(class_name),
            BranchSpec::Object(class_name.to_string()),
        ));
        self
    }

    pub fn build(self) -> Result<MemoryTree, SourceError> {
        let mut seen = HashMap::new();
        for (i, (b, _)) in self.branches.iter().enumerate() {
            if seen.insert(b.name.clone(), i).is_some() {
                return Err(SourceError::DuplicateBranch {
                    branch: b.name.clone(),
                });
            }
        }

        let (mut branches, specs): (Vec<_>, Vec<_>) = self.branches.into_iter().unzip();

        let counters: Vec<(usize, String)> = branches
            .iter()
            .enumerate()
            .flat_map(|(bi, b)| {
                b.leaves
                    .iter()
                    .filter_map(move |l| l.counter.clone().map(|c| (bi, c)))
            })
            .collect();
        let mut count_leaves = HashMap::new();
        for (owner, counter) in counters {
            let location = find_counter(&branches, owner, &counter).ok_or_else(|| {
                SourceError::InvalidLeafList {
                    branch: branches[owner].name.clone(),
                    leaflist: counter.clone(),
                    detail: format!("count leaf '{counter}' not found"),
                }
            })?;
            let (bi, li) = location;
            branches[bi].leaves[li].is_count = true;
            count_leaves.insert(counter, location);
        }

        let layouts = branches
            .iter()
            .map(|b| branch_layout(b, &self.classes))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MemoryTree {
            name: self.name,
            bindings: vec![None; branches.len()],
            branches,
            specs,
            layouts,
            count_leaves,
            classes: self.classes,
            entries: Vec::new(),
            implicit_mt: true,
        })
    }
}

/// Row-oriented tree held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryTree {
    name: String,
    branches: Vec<BranchDef>,
    specs: Vec<BranchSpec>,
    layouts: Vec<Vec<LeafLayout>>,
    count_leaves: HashMap<String, (usize, usize)>,
    classes: Vec<ClassDef>,
    entries: Vec<Vec<Vec<u8>>>,
    bindings: Vec<Option<(BufferSlot, usize)>>,
    implicit_mt: bool,
}

impl MemoryTree {
    pub fn builder(name: impl Into<String>) -> MemoryTreeBuilder {
        MemoryTreeBuilder {
            name: name.into(),
            branches: Vec::new(),
            classes: Vec::new(),
        }
    }

    /// Classes used by the class branches of this tree.
    pub fn classes(&self) -> &[ClassDef] {
        &self.classes
    }

    pub fn branch_specs(&self) -> &[BranchSpec] {
        &self.specs
    }

    pub fn implicit_mt(&self) -> bool {
        self.implicit_mt
    }

    /// Append one entry with one value per branch, in branch order.
    ///
    /// Leaf-list branches take a [`Value::Record`] with one value per leaf,
    /// array leaves take a [`Value::Array`], C strings a [`Value::String`],
    /// class branches a record of their members and object branches
    /// [`Value::Null`].
    pub fn fill(&mut self, row: Vec<Value>) -> Result<(), SourceError> {
        if row.len() != self.branches.len() {
            return Err(SourceError::ValueMismatch {
                branch: self.name.clone(),
                detail: format!(
                    "expected {} branch values, got {}",
                    self.branches.len(),
                    row.len()
                ),
            });
        }

        let mut counts: HashMap<&str, i64> = HashMap::new();
        let mut counted: Vec<(&str, &str, usize)> = Vec::new();
        let mut strings: Vec<(usize, usize)> = Vec::new();
        let mut encoded = Vec::with_capacity(self.branches.len());

        for (bi, value) in row.iter().enumerate() {
            let branch = &self.branches[bi];
            let mismatch = |detail: String| SourceError::ValueMismatch {
                branch: branch.name.clone(),
                detail,
            };
            let leaf_values: Vec<&Value> = if branch.is_leaf_list() {
                match value {
                    Value::Record(items) if items.len() == branch.leaves.len() => {
                        items.iter().collect()
                    }
                    other => {
                        return Err(mismatch(format!(
                            "expected Record of {} leaves, got {}",
                            branch.leaves.len(),
                            other.variant_name()
                        )));
                    }
                }
            } else {
                vec![value]
            };

            let mut buf = Vec::new();
            for ((leaf, layout), v) in branch
                .leaves
                .iter()
                .zip(&self.layouts[bi])
                .zip(leaf_values)
            {
                encode_leaf(layout, v, &mut buf)
                    .map_err(|d| mismatch(format!("{}: {d}", leaf.name)))?;
                match (layout, v) {
                    (LeafLayout::Counted { counter, .. }, Value::Array(items)) => {
                        counted.push((branch.name.as_str(), counter.as_str(), items.len()));
                    }
                    (LeafLayout::CString, Value::String(s)) => {
                        strings.push((bi, s.len() + 1));
                    }
                    _ if leaf.is_count => {
                        let n = v
                            .as_count()
                            .filter(|n| *n >= 0)
                            .ok_or_else(|| mismatch(format!("invalid count {v:?}")))?;
                        counts.insert(leaf.name.as_str(), n);
                    }
                    _ => {}
                }
            }
            encoded.push(buf);
        }

        for (branch, counter, len) in &counted {
            let expected = counts.get(counter).copied().unwrap_or_default();
            if expected != *len as i64 {
                return Err(SourceError::ValueMismatch {
                    branch: branch.to_string(),
                    detail: format!("count leaf '{counter}' is {expected} but array holds {len}"),
                });
            }
        }

        let counts: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(k, v)| (k.to_string(), v as usize))
            .collect();
        for (name, n) in counts {
            if let Some(&(bi, li)) = self.count_leaves.get(&name) {
                let leaf = &mut self.branches[bi].leaves[li];
                leaf.maximum = leaf.maximum.max(n);
            }
        }
        for (bi, size) in strings {
            let leaf = &mut self.branches[bi].leaves[0];
            leaf.maximum = leaf.maximum.max(size);
        }

        self.entries.push(encoded);
        Ok(())
    }

    /// Encoded bytes of one branch of one entry.
    pub fn entry_bytes(&self, entry: usize, branch: usize) -> Option<&[u8]> {
        self.entries
            .get(entry)
            .and_then(|e| e.get(branch))
            .map(Vec::as_slice)
    }

    /// Append an already encoded entry, as read back from a tree file.
    pub(crate) fn push_encoded(&mut self, entry: Vec<Vec<u8>>) -> Result<(), SourceError> {
        for (bi, bytes) in entry.iter().enumerate() {
            let required = self.required_size(bi);
            if bytes.len() > required {
                return Err(SourceError::BufferTooSmall {
                    branch: self.branches[bi].name.clone(),
                    required: bytes.len(),
                    actual: required,
                });
            }
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Override the recorded maximum of a leaf, as read back from a tree file.
    pub(crate) fn set_leaf_maximum(&mut self, leaf: &str, maximum: usize) -> bool {
        match find_leaf(&self.branches, leaf) {
            Some((bi, li)) => {
                self.branches[bi].leaves[li].maximum = maximum;
                true
            }
            None => false,
        }
    }

    /// Size of the largest value branch `index` can hold.
    pub fn required_size(&self, index: usize) -> usize {
        self.layouts[index]
            .iter()
            .zip(&self.branches[index].leaves)
            .map(|(layout, leaf)| match layout {
                LeafLayout::Primitive { p, len } => p.size() * len,
                LeafLayout::Counted { p, counter } => {
                    let max = self
                        .count_leaves
                        .get(counter)
                        .map(|&(bi, li)| self.branches[bi].leaves[li].maximum)
                        .unwrap_or_default();
                    p.size() * max
                }
                LeafLayout::CString => leaf.maximum.max(1),
                LeafLayout::Class { members, len } => {
                    members.iter().map(PrimitiveType::size).sum::<usize>() * len
                }
                LeafLayout::Object => 0,
            })
            .sum()
    }
}

impl SourceTree for MemoryTree {
    fn name(&self) -> &str {
        &self.name
    }

    fn branches(&self) -> &[BranchDef] {
        &self.branches
    }

    fn entry_count(&self) -> u64 {
        self.entries.len() as u64
    }

    fn set_implicit_mt(&mut self, enabled: bool) {
        self.implicit_mt = enabled;
    }

    fn bind(&mut self, branch: &str, slot: BufferSlot, size: usize) -> Result<(), SourceError> {
        let index = self
            .branches
            .iter()
            .position(|b| b.name == branch)
            .ok_or_else(|| SourceError::BranchNotFound {
                branch: branch.to_string(),
            })?;
        let required = self.required_size(index);
        if size < required {
            return Err(SourceError::BufferTooSmall {
                branch: branch.to_string(),
                required,
                actual: size,
            });
        }
        self.bindings[index] = Some((slot, size));
        Ok(())
    }

    fn read_entry(&mut self, entry: u64, buffers: &mut BufferTable) -> Result<(), SourceError> {
        let data = usize::try_from(entry)
            .ok()
            .and_then(|e| self.entries.get(e))
            .ok_or(SourceError::EntryOutOfRange {
                entry,
                entries: self.entries.len() as u64,
            })?;

        for (bi, binding) in self.bindings.iter().enumerate() {
            let Some((slot, _)) = binding else {
                continue;
            };
            let bytes = &data[bi];
            let buf = buffers.get_mut(*slot);
            if bytes.len() > buf.len() {
                return Err(SourceError::BufferTooSmall {
                    branch: self.branches[bi].name.clone(),
                    required: bytes.len(),
                    actual: buf.len(),
                });
            }
            buf[..bytes.len()].copy_from_slice(bytes);
        }
        Ok(())
    }
}

fn find_leaf(branches: &[BranchDef], leaf: &str) -> Option<(usize, usize)> {
    branches.iter().enumerate().find_map(|(bi, b)| {
        b.leaves
            .iter()
            .position(|l| l.name == leaf)
            .map(|li| (bi, li))
    })
}

/// A count leaf in the branch of the array it sizes wins over one elsewhere.
fn find_counter(branches: &[BranchDef], owner: usize, leaf: &str) -> Option<(usize, usize)> {
    branches[owner]
        .leaves
        .iter()
        .position(|l| l.name == leaf)
        .map(|li| (owner, li))
        .or_else(|| find_leaf(branches, leaf))
}

fn branch_layout(branch: &BranchDef, classes: &[ClassDef]) -> Result<Vec<LeafLayout>, SourceError> {
    let plain_string = |leaf: &LeafDef| {
        !branch.is_leaf_list() && leaf.len == 1 && leaf.counter.is_none()
    };

    branch
        .leaves
        .iter()
        .map(|leaf| {
            Ok(match leaf.kind {
                LeafKind::CString if plain_string(leaf) => LeafLayout::CString,
                LeafKind::Basic | LeafKind::CString => {
                    let p = PrimitiveType::from_type_name(&leaf.type_name).ok_or_else(|| {
                        SourceError::InvalidLeafList {
                            branch: branch.name.clone(),
                            leaflist: leaf.type_name.clone(),
                            detail: format!("unknown leaf type '{}'", leaf.type_name),
                        }
                    })?;
                    match &leaf.counter {
                        Some(counter) => LeafLayout::Counted {
                            p,
                            counter: counter.clone(),
                        },
                        None => LeafLayout::Primitive { p, len: leaf.len },
                    }
                }
                LeafKind::Element => {
                    let class = classes
                        .iter()
                        .find(|c| c.name == leaf.type_name)
                        .ok_or_else(|| SourceError::UnsupportedClass {
                            class_name: leaf.type_name.clone(),
                            detail: "class not declared".to_string(),
                        })?;
                    let members = class
                        .members
                        .iter()
                        .map(|m| {
                            PrimitiveType::from_type_name(&m.type_name).ok_or_else(|| {
                                SourceError::UnsupportedClass {
                                    class_name: class.name.clone(),
                                    detail: format!(
                                        "member '{}' has non-primitive type '{}'",
                                        m.name, m.type_name
                                    ),
                                }
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    LeafLayout::Class {
                        members,
                        len: leaf.len,
                    }
                }
                LeafKind::Object => LeafLayout::Object,
            })
        })
        .collect()
}

fn encode_leaf(layout: &LeafLayout, value: &Value, out: &mut Vec<u8>) -> Result<(), String> {
    match layout {
        LeafLayout::Primitive { p, len: 1 } => value.encode_primitive(*p, out),
        LeafLayout::Primitive { p, len } => match value {
            Value::Array(items) if items.len() == *len => {
                items.iter().try_for_each(|v| v.encode_primitive(*p, out))
            }
            other => Err(format!("expected Array of {len}, got {other:?}")),
        },
        LeafLayout::Counted { p, .. } => match value {
            Value::Array(items) => items.iter().try_for_each(|v| v.encode_primitive(*p, out)),
            other => Err(format!("expected Array, got {}", other.variant_name())),
        },
        LeafLayout::CString => match value {
            Value::String(s) if !s.as_bytes().contains(&0) => {
                out.extend_from_slice(s.as_bytes());
                out.push(0);
                Ok(())
            }
            Value::String(_) => Err("string contains a NUL byte".to_string()),
            other => Err(format!("expected String, got {}", other.variant_name())),
        },
        LeafLayout::Class { members, len: 1 } => encode_object(members, value, out),
        LeafLayout::Class { members, len } => match value {
            Value::Array(items) if items.len() == *len => items
                .iter()
                .try_for_each(|v| encode_object(members, v, out)),
            other => Err(format!("expected Array of {len} objects, got {other:?}")),
        },
        LeafLayout::Object => match value {
            Value::Null => Ok(()),
            other => Err(format!("expected Null, got {}", other.variant_name())),
        },
    }
}

fn encode_object(members: &[PrimitiveType], value: &Value, out: &mut Vec<u8>) -> Result<(), String> {
    match value {
        Value::Record(items) if items.len() == members.len() => members
            .iter()
            .zip(items)
            .try_for_each(|(p, v)| v.encode_primitive(*p, out)),
        other => Err(format!(
            "expected Record of {} members, got {other:?}",
            members.len()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ClassMember;

    fn slot_bytes(tree: &mut MemoryTree, branch: &str, entry: u64) -> Vec<u8> {
        let mut table = BufferTable::new();
        let index = tree.branches().iter().position(|b| b.name == branch).unwrap();
        let size = tree.required_size(index);
        let slot = table.allocate(size);
        tree.bind(branch, slot, size).unwrap();
        tree.read_entry(entry, &mut table).unwrap();
        table.get(slot).to_vec()
    }

    #[test]
    fn counts_and_strings_update_maxima() {
        let mut tree = MemoryTree::builder("t")
            .branch("n", "n/I")
            .unwrap()
            .branch("vals", "vals[n]/F")
            .unwrap()
            .branch("label", "label/C")
            .unwrap()
            .build()
            .unwrap();
        tree.fill(vec![
            Value::I32(2),
            Value::array([1.0_f32, 2.0]),
            Value::string("abcd"),
        ])
        .unwrap();
        tree.fill(vec![Value::I32(0), Value::Array(vec![]), Value::string("x")])
            .unwrap();

        let n = &tree.branches()[0].leaves[0];
        assert!(n.is_count);
        assert_eq!(n.maximum, 2);
        assert_eq!(tree.branches()[2].leaves[0].maximum, 5);
        assert_eq!(tree.required_size(1), 8);
    }

    #[test]
    fn counter_resolves_in_owning_branch_first() {
        let tree = MemoryTree::builder("t")
            .branch("other", "n/I:k/I")
            .unwrap()
            .branch("arr", "n/I:vals[n]/F")
            .unwrap()
            .build()
            .unwrap();

        assert!(!tree.branches()[0].leaves[0].is_count);
        assert!(tree.branches()[1].leaves[0].is_count);
        assert_eq!(tree.count_leaves["n"], (1, 0));
    }

    #[test]
    fn rejects_count_mismatch() {
        let mut tree = MemoryTree::builder("t")
            .branch("n", "n/I")
            .unwrap()
            .branch("vals", "vals[n]/F")
            .unwrap()
            .build()
            .unwrap();
        let err = tree
            .fill(vec![Value::I32(3), Value::array([1.0_f32])])
            .unwrap_err();
        assert!(matches!(err, SourceError::ValueMismatch { .. }));
    }

    #[test]
    fn rejects_unknown_counter() {
        let err = MemoryTree::builder("t")
            .branch("vals", "vals[n]/F")
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidLeafList { .. }));
    }

    #[test]
    fn reads_leaf_list_and_class_entries() {
        let point = ClassDef::new(
            "Point",
            vec![ClassMember::new("x", "float"), ClassMember::new("id", "Int_t")],
        );
        let mut tree = MemoryTree::builder("t")
            .branch("pair", "a/S:b/s")
            .unwrap()
            .class_branch("p", &point)
            .build()
            .unwrap();
        tree.fill(vec![
            Value::Record(vec![Value::I16(-1), Value::U16(2)]),
            Value::Record(vec![Value::F32(0.5), Value::I32(9)]),
        ])
        .unwrap();

        let pair = slot_bytes(&mut tree, "pair", 0);
        assert_eq!(pair.len(), 4);
        assert_eq!(&pair[..2], &(-1_i16).to_ne_bytes());
        assert_eq!(&pair[2..], &2_u16.to_ne_bytes());

        let p = slot_bytes(&mut tree, "p", 0);
        assert_eq!(&p[..4], &0.5_f32.to_ne_bytes());
        assert_eq!(&p[4..], &9_i32.to_ne_bytes());
    }

    #[test]
    fn bind_checks_buffer_size_and_branch() {
        let mut tree = MemoryTree::builder("t")
            .branch("arr", "arr[4]/D")
            .unwrap()
            .build()
            .unwrap();
        let mut table = BufferTable::new();
        let slot = table.allocate(8);
        assert!(matches!(
            tree.bind("arr", slot, 8),
            Err(SourceError::BufferTooSmall { required: 32, .. })
        ));
        assert!(matches!(
            tree.bind("nope", slot, 8),
            Err(SourceError::BranchNotFound { .. })
        ));
    }
}
