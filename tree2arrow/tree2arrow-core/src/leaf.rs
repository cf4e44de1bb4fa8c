//! Branch and leaf descriptors reported by a source tree.

/// How a leaf stores its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafKind {
    /// Fundamental numeric leaf.
    Basic,
    /// Character leaf declared with the `C` type code.
    CString,
    /// Class object (STL or user-defined) materialized by the source.
    Element,
    /// Legacy self-describing object leaf.
    Object,
}

/// A single leaf of a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafDef {
    pub name: String,
    /// Leaf type name (`Int_t`, `Float_t`, `Char_t`, or a class name).
    pub type_name: String,
    pub kind: LeafKind,
    /// Static number of values; 1 for plain scalars and C strings.
    pub len: usize,
    /// Name of the count leaf supplying this leaf's length, if counted.
    pub counter: Option<String>,
    /// Largest value the leaf can carry: the capacity in bytes (including the
    /// terminator) for C strings, the largest count for count leaves.
    pub maximum: usize,
    /// Whether other leaves use this leaf as their count.
    pub is_count: bool,
}

impl LeafDef {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            kind: LeafKind::Basic,
            len: 1,
            counter: None,
            maximum: 0,
            is_count: false,
        }
    }

    pub fn with_kind(mut self, kind: LeafKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_len(mut self, len: usize) -> Self {
        self.len = len;
        self
    }

    pub fn with_counter(mut self, counter: impl Into<String>) -> Self {
        self.counter = Some(counter.into());
        self
    }

    pub fn with_maximum(mut self, maximum: usize) -> Self {
        self.maximum = maximum;
        self
    }
}

/// A branch: one unit read per entry, grouping one or more leaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchDef {
    pub name: String,
    /// Class stored in the branch, for object branches.
    pub class_name: Option<String>,
    pub leaves: Vec<LeafDef>,
}

impl BranchDef {
    pub fn new(name: impl Into<String>, leaves: Vec<LeafDef>) -> Self {
        Self {
            name: name.into(),
            class_name: None,
            leaves,
        }
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    /// A branch with more than one leaf is a leaf list.
    pub fn is_leaf_list(&self) -> bool {
        self.leaves.len() > 1
    }

    pub fn first_leaf(&self) -> Option<&LeafDef> {
        self.leaves.first()
    }
}
