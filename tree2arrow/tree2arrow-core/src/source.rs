//! Source tree contract and the buffer table it materializes entries into.

use crate::{error::SourceError, leaf::BranchDef};

/// Handle to one buffer of a [`BufferTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferSlot(usize);

impl BufferSlot {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Owner of the raw per-branch read buffers.
///
/// Buffers are allocated once, before the first entry is read, and reused for
/// every entry.
#[derive(Debug, Default)]
pub struct BufferTable {
    slots: Vec<Vec<u8>>,
}

impl BufferTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a zeroed buffer of `size` bytes.
    pub fn allocate(&mut self, size: usize) -> BufferSlot {
        self.slots.push(vec![0; size]);
        BufferSlot(self.slots.len() - 1)
    }

    pub fn get(&self, slot: BufferSlot) -> &[u8] {
        &self.slots[slot.0]
    }

    pub fn get_mut(&mut self, slot: BufferSlot) -> &mut [u8] {
        &mut self.slots[slot.0]
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// A row-oriented dataset read one entry at a time.
///
/// Callers bind a buffer slot to each branch they want to read, then call
/// [`SourceTree::read_entry`], which refreshes every bound slot with the
/// values of that entry. Unbound branches are skipped.
pub trait SourceTree {
    /// Name of the tree.
    fn name(&self) -> &str;

    /// Branches in stable storage order.
    fn branches(&self) -> &[BranchDef];

    /// Total number of entries.
    fn entry_count(&self) -> u64;

    /// Enable or disable parallel decompression of entries.
    ///
    /// Importers disable it: all bound buffers are shared with the writer and
    /// exactly one entry may be in flight.
    fn set_implicit_mt(&mut self, enabled: bool);

    /// Bind `slot` (of `size` bytes) as the read buffer of `branch`.
    fn bind(&mut self, branch: &str, slot: BufferSlot, size: usize) -> Result<(), SourceError>;

    /// Materialize entry `entry` into all bound buffers of `buffers`.
    fn read_entry(&mut self, entry: u64, buffers: &mut BufferTable) -> Result<(), SourceError>;
}

impl<T: SourceTree + ?Sized> SourceTree for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn branches(&self) -> &[BranchDef] {
        (**self).branches()
    }

    fn entry_count(&self) -> u64 {
        (**self).entry_count()
    }

    fn set_implicit_mt(&mut self, enabled: bool) {
        (**self).set_implicit_mt(enabled)
    }

    fn bind(&mut self, branch: &str, slot: BufferSlot, size: usize) -> Result<(), SourceError> {
        (**self).bind(branch, slot, size)
    }

    fn read_entry(&mut self, entry: u64, buffers: &mut BufferTable) -> Result<(), SourceError> {
        (**self).read_entry(entry, buffers)
    }
}
