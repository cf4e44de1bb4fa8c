//! Value copies for fields that cannot alias their branch buffer.

use tree2arrow_core::ValueBuffer;

use crate::{
    buffers::{BranchBuffers, FieldBuffer, ImportField},
    error::TransformError,
};

/// Copies one value from a branch buffer into an owned field buffer.
///
/// The caller attaches branch and entry to the returned error.
pub trait Transformation {
    /// Index of the branch buffer read from.
    fn branch(&self) -> usize;

    /// Index of the import field written to.
    fn field(&self) -> usize;

    fn transform(
        &mut self,
        branches: &BranchBuffers,
        field: &mut ImportField,
    ) -> Result<(), TransformError>;

    /// Prepare for the next entry.
    fn reset_entry(&mut self) {}
}

/// Turns a null-terminated branch buffer into a `String` value.
#[derive(Debug, Clone)]
pub struct CStringTransformation {
    branch: usize,
    field: usize,
}

impl CStringTransformation {
    pub fn new(branch: usize, field: usize) -> Self {
        Self { branch, field }
    }
}

impl Transformation for CStringTransformation {
    fn branch(&self) -> usize {
        self.branch
    }

    fn field(&self) -> usize {
        self.field
    }

    fn transform(
        &mut self,
        branches: &BranchBuffers,
        field: &mut ImportField,
    ) -> Result<(), TransformError> {
        let bytes = branches
            .bytes(self.branch)
            .ok_or(TransformError::MissingBuffer {
                branch: self.branch,
            })?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        let text = std::str::from_utf8(&bytes[..end])?;

        match &mut field.buffer {
            FieldBuffer::Owned(ValueBuffer::Text(value)) => {
                value.clear();
                value.push_str(text);
                Ok(())
            }
            _ => Err(TransformError::BufferKind {
                field: field.field.name.clone(),
                expected: "string",
            }),
        }
    }
}

/// Copies the elements of a variable array one at a time.
///
/// Each call copies the element at the cursor and advances it;
/// [`Transformation::reset_entry`] rewinds to the first element.
#[derive(Debug, Clone)]
pub struct LeafArrayTransformation {
    branch: usize,
    field: usize,
    element_size: usize,
    cursor: usize,
}

impl LeafArrayTransformation {
    pub fn new(branch: usize, field: usize, element_size: usize) -> Self {
        Self {
            branch,
            field,
            element_size,
            cursor: 0,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl Transformation for LeafArrayTransformation {
    fn branch(&self) -> usize {
        self.branch
    }

    fn field(&self) -> usize {
        self.field
    }

    fn transform(
        &mut self,
        branches: &BranchBuffers,
        field: &mut ImportField,
    ) -> Result<(), TransformError> {
        let bytes = branches
            .bytes(self.branch)
            .ok_or(TransformError::MissingBuffer {
                branch: self.branch,
            })?;
        let start = self.cursor * self.element_size;
        let element = bytes
            .get(start..start + self.element_size)
            .ok_or(TransformError::OutOfBounds {
                element: self.cursor,
                size: bytes.len(),
            })?;

        match &mut field.buffer {
            FieldBuffer::Owned(ValueBuffer::Raw(value)) if value.len() == self.element_size => {
                value.copy_from_slice(element);
            }
            _ => {
                return Err(TransformError::BufferKind {
                    field: field.field.name.clone(),
                    expected: "fixed-size element",
                });
            }
        }
        self.cursor += 1;
        Ok(())
    }

    fn reset_entry(&mut self) {
        self.cursor = 0;
    }
}
