//! Streaming importer from row-oriented trees to column-oriented datasets.
//!
//! An import runs in two phases:
//! 1. [`Importer::prepare_schema`] classifies every branch of the source
//!    ([`classify_branches`]) and maps it to a frozen destination model
//!    ([`map_schema`]). Fixed-size values alias their branch buffer; C strings
//!    and variable arrays are copied by [`Transformation`]s.
//! 2. [`Importer::import`] reads one entry at a time into the shared buffers,
//!    fills the leaf-count collections and commits one destination row.
//!
//! ```rust
//! use tree2arrow::{Importer, ImportOptions};
//! use tree2arrow::arrow::MemoryStore;
//! use tree2arrow::core::{MemoryTree, Value};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut tree = MemoryTree::builder("events")
//!     .branch("n", "n/I")?
//!     .branch("vals", "vals[n]/F")?
//!     .build()?;
//! tree.fill(vec![Value::I32(2), Value::array([1.0_f32, 2.0])])?;
//!
//! let store = MemoryStore::new();
//! let mut importer = Importer::from_tree(Box::new(tree), Box::new(store.clone()))
//!     .with_options(ImportOptions::default().with_quiet(true));
//! let summary = importer.import()?;
//! assert_eq!(summary.rows, 1);
//! assert!(store.batches("events").is_some());
//! # Ok(())
//! # }
//! ```
mod buffers;
mod error;
mod importer;
mod mapper;
mod progress;
mod transform;
mod walker;

pub use buffers::{BranchBuffers, FieldBuffer, ImportBranch, ImportField};
pub use error::{ImportError, TransformError};
pub use importer::{ImportOptions, ImportState, Importer};
pub use mapper::{ImportPlan, LeafCountCollection, map_schema};
pub use progress::{DefaultProgress, ProgressObserver};
pub use transform::{CStringTransformation, LeafArrayTransformation, Transformation};
pub use tree2arrow_arrow as arrow;
pub use tree2arrow_core as core;
pub use walker::{ClassifiedBranch, LeafClass, classify_branches};
