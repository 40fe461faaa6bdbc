// rust/minibatch-core/src/dataset/mod.rs

//! Columnar array stores.
//!
//! A minibatch source only depends on the [`ArrayCollection`] capability:
//! an ordered set of named arrays, each indexable and sliceable by record
//! and carrying [`ArrayAttributes`]. Two adapters are provided: an
//! in-memory name-to-array mapping and an on-disk array directory.
//!
//! # Example
//!
//! ```
//! use minibatch_core::dataset::{ArrayCollection, InMemoryCollection, MemoryArray};
//!
//! let collection = InMemoryCollection::new()
//!     .with_array(MemoryArray::fixed("label", vec![3, 1], &[0.0f32, 1.0, 2.0]).unwrap())
//!     .with_array(MemoryArray::sequence("feats", vec![2], vec![vec![1.0f32, 2.0]; 3]));
//!
//! assert_eq!(collection.arrays().len(), 2);
//! ```

mod block;
mod directory;
mod dtype;
mod memory;
mod traits;

pub use block::RecordBlock;
pub use directory::{
    ArrayDirectory, ArrayDirectoryWriter, ArrayEntry, ArrayLayout, DirectoryArray, MANIFEST_FILE,
};
pub use dtype::{encode_le, Element, ElementType};
pub use memory::{InMemoryCollection, MemoryArray};
pub use traits::{ArrayAttributes, ArrayCollection, RecordArray};
