// rust/minibatch-core/src/storage/mod.rs

//! Storage abstraction underneath the on-disk array store.
//!
//! # Example
//!
//! ```no_run
//! use minibatch_core::config::StorageConfig;
//! use minibatch_core::storage::{LocalStorage, StorageBackend};
//! use std::path::Path;
//!
//! let storage = LocalStorage::new(&StorageConfig::default()).unwrap();
//! let mut reader = storage.open_read(Path::new("store/label.bin")).unwrap();
//! let first_record = reader.read_range(0, 4).unwrap();
//! ```

mod local;
mod traits;

pub use local::LocalStorage;
pub use traits::{ObjectMeta, StorageBackend, StorageReader, StorageWriter};
