// rust/minibatch-core/src/storage/traits.rs

//! Byte-level storage traits underneath the array store adapters.
//!
//! Array directories never touch `std::fs` directly; they go through a
//! `StorageBackend` so that the on-disk layout can be served from any
//! backend that supports ranged reads.

use std::io::Write;
use std::path::Path;

use crate::error::Result;

/// Metadata about a stored object.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Size of the object in bytes.
    pub size: u64,
    /// Whether this object is a directory.
    pub is_dir: bool,
}

/// A handle for reading from storage.
pub trait StorageReader: Send {
    /// Returns the total size of the object in bytes.
    fn size(&self) -> u64;

    /// Reads exactly `length` bytes starting at byte offset `start`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is out of bounds or the read fails.
    fn read_range(&mut self, start: u64, length: usize) -> Result<Vec<u8>>;
}

/// A handle for writing to storage.
pub trait StorageWriter: Write + Send {
    /// Flushes and syncs the written data. The writer must not be used afterwards.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// The storage backend trait used by array directories.
///
/// Object-safe; stores hold it as `Arc<dyn StorageBackend>`.
pub trait StorageBackend: Send + Sync {
    /// Checks if an object exists at the given path.
    fn exists(&self, path: &Path) -> Result<bool>;

    /// Retrieves metadata for an object.
    ///
    /// # Errors
    ///
    /// Returns an error if the object doesn't exist or metadata cannot be read.
    fn metadata(&self, path: &Path) -> Result<ObjectMeta>;

    /// Opens an object for reading.
    fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>>;

    /// Opens an object for writing, truncating any existing object and
    /// creating parent directories.
    fn open_write(&self, path: &Path) -> Result<Box<dyn StorageWriter>>;

    /// Creates a directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> Result<()>;
}
