// rust/minibatch-core/src/storage/local.rs

//! Local filesystem storage backend.
//!
//! Small array files are read through a buffered reader; files at or above
//! the configured threshold are memory-mapped so that record range reads
//! become slice copies.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use super::traits::{ObjectMeta, StorageBackend, StorageReader, StorageWriter};
use crate::config::StorageConfig;
use crate::error::{MinibatchError, Result};

/// Local filesystem storage backend.
pub struct LocalStorage {
    base_path: PathBuf,
    buffer_size: usize,
    use_mmap: bool,
    mmap_threshold: u64,
}

impl LocalStorage {
    /// Creates a new `LocalStorage` rooted at `config.base_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base path cannot be created.
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let base_path = config.base_path.clone();

        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                MinibatchError::storage_with_source(
                    &base_path,
                    "failed to create base directory",
                    e,
                )
            })?;
        }

        Ok(Self {
            base_path,
            buffer_size: config.buffer_size,
            use_mmap: config.use_mmap,
            mmap_threshold: config.mmap_threshold,
        })
    }

    /// Returns the base directory relative paths are resolved against.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }
}

impl StorageBackend for LocalStorage {
    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.resolve_path(path).exists())
    }

    fn metadata(&self, path: &Path) -> Result<ObjectMeta> {
        let full_path = self.resolve_path(path);
        let meta = fs::metadata(&full_path).map_err(|e| {
            MinibatchError::storage_with_source(&full_path, "failed to read metadata", e)
        })?;

        Ok(ObjectMeta {
            size: meta.len(),
            is_dir: meta.is_dir(),
        })
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>> {
        let full_path = self.resolve_path(path);
        let file = File::open(&full_path).map_err(|e| {
            MinibatchError::storage_with_source(&full_path, "failed to open file", e)
        })?;

        let size = file
            .metadata()
            .map_err(|e| {
                MinibatchError::storage_with_source(&full_path, "failed to read file metadata", e)
            })?
            .len();

        if self.use_mmap && size >= self.mmap_threshold {
            // SAFETY: the file is opened read-only and the map lives as long
            // as the reader. Array stores are never written while a source
            // is reading them.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
                MinibatchError::storage_with_source(&full_path, "failed to memory-map file", e)
            })?;

            Ok(Box::new(MmapReader::new(full_path, mmap)))
        } else {
            Ok(Box::new(LocalReader::new(full_path, file, size, self.buffer_size)))
        }
    }

    fn open_write(&self, path: &Path) -> Result<Box<dyn StorageWriter>> {
        let full_path = self.resolve_path(path);

        if let Some(parent) = full_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    MinibatchError::storage_with_source(
                        parent,
                        "failed to create parent directories",
                        e,
                    )
                })?;
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&full_path)
            .map_err(|e| {
                MinibatchError::storage_with_source(&full_path, "failed to create file", e)
            })?;

        Ok(Box::new(LocalWriter::new(full_path, file, self.buffer_size)))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let full_path = self.resolve_path(path);
        fs::create_dir_all(&full_path).map_err(|e| {
            MinibatchError::storage_with_source(&full_path, "failed to create directories", e)
        })
    }
}

/// Buffered file reader.
struct LocalReader {
    path: PathBuf,
    reader: BufReader<File>,
    size: u64,
}

impl LocalReader {
    fn new(path: PathBuf, file: File, size: u64, buffer_size: usize) -> Self {
        Self {
            path,
            reader: BufReader::with_capacity(buffer_size, file),
            size,
        }
    }
}

impl StorageReader for LocalReader {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_range(&mut self, start: u64, length: usize) -> Result<Vec<u8>> {
        self.reader.seek(SeekFrom::Start(start)).map_err(|e| {
            MinibatchError::storage_with_source(
                &self.path,
                format!("failed to seek to position {start}"),
                e,
            )
        })?;

        let mut buf = vec![0u8; length];
        self.reader.read_exact(&mut buf).map_err(|e| {
            MinibatchError::storage_with_source(
                &self.path,
                format!("failed to read {length} bytes at position {start}"),
                e,
            )
        })?;

        Ok(buf)
    }
}

/// Memory-mapped file reader.
struct MmapReader {
    path: PathBuf,
    mmap: Mmap,
}

impl MmapReader {
    fn new(path: PathBuf, mmap: Mmap) -> Self {
        Self { path, mmap }
    }
}

impl StorageReader for MmapReader {
    fn size(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn read_range(&mut self, start: u64, length: usize) -> Result<Vec<u8>> {
        let start = start as usize;
        let end = start.checked_add(length).filter(|&end| end <= self.mmap.len());

        match end {
            Some(end) => Ok(self.mmap[start..end].to_vec()),
            None => Err(MinibatchError::storage(
                &self.path,
                format!(
                    "read range {}+{} exceeds file size {}",
                    start,
                    length,
                    self.mmap.len()
                ),
            )),
        }
    }
}

/// Buffered file writer.
struct LocalWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl LocalWriter {
    fn new(path: PathBuf, file: File, buffer_size: usize) -> Self {
        Self {
            path,
            writer: BufWriter::with_capacity(buffer_size, file),
        }
    }
}

impl Write for LocalWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl StorageWriter for LocalWriter {
    fn finish(mut self: Box<Self>) -> Result<()> {
        self.writer.flush().map_err(|e| {
            MinibatchError::storage_with_source(&self.path, "failed to flush writer", e)
        })?;

        self.writer.get_ref().sync_all().map_err(|e| {
            MinibatchError::storage_with_source(&self.path, "failed to sync file to disk", e)
        })
    }
}
