// rust/minibatch-core/src/dataset/directory.rs

//! On-disk array directory: an `arrays.toml` manifest plus one raw
//! little-endian data file per array.
//!
//! Fixed-shape arrays store the whole row-major array in `data`.
//! Variable-length arrays store the concatenation of all record blocks in
//! `data`, and `records + 1` little-endian `u64` element offsets in
//! `offsets`; record `i` spans elements `offsets[i]..offsets[i + 1]`.
//!
//! ```toml
//! [[array]]
//! name = "vlen_seq"
//! dtype = "f4"
//! layout = "variable"
//! records = 100
//! data = "vlen_seq.bin"
//! offsets = "vlen_seq.offsets"
//!
//! [array.attrs]
//! is_seq = true
//! shape = [3]
//! dtype = "f4"
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::block::RecordBlock;
use super::dtype::{encode_le, Element, ElementType};
use super::memory::InMemoryCollection;
use super::traits::{check_range, ArrayAttributes, ArrayCollection, RecordArray};
use crate::error::{MinibatchError, Result};
use crate::storage::StorageBackend;

/// Manifest file name inside an array directory.
pub const MANIFEST_FILE: &str = "arrays.toml";

const OFFSET_WIDTH: usize = std::mem::size_of::<u64>();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayLayout {
    Fixed,
    Variable,
}

/// One `[[array]]` entry of the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayEntry {
    pub name: String,
    pub dtype: ElementType,
    pub layout: ArrayLayout,
    /// Full shape including the record axis (fixed layout only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shape: Vec<usize>,
    /// Record count (variable layout only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<usize>,
    pub data: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offsets: Option<PathBuf>,
    #[serde(default)]
    pub attrs: ArrayAttributes,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Manifest {
    #[serde(rename = "array", default)]
    arrays: Vec<ArrayEntry>,
}

enum Layout {
    Fixed { record_elements: usize },
    Variable { offsets: Vec<u64> },
}

/// A record array served from an array directory.
pub struct DirectoryArray {
    storage: Arc<dyn StorageBackend>,
    name: String,
    attributes: ArrayAttributes,
    dtype: ElementType,
    shape: Vec<usize>,
    data_path: PathBuf,
    layout: Layout,
}

impl DirectoryArray {
    fn open(storage: Arc<dyn StorageBackend>, root: &Path, entry: ArrayEntry) -> Result<Self> {
        let data_path = root.join(&entry.data);
        let data_size = storage.metadata(&data_path)?.size;
        let width = entry.dtype.size_in_bytes() as u64;

        let (shape, layout) = match entry.layout {
            ArrayLayout::Fixed => {
                if entry.shape.is_empty() {
                    return Err(MinibatchError::schema(
                        &entry.name,
                        "fixed layout needs a shape with a record axis",
                    ));
                }
                let expected = entry
                    .shape
                    .iter()
                    .try_fold(width, |bytes, &dim| bytes.checked_mul(dim as u64))
                    .ok_or_else(|| {
                        MinibatchError::schema(
                            &entry.name,
                            format!("shape {:?} overflows the addressable size", entry.shape),
                        )
                    })?;
                if data_size != expected {
                    return Err(MinibatchError::storage(
                        &data_path,
                        format!(
                            "expected {expected} bytes for shape {:?}, found {data_size}",
                            entry.shape
                        ),
                    ));
                }
                let record_elements = entry.shape[1..].iter().product();
                (entry.shape.clone(), Layout::Fixed { record_elements })
            }
            ArrayLayout::Variable => {
                let (records, offsets_file) = match (entry.records, &entry.offsets) {
                    (Some(records), Some(offsets)) => (records, offsets),
                    _ => {
                        return Err(MinibatchError::schema(
                            &entry.name,
                            "variable layout needs both `records` and `offsets`",
                        ))
                    }
                };
                let offsets_path = root.join(offsets_file);
                let offsets = read_offsets(storage.as_ref(), &offsets_path, records)?;
                let total = offsets.last().copied().unwrap_or(0);
                if total.checked_mul(width) != Some(data_size) {
                    return Err(MinibatchError::storage(
                        &data_path,
                        format!(
                            "offsets cover {total} elements but data file holds {data_size} bytes"
                        ),
                    ));
                }
                (vec![records], Layout::Variable { offsets })
            }
        };

        Ok(Self {
            storage,
            name: entry.name,
            attributes: entry.attrs,
            dtype: entry.dtype,
            shape,
            data_path,
            layout,
        })
    }

    fn read_elements(&self, first: u64, count: u64) -> Result<Bytes> {
        if count == 0 {
            return Ok(Bytes::new());
        }
        let width = self.dtype.size_in_bytes() as u64;
        let mut reader = self.storage.open_read(&self.data_path)?;
        let data = reader.read_range(first * width, (count * width) as usize)?;
        Ok(Bytes::from(data))
    }
}

fn read_offsets(storage: &dyn StorageBackend, path: &Path, records: usize) -> Result<Vec<u64>> {
    let mut reader = storage.open_read(path)?;
    let expected = records
        .checked_add(1)
        .and_then(|count| count.checked_mul(OFFSET_WIDTH))
        .ok_or_else(|| {
            MinibatchError::storage(path, format!("record count {records} is out of range"))
        })?;
    if reader.size() != expected as u64 {
        return Err(MinibatchError::storage(
            path,
            format!(
                "expected {expected} offset bytes for {records} records, found {}",
                reader.size()
            ),
        ));
    }

    let raw = reader.read_range(0, expected)?;
    let offsets: Vec<u64> = raw.chunks_exact(OFFSET_WIDTH).map(u64::read_le).collect();

    if offsets[0] != 0 || offsets.windows(2).any(|pair| pair[1] < pair[0]) {
        return Err(MinibatchError::storage(
            path,
            "offsets must start at 0 and be non-decreasing",
        ));
    }
    Ok(offsets)
}

impl RecordArray for DirectoryArray {
    fn name(&self) -> &str {
        &self.name
    }

    fn attributes(&self) -> &ArrayAttributes {
        &self.attributes
    }

    fn dtype(&self) -> ElementType {
        self.dtype
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn record_len(&self, index: usize) -> Result<usize> {
        check_range(self, index, index + 1)?;
        match &self.layout {
            Layout::Fixed { record_elements } => Ok(*record_elements),
            Layout::Variable { offsets } => Ok((offsets[index + 1] - offsets[index]) as usize),
        }
    }

    fn read_range(&self, start: usize, end: usize) -> Result<Vec<RecordBlock>> {
        check_range(self, start, end)?;
        if start == end {
            return Ok(Vec::new());
        }

        let width = self.dtype.size_in_bytes();
        match &self.layout {
            Layout::Fixed { record_elements } => {
                let count = (end - start) * record_elements;
                let data = self.read_elements((start * record_elements) as u64, count as u64)?;
                let stride = record_elements * width;
                (0..end - start)
                    .map(|i| {
                        RecordBlock::new(
                            self.dtype,
                            self.shape[1..].to_vec(),
                            data.slice(i * stride..(i + 1) * stride),
                        )
                    })
                    .collect()
            }
            Layout::Variable { offsets } => {
                let base = offsets[start];
                let data = self.read_elements(base, offsets[end] - base)?;
                Ok(offsets[start..=end]
                    .windows(2)
                    .map(|pair| {
                        let from = ((pair[0] - base) as usize) * width;
                        let to = ((pair[1] - base) as usize) * width;
                        RecordBlock::flat(self.dtype, data.slice(from..to))
                    })
                    .collect())
            }
        }
    }
}

/// An array directory opened through a storage backend.
pub struct ArrayDirectory {
    root: PathBuf,
    arrays: Vec<Arc<dyn RecordArray>>,
}

impl ArrayDirectory {
    /// Opens the directory at `root`, validating every data file against the
    /// manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest is missing or malformed, or a data
    /// file does not match its declared shape.
    pub fn open(storage: Arc<dyn StorageBackend>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let manifest_path = root.join(MANIFEST_FILE);
        if !storage.exists(&manifest_path)? {
            return Err(MinibatchError::storage(
                &manifest_path,
                format!("not an array directory, {MANIFEST_FILE} is missing"),
            ));
        }

        let mut reader = storage.open_read(&manifest_path)?;
        let size = reader.size() as usize;
        let raw = reader.read_range(0, size)?;
        let text = String::from_utf8(raw).map_err(|e| {
            MinibatchError::storage(&manifest_path, format!("manifest is not valid UTF-8: {e}"))
        })?;
        let manifest: Manifest = toml::from_str(&text).map_err(|e| {
            MinibatchError::storage(&manifest_path, format!("failed to parse array manifest: {e}"))
        })?;

        let arrays = manifest
            .arrays
            .into_iter()
            .map(|entry| {
                DirectoryArray::open(storage.clone(), &root, entry)
                    .map(|array| Arc::new(array) as Arc<dyn RecordArray>)
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(root = %root.display(), arrays = arrays.len(), "opened array directory");

        Ok(Self { root, arrays })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A collection of the named arrays only, in the order given. The
    /// selected arrays share this directory's open files.
    ///
    /// # Errors
    ///
    /// Returns a schema error if a name is not in the manifest.
    pub fn select(&self, names: &[&str]) -> Result<InMemoryCollection> {
        let mut collection = InMemoryCollection::new();
        for &name in names {
            let array = self
                .arrays
                .iter()
                .find(|array| array.name() == name)
                .ok_or_else(|| MinibatchError::schema(name, "no such array in the directory"))?;
            collection.push_shared(array.clone());
        }
        Ok(collection)
    }
}

impl ArrayCollection for ArrayDirectory {
    fn arrays(&self) -> Vec<Arc<dyn RecordArray>> {
        self.arrays.clone()
    }
}

/// Writes arrays into a directory in the format `ArrayDirectory` reads.
///
/// The manifest is only written by `finish`, so an abandoned writer leaves
/// no readable store behind.
pub struct ArrayDirectoryWriter {
    storage: Arc<dyn StorageBackend>,
    root: PathBuf,
    manifest: Manifest,
}

impl ArrayDirectoryWriter {
    pub fn create(storage: Arc<dyn StorageBackend>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        storage.create_dir_all(&root)?;
        Ok(Self {
            storage,
            root,
            manifest: Manifest::default(),
        })
    }

    /// Writes a fixed-shape array; `shape` includes the record axis.
    pub fn write_fixed<T: Element>(
        &mut self,
        name: &str,
        shape: &[usize],
        values: &[T],
        attrs: ArrayAttributes,
    ) -> Result<()> {
        self.check_new_name(name)?;
        if shape.is_empty() || shape.iter().product::<usize>() != values.len() {
            return Err(MinibatchError::schema(
                name,
                format!("shape {:?} does not match {} values", shape, values.len()),
            ));
        }

        let data = PathBuf::from(format!("{name}.bin"));
        self.write_file(&data, &encode_le(values))?;

        self.manifest.arrays.push(ArrayEntry {
            name: name.to_string(),
            dtype: T::DTYPE,
            layout: ArrayLayout::Fixed,
            shape: shape.to_vec(),
            records: None,
            data,
            offsets: None,
            attrs,
        });
        Ok(())
    }

    /// Writes a variable-length array with one flat block per record.
    pub fn write_variable<T: Element>(
        &mut self,
        name: &str,
        records: &[Vec<T>],
        attrs: ArrayAttributes,
    ) -> Result<()> {
        self.check_new_name(name)?;

        let mut offsets = Vec::with_capacity(records.len() + 1);
        let mut flat = Vec::new();
        offsets.push(0u64);
        for record in records {
            flat.extend_from_slice(record);
            offsets.push(flat.len() as u64);
        }

        let data = PathBuf::from(format!("{name}.bin"));
        let offsets_file = PathBuf::from(format!("{name}.offsets"));
        self.write_file(&data, &encode_le(&flat))?;
        self.write_file(&offsets_file, &encode_le(&offsets))?;

        self.manifest.arrays.push(ArrayEntry {
            name: name.to_string(),
            dtype: T::DTYPE,
            layout: ArrayLayout::Variable,
            shape: Vec::new(),
            records: Some(records.len()),
            data,
            offsets: Some(offsets_file),
            attrs,
        });
        Ok(())
    }

    /// Writes the manifest and returns the directory root.
    pub fn finish(self) -> Result<PathBuf> {
        let text = toml::to_string(&self.manifest).map_err(|e| {
            MinibatchError::storage(
                self.root.join(MANIFEST_FILE),
                format!("failed to encode array manifest: {e}"),
            )
        })?;
        self.write_file(Path::new(MANIFEST_FILE), text.as_bytes())?;
        Ok(self.root)
    }

    fn check_new_name(&self, name: &str) -> Result<()> {
        if self.manifest.arrays.iter().any(|entry| entry.name == name) {
            return Err(MinibatchError::schema(name, "array already written"));
        }
        Ok(())
    }

    fn write_file(&self, relative: &Path, bytes: &[u8]) -> Result<()> {
        let path = self.root.join(relative);
        let mut writer = self.storage.open_write(&path)?;
        writer.write_all(bytes).map_err(|e| {
            MinibatchError::storage_with_source(&path, "failed to write array file", e)
        })?;
        writer.finish()
    }
}
