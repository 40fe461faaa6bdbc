// rust/minibatch-core/src/source/catalog.rs

use std::collections::HashSet;
use std::sync::Arc;

use crate::dataset::{ArrayCollection, ElementType, RecordArray};
use crate::error::{MinibatchError, Result};

/// How a stream's records are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    Dense,
    /// Reserved; no store currently produces sparse streams.
    Sparse,
}

/// Immutable description of one stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamInfo {
    pub name: String,
    /// Position of the array in the store's enumeration order.
    pub ordinal: usize,
    pub storage_kind: StorageKind,
    pub element_dtype: ElementType,
    /// Shape of one sample: one sequence step, or one whole record.
    pub element_shape: Vec<usize>,
    pub is_sequence: bool,
}

impl StreamInfo {
    /// Number of scalars in one element.
    pub fn element_size(&self) -> usize {
        self.element_shape.iter().product()
    }
}

pub(crate) struct CatalogEntry {
    pub(crate) info: Arc<StreamInfo>,
    pub(crate) array: Arc<dyn RecordArray>,
}

/// The set of streams of a store, derived once from its arrays.
pub struct StreamCatalog {
    entries: Vec<CatalogEntry>,
}

impl StreamCatalog {
    /// Derives stream metadata for every array in `collection`.
    ///
    /// # Errors
    ///
    /// Returns a schema error if the collection is empty, names repeat, or a
    /// sequence array lacks a usable element shape or dtype.
    pub fn build(collection: &dyn ArrayCollection) -> Result<Self> {
        let arrays = collection.arrays();
        if arrays.is_empty() {
            return Err(MinibatchError::schema("<store>", "store contains no arrays"));
        }

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(arrays.len());

        for (ordinal, array) in arrays.into_iter().enumerate() {
            if !seen.insert(array.name().to_string()) {
                return Err(MinibatchError::schema(array.name(), "duplicate stream name"));
            }

            let info = if array.attributes().is_seq {
                sequence_info(array.as_ref(), ordinal)?
            } else {
                StreamInfo {
                    name: array.name().to_string(),
                    ordinal,
                    storage_kind: StorageKind::Dense,
                    element_dtype: array.dtype(),
                    element_shape: array.shape().get(1..).unwrap_or_default().to_vec(),
                    is_sequence: false,
                }
            };

            tracing::debug!(
                stream = %info.name,
                ordinal = info.ordinal,
                dtype = %info.element_dtype,
                shape = ?info.element_shape,
                sequence = info.is_sequence,
                "registered stream"
            );

            entries.push(CatalogEntry {
                info: Arc::new(info),
                array,
            });
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Streams in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<StreamInfo>> {
        self.entries.iter().map(|entry| &entry.info)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<StreamInfo>> {
        self.iter().find(|info| info.name == name)
    }

    pub(crate) fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// The dataset's record count, taken from the first stream.
    ///
    /// With `validate` set, every stream must agree.
    pub fn record_count(&self, validate: bool) -> Result<usize> {
        let first = &self.entries[0];
        let count = first.array.record_count();

        if validate {
            if let Some(other) = self
                .entries
                .iter()
                .find(|entry| entry.array.record_count() != count)
            {
                return Err(MinibatchError::invariant(format!(
                    "stream '{}' has {} records but stream '{}' has {}",
                    other.info.name,
                    other.array.record_count(),
                    first.info.name,
                    count
                )));
            }
        }

        if count == 0 {
            return Err(MinibatchError::invariant(format!(
                "stream '{}' has no records",
                first.info.name
            )));
        }
        Ok(count)
    }
}

fn sequence_info(array: &dyn RecordArray, ordinal: usize) -> Result<StreamInfo> {
    let attrs = array.attributes();
    let name = array.name();

    let element_shape = attrs.shape.clone().ok_or_else(|| {
        MinibatchError::schema(name, "sequence array is missing the `shape` attribute")
    })?;
    if element_shape.contains(&0) {
        return Err(MinibatchError::schema(
            name,
            format!("element shape {element_shape:?} has a zero dimension"),
        ));
    }

    let tag = attrs.dtype.as_deref().ok_or_else(|| {
        MinibatchError::schema(name, "sequence array is missing the `dtype` attribute")
    })?;
    let element_dtype: ElementType = tag
        .parse()
        .map_err(|e: String| MinibatchError::schema(name, e))?;

    if element_dtype != array.dtype() {
        return Err(MinibatchError::schema(
            name,
            format!(
                "declared element dtype {} does not match stored dtype {}",
                element_dtype,
                array.dtype()
            ),
        ));
    }

    Ok(StreamInfo {
        name: name.to_string(),
        ordinal,
        storage_kind: StorageKind::Dense,
        element_dtype,
        element_shape,
        is_sequence: true,
    })
}
