// rust/minibatch-core/src/dataset/memory.rs

//! In-memory adapter: a plain name-to-array mapping.

use std::sync::Arc;

use bytes::Bytes;

use super::block::RecordBlock;
use super::dtype::{encode_le, Element, ElementType};
use super::traits::{check_range, ArrayAttributes, ArrayCollection, RecordArray};
use crate::error::{MinibatchError, Result};

enum Storage {
    /// One contiguous buffer, `record_elements` per record.
    Fixed { data: Bytes, record_elements: usize },
    /// One buffer per record.
    Variable { records: Vec<Bytes> },
}

/// A record array held entirely in memory.
pub struct MemoryArray {
    name: String,
    attributes: ArrayAttributes,
    dtype: ElementType,
    shape: Vec<usize>,
    storage: Storage,
}

impl MemoryArray {
    /// A fixed-shape array. `shape` includes the leading record axis and
    /// `values` is the row-major data of the whole array.
    pub fn fixed<T: Element>(
        name: impl Into<String>,
        shape: Vec<usize>,
        values: &[T],
    ) -> Result<Self> {
        let name = name.into();
        if shape.is_empty() {
            return Err(MinibatchError::schema(name, "fixed array needs a record axis"));
        }

        let total: usize = shape.iter().product();
        if values.len() != total {
            return Err(MinibatchError::schema(
                name,
                format!("shape {:?} needs {} values, got {}", shape, total, values.len()),
            ));
        }

        Ok(Self {
            name,
            attributes: ArrayAttributes::default(),
            dtype: T::DTYPE,
            storage: Storage::Fixed {
                data: Bytes::from(encode_le(values)),
                record_elements: shape[1..].iter().product(),
            },
            shape,
        })
    }

    /// A variable-length array with one flat block per record.
    pub fn variable<T: Element>(name: impl Into<String>, records: Vec<Vec<T>>) -> Self {
        let shape = vec![records.len()];
        let records = records
            .iter()
            .map(|record| Bytes::from(encode_le(record)))
            .collect();

        Self {
            name: name.into(),
            attributes: ArrayAttributes::default(),
            dtype: T::DTYPE,
            shape,
            storage: Storage::Variable { records },
        }
    }

    /// A variable-length sequence array of `element_shape` elements.
    pub fn sequence<T: Element>(
        name: impl Into<String>,
        element_shape: Vec<usize>,
        records: Vec<Vec<T>>,
    ) -> Self {
        Self::variable(name, records)
            .with_attributes(ArrayAttributes::sequence(element_shape, T::DTYPE))
    }

    #[must_use]
    pub fn with_attributes(mut self, attributes: ArrayAttributes) -> Self {
        self.attributes = attributes;
        self
    }
}

impl RecordArray for MemoryArray {
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
        match &self.storage {
            Storage::Fixed { record_elements, .. } => Ok(*record_elements),
            Storage::Variable { records } => Ok(records[index].len() / self.dtype.size_in_bytes()),
        }
    }

    fn read_range(&self, start: usize, end: usize) -> Result<Vec<RecordBlock>> {
        check_range(self, start, end)?;
        match &self.storage {
            Storage::Fixed {
                data,
                record_elements,
            } => {
                let stride = record_elements * self.dtype.size_in_bytes();
                (start..end)
                    .map(|i| {
                        RecordBlock::new(
                            self.dtype,
                            self.shape[1..].to_vec(),
                            data.slice(i * stride..(i + 1) * stride),
                        )
                    })
                    .collect()
            }
            Storage::Variable { records } => Ok(records[start..end]
                .iter()
                .map(|record| RecordBlock::flat(self.dtype, record.clone()))
                .collect()),
        }
    }
}

/// An ordered collection of in-memory arrays.
#[derive(Default)]
pub struct InMemoryCollection {
    arrays: Vec<Arc<dyn RecordArray>>,
}

impl InMemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_array(mut self, array: impl RecordArray + 'static) -> Self {
        self.push(array);
        self
    }

    pub fn push(&mut self, array: impl RecordArray + 'static) {
        self.arrays.push(Arc::new(array));
    }

    /// Adds an array already shared with another collection, such as one
    /// taken from an [`ArrayDirectory`](super::ArrayDirectory).
    #[must_use]
    pub fn with_shared(mut self, array: Arc<dyn RecordArray>) -> Self {
        self.push_shared(array);
        self
    }

    pub fn push_shared(&mut self, array: Arc<dyn RecordArray>) {
        self.arrays.push(array);
    }
}

impl ArrayCollection for InMemoryCollection {
    fn arrays(&self) -> Vec<Arc<dyn RecordArray>> {
        self.arrays.clone()
    }
}
