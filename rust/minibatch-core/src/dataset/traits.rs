// rust/minibatch-core/src/dataset/traits.rs

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use super::block::RecordBlock;
use super::dtype::ElementType;
use crate::error::{MinibatchError, Result};

/// Metadata attached to a stored array.
///
/// Sequence arrays must carry the element `shape` and `dtype`: variable-length
/// data is stored flattened, so neither can be recovered from the raw array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrayAttributes {
    pub is_seq: bool,
    /// Element shape. A bare integer `n` is read as `[n]`.
    #[serde(
        deserialize_with = "deserialize_shape",
        skip_serializing_if = "Option::is_none"
    )]
    pub shape: Option<Vec<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dtype: Option<String>,
}

impl ArrayAttributes {
    /// Attributes for a sequence array of `element_shape` elements.
    pub fn sequence(element_shape: Vec<usize>, dtype: ElementType) -> Self {
        Self {
            is_seq: true,
            shape: Some(element_shape),
            dtype: Some(dtype.code().to_string()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ShapeAttribute {
    Scalar(usize),
    Dims(Vec<usize>),
}

fn deserialize_shape<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<usize>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<ShapeAttribute>::deserialize(deserializer)?.map(|shape| match shape {
            ShapeAttribute::Scalar(n) => vec![n],
            ShapeAttribute::Dims(dims) => dims,
        }),
    )
}

/// A named array with one entry per record along its leading axis.
pub trait RecordArray: Send + Sync {
    fn name(&self) -> &str;

    fn attributes(&self) -> &ArrayAttributes;

    /// Native element type of the stored data.
    fn dtype(&self) -> ElementType;

    /// Full shape including the leading record axis. Variable-length arrays
    /// report `[record_count]`.
    fn shape(&self) -> &[usize];

    fn record_count(&self) -> usize {
        self.shape().first().copied().unwrap_or(0)
    }

    /// Number of elements stored for record `index`.
    fn record_len(&self, index: usize) -> Result<usize>;

    /// Reads records `[start, end)` in order.
    fn read_range(&self, start: usize, end: usize) -> Result<Vec<RecordBlock>>;
}

/// The store capability a minibatch source depends on: an ordered collection
/// of record arrays.
pub trait ArrayCollection: Send + Sync {
    /// All arrays, in a stable enumeration order.
    fn arrays(&self) -> Vec<Arc<dyn RecordArray>>;
}

/// Fails unless `[start, end)` lies within `array`.
pub(crate) fn check_range(array: &dyn RecordArray, start: usize, end: usize) -> Result<()> {
    if start > end || end > array.record_count() {
        return Err(MinibatchError::invariant(format!(
            "record range {}..{} out of bounds for array '{}' with {} records",
            start,
            end,
            array.name(),
            array.record_count()
        )));
    }
    Ok(())
}
