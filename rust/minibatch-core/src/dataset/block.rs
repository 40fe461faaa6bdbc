// rust/minibatch-core/src/dataset/block.rs

use bytes::Bytes;

use super::dtype::{encode_le, Element, ElementType};
use crate::error::{MinibatchError, Result};

/// One raw record read from an array: a row-major block of elements.
///
/// The data is a shared `Bytes` buffer, so reshaping and element slicing
/// never copy.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBlock {
    dtype: ElementType,
    shape: Vec<usize>,
    data: Bytes,
}

impl RecordBlock {
    /// Creates a block, checking that `data` holds exactly `product(shape)` elements.
    pub fn new(dtype: ElementType, shape: Vec<usize>, data: Bytes) -> Result<Self> {
        let expected = shape.iter().product::<usize>() * dtype.size_in_bytes();
        if data.len() != expected {
            return Err(MinibatchError::invariant(format!(
                "block of shape {:?} and dtype {} needs {} bytes, got {}",
                shape,
                dtype,
                expected,
                data.len()
            )));
        }
        Ok(Self { dtype, shape, data })
    }

    /// Builds a block from typed values.
    pub fn from_values<T: Element>(shape: Vec<usize>, values: &[T]) -> Result<Self> {
        Self::new(T::DTYPE, shape, Bytes::from(encode_le(values)))
    }

    /// A one-dimensional block covering all of `data`.
    pub(crate) fn flat(dtype: ElementType, data: Bytes) -> Self {
        let len = data.len() / dtype.size_in_bytes();
        Self {
            dtype,
            shape: vec![len],
            data,
        }
    }

    pub fn dtype(&self) -> ElementType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Raw little-endian bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    /// Number of elements in the block.
    pub fn len(&self) -> usize {
        self.data.len() / self.dtype.size_in_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Decodes the block into typed values.
    ///
    /// # Errors
    ///
    /// Returns a type error if `T` does not match the block's dtype.
    pub fn values<T: Element>(&self) -> Result<Vec<T>> {
        if T::DTYPE != self.dtype {
            return Err(MinibatchError::type_mismatch(
                T::DTYPE.to_string(),
                self.dtype.to_string(),
            ));
        }
        Ok(self
            .data
            .chunks_exact(self.dtype.size_in_bytes())
            .map(T::read_le)
            .collect())
    }

    /// `count` elements starting at element `start`, viewed with `shape`.
    pub(crate) fn slice_elements(&self, start: usize, count: usize, shape: Vec<usize>) -> Self {
        let width = self.dtype.size_in_bytes();
        Self {
            dtype: self.dtype,
            shape,
            data: self.data.slice(start * width..(start + count) * width),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_values_checks_length() {
        let block = RecordBlock::from_values(vec![2, 2], &[1.0f32, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(block.len(), 4);
        assert_eq!(block.shape(), &[2, 2]);
        assert_eq!(block.dtype(), ElementType::F32);

        assert!(RecordBlock::from_values(vec![3], &[1i32, 2]).is_err());
    }

    #[test]
    fn test_values_rejects_wrong_type() {
        let block = RecordBlock::from_values(vec![3], &[1i32, 2, 3]).unwrap();
        assert_eq!(block.values::<i32>().unwrap(), vec![1, 2, 3]);

        let err = block.values::<f32>().unwrap_err();
        assert!(matches!(err, MinibatchError::Type { .. }));
    }

    #[test]
    fn test_slice_shares_buffer() {
        let block = RecordBlock::from_values(vec![6], &[0u16, 1, 2, 3, 4, 5]).unwrap();
        let middle = block.slice_elements(2, 3, vec![3]);
        assert_eq!(middle.values::<u16>().unwrap(), vec![2, 3, 4]);
        assert_eq!(middle.bytes().as_ptr(), block.bytes()[4..].as_ptr());
    }
}
