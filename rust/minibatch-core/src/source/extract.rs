// rust/minibatch-core/src/source/extract.rs

use super::selector::Selection;
use crate::dataset::{RecordArray, RecordBlock};
use crate::error::Result;

/// Reads the selected records of one array in batch order.
///
/// A wrapped selection is the tail `[start, record_count)` followed by the
/// head `[0, end)`.
pub fn extract(
    array: &dyn RecordArray,
    selection: &Selection,
    record_count: usize,
) -> Result<Vec<RecordBlock>> {
    if !selection.wrapped {
        return array.read_range(selection.start, selection.end);
    }

    let mut blocks = array.read_range(selection.start, record_count)?;
    blocks.extend(array.read_range(0, selection.end)?);
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::MemoryArray;

    fn ids(blocks: &[RecordBlock]) -> Vec<u32> {
        blocks
            .iter()
            .map(|block| block.values::<u32>().unwrap()[0])
            .collect()
    }

    fn array() -> MemoryArray {
        let values: Vec<u32> = (0..10).collect();
        MemoryArray::fixed("ids", vec![10], &values).unwrap()
    }

    fn selection(start: usize, end: usize, wrapped: bool, records: usize) -> Selection {
        Selection {
            start,
            end,
            wrapped,
            records,
            samples: records,
        }
    }

    #[test]
    fn test_contiguous_range() {
        let blocks = extract(&array(), &selection(2, 5, false, 3), 10).unwrap();
        assert_eq!(ids(&blocks), vec![2, 3, 4]);
    }

    #[test]
    fn test_wrapped_range_keeps_order() {
        let blocks = extract(&array(), &selection(8, 2, true, 4), 10).unwrap();
        assert_eq!(ids(&blocks), vec![8, 9, 0, 1]);
    }

    #[test]
    fn test_full_sweep_from_zero() {
        let blocks = extract(&array(), &selection(0, 0, true, 10), 10).unwrap();
        assert_eq!(ids(&blocks), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_short_array_fails() {
        let short = MemoryArray::fixed("ids", vec![5], &[0u32, 1, 2, 3, 4]).unwrap();
        assert!(extract(&short, &selection(8, 2, true, 4), 10).is_err());
    }
}
