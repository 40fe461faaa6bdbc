// rust/minibatch-core/src/source/reshape.rs

use super::catalog::StreamInfo;
use super::length::{sequence_length, LengthPolicy};
use crate::dataset::RecordBlock;
use crate::error::Result;

/// Per-stream batch contents handed to a tensor builder.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamData {
    /// One block per record.
    Dense(Vec<RecordBlock>),
    /// Per record, one block of `element_shape` per sequence step.
    Sequence(Vec<Vec<RecordBlock>>),
}

impl StreamData {
    pub fn records(&self) -> usize {
        match self {
            Self::Dense(blocks) => blocks.len(),
            Self::Sequence(sequences) => sequences.len(),
        }
    }

    /// Number of samples: records for dense data, total steps for sequences.
    pub fn samples(&self) -> usize {
        match self {
            Self::Dense(blocks) => blocks.len(),
            Self::Sequence(sequences) => sequences.iter().map(Vec::len).sum(),
        }
    }
}

/// Splits each record of a sequence stream into its elements. `indices`
/// are the dataset indices of `blocks`, used for error reporting.
pub fn reshape(
    stream: &StreamInfo,
    indices: &[usize],
    blocks: Vec<RecordBlock>,
    policy: LengthPolicy,
) -> Result<StreamData> {
    if !stream.is_sequence {
        return Ok(StreamData::Dense(blocks));
    }

    let element_size = stream.element_size();
    blocks
        .iter()
        .zip(indices)
        .map(|(block, &record)| -> Result<Vec<RecordBlock>> {
            let seq_len = sequence_length(stream, record, block.len(), policy)?;
            Ok((0..seq_len)
                .map(|step| {
                    let offset = step * element_size;
                    block.slice_elements(offset, element_size, stream.element_shape.clone())
                })
                .collect())
        })
        .collect::<Result<Vec<_>>>()
        .map(StreamData::Sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ElementType;
    use crate::error::MinibatchError;
    use crate::source::catalog::StorageKind;

    fn stream(is_sequence: bool) -> StreamInfo {
        StreamInfo {
            name: "feats".to_string(),
            ordinal: 0,
            storage_kind: StorageKind::Dense,
            element_dtype: ElementType::F32,
            element_shape: vec![2, 2],
            is_sequence,
        }
    }

    fn flat(values: &[f32]) -> RecordBlock {
        RecordBlock::from_values(vec![values.len()], values).unwrap()
    }

    #[test]
    fn test_elements_are_bit_identical_slices() {
        let values: Vec<f32> = (0..12).map(|v| v as f32 * 0.5).collect();
        let block = flat(&values);

        let data = reshape(&stream(true), &[0], vec![block.clone()], LengthPolicy::Strict).unwrap();
        let StreamData::Sequence(sequences) = data else {
            panic!("expected sequence data");
        };

        assert_eq!(sequences.len(), 1);
        assert_eq!(sequences[0].len(), 3);
        for (step, element) in sequences[0].iter().enumerate() {
            assert_eq!(element.shape(), &[2, 2]);
            assert_eq!(&element.bytes()[..], &block.bytes()[step * 16..(step + 1) * 16]);
        }
    }

    #[test]
    fn test_sample_count_sums_sequence_lengths() {
        let blocks = vec![flat(&[0.0; 8]), flat(&[]), flat(&[0.0; 4])];
        let data = reshape(&stream(true), &[5, 6, 7], blocks, LengthPolicy::Strict).unwrap();
        assert_eq!(data.records(), 3);
        assert_eq!(data.samples(), 3);
    }

    #[test]
    fn test_dense_passthrough() {
        let blocks = vec![flat(&[1.0; 4]), flat(&[2.0; 4])];
        let data = reshape(&stream(false), &[0, 1], blocks.clone(), LengthPolicy::Strict).unwrap();
        assert_eq!(data, StreamData::Dense(blocks));
        assert_eq!(data.samples(), 2);
    }

    #[test]
    fn test_inexact_block_reports_dataset_index() {
        let blocks = vec![flat(&[0.0; 4]), flat(&[0.0; 6])];
        let err =
            reshape(&stream(true), &[9, 0], blocks.clone(), LengthPolicy::Strict).unwrap_err();
        assert!(matches!(err, MinibatchError::Shape { record: 0, .. }));

        let data = reshape(&stream(true), &[9, 0], blocks, LengthPolicy::Floor).unwrap();
        assert_eq!(data.samples(), 2);
    }
}
