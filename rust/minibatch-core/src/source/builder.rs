// rust/minibatch-core/src/source/builder.rs

//! The tensor-builder seam: turns reshaped stream data into the value a
//! trainer consumes.

use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use super::catalog::StreamInfo;
use super::reshape::StreamData;
use crate::dataset::{ElementType, RecordBlock};
use crate::error::{MinibatchError, Result};

/// Placement of built batches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Device {
    #[default]
    Cpu,
    /// Accelerator by ordinal.
    Gpu(u32),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Gpu(id) => write!(f, "gpu:{id}"),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.split_once(':') {
            None if lower == "cpu" => Ok(Self::Cpu),
            None if lower == "gpu" => Ok(Self::Gpu(0)),
            Some(("gpu", id)) => id
                .parse()
                .map(Self::Gpu)
                .map_err(|_| format!("invalid gpu ordinal in device '{s}'")),
            _ => Err(format!("unknown device '{s}', expected 'cpu', 'gpu' or 'gpu:N'")),
        }
    }
}

impl TryFrom<String> for Device {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Device> for String {
    fn from(device: Device) -> Self {
        device.to_string()
    }
}

/// Builds a batched value for one stream.
///
/// The source never inspects the returned value.
pub trait TensorBuilder {
    type Value;

    fn build(&self, stream: &StreamInfo, data: StreamData, device: Device) -> Result<Self::Value>;
}

/// Hands the reshaped blocks through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughBuilder;

impl TensorBuilder for PassthroughBuilder {
    type Value = StreamData;

    fn build(&self, _stream: &StreamInfo, data: StreamData, _device: Device) -> Result<StreamData> {
        Ok(data)
    }
}

/// A dense, zero-padded batch.
///
/// Sequence streams have shape `[records, max_len, ..element_shape]`; other
/// streams `[records, ..record_shape]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedBatch {
    pub dtype: ElementType,
    pub shape: Vec<usize>,
    /// Valid steps per record; all ones for non-sequence streams.
    pub lengths: Vec<usize>,
    /// Row-major little-endian data.
    pub data: Bytes,
    pub device: Device,
}

impl PaddedBatch {
    /// The whole buffer as one block.
    pub fn to_block(&self) -> Result<RecordBlock> {
        RecordBlock::new(self.dtype, self.shape.clone(), self.data.clone())
    }
}

/// Packs each stream into a [`PaddedBatch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PaddedBatchBuilder;

impl PaddedBatchBuilder {
    fn pack_dense(
        stream: &StreamInfo,
        blocks: Vec<RecordBlock>,
        device: Device,
    ) -> Result<PaddedBatch> {
        let row_shape = blocks
            .first()
            .map(|block| block.shape().to_vec())
            .unwrap_or_else(|| stream.element_shape.clone());

        let row_bytes: usize = blocks.first().map(|block| block.bytes().len()).unwrap_or(0);
        let mut data = BytesMut::with_capacity(row_bytes * blocks.len());

        for (row, block) in blocks.iter().enumerate() {
            if block.shape() != row_shape.as_slice() {
                return Err(MinibatchError::invariant(format!(
                    "stream '{}' row {} has shape {:?}, expected {:?}; \
                     ragged dense streams cannot be padded",
                    stream.name,
                    row,
                    block.shape(),
                    row_shape
                )));
            }
            data.put_slice(block.bytes());
        }

        let mut shape = Vec::with_capacity(row_shape.len() + 1);
        shape.push(blocks.len());
        shape.extend(row_shape);

        Ok(PaddedBatch {
            dtype: stream.element_dtype,
            shape,
            lengths: vec![1; blocks.len()],
            data: data.freeze(),
            device,
        })
    }

    fn pack_sequences(
        stream: &StreamInfo,
        sequences: Vec<Vec<RecordBlock>>,
        device: Device,
    ) -> Result<PaddedBatch> {
        let lengths: Vec<usize> = sequences.iter().map(Vec::len).collect();
        let max_len = lengths.iter().copied().max().unwrap_or(0);
        let step_bytes = stream.element_size() * stream.element_dtype.size_in_bytes();

        let mut data = BytesMut::with_capacity(sequences.len() * max_len * step_bytes);
        for sequence in &sequences {
            for element in sequence {
                if element.bytes().len() != step_bytes {
                    return Err(MinibatchError::invariant(format!(
                        "stream '{}' element of {} bytes, expected {}",
                        stream.name,
                        element.bytes().len(),
                        step_bytes
                    )));
                }
                data.put_slice(element.bytes());
            }
            data.put_bytes(0, (max_len - sequence.len()) * step_bytes);
        }

        let mut shape = Vec::with_capacity(stream.element_shape.len() + 2);
        shape.push(sequences.len());
        shape.push(max_len);
        shape.extend_from_slice(&stream.element_shape);

        Ok(PaddedBatch {
            dtype: stream.element_dtype,
            shape,
            lengths,
            data: data.freeze(),
            device,
        })
    }
}

impl TensorBuilder for PaddedBatchBuilder {
    type Value = PaddedBatch;

    fn build(&self, stream: &StreamInfo, data: StreamData, device: Device) -> Result<PaddedBatch> {
        match data {
            StreamData::Dense(blocks) => Self::pack_dense(stream, blocks, device),
            StreamData::Sequence(sequences) => Self::pack_sequences(stream, sequences, device),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::catalog::StorageKind;

    fn stream(is_sequence: bool, element_shape: Vec<usize>) -> StreamInfo {
        StreamInfo {
            name: "s".to_string(),
            ordinal: 0,
            storage_kind: StorageKind::Dense,
            element_dtype: ElementType::I32,
            element_shape,
            is_sequence,
        }
    }

    fn block(shape: Vec<usize>, values: &[i32]) -> RecordBlock {
        RecordBlock::from_values(shape, values).unwrap()
    }

    #[test]
    fn test_device_parsing() {
        assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!("GPU".parse::<Device>().unwrap(), Device::Gpu(0));
        assert_eq!("gpu:7".parse::<Device>().unwrap(), Device::Gpu(7));
        assert!("gpu:x".parse::<Device>().is_err());
        assert!("cpu:1".parse::<Device>().is_err());
        assert!("tpu".parse::<Device>().is_err());

        assert_eq!(Device::Gpu(2).to_string(), "gpu:2");
        assert_eq!(Device::default(), Device::Cpu);
    }

    #[test]
    fn test_passthrough_returns_input() {
        let data = StreamData::Dense(vec![block(vec![1], &[4])]);
        let built = PassthroughBuilder
            .build(&stream(false, vec![1]), data.clone(), Device::Cpu)
            .unwrap();
        assert_eq!(built, data);
    }

    #[test]
    fn test_pads_sequences_with_zeros() {
        let info = stream(true, vec![2]);
        let data = StreamData::Sequence(vec![
            vec![block(vec![2], &[1, 2]), block(vec![2], &[3, 4])],
            vec![],
            vec![block(vec![2], &[5, 6])],
        ]);

        let batch = PaddedBatchBuilder.build(&info, data, Device::Gpu(1)).unwrap();
        assert_eq!(batch.shape, vec![3, 2, 2]);
        assert_eq!(batch.lengths, vec![2, 0, 1]);
        assert_eq!(batch.device, Device::Gpu(1));
        assert_eq!(
            batch.to_block().unwrap().values::<i32>().unwrap(),
            vec![1, 2, 3, 4, 0, 0, 0, 0, 5, 6, 0, 0]
        );
    }

    #[test]
    fn test_stacks_dense_rows() {
        let info = stream(false, vec![2]);
        let data = StreamData::Dense(vec![block(vec![2], &[1, 2]), block(vec![2], &[3, 4])]);

        let batch = PaddedBatchBuilder.build(&info, data, Device::Cpu).unwrap();
        assert_eq!(batch.shape, vec![2, 2]);
        assert_eq!(batch.lengths, vec![1, 1]);
        assert_eq!(batch.to_block().unwrap().values::<i32>().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_ragged_dense_rows_are_rejected() {
        let info = stream(false, vec![]);
        let data = StreamData::Dense(vec![block(vec![2], &[1, 2]), block(vec![3], &[3, 4, 5])]);

        let err = PaddedBatchBuilder.build(&info, data, Device::Cpu).unwrap_err();
        assert!(matches!(err, MinibatchError::Invariant { .. }));
    }
}
