// rust/minibatch-core/src/source/length.rs

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::catalog::StreamInfo;
use crate::dataset::RecordArray;
use crate::error::{MinibatchError, Result};

/// Treatment of variable-length blocks whose length is not a multiple of the
/// element size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthPolicy {
    /// Reject the record with a shape error.
    #[default]
    Strict,
    /// Drop the trailing partial element.
    Floor,
}

impl FromStr for LengthPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "floor" => Ok(Self::Floor),
            _ => Err(format!("unknown length policy '{s}', expected 'strict' or 'floor'")),
        }
    }
}

/// Sequence length of a record holding `elements` scalars.
pub fn sequence_length(
    stream: &StreamInfo,
    record: usize,
    elements: usize,
    policy: LengthPolicy,
) -> Result<usize> {
    let element_size = stream.element_size();
    let remainder = elements % element_size;

    if remainder != 0 {
        match policy {
            LengthPolicy::Strict => {
                return Err(MinibatchError::shape(&stream.name, record, elements, element_size));
            }
            LengthPolicy::Floor => {
                tracing::debug!(
                    stream = %stream.name,
                    record,
                    dropped = remainder,
                    "truncating partial trailing element"
                );
            }
        }
    }

    Ok(elements / element_size)
}

/// Number of samples record `record` contributes to `stream`.
pub fn sample_count(
    stream: &StreamInfo,
    array: &dyn RecordArray,
    record: usize,
    policy: LengthPolicy,
) -> Result<usize> {
    if !stream.is_sequence {
        return Ok(1);
    }
    sequence_length(stream, record, array.record_len(record)?, policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{ElementType, MemoryArray};
    use crate::source::catalog::StorageKind;

    fn stream(is_sequence: bool, element_shape: Vec<usize>) -> StreamInfo {
        StreamInfo {
            name: "s".to_string(),
            ordinal: 0,
            storage_kind: StorageKind::Dense,
            element_dtype: ElementType::F32,
            element_shape,
            is_sequence,
        }
    }

    #[test]
    fn test_non_sequence_is_one_sample() {
        let array = MemoryArray::variable("s", vec![vec![0.0f32; 7]]);
        let count = sample_count(&stream(false, vec![7]), &array, 0, LengthPolicy::Strict);
        assert_eq!(count.unwrap(), 1);
    }

    #[test]
    fn test_sequence_exact_division() {
        let array = MemoryArray::variable("s", vec![vec![0.0f32; 12], vec![]]);
        let info = stream(true, vec![2, 3]);
        assert_eq!(sample_count(&info, &array, 0, LengthPolicy::Strict).unwrap(), 2);
        assert_eq!(sample_count(&info, &array, 1, LengthPolicy::Strict).unwrap(), 0);
    }

    #[test]
    fn test_remainder_policy() {
        let info = stream(true, vec![3]);

        let err = sequence_length(&info, 4, 10, LengthPolicy::Strict).unwrap_err();
        match err {
            MinibatchError::Shape {
                record,
                elements,
                element_size,
                ..
            } => {
                assert_eq!(record, 4);
                assert_eq!(elements, 10);
                assert_eq!(element_size, 3);
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(sequence_length(&info, 4, 10, LengthPolicy::Floor).unwrap(), 3);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("Strict".parse::<LengthPolicy>().unwrap(), LengthPolicy::Strict);
        assert_eq!("floor".parse::<LengthPolicy>().unwrap(), LengthPolicy::Floor);
        assert!("nearest".parse::<LengthPolicy>().is_err());
    }
}
