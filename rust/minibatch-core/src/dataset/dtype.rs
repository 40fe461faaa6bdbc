// rust/minibatch-core/src/dataset/dtype.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Primitive element type of a stored array.
///
/// Tags follow NumPy's array-protocol codes (`"f4"`, `"<i8"`, `"|u1"`) and
/// also accept the long names (`"float32"`). All data is little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ElementType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl ElementType {
    /// Width of one element in bytes.
    pub fn size_in_bytes(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    /// The short array-protocol code, e.g. `"f4"`.
    pub fn code(self) -> &'static str {
        match self {
            Self::I8 => "i1",
            Self::I16 => "i2",
            Self::I32 => "i4",
            Self::I64 => "i8",
            Self::U8 => "u1",
            Self::U16 => "u2",
            Self::U32 => "u4",
            Self::U64 => "u8",
            Self::F32 => "f4",
            Self::F64 => "f8",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        let dtype = match name {
            "i1" | "int8" => Self::I8,
            "i2" | "int16" => Self::I16,
            "i4" | "int32" => Self::I32,
            "i8" | "int64" => Self::I64,
            "u1" | "uint8" => Self::U8,
            "u2" | "uint16" => Self::U16,
            "u4" | "uint32" => Self::U32,
            "u8" | "uint64" => Self::U64,
            "f4" | "float32" => Self::F32,
            "f8" | "float64" => Self::F64,
            _ => return None,
        };
        Some(dtype)
    }
}

impl FromStr for ElementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        let (big_endian, name) = match tag.chars().next() {
            Some('<') | Some('=') | Some('|') => (false, &tag[1..]),
            Some('>') => (true, &tag[1..]),
            _ => (false, tag),
        };

        let dtype = Self::from_name(name).ok_or_else(|| format!("unknown element dtype '{s}'"))?;
        if big_endian && dtype.size_in_bytes() > 1 {
            return Err(format!("big-endian element dtype '{s}' is not supported"));
        }
        Ok(dtype)
    }
}

impl TryFrom<String> for ElementType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ElementType> for String {
    fn from(value: ElementType) -> Self {
        value.code().to_string()
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.code())
    }
}

/// A Rust primitive that can be stored in an array.
pub trait Element: Copy + Default + Send + Sync + 'static {
    const DTYPE: ElementType;

    /// Decodes one element from exactly `DTYPE.size_in_bytes()` little-endian bytes.
    fn read_le(bytes: &[u8]) -> Self;

    /// Appends the little-endian encoding of `self`.
    fn write_le(self, out: &mut Vec<u8>);
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: ElementType = ElementType::$dtype;

                fn read_le(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    buf.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(buf)
                }

                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_element! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
}

/// Encodes a slice of elements as little-endian bytes.
pub fn encode_le<T: Element>(values: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * T::DTYPE.size_in_bytes());
    for &value in values {
        value.write_le(&mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_codes_and_names() {
        assert_eq!("f4".parse::<ElementType>().unwrap(), ElementType::F32);
        assert_eq!("<i8".parse::<ElementType>().unwrap(), ElementType::I64);
        assert_eq!("|u1".parse::<ElementType>().unwrap(), ElementType::U8);
        assert_eq!("float64".parse::<ElementType>().unwrap(), ElementType::F64);
        assert_eq!(" int32 ".parse::<ElementType>().unwrap(), ElementType::I32);
        assert_eq!(">u1".parse::<ElementType>().unwrap(), ElementType::U8);
    }

    #[test]
    fn test_parse_rejects_unknown_and_big_endian() {
        assert!("c8".parse::<ElementType>().is_err());
        assert!("".parse::<ElementType>().is_err());
        let err = ">f4".parse::<ElementType>().unwrap_err();
        assert!(err.contains("big-endian"));
    }

    #[test]
    fn test_code_parses_back() {
        for dtype in [
            ElementType::I8,
            ElementType::I16,
            ElementType::I32,
            ElementType::I64,
            ElementType::U8,
            ElementType::U16,
            ElementType::U32,
            ElementType::U64,
            ElementType::F32,
            ElementType::F64,
        ] {
            assert_eq!(dtype.code().parse::<ElementType>().unwrap(), dtype);
        }
    }

    #[test]
    fn test_encode_le_layout() {
        let bytes = encode_le(&[1u16, 0x0203]);
        assert_eq!(bytes, vec![1, 0, 3, 2]);
        assert_eq!(f32::read_le(&encode_le(&[1.5f32])), 1.5);
        assert_eq!(i64::DTYPE.size_in_bytes(), 8);
    }
}
