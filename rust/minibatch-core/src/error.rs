// rust/minibatch-core/src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MinibatchError {

    #[error("Storage error at '{path}': {message}")]
    Storage {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Schema error in stream '{stream}': {message}")]
    Schema {
        stream: String,
        message: String,
    },

    #[error(
        "Shape error in stream '{stream}' at record {record}: \
         {elements} elements is not a multiple of element size {element_size}"
    )]
    Shape {
        stream: String,
        record: usize,
        elements: usize,
        element_size: usize,
    },

    #[error("Invariant violation: {message}")]
    Invariant {
        message: String,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Element type mismatch: expected {expected}, found {actual}")]
    Type {
        expected: String,
        actual: String,
    },
}

pub type Result<T> = std::result::Result<T, MinibatchError>;

// Convenience constructors
impl MinibatchError {

    pub fn storage(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn storage_with_source(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn schema(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            stream: stream.into(),
            message: message.into(),
        }
    }

    pub fn shape(
        stream: impl Into<String>,
        record: usize,
        elements: usize,
        element_size: usize,
    ) -> Self {
        Self::Shape {
            stream: stream.into(),
            record,
            elements,
            element_size,
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::Type {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_error_message() {
        let err = MinibatchError::shape("vlen_seq", 7, 10, 3);
        let msg = err.to_string();
        assert!(msg.contains("vlen_seq"));
        assert!(msg.contains("record 7"));
        assert!(msg.contains("element size 3"));
    }

    #[test]
    fn test_storage_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = MinibatchError::storage_with_source("/tmp/x.bin", "failed to open file", io);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("/tmp/x.bin"));
    }
}
