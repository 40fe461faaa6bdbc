// rust/minibatch-core/src/lib.rs

//! Columnar Minibatch Source - Core Library
//!
//! This crate turns a columnar store of named, record-indexed arrays into
//! successive minibatches whose sample count meets a caller budget. It
//! provides error handling, configuration, storage abstractions, the array
//! store adapters, and the minibatch source itself.

pub mod config;
pub mod error;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::SourceConfig;
pub use error::{MinibatchError, Result};
pub use storage::{LocalStorage, ObjectMeta, StorageBackend, StorageReader, StorageWriter};

pub mod dataset;
pub use dataset::{
    ArrayAttributes, ArrayCollection, ArrayDirectory, ArrayDirectoryWriter, ElementType,
    InMemoryCollection, MemoryArray, RecordArray, RecordBlock,
};

pub mod source;
pub use source::{
    BatchDescriptor, Device, LengthPolicy, MinibatchRequest, MinibatchResult, MinibatchSource,
    PaddedBatch, PaddedBatchBuilder, PassthroughBuilder, SourceOptions, StreamData, StreamInfo,
    TensorBuilder,
};
