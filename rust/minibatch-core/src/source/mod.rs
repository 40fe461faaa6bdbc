// rust/minibatch-core/src/source/mod.rs

//! Sample-budgeted minibatch assembly.
//!
//! A request flows through the window selector, the range extractor, the
//! sequence reshaper, the tensor builder and the packager, all over the
//! streams of a [`StreamCatalog`] built once per source.

mod batch;
mod builder;
mod catalog;
mod extract;
mod length;
mod minibatch;
mod reshape;
mod selector;

pub use batch::{package, BatchDescriptor, MinibatchResult};
pub use builder::{Device, PaddedBatch, PaddedBatchBuilder, PassthroughBuilder, TensorBuilder};
pub use catalog::{StorageKind, StreamCatalog, StreamInfo};
pub use extract::extract;
pub use length::{sample_count, sequence_length, LengthPolicy};
pub use minibatch::{MinibatchRequest, MinibatchSource, SourceOptions};
pub use reshape::{reshape, StreamData};
pub use selector::{select_window, Selection};
