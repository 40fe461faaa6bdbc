// rust/minibatch-core/src/source/minibatch.rs

use std::sync::Arc;

use super::batch::{package, MinibatchResult};
use super::builder::{Device, PassthroughBuilder, TensorBuilder};
use super::catalog::{StreamCatalog, StreamInfo};
use super::extract::extract;
use super::length::{sample_count, LengthPolicy};
use super::reshape::reshape;
use super::selector::select_window;
use crate::config::{SourceConfig, SourceSection};
use crate::dataset::{ArrayCollection, ArrayDirectory};
use crate::error::Result;
use crate::storage::{LocalStorage, StorageBackend};

/// Construction options for a [`MinibatchSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceOptions {
    /// Placement used when a request does not name one.
    pub device: Device,
    pub length_policy: LengthPolicy,
    /// Reject collections whose arrays disagree on record count.
    pub validate_record_counts: bool,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self::from(&SourceSection::default())
    }
}

impl From<&SourceSection> for SourceOptions {
    fn from(section: &SourceSection) -> Self {
        Self {
            device: section.device,
            length_policy: section.length_policy,
            validate_record_counts: section.validate_record_counts,
        }
    }
}

/// Per-call parameters of [`MinibatchSource::next_minibatch_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinibatchRequest {
    /// Accepted for compatibility; every worker reads the whole dataset.
    pub worker_count: usize,
    /// Accepted for compatibility; ignored.
    pub worker_rank: usize,
    /// Overrides the source's default device for this call.
    pub device: Option<Device>,
}

impl Default for MinibatchRequest {
    fn default() -> Self {
        Self {
            worker_count: 1,
            worker_rank: 0,
            device: None,
        }
    }
}

/// Produces successive sample-budgeted minibatches over a columnar store.
///
/// Every stream of a batch covers the same records. The cursor walks the
/// record axis cyclically; a batch that crosses the end of the dataset is
/// flagged as a sweep end.
///
/// # Example
///
/// ```
/// use minibatch_core::dataset::{InMemoryCollection, MemoryArray};
/// use minibatch_core::source::MinibatchSource;
///
/// let collection = InMemoryCollection::new()
///     .with_array(MemoryArray::fixed("label", vec![4, 1], &[0i32, 1, 2, 3]).unwrap())
///     .with_array(MemoryArray::sequence("feats", vec![2], vec![vec![0.5f32; 4]; 4]));
///
/// let mut source = MinibatchSource::from_collection(&collection).unwrap();
/// let batch = source.next_minibatch(3).unwrap();
///
/// assert_eq!(batch.by_name("feats").unwrap().sample_count, 4);
/// assert_eq!(batch.by_name("label").unwrap().record_count, 2);
/// assert_eq!(source.cursor(), 2);
/// ```
pub struct MinibatchSource<B: TensorBuilder = PassthroughBuilder> {
    catalog: StreamCatalog,
    record_count: usize,
    cursor: usize,
    builder: B,
    options: SourceOptions,
}

impl MinibatchSource<PassthroughBuilder> {
    /// A source with default options that hands out reshaped blocks as is.
    pub fn from_collection(collection: &dyn ArrayCollection) -> Result<Self> {
        Self::new(collection, PassthroughBuilder, SourceOptions::default())
    }
}

impl<B: TensorBuilder> MinibatchSource<B> {
    /// Builds the stream catalog and resolves the record count.
    ///
    /// # Errors
    ///
    /// Returns a schema error for unusable array metadata, or an invariant
    /// error for an empty dataset or, when validation is enabled, arrays
    /// with differing record counts.
    pub fn new(
        collection: &dyn ArrayCollection,
        builder: B,
        options: SourceOptions,
    ) -> Result<Self> {
        let catalog = StreamCatalog::build(collection)?;
        let record_count = catalog.record_count(options.validate_record_counts)?;

        tracing::info!(
            streams = catalog.len(),
            records = record_count,
            device = %options.device,
            policy = ?options.length_policy,
            "minibatch source ready"
        );

        Ok(Self {
            catalog,
            record_count,
            cursor: 0,
            builder,
            options,
        })
    }

    /// Opens the array directory named by `config.source.store_path` on local
    /// storage.
    pub fn open(config: &SourceConfig, builder: B) -> Result<Self> {
        config.validate()?;
        let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(&config.storage)?);
        let directory = ArrayDirectory::open(storage, &config.source.store_path)?;
        Self::new(&directory, builder, SourceOptions::from(&config.source))
    }

    /// Next batch holding more than `requested` samples, or as close as one
    /// sweep of the dataset allows.
    pub fn next_minibatch(&mut self, requested: usize) -> Result<MinibatchResult<B::Value>> {
        self.next_minibatch_with(requested, MinibatchRequest::default())
    }

    /// Like [`next_minibatch`](Self::next_minibatch) with per-call parameters.
    ///
    /// On error the cursor is left where it was.
    pub fn next_minibatch_with(
        &mut self,
        requested: usize,
        request: MinibatchRequest,
    ) -> Result<MinibatchResult<B::Value>> {
        if request.worker_count > 1 {
            tracing::debug!(
                worker_count = request.worker_count,
                worker_rank = request.worker_rank,
                "sharding is not supported, reading the full dataset"
            );
        }

        let device = request.device.unwrap_or(self.options.device);
        let policy = self.options.length_policy;
        let entries = self.catalog.entries();

        let selection = select_window(self.cursor, self.record_count, requested, |index| {
            entries.iter().try_fold(0, |max, entry| {
                sample_count(&entry.info, entry.array.as_ref(), index, policy).map(|n| max.max(n))
            })
        })?;

        tracing::debug!(
            start = selection.start,
            end = selection.end,
            records = selection.records,
            samples = selection.samples,
            sweep_end = selection.wrapped,
            "selected records"
        );

        let indices: Vec<usize> = selection.indices(self.record_count).collect();
        let mut streams = Vec::with_capacity(entries.len());
        for entry in entries {
            let blocks = extract(entry.array.as_ref(), &selection, self.record_count)?;
            let data = reshape(&entry.info, &indices, blocks, policy)?;
            let samples = data.samples();
            let value = self.builder.build(&entry.info, data, device)?;
            streams.push((entry.info.clone(), value, samples));
        }

        self.cursor = selection.end;
        Ok(package(selection, streams))
    }

    /// All streams, in ordinal order.
    pub fn stream_infos(&self) -> impl Iterator<Item = &Arc<StreamInfo>> {
        self.catalog.iter()
    }

    pub fn stream_info(&self, name: &str) -> Option<&Arc<StreamInfo>> {
        self.catalog.get(name)
    }

    pub fn catalog(&self) -> &StreamCatalog {
        &self.catalog
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Index of the first record of the next batch.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Default placement for built batches.
    pub fn device(&self) -> Device {
        self.options.device
    }
}
