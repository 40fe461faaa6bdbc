// rust/minibatch-core/src/source/batch.rs

use std::collections::hash_map;
use std::collections::HashMap;
use std::sync::Arc;

use super::catalog::StreamInfo;
use super::selector::Selection;

/// One stream's share of a minibatch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchDescriptor<V> {
    /// The value produced by the tensor builder.
    pub data: V,
    /// Records in the batch; identical across streams.
    pub record_count: usize,
    /// Samples this stream contributes.
    pub sample_count: usize,
    /// The batch crossed the end of the dataset.
    pub sweep_end: bool,
}

/// The batches of one request, keyed by stream.
#[derive(Debug, Clone)]
pub struct MinibatchResult<V> {
    batches: HashMap<Arc<StreamInfo>, BatchDescriptor<V>>,
    selection: Selection,
}

impl<V> MinibatchResult<V> {
    pub fn get(&self, stream: &StreamInfo) -> Option<&BatchDescriptor<V>> {
        self.batches.get(stream)
    }

    pub fn by_name(&self, name: &str) -> Option<&BatchDescriptor<V>> {
        self.batches
            .iter()
            .find(|(info, _)| info.name == name)
            .map(|(_, batch)| batch)
    }

    /// The record window that produced this batch.
    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn sweep_end(&self) -> bool {
        self.selection.wrapped
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Arc<StreamInfo>, &BatchDescriptor<V>)> {
        self.batches.iter()
    }

    pub fn into_inner(self) -> HashMap<Arc<StreamInfo>, BatchDescriptor<V>> {
        self.batches
    }
}

impl<V> IntoIterator for MinibatchResult<V> {
    type Item = (Arc<StreamInfo>, BatchDescriptor<V>);
    type IntoIter = hash_map::IntoIter<Arc<StreamInfo>, BatchDescriptor<V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.batches.into_iter()
    }
}

/// Assembles per-stream `(stream, data, sample_count)` triples into a result
/// sharing the selection's record count and sweep flag.
pub fn package<V, I>(selection: Selection, streams: I) -> MinibatchResult<V>
where
    I: IntoIterator<Item = (Arc<StreamInfo>, V, usize)>,
{
    let batches = streams
        .into_iter()
        .map(|(info, data, sample_count)| {
            let batch = BatchDescriptor {
                data,
                record_count: selection.records,
                sample_count,
                sweep_end: selection.wrapped,
            };
            (info, batch)
        })
        .collect();

    MinibatchResult { batches, selection }
}
