// rust/minibatch-core/src/source/selector.rs

//! Cyclic window selection over the record axis.

use crate::error::{MinibatchError, Result};

/// The records chosen for one minibatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// First selected record.
    pub start: usize,
    /// One past the last selected record, modulo the record count. This is
    /// also the next cursor position.
    pub end: usize,
    /// The walk crossed the end of the dataset (sweep end).
    pub wrapped: bool,
    /// Number of records selected.
    pub records: usize,
    /// Accumulated per-record maximum sample count.
    pub samples: usize,
}

impl Selection {
    /// Selected record indices, in batch order.
    pub fn indices(&self, record_count: usize) -> impl Iterator<Item = usize> {
        let start = self.start;
        (0..self.records).map(move |offset| (start + offset) % record_count)
    }
}

/// Walks forward from `cursor`, taking whole records until the accumulated
/// sample count strictly exceeds `requested`.
///
/// `contribution(index)` is the sample count of record `index`: the maximum
/// over all streams. At least one record is always taken, and at most one
/// full sweep (`record_count` records).
pub fn select_window<F>(
    cursor: usize,
    record_count: usize,
    requested: usize,
    mut contribution: F,
) -> Result<Selection>
where
    F: FnMut(usize) -> Result<usize>,
{
    if cursor >= record_count {
        return Err(MinibatchError::invariant(format!(
            "cursor {cursor} outside dataset of {record_count} records"
        )));
    }

    let mut index = cursor;
    let mut samples = 0;
    let mut records = 0;

    loop {
        samples += contribution(index)?;
        index = (index + 1) % record_count;
        records += 1;

        if samples > requested {
            break;
        }
        if records == record_count {
            tracing::warn!(
                requested,
                samples,
                record_count,
                "request exceeds one sweep of the dataset, truncating at a full sweep"
            );
            break;
        }
    }

    Ok(Selection {
        start: cursor,
        end: index,
        wrapped: index <= cursor,
        records,
        samples,
    })
}
