//! In-memory record sources.

use super::query::FrameWindowQuery;
use super::types::FrameRecord;
use super::{FrameLookup, RecordSource};
use crate::error::FetchError;
use std::collections::VecDeque;

/// Record source over pre-built batches.
#[derive(Debug, Clone)]
pub struct VecSource<R> {
    batches: VecDeque<Vec<R>>,
    closed: bool,
}

impl<R> VecSource<R> {
    /// Splits `records` into batches of `batch_size`.
    pub fn from_records(records: Vec<R>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        let mut batches = VecDeque::new();
        let mut iter = records.into_iter().peekable();
        while iter.peek().is_some() {
            batches.push_back(iter.by_ref().take(batch_size).collect());
        }
        Self {
            batches,
            closed: false,
        }
    }

    pub fn from_batches(batches: Vec<Vec<R>>) -> Self {
        Self {
            batches: batches.into_iter().filter(|b| !b.is_empty()).collect(),
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Batches not yet handed out.
    pub fn remaining_batches(&self) -> usize {
        self.batches.len()
    }
}

impl<R> RecordSource for VecSource<R> {
    type Record = R;

    fn next_batch(&mut self) -> Result<Vec<R>, FetchError> {
        if self.closed {
            return Ok(Vec::new());
        }
        Ok(self.batches.pop_front().unwrap_or_default())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Frame lookup over an in-memory frame list.
#[derive(Debug, Clone, Default)]
pub struct MemoryFrameStore {
    frames: Vec<FrameRecord>,
}

impl MemoryFrameStore {
    pub fn new(frames: Vec<FrameRecord>) -> Self {
        Self { frames }
    }

    pub fn push(&mut self, frame: FrameRecord) {
        self.frames.push(frame);
    }
}

impl FrameLookup for MemoryFrameStore {
    fn frames_in_window(&self, query: &FrameWindowQuery) -> Result<Vec<FrameRecord>, FetchError> {
        let mut found: Vec<FrameRecord> = self
            .frames
            .iter()
            .filter(|f| query.matches(f))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.ert.cmp(&a.ert));
        found.truncate(query.limit);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_source_batches_then_ends() {
        let mut source = VecSource::from_records((0..5).collect::<Vec<u32>>(), 2);
        assert_eq!(source.next_batch().unwrap(), vec![0, 1]);
        assert_eq!(source.next_batch().unwrap(), vec![2, 3]);
        assert_eq!(source.next_batch().unwrap(), vec![4]);
        assert!(source.next_batch().unwrap().is_empty());
        assert!(source.next_batch().unwrap().is_empty());
    }

    #[test]
    fn test_closed_source_returns_nothing() {
        let mut source = VecSource::from_batches(vec![vec![1u32], vec![2]]);
        source.close();
        assert!(source.is_closed());
        assert!(source.next_batch().unwrap().is_empty());
        assert_eq!(source.remaining_batches(), 2);
    }
}
