//! Record store access.
//!
//! The analysis code only sees two narrow capabilities:
//! - [`RecordSource`]: ordered, batch-pulled records for one query
//! - [`FrameLookup`]: the bounded frame search used by time correlation
//!
//! [`SqliteStore`] implements both against the on-disk database;
//! [`VecSource`] and [`MemoryFrameStore`] are the in-memory equivalents.

pub mod memory;
pub mod query;
pub mod sqlite;
pub mod types;

pub use memory::{MemoryFrameStore, VecSource};
pub use query::{
    FrameOrder, FrameQuery, FrameWindowQuery, PacketOrder, PacketQuery, PacketSelection,
    PacketTimeWindow, SclkRange, TimeRange,
};
pub use sqlite::{SqliteSource, SqliteStore};
pub use types::{FrameRecord, PacketRecord};

use crate::error::FetchError;

/// Ordered, paginated stream of records.
///
/// Records arrive in the query's sort order; gap detection depends on it and
/// does not re-sort.
pub trait RecordSource {
    type Record;

    /// Next batch of records. The first call returns the first page; an empty
    /// batch marks the end of the stream.
    fn next_batch(&mut self) -> Result<Vec<Self::Record>, FetchError>;

    /// Releases the underlying query. Later calls to `next_batch` return empty.
    fn close(&mut self) {}
}

/// Windowed frame search: exact VCID and VCFC, inclusive ERT window,
/// newest first, capped at `limit` rows.
pub trait FrameLookup {
    fn frames_in_window(&self, query: &FrameWindowQuery) -> Result<Vec<FrameRecord>, FetchError>;
}

impl<L: FrameLookup + ?Sized> FrameLookup for &L {
    fn frames_in_window(&self, query: &FrameWindowQuery) -> Result<Vec<FrameRecord>, FetchError> {
        (**self).frames_in_window(query)
    }
}
