//! # Sequence Gap Tracker
//!
//! Per-key run detection over a stream of sequence counters.
//!
//! Every group key owns one [`RunState`]. A record continues the current run
//! when its counter is the expected successor of the last accepted counter or
//! repeats it; anything else closes the run and starts a new one at that
//! record. Closed runs come back as [`RangeSummary`] values; the still-open
//! run of every key is returned by [`SequenceGapTracker::flush`].
//!
//! A repeated counter is accepted without distinguishing a retransmission
//! from a counter reset.

use serde::Serialize;
use std::collections::BTreeMap;

/// Arithmetic used to compute the expected successor of a counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CounterModel {
    /// Counter wraps to zero after `modulus - 1`
    Wrapping { modulus: u64 },
    /// Plain integer successor, overflow is not modelled
    Unbounded,
}

impl CounterModel {
    #[inline]
    pub fn successor(&self, counter: u64) -> u64 {
        match *self {
            CounterModel::Wrapping { modulus } => (counter + 1) % modulus,
            CounterModel::Unbounded => counter.wrapping_add(1),
        }
    }

    /// True when `next` may directly follow `last` within one run.
    #[inline]
    pub fn continues(&self, last: u64, next: u64) -> bool {
        next == last || next == self.successor(last)
    }
}

/// Counter and time stamp of one end of a run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunEndpoint<T> {
    pub counter: u64,
    pub stamp: T,
}

/// Snapshot of a consecutive run, produced when the run closes or is flushed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RangeSummary<K, T> {
    pub key: K,
    pub start: RunEndpoint<T>,
    pub last: RunEndpoint<T>,
    /// Records accepted into the run, duplicates included
    pub run_length: u64,
}

/// Lifecycle of a key's run state. A key with no state has seen no records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunPhase {
    /// Exactly one record seen for the key so far
    First,
    Running,
}

/// Run bookkeeping for one group key.
#[derive(Clone, Debug)]
pub struct RunState<T> {
    start: RunEndpoint<T>,
    last: RunEndpoint<T>,
    run_length: u64,
    lines_since_emit: u64,
    phase: RunPhase,
}

impl<T: Clone> RunState<T> {
    fn begin(counter: u64, stamp: T, phase: RunPhase) -> Self {
        let endpoint = RunEndpoint { counter, stamp };
        Self {
            start: endpoint.clone(),
            last: endpoint,
            run_length: 1,
            lines_since_emit: 1,
            phase,
        }
    }

    fn accept(&mut self, counter: u64, stamp: T) {
        self.last = RunEndpoint { counter, stamp };
        self.run_length += 1;
        self.lines_since_emit += 1;
        self.phase = RunPhase::Running;
    }

    /// Summary of the run, or `None` if nothing arrived since the last one.
    fn take_summary<K: Clone>(&mut self, key: &K) -> Option<RangeSummary<K, T>> {
        if self.lines_since_emit == 0 {
            return None;
        }
        self.lines_since_emit = 0;
        Some(RangeSummary {
            key: key.clone(),
            start: self.start.clone(),
            last: self.last.clone(),
            run_length: self.run_length,
        })
    }

    pub fn start(&self) -> &RunEndpoint<T> {
        &self.start
    }

    pub fn last(&self) -> &RunEndpoint<T> {
        &self.last
    }

    pub fn run_length(&self) -> u64 {
        self.run_length
    }

    pub fn lines_since_emit(&self) -> u64 {
        self.lines_since_emit
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }
}

/// Outcome of feeding one record to a tracker.
#[derive(Clone, Debug, PartialEq)]
pub enum GapDecision<S> {
    /// Record extended the current run.
    Continued,
    /// Record broke the run and starts a new one. Carries the summary of the
    /// run it closed unless that run was already emitted by a flush.
    GapStarted(Option<S>),
}

impl<S> GapDecision<S> {
    pub fn is_gap(&self) -> bool {
        matches!(self, GapDecision::GapStarted(_))
    }

    /// Summary of the closed run, if any.
    pub fn into_closed(self) -> Option<S> {
        match self {
            GapDecision::Continued => None,
            GapDecision::GapStarted(closed) => closed,
        }
    }

    pub fn map<U, F: FnOnce(S) -> U>(self, f: F) -> GapDecision<U> {
        match self {
            GapDecision::Continued => GapDecision::Continued,
            GapDecision::GapStarted(closed) => GapDecision::GapStarted(closed.map(f)),
        }
    }
}

/// Gap detector over any ordered stream of `(key, counter, stamp)` triples.
///
/// Keys are kept in a `BTreeMap`, so flushed summaries come out in ascending
/// key order.
#[derive(Clone, Debug)]
pub struct SequenceGapTracker<K, T> {
    model: CounterModel,
    runs: BTreeMap<K, RunState<T>>,
}

impl<K: Ord + Clone, T: Clone> SequenceGapTracker<K, T> {
    pub fn new(model: CounterModel) -> Self {
        Self {
            model,
            runs: BTreeMap::new(),
        }
    }

    /// Tracker whose counters wrap to zero at `modulus`.
    pub fn wrapping(modulus: u64) -> Self {
        Self::new(CounterModel::Wrapping { modulus })
    }

    pub fn unbounded() -> Self {
        Self::new(CounterModel::Unbounded)
    }

    pub fn model(&self) -> CounterModel {
        self.model
    }

    /// Feeds one record. Records must arrive in stream order.
    pub fn process(&mut self, key: K, counter: u64, stamp: T) -> GapDecision<RangeSummary<K, T>> {
        let model = self.model;

        let Some(run) = self.runs.get_mut(&key) else {
            self.runs
                .insert(key, RunState::begin(counter, stamp, RunPhase::First));
            return GapDecision::Continued;
        };

        if model.continues(run.last.counter, counter) {
            run.accept(counter, stamp);
            return GapDecision::Continued;
        }

        let closed = run.take_summary(&key);
        *run = RunState::begin(counter, stamp, RunPhase::Running);
        GapDecision::GapStarted(closed)
    }

    /// Summaries of every open run with unemitted records, in key order.
    ///
    /// Run state is kept, so later records for a key keep extending (or
    /// breaking) the same run.
    pub fn flush(&mut self) -> Vec<RangeSummary<K, T>> {
        self.runs
            .iter_mut()
            .filter_map(|(key, run)| run.take_summary(key))
            .collect()
    }

    pub fn run_state(&self, key: &K) -> Option<&RunState<T>> {
        self.runs.get(key)
    }

    /// Number of distinct keys seen.
    pub fn key_count(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}
