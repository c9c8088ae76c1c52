//! Buffered channel between two nodes.
//!
//! A [`Buffer`] is a FIFO queue of items with an optional capacity, plus the
//! bookkeeping observed from outside: the population and the population by
//! item type. The bookkeeping is kept apart from the queue itself
//! since the consumption paths of the processes differ:
//!
//! * a plain [`get`](Buffer::get) pops an item and updates the bookkeeping
//!   in the same step,
//! * a race across several buffers [`pop`](Buffer::pop)s from every ready
//!   buffer, then [`record_consumed`](Buffer::record_consumed) is called for
//!   the winner only while the losers are
//!   [`restore_front`](Buffer::restore_front)d without ever leaving the
//!   bookkeeping,
//! * the combination engine scans and consumes under the buffer locks.
//!
//! Capacity is checked against the bookkeeping population, so an item that
//! was popped by a race loser still occupies its slot until it is restored.
//! Nothing can be popped from a buffer while one of its items is being
//! returned, so the queue order survives a lost race.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_event::Event;

use crate::error::BufferError;
use crate::item::Item;
use crate::model::Connection;
use crate::util::lock;

/// Population of a buffer, total and by item type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BufferLevel {
    /// Number of items accounted for in the buffer.
    pub population: usize,
    /// Number of items accounted for, by type key.
    pub type_counts: BTreeMap<String, usize>,
}

/// A bounded or unbounded FIFO buffer with externally visible bookkeeping.
pub struct Buffer {
    id: String,
    capacity: Option<usize>,
    initial_count: usize,
    initial_type: Option<String>,
    initial_type_name: Option<String>,
    state: Mutex<BufferState>,
    /// Notified on every mutation of this buffer.
    changed: Event,
    /// Notified whenever items become available in any buffer of the graph.
    activity: Arc<Event>,
    instrumented: AtomicBool,
    violations: AtomicUsize,
}

impl Buffer {
    pub(crate) fn new(
        connection: &Connection,
        initial_type_name: Option<String>,
        activity: Arc<Event>,
    ) -> Self {
        let buffer = Self {
            id: connection.id.clone(),
            capacity: connection.capacity,
            initial_count: connection.initial_count,
            initial_type: connection.initial_type.clone(),
            initial_type_name,
            state: Mutex::new(BufferState::default()),
            changed: Event::new(),
            activity,
            instrumented: AtomicBool::new(false),
            violations: AtomicUsize::new(0),
        };
        buffer.reset(false);

        buffer
    }

    /// Connection identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Maximum population, or `None` if unbounded.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Number of items present at the start of a run.
    pub fn initial_count(&self) -> usize {
        self.initial_count
    }

    /// Current bookkeeping population.
    pub fn population(&self) -> usize {
        lock(&self.state).population
    }

    /// Current bookkeeping population, total and by type.
    pub fn level(&self) -> BufferLevel {
        lock(&self.state).level()
    }

    /// Number of items actually sitting in the queue.
    ///
    /// This is lower than the population while race losers are being
    /// returned.
    pub fn queued(&self) -> usize {
        lock(&self.state).items.len()
    }

    /// Whether a put would currently succeed without waiting.
    pub fn has_space(&self) -> bool {
        let state = lock(&self.state);
        self.capacity.map_or(true, |c| state.population < c)
    }

    /// Number of bookkeeping inconsistencies detected in instrumentation
    /// mode.
    pub fn violations(&self) -> usize {
        self.violations.load(Ordering::Relaxed)
    }

    /// Checks that the population matches the sum of the type counts.
    pub fn check_invariant(&self) -> bool {
        lock(&self.state).is_consistent()
    }

    /// Restores the initial condition: `initial_count` items created at time
    /// zero, matching bookkeeping, and an open buffer.
    pub(crate) fn reset(&self, instrumented: bool) {
        self.instrumented.store(instrumented, Ordering::Relaxed);
        self.violations.store(0, Ordering::Relaxed);

        let mut state = lock(&self.state);
        *state = BufferState::default();
        for i in 0..self.initial_count {
            let item = Item::new(format!("{}_init_{i}", self.id), 0.0)
                .with_type(self.initial_type.clone(), self.initial_type_name.clone());
            state.account(&item);
            state.items.push_back(item);
        }
    }

    /// Closes the buffer, making all pending and future waits fail.
    pub(crate) fn close(&self) {
        lock(&self.state).closed = true;
        self.changed.notify_all();
        self.activity.notify_all();
    }

    /// Appends an item, waiting first for the population to drop below
    /// capacity.
    ///
    /// The bookkeeping is updated in the same step as the append, and the
    /// returned level is the post-put state.
    pub(crate) async fn put(&self, item: Item) -> Result<BufferLevel, BufferError> {
        let mut item = Some(item);
        let level = self
            .changed
            .wait_until(|| {
                let mut state = lock(&self.state);
                if state.closed {
                    return Some(Err(BufferError::Closed));
                }
                if self.capacity.is_some_and(|c| state.population >= c) {
                    return None;
                }
                let item = item.take()?;
                state.account(&item);
                state.items.push_back(item);
                self.check(&state);

                Some(Ok(state.level()))
            })
            .await?;

        self.changed.notify_all();
        self.activity.notify_all();

        Ok(level)
    }

    /// Pops the oldest item, waiting for one if necessary, and updates the
    /// bookkeeping.
    ///
    /// The returned level is the post-get state.
    pub(crate) async fn get(&self) -> Result<(Item, BufferLevel), BufferError> {
        let popped = self
            .changed
            .wait_until(|| {
                let mut state = lock(&self.state);
                if state.closed {
                    return Some(Err(BufferError::Closed));
                }
                if state.returning > 0 {
                    return None;
                }
                let item = state.items.pop_front()?;
                state.discount(&item);
                self.check(&state);

                Some(Ok((item, state.level())))
            })
            .await?;

        self.changed.notify_all();

        Ok(popped)
    }

    /// Pops the oldest item, waiting for one if necessary, without touching
    /// the bookkeeping.
    ///
    /// The caller must either [`record_consumed`](Buffer::record_consumed) or
    /// [`restore_front`](Buffer::restore_front) the item.
    pub(crate) async fn pop(&self) -> Result<Item, BufferError> {
        let item = self
            .changed
            .wait_until(|| {
                let mut state = lock(&self.state);
                if state.closed {
                    return Some(Err(BufferError::Closed));
                }
                if state.returning > 0 {
                    return None;
                }

                state.items.pop_front().map(Ok)
            })
            .await?;

        self.changed.notify_all();

        Ok(item)
    }

    /// Removes a popped item from the bookkeeping and returns the new level.
    pub(crate) fn record_consumed(&self, item: &Item) -> BufferLevel {
        let level = {
            let mut state = lock(&self.state);
            state.discount(item);
            self.check(&state);

            state.level()
        };
        self.changed.notify_all();

        level
    }

    /// Marks a popped item as being returned.
    ///
    /// Pops wait until the matching [`restore_front`](Buffer::restore_front).
    pub(crate) fn hold_for_return(&self) {
        lock(&self.state).returning += 1;
    }

    /// Puts a popped item back at the head of the queue, leaving the
    /// bookkeeping untouched.
    pub(crate) fn restore_front(&self, item: Item) {
        {
            let mut state = lock(&self.state);
            state.items.push_front(item);
            state.returning = state.returning.saturating_sub(1);
        }
        self.changed.notify_all();
        self.activity.notify_all();
    }

    /// Locks the queue and bookkeeping for a multi-step scan.
    ///
    /// [`notify_consumed`](Buffer::notify_consumed) must be called once the
    /// guard is released if anything was removed.
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, BufferState> {
        lock(&self.state)
    }

    /// Wakes the tasks waiting on this buffer after a scan removed items.
    pub(crate) fn notify_consumed(&self) {
        if self.instrumented.load(Ordering::Relaxed) {
            self.check(&lock(&self.state));
        }
        self.changed.notify_all();
    }

    fn check(&self, state: &BufferState) {
        if self.instrumented.load(Ordering::Relaxed) && !state.is_consistent() {
            self.violations.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                buffer = %self.id,
                population = state.population,
                type_total = state.type_counts.values().sum::<usize>(),
                "buffer bookkeeping is inconsistent"
            );
        }
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .field("population", &self.population())
            .finish_non_exhaustive()
    }
}

/// Queue and bookkeeping of a buffer.
#[derive(Debug, Default)]
pub(crate) struct BufferState {
    pub(crate) items: VecDeque<Item>,
    population: usize,
    type_counts: BTreeMap<String, usize>,
    /// Race losers popped but not yet restored.
    returning: usize,
    closed: bool,
}

impl BufferState {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether race losers still have to be put back.
    pub(crate) fn is_returning(&self) -> bool {
        self.returning > 0
    }

    /// Adds an item to the bookkeeping.
    pub(crate) fn account(&mut self, item: &Item) {
        self.population += 1;
        *self.type_counts.entry(item.type_key().to_string()).or_default() += 1;
    }

    /// Removes an item from the bookkeeping.
    pub(crate) fn discount(&mut self, item: &Item) {
        self.population = self.population.saturating_sub(1);
        if let Some(count) = self.type_counts.get_mut(item.type_key()) {
            *count -= 1;
            if *count == 0 {
                self.type_counts.remove(item.type_key());
            }
        }
    }

    pub(crate) fn level(&self) -> BufferLevel {
        BufferLevel {
            population: self.population,
            type_counts: self.type_counts.clone(),
        }
    }

    pub(crate) fn is_consistent(&self) -> bool {
        self.type_counts.values().sum::<usize>() == self.population
    }

    /// Number of queued items by type key.
    pub(crate) fn queued_by_type(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for item in &self.items {
            *counts.entry(item.type_key()).or_default() += 1;
        }

        counts
    }
}
