use std::collections::{BTreeMap, HashMap};
use std::sync::{Condvar, Mutex};

use protocol::TileKey;

use crate::{TileError, TileRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// New entry; the queue acquired its own holder.
    Inserted,
    /// Already queued and moved to the front.
    Promoted,
    /// Already queued; position left unchanged.
    AlreadyQueued,
}

#[derive(Debug)]
struct QueueState {
    // Smaller sequence pops first. Front pushes count down, back pushes count up.
    order: BTreeMap<i64, TileRef>,
    positions: HashMap<TileKey, i64>,
    next_front: i64,
    next_back: i64,
    // Entries popped by consumers that have not called `complete` yet.
    checked_out: usize,
    closed: bool,
}

impl QueueState {
    fn insert(&mut self, record: &TileRef, sequence: i64) -> Result<(), TileError> {
        self.positions
            .try_reserve(1)
            .map_err(|_| TileError::OutOfMemory {
                structure: "load queue",
            })?;
        record.acquire();
        self.positions.insert(record.key(), sequence);
        self.order.insert(sequence, TileRef::clone(record));
        Ok(())
    }

    fn take_front_sequence(&mut self) -> i64 {
        let sequence = self.next_front;
        self.next_front -= 1;
        sequence
    }

    fn take_back_sequence(&mut self) -> i64 {
        let sequence = self.next_back;
        self.next_back += 1;
        sequence
    }

    fn move_to_front(&mut self, key: TileKey) -> bool {
        let Some(current) = self.positions.get(&key).copied() else {
            return false;
        };
        let sequence = self.take_front_sequence();
        let record = self
            .order
            .remove(&current)
            .expect("load queue position points at a missing entry");
        self.order.insert(sequence, record);
        self.positions.insert(key, sequence);
        true
    }

    fn assert_accepting_new_requests(&self, stage: &'static str) {
        if self.closed {
            panic!("load queue rejects new request after close at stage {stage}");
        }
    }
}

/// Pending fetches, highest priority at the front, at most one entry per key.
///
/// Every entry owns one holder on its record. Holders are acquired and handed off
/// while the queue lock is held, so membership and reference counts change together.
#[derive(Debug)]
pub struct LoadQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl Default for LoadQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                order: BTreeMap::new(),
                positions: HashMap::new(),
                next_front: -1,
                next_back: 0,
                checked_out: 0,
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Queues `record` at highest priority, or promotes its existing entry.
    pub fn enqueue_front(&self, record: &TileRef) -> Result<Enqueued, TileError> {
        let mut state = self.state.lock().expect("load queue lock poisoned");
        state.assert_accepting_new_requests("enqueue_front");
        if state.move_to_front(record.key()) {
            return Ok(Enqueued::Promoted);
        }
        let sequence = state.take_front_sequence();
        state.insert(record, sequence)?;
        drop(state);
        self.available.notify_one();
        Ok(Enqueued::Inserted)
    }

    /// Queues `record` at lowest priority. Existing entries keep their position.
    pub fn enqueue_back(&self, record: &TileRef) -> Result<Enqueued, TileError> {
        let mut state = self.state.lock().expect("load queue lock poisoned");
        state.assert_accepting_new_requests("enqueue_back");
        if state.positions.contains_key(&record.key()) {
            return Ok(Enqueued::AlreadyQueued);
        }
        let sequence = state.take_back_sequence();
        state.insert(record, sequence)?;
        drop(state);
        self.available.notify_one();
        Ok(Enqueued::Inserted)
    }

    /// Moves a queued key to the front. Returns false if it is not queued.
    pub fn promote(&self, key: TileKey) -> bool {
        let mut state = self.state.lock().expect("load queue lock poisoned");
        state.move_to_front(key)
    }

    /// Takes `key` out of the queue. The queue's holder moves to the caller.
    pub fn remove(&self, key: TileKey) -> Option<TileRef> {
        let mut state = self.state.lock().expect("load queue lock poisoned");
        let sequence = state.positions.remove(&key)?;
        let record = state
            .order
            .remove(&sequence)
            .expect("load queue position points at a missing entry");
        Some(record)
    }

    /// Blocks until an entry is available. Returns `None` once the queue is closed.
    /// The queue's holder moves to the caller, who reports back with [`LoadQueue::complete`].
    pub fn pop_blocking(&self) -> Option<TileRef> {
        let mut state = self.state.lock().expect("load queue lock poisoned");
        loop {
            if state.closed {
                return None;
            }
            if let Some((_, record)) = state.order.pop_first() {
                state.positions.remove(&record.key());
                state.checked_out += 1;
                return Some(record);
            }
            state = self
                .available
                .wait(state)
                .expect("load queue lock poisoned");
        }
    }

    pub fn try_pop(&self) -> Option<TileRef> {
        let mut state = self.state.lock().expect("load queue lock poisoned");
        if state.closed {
            return None;
        }
        let (_, record) = state.order.pop_first()?;
        state.positions.remove(&record.key());
        state.checked_out += 1;
        Some(record)
    }

    /// Marks one popped entry as fully handled.
    pub fn complete(&self) {
        let mut state = self.state.lock().expect("load queue lock poisoned");
        state.checked_out = state
            .checked_out
            .checked_sub(1)
            .expect("load queue completion without a matching pop");
    }

    /// No queued entries and no popped entry still being handled.
    pub fn is_idle(&self) -> bool {
        let state = self.state.lock().expect("load queue lock poisoned");
        state.order.is_empty() && state.checked_out == 0
    }

    pub fn contains(&self, key: TileKey) -> bool {
        self.state
            .lock()
            .expect("load queue lock poisoned")
            .positions
            .contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .expect("load queue lock poisoned")
            .order
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys in pop order.
    pub fn keys(&self) -> Vec<TileKey> {
        self.state
            .lock()
            .expect("load queue lock poisoned")
            .order
            .values()
            .map(|record| record.key())
            .collect()
    }

    /// Wakes every blocked consumer; further pops return `None`.
    pub fn close(&self) {
        let mut state = self.state.lock().expect("load queue lock poisoned");
        state.closed = true;
        drop(state);
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().expect("load queue lock poisoned").closed
    }

    /// Removes every entry, handing each holder to the caller.
    pub fn drain(&self) -> Vec<TileRef> {
        let mut state = self.state.lock().expect("load queue lock poisoned");
        state.positions.clear();
        std::mem::take(&mut state.order).into_values().collect()
    }
}
