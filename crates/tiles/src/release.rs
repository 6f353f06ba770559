use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_queue::SegQueue;
use tracing::trace;

use crate::{TileRef, TileState};

/// Deferred teardown for records whose last holder is gone.
///
/// Any thread may push; only the render thread drains, since draining frees
/// the record's texture.
#[derive(Debug, Default)]
pub struct ReleaseBuffer {
    pending: SegQueue<TileRef>,
    released_total: AtomicU64,
}

impl ReleaseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the caller's holder on `record`. Returns true when it was the last one,
    /// in which case the record is parked here until the render thread frees it.
    pub fn release(&self, record: TileRef) -> bool {
        if !record.release() {
            return false;
        }
        record.set_state(TileState::Orphaned);
        trace!(tile = %record.key(), "tile parked for release");
        self.pending.push(record);
        true
    }

    /// Hands at most `max_records` parked records to `free`. Returns how many were handed.
    pub fn drain_with(&self, max_records: usize, mut free: impl FnMut(TileRef)) -> usize {
        let mut drained = 0;
        while drained < max_records {
            let Some(record) = self.pending.pop() else {
                break;
            };
            assert_eq!(
                record.holders(),
                0,
                "tile {} in release buffer still has holders",
                record.key()
            );
            free(record);
            drained += 1;
        }
        self.released_total
            .fetch_add(drained as u64, Ordering::Relaxed);
        drained
    }

    /// Hands every parked record to `free`, regardless of per-frame quota.
    pub fn force_release_all(&self, free: impl FnMut(TileRef)) -> usize {
        self.drain_with(usize::MAX, free)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_drained(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn released_total(&self) -> u64 {
        self.released_total.load(Ordering::Relaxed)
    }
}
