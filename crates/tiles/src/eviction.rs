use protocol::TileKey;
use tracing::debug;

use crate::{ActiveSet, LoadQueue, ReleaseBuffer, TileError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub evicted: Vec<TileKey>,
    /// Evicted keys that were also pulled out of the load queue.
    pub dequeued: usize,
    /// Protected records rotated back to the front instead of being evicted.
    pub protected_rotations: usize,
}

/// Trims `active` down to its capacity, least recent first.
///
/// Protected tiles are rotated back to the front; the pass stops once every
/// remaining record is protected. An evicted record gives up its load-queue
/// holder (if still queued) before the active set's own holder.
pub fn enforce_capacity(
    active: &mut ActiveSet,
    queue: &LoadQueue,
    releases: &ReleaseBuffer,
) -> Result<EvictionReport, TileError> {
    let mut report = EvictionReport::default();
    let mut protected_streak = 0usize;

    while active.is_over_capacity() {
        let Some(record) = active.evict_back() else {
            break;
        };
        let key = record.key();

        if key.is_protected() {
            active.insert_front(record)?;
            report.protected_rotations += 1;
            protected_streak += 1;
            if protected_streak >= active.len() {
                debug!(
                    resident = active.len(),
                    capacity = active.capacity(),
                    "only protected tiles remain over capacity"
                );
                break;
            }
            continue;
        }
        protected_streak = 0;

        if let Some(queued) = queue.remove(key) {
            releases.release(queued);
            report.dequeued += 1;
        }
        releases.release(record);
        report.evicted.push(key);
    }

    if !report.evicted.is_empty() {
        debug!(
            evicted = report.evicted.len(),
            dequeued = report.dequeued,
            resident = active.len(),
            "evicted least recent tiles"
        );
    }
    Ok(report)
}
