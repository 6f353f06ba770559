use std::collections::BTreeSet;

use protocol::TileKey;
use tiles::{ActiveSet, Enqueued, LoadQueue, TileError, TileRecord, TileRef};
use view::{MapView, ring_order};

#[derive(Debug, Default)]
pub(crate) struct VisibleSet {
    /// Base-zoom tiles in ring order.
    pub(crate) leaves: Vec<TileKey>,
    pub(crate) leaves_requested: usize,
    pub(crate) ancestors_requested: usize,
}

/// Registers every tile the view needs, plus the ancestors used for fallback.
///
/// Leaves are requested at the front of the load queue in ring order; missing
/// ancestors are created afterwards in key order and queued at the back.
/// Ancestors already resident are promoted after the leaves, so on later
/// rebuilds a still-pending ancestor is fetched ahead of the leaves.
pub(crate) fn build_visible_set(
    view: &MapView,
    max_zoom: u8,
    active: &mut ActiveSet,
    queue: &LoadQueue,
) -> Result<VisibleSet, TileError> {
    let Some(range) = view.visible_range(max_zoom) else {
        return Ok(VisibleSet::default());
    };
    let leaves = ring_order(&range).map_err(|_| TileError::OutOfMemory {
        structure: "visible set",
    })?;

    let mut leaves_requested = 0;
    for &key in &leaves {
        if active.move_to_front(&key) {
            queue.promote(key);
            continue;
        }
        request(key, active, queue, Priority::Leaf)?;
        leaves_requested += 1;
    }

    let mut missing = BTreeSet::new();
    for &leaf in &leaves {
        for ancestor in leaf.ancestor_chain() {
            if active.move_to_front(&ancestor) {
                queue.promote(ancestor);
            } else {
                missing.insert(ancestor);
            }
        }
    }
    let ancestors_requested = missing.len();
    for key in missing {
        request(key, active, queue, Priority::Ancestor)?;
    }

    Ok(VisibleSet {
        leaves,
        leaves_requested,
        ancestors_requested,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Priority {
    Leaf,
    Ancestor,
}

fn request(
    key: TileKey,
    active: &mut ActiveSet,
    queue: &LoadQueue,
    priority: Priority,
) -> Result<(), TileError> {
    let record = TileRecord::new(key);
    active.insert_front(TileRef::clone(&record))?;
    let outcome = match priority {
        Priority::Leaf => queue.enqueue_front(&record)?,
        Priority::Ancestor => queue.enqueue_back(&record)?,
    };
    debug_assert_eq!(
        outcome,
        Enqueued::Inserted,
        "tile {key} was queued without being resident"
    );
    Ok(())
}
