use std::collections::{BTreeMap, HashMap};

use protocol::TileKey;
use slotmap::{SlotMap, new_key_type};

use crate::{TileError, TileRef};

new_key_type! {
    pub struct TileSlot;
}

#[derive(Debug)]
struct ActiveEntry {
    record: TileRef,
    stamp: u64,
}

/// Resident tiles in most-recently-used order.
///
/// Records live in a slot arena; the key index and the recency map store slots only.
/// Each resident record carries exactly one holder owned by this set.
#[derive(Debug)]
pub struct ActiveSet {
    capacity: usize,
    entries: SlotMap<TileSlot, ActiveEntry>,
    index: HashMap<TileKey, TileSlot>,
    recency: BTreeMap<u64, TileSlot>,
    next_stamp: u64,
}

impl ActiveSet {
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(
            capacity > 0,
            "active set capacity must be greater than zero"
        );
        Self {
            capacity,
            entries: SlotMap::with_capacity_and_key(capacity),
            index: HashMap::with_capacity(capacity),
            recency: BTreeMap::new(),
            next_stamp: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_over_capacity(&self) -> bool {
        self.entries.len() > self.capacity
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn find(&self, key: &TileKey) -> Option<&TileRef> {
        let slot = self.index.get(key)?;
        Some(&self.entries[*slot].record)
    }

    /// Takes over the caller's holder on `record` and marks it most recent.
    pub fn insert_front(&mut self, record: TileRef) -> Result<(), TileError> {
        let key = record.key();
        if self.index.contains_key(&key) {
            return Err(TileError::AlreadyResident { key });
        }
        self.index
            .try_reserve(1)
            .map_err(|_| TileError::OutOfMemory {
                structure: "active set index",
            })?;
        let stamp = self.bump_stamp();
        let slot = self.entries.insert(ActiveEntry { record, stamp });
        self.index.insert(key, slot);
        self.recency.insert(stamp, slot);
        Ok(())
    }

    /// Marks `key` most recent. Returns false if it is not resident.
    pub fn move_to_front(&mut self, key: &TileKey) -> bool {
        let Some(slot) = self.index.get(key).copied() else {
            return false;
        };
        let stamp = self.bump_stamp();
        let entry = &mut self.entries[slot];
        self.recency.remove(&entry.stamp);
        entry.stamp = stamp;
        self.recency.insert(stamp, slot);
        true
    }

    /// Removes the least recent record. The set's holder moves to the caller.
    pub fn evict_back(&mut self) -> Option<TileRef> {
        let (_, slot) = self.recency.pop_first()?;
        let entry = self
            .entries
            .remove(slot)
            .expect("active set recency points at a vacant slot");
        self.index.remove(&entry.record.key());
        Some(entry.record)
    }

    /// Records from most to least recent.
    pub fn iter_recent(&self) -> impl Iterator<Item = &TileRef> + '_ {
        self.recency
            .values()
            .rev()
            .map(|slot| &self.entries[*slot].record)
    }

    /// Empties the set, handing every holder to the caller.
    pub fn drain(&mut self) -> Vec<TileRef> {
        self.index.clear();
        self.recency.clear();
        self.entries
            .drain()
            .map(|(_, entry)| entry.record)
            .collect()
    }

    fn bump_stamp(&mut self) -> u64 {
        let stamp = self.next_stamp;
        self.next_stamp = self
            .next_stamp
            .checked_add(1)
            .expect("active set recency stamp overflow");
        stamp
    }
}
