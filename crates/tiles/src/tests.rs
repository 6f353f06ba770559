use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use protocol::{TextureHandle, TileKey};

use super::*;

fn key(zoom: u8, x: u32, y: u32) -> TileKey {
    TileKey::new(zoom, x, y)
}

fn resident(active: &mut ActiveSet, tile: TileKey) -> TileRef {
    let record = TileRecord::new(tile);
    active
        .insert_front(TileRef::clone(&record))
        .expect("insert resident tile");
    record
}

#[test]
fn record_counts_holders_and_reports_last_release() {
    let record = TileRecord::new(key(3, 1, 1));
    assert_eq!(record.holders(), 1);
    record.acquire();
    record.acquire();
    assert_eq!(record.holders(), 3);
    assert!(!record.release());
    assert!(!record.release());
    assert!(record.is_sole_holder());
    assert!(record.release());
    assert_eq!(record.holders(), 0);
}

#[test]
#[should_panic(expected = "released more times than acquired")]
fn record_release_below_zero_panics() {
    let record = TileRecord::new(key(2, 0, 0));
    assert!(record.release());
    record.release();
}

#[test]
#[should_panic(expected = "acquired after its last holder released it")]
fn record_acquire_after_zero_panics() {
    let record = TileRecord::new(key(2, 0, 0));
    assert!(record.release());
    record.acquire();
}

#[test]
#[should_panic(expected = "already owns texture")]
fn record_refuses_second_texture() {
    let record = TileRecord::new(key(2, 1, 0));
    record.set_texture(TextureHandle(1));
    record.set_texture(TextureHandle(2));
}

#[test]
fn active_set_evicts_least_recent_first() {
    let mut active = ActiveSet::with_capacity(8);
    for x in 0..4 {
        resident(&mut active, key(4, x, 0));
    }
    assert!(active.move_to_front(&key(4, 0, 0)));
    assert!(!active.move_to_front(&key(4, 9, 9)));

    let recent: Vec<TileKey> = active.iter_recent().map(|r| r.key()).collect();
    assert_eq!(
        recent,
        vec![key(4, 0, 0), key(4, 3, 0), key(4, 2, 0), key(4, 1, 0)]
    );

    let evicted = active.evict_back().expect("evict");
    assert_eq!(evicted.key(), key(4, 1, 0));
    assert!(!active.contains(&key(4, 1, 0)));
    assert_eq!(active.len(), 3);
    assert!(active.find(&key(4, 2, 0)).is_some());
}

#[test]
fn active_set_rejects_duplicate_key() {
    let mut active = ActiveSet::with_capacity(4);
    resident(&mut active, key(5, 3, 3));
    let duplicate = TileRecord::new(key(5, 3, 3));
    assert_eq!(
        active.insert_front(duplicate),
        Err(TileError::AlreadyResident { key: key(5, 3, 3) })
    );
    assert_eq!(active.len(), 1);
}

#[test]
fn load_queue_front_push_deduplicates_by_promotion() {
    let queue = LoadQueue::new();
    let first = TileRecord::new(key(6, 1, 1));
    let second = TileRecord::new(key(6, 2, 2));

    assert_eq!(queue.enqueue_front(&first), Ok(Enqueued::Inserted));
    assert_eq!(queue.enqueue_front(&second), Ok(Enqueued::Inserted));
    assert_eq!(queue.keys(), vec![key(6, 2, 2), key(6, 1, 1)]);

    assert_eq!(queue.enqueue_front(&first), Ok(Enqueued::Promoted));
    assert_eq!(queue.keys(), vec![key(6, 1, 1), key(6, 2, 2)]);
    assert_eq!(queue.len(), 2);
    assert_eq!(first.holders(), 2);
}

#[test]
fn load_queue_back_push_keeps_existing_position() {
    let queue = LoadQueue::new();
    let leaf = TileRecord::new(key(6, 1, 1));
    let ancestor = TileRecord::new(key(5, 0, 0));
    let other = TileRecord::new(key(5, 1, 0));

    queue.enqueue_front(&leaf).expect("enqueue leaf");
    queue.enqueue_back(&ancestor).expect("enqueue ancestor");
    queue.enqueue_back(&other).expect("enqueue other");
    assert_eq!(queue.enqueue_back(&leaf), Ok(Enqueued::AlreadyQueued));
    assert_eq!(queue.keys(), vec![key(6, 1, 1), key(5, 0, 0), key(5, 1, 0)]);
    assert_eq!(leaf.holders(), 2);

    assert!(queue.promote(key(5, 1, 0)));
    assert_eq!(queue.try_pop().map(|r| r.key()), Some(key(5, 1, 0)));
}

#[test]
fn load_queue_remove_hands_holder_to_caller() {
    let queue = LoadQueue::new();
    let releases = ReleaseBuffer::new();
    let record = TileRecord::new(key(7, 4, 4));
    queue.enqueue_front(&record).expect("enqueue");

    let removed = queue.remove(key(7, 4, 4)).expect("queued");
    assert!(queue.remove(key(7, 4, 4)).is_none());
    assert!(!queue.contains(key(7, 4, 4)));
    assert!(!releases.release(removed));
    assert_eq!(record.holders(), 1);
}

#[test]
fn pop_blocking_wakes_on_push_and_on_close() {
    let queue = Arc::new(LoadQueue::new());

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            let first = queue.pop_blocking().map(|record| record.key());
            let second = queue.pop_blocking().map(|record| record.key());
            (first, second)
        })
    };

    thread::sleep(Duration::from_millis(20));
    let record = TileRecord::new(key(3, 3, 3));
    queue.enqueue_front(&record).expect("enqueue");
    thread::sleep(Duration::from_millis(20));
    queue.close();

    let (first, second) = consumer.join().expect("consumer thread");
    assert_eq!(first, Some(key(3, 3, 3)));
    assert_eq!(second, None);
    assert!(queue.is_closed());
}

#[test]
#[should_panic(expected = "load queue rejects new request after close")]
fn load_queue_rejects_enqueue_after_close() {
    let queue = LoadQueue::new();
    queue.close();
    let record = TileRecord::new(key(2, 2, 2));
    let _ = queue.enqueue_front(&record);
}

#[test]
fn concurrent_overlapping_enqueues_never_duplicate() {
    let queue = Arc::new(LoadQueue::new());
    let records: Arc<HashMap<TileKey, TileRef>> = Arc::new(
        (0..64)
            .map(|x| (key(8, x, 7), TileRecord::new(key(8, x, 7))))
            .collect(),
    );

    let producers: Vec<_> = [0u32, 16]
        .into_iter()
        .map(|start| {
            let queue = Arc::clone(&queue);
            let records = Arc::clone(&records);
            thread::spawn(move || {
                for x in start..start + 48 {
                    queue
                        .enqueue_front(&records[&key(8, x, 7)])
                        .expect("enqueue");
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().expect("producer thread");
    }

    let keys = queue.keys();
    assert_eq!(keys.len(), 64);
    let mut sorted = keys.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), 64);
    for record in records.values() {
        assert_eq!(record.holders(), 2, "tile {}", record.key());
    }
}

#[test]
fn release_buffer_parks_only_zero_holder_records() {
    let releases = ReleaseBuffer::new();
    let shared = TileRecord::new(key(4, 4, 4));
    shared.acquire();

    assert!(!releases.release(TileRef::clone(&shared)));
    assert!(releases.is_drained());
    assert!(releases.release(TileRef::clone(&shared)));
    assert_eq!(releases.len(), 1);
    assert_eq!(shared.state(), TileState::Orphaned);

    let mut freed = Vec::new();
    assert_eq!(releases.drain_with(4, |record| freed.push(record.key())), 1);
    assert_eq!(freed, vec![key(4, 4, 4)]);
    assert_eq!(releases.released_total(), 1);
}

#[test]
fn release_buffer_drain_respects_quota() {
    let releases = ReleaseBuffer::new();
    for x in 0..6 {
        releases.release(TileRecord::new(key(3, x, 0)));
    }
    assert_eq!(releases.drain_with(4, drop), 4);
    assert_eq!(releases.len(), 2);
    assert_eq!(releases.force_release_all(drop), 2);
    assert_eq!(releases.force_release_all(drop), 0);
    assert!(releases.is_drained());
}

#[test]
fn eviction_trims_to_capacity_and_releases_queue_holder() {
    let mut active = ActiveSet::with_capacity(3);
    let queue = LoadQueue::new();
    let releases = ReleaseBuffer::new();

    let oldest = resident(&mut active, key(5, 0, 0));
    queue.enqueue_front(&oldest).expect("enqueue");
    let middle = resident(&mut active, key(5, 1, 0));
    for x in 2..5 {
        resident(&mut active, key(5, x, 0));
    }
    assert_eq!(oldest.holders(), 2);

    let report = enforce_capacity(&mut active, &queue, &releases).expect("evict");
    assert_eq!(report.evicted, vec![key(5, 0, 0), key(5, 1, 0)]);
    assert_eq!(report.dequeued, 1);
    assert_eq!(active.len(), 3);
    assert!(queue.is_empty());
    assert_eq!(oldest.holders(), 0);
    assert_eq!(middle.holders(), 0);
    assert_eq!(releases.len(), 2);
}

#[test]
fn eviction_rotates_protected_tiles() {
    let mut active = ActiveSet::with_capacity(2);
    let queue = LoadQueue::new();
    let releases = ReleaseBuffer::new();

    resident(&mut active, TileKey::ROOT);
    resident(&mut active, key(1, 1, 1));
    resident(&mut active, key(6, 9, 9));
    resident(&mut active, key(6, 9, 10));

    let report = enforce_capacity(&mut active, &queue, &releases).expect("evict");
    assert_eq!(report.evicted, vec![key(6, 9, 9), key(6, 9, 10)]);
    assert_eq!(report.protected_rotations, 2);
    assert!(active.contains(&TileKey::ROOT));
    assert!(active.contains(&key(1, 1, 1)));
}

#[test]
fn eviction_stops_when_only_protected_tiles_remain() {
    let mut active = ActiveSet::with_capacity(2);
    let queue = LoadQueue::new();
    let releases = ReleaseBuffer::new();

    resident(&mut active, TileKey::ROOT);
    for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
        resident(&mut active, key(1, x, y));
    }

    let report = enforce_capacity(&mut active, &queue, &releases).expect("evict");
    assert!(report.evicted.is_empty());
    assert_eq!(active.len(), 5);
    assert!(releases.is_drained());
}

#[test]
fn load_queue_stays_busy_until_popped_entry_completes() {
    let queue = LoadQueue::new();
    assert!(queue.is_idle());
    let record = TileRecord::new(key(9, 1, 2));
    queue.enqueue_front(&record).expect("enqueue");
    assert!(!queue.is_idle());

    let popped = queue.try_pop().expect("pop");
    assert!(queue.is_empty());
    assert!(!queue.is_idle());
    drop(popped);
    queue.complete();
    assert!(queue.is_idle());
}
