use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use protocol::{RawImage, TextureHandle, TileKey};

pub type TileRef = Arc<TileRecord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TileState {
    Requested = 0,
    Loading = 1,
    Loaded = 2,
    TextureReady = 3,
    Failed = 4,
    Orphaned = 5,
}

impl TileState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => TileState::Requested,
            1 => TileState::Loading,
            2 => TileState::Loaded,
            3 => TileState::TextureReady,
            4 => TileState::Failed,
            5 => TileState::Orphaned,
            _ => panic!("invalid tile state discriminant {raw}"),
        }
    }
}

/// One cached tile.
///
/// `Arc` keeps the memory alive; `holders` counts the logical owners
/// (active set, load queue, draw list, loaded buffer, in-flight worker).
/// Whoever drops `holders` to zero routes the record to the release buffer,
/// which is the only place its texture is freed.
pub struct TileRecord {
    key: TileKey,
    holders: AtomicUsize,
    state: AtomicU8,
    payload: Mutex<Option<RawImage>>,
    texture: Mutex<Option<TextureHandle>>,
}

impl TileRecord {
    /// New record with a single holder, owned by whoever inserts it into the active set.
    pub fn new(key: TileKey) -> TileRef {
        Arc::new(Self {
            key,
            holders: AtomicUsize::new(1),
            state: AtomicU8::new(TileState::Requested as u8),
            payload: Mutex::new(None),
            texture: Mutex::new(None),
        })
    }

    pub fn key(&self) -> TileKey {
        self.key
    }

    pub fn holders(&self) -> usize {
        self.holders.load(Ordering::Acquire)
    }

    /// True when the caller's reference is the last one left.
    pub fn is_sole_holder(&self) -> bool {
        self.holders() == 1
    }

    pub fn acquire(&self) {
        let result = self
            .holders
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                if count == 0 {
                    None
                } else {
                    count.checked_add(1)
                }
            });
        if result.is_err() {
            panic!(
                "tile {} acquired after its last holder released it",
                self.key
            );
        }
    }

    /// Drops one holder. Returns true when that was the last one.
    pub fn release(&self) -> bool {
        match self
            .holders
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            }) {
            Ok(previous) => previous == 1,
            Err(_) => panic!("tile {} released more times than acquired", self.key),
        }
    }

    pub fn state(&self) -> TileState {
        TileState::from_raw(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: TileState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn attach_payload(&self, image: RawImage) {
        let mut payload = self.payload.lock().expect("tile payload lock poisoned");
        if payload.is_some() {
            panic!("tile {} received a second payload", self.key);
        }
        *payload = Some(image);
    }

    pub fn take_payload(&self) -> Option<RawImage> {
        self.payload
            .lock()
            .expect("tile payload lock poisoned")
            .take()
    }

    pub fn texture(&self) -> Option<TextureHandle> {
        *self.texture.lock().expect("tile texture lock poisoned")
    }

    pub fn set_texture(&self, handle: TextureHandle) {
        let mut texture = self.texture.lock().expect("tile texture lock poisoned");
        if let Some(existing) = *texture {
            panic!(
                "tile {} already owns texture {:?}, refusing {:?}",
                self.key, existing, handle
            );
        }
        *texture = Some(handle);
    }

    pub fn take_texture(&self) -> Option<TextureHandle> {
        self.texture
            .lock()
            .expect("tile texture lock poisoned")
            .take()
    }
}

impl fmt::Debug for TileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileRecord")
            .field("key", &self.key)
            .field("holders", &self.holders())
            .field("state", &self.state())
            .finish()
    }
}
