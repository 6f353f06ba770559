//! Tile cache primitives shared between the render thread and fetch workers.
//!
//! Ownership model:
//! - [`TileRecord`] is shared through `Arc`, but its lifetime is governed by an
//!   explicit holder count. Each structure that stores a record owns one holder.
//! - [`ActiveSet`] is touched only by the render thread.
//! - [`LoadQueue`] is shared with workers; holders move in and out under its lock.
//! - [`ReleaseBuffer::release`] is the single path that drops a holder, so the
//!   record that reaches zero always lands in the release buffer.

mod active_set;
mod eviction;
mod load_queue;
mod record;
mod release;

use protocol::TileKey;
use static_assertions::assert_impl_all;
use thiserror::Error;

pub use active_set::{ActiveSet, TileSlot};
pub use eviction::{EvictionReport, enforce_capacity};
pub use load_queue::{Enqueued, LoadQueue};
pub use record::{TileRecord, TileRef, TileState};
pub use release::ReleaseBuffer;

/// Resident tile budget used when nothing else is configured.
pub const DEFAULT_ACTIVE_CAPACITY: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileError {
    #[error("allocation failed while growing {structure}")]
    OutOfMemory { structure: &'static str },
    #[error("tile {key} is already resident")]
    AlreadyResident { key: TileKey },
}

assert_impl_all!(TileRecord: Send, Sync);
assert_impl_all!(LoadQueue: Send, Sync);
assert_impl_all!(ReleaseBuffer: Send, Sync);
assert_impl_all!(ActiveSet: Send);

#[cfg(test)]
mod tests;
