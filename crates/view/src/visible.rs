use std::collections::TryReserveError;

use protocol::{TileKey, tiles_per_axis};

/// Inclusive rectangle of tile indices at one zoom level. Never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub zoom: u8,
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl TileRange {
    /// Clamps signed bounds to the zoom level's grid; `None` if nothing is left.
    pub fn clamped(zoom: u8, min_x: i64, max_x: i64, min_y: i64, max_y: i64) -> Option<Self> {
        let last = i64::from(tiles_per_axis(zoom)) - 1;
        let min_x = min_x.max(0);
        let min_y = min_y.max(0);
        let max_x = max_x.min(last);
        let max_y = max_y.min(last);
        if min_x > max_x || min_y > max_y {
            return None;
        }
        Some(Self {
            zoom,
            min_x: min_x as u32,
            max_x: max_x as u32,
            min_y: min_y as u32,
            max_y: max_y as u32,
        })
    }

    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    pub fn len(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    pub fn contains(&self, key: TileKey) -> bool {
        key.zoom == self.zoom
            && (self.min_x..=self.max_x).contains(&key.x)
            && (self.min_y..=self.max_y).contains(&key.y)
    }
}

/// Visits every tile of `range` once, walking inward ring by ring:
/// right column downwards, bottom row leftwards, left column upwards,
/// top row rightwards, shrinking the rectangle after each side.
///
/// Fails without aborting when the range is too large to hold in memory.
pub fn ring_order(range: &TileRange) -> Result<Vec<TileKey>, TryReserveError> {
    let total = range.len();
    let mut order = Vec::new();
    order.try_reserve_exact(total)?;
    let zoom = range.zoom;
    let mut start_x = i64::from(range.min_x);
    let mut start_y = i64::from(range.min_y);
    let mut end_x = i64::from(range.max_x);
    let mut end_y = i64::from(range.max_y);
    let push = |order: &mut Vec<TileKey>, x: i64, y: i64| {
        order.push(TileKey {
            zoom,
            x: x as u32,
            y: y as u32,
        });
    };

    while order.len() < total {
        for y in start_y..=end_y {
            push(&mut order, end_x, y);
        }
        if order.len() == total {
            break;
        }
        end_x -= 1;

        for x in (start_x..=end_x).rev() {
            push(&mut order, x, end_y);
        }
        if order.len() == total {
            break;
        }
        end_y -= 1;

        for y in (start_y..=end_y).rev() {
            push(&mut order, start_x, y);
        }
        if order.len() == total {
            break;
        }
        start_x += 1;

        for x in start_x..=end_x {
            push(&mut order, x, start_y);
        }
        start_y += 1;
    }
    Ok(order)
}
