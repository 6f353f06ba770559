//! Shared vocabulary between the tile cache, the view math and the collaborators
//! that fetch pixels and own GPU textures.
//!
//! Nothing in here owns threads or locks. Every crate in the workspace depends on
//! these types, so they stay small, `Copy` where possible and free of policy.

mod draw;

use std::fmt;

use smallvec::SmallVec;
use thiserror::Error;

pub use draw::{DrawItem, Quad, TexRect, TextureSource};

/// Highest zoom level whose tile indices still fit in `u32`.
pub const MAX_SUPPORTED_ZOOM: u8 = 30;
/// Tiles at or above this zoom level are never evicted.
pub const PROTECTED_MAX_ZOOM: u8 = 1;
pub const RGBA8_BYTES_PER_PIXEL: usize = 4;

/// Ancestor chains never exceed `MAX_SUPPORTED_ZOOM` entries.
pub type AncestorChain = SmallVec<[TileKey; 32]>;

/// Address of one tile in the quadtree pyramid.
///
/// The derived ordering is (zoom, x, y), which is the order ancestors are staged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileKey {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileKey {
    pub const ROOT: TileKey = TileKey {
        zoom: 0,
        x: 0,
        y: 0,
    };

    pub fn new(zoom: u8, x: u32, y: u32) -> Self {
        assert!(
            zoom <= MAX_SUPPORTED_ZOOM,
            "tile zoom {zoom} exceeds supported maximum {MAX_SUPPORTED_ZOOM}"
        );
        let per_axis = tiles_per_axis(zoom);
        assert!(
            x < per_axis && y < per_axis,
            "tile {zoom}/{x}/{y} lies outside the {per_axis}x{per_axis} grid"
        );
        Self { zoom, x, y }
    }

    pub fn parent(self) -> Option<TileKey> {
        if self.zoom == 0 {
            return None;
        }
        Some(TileKey {
            zoom: self.zoom - 1,
            x: self.x / 2,
            y: self.y / 2,
        })
    }

    /// Every ancestor down to zoom 0, nearest first.
    pub fn ancestor_chain(self) -> AncestorChain {
        let mut chain = AncestorChain::new();
        let mut current = self;
        while let Some(parent) = current.parent() {
            chain.push(parent);
            current = parent;
        }
        chain
    }

    pub fn is_protected(self) -> bool {
        self.zoom <= PROTECTED_MAX_ZOOM
    }

    /// Position inside the parent's 2x2 grid as (column bit, row bit).
    pub fn quadrant(self) -> (u32, u32) {
        (self.x & 1, self.y & 1)
    }

    /// True when `other` is this tile or lies somewhere beneath it.
    pub fn contains(self, other: TileKey) -> bool {
        if other.zoom < self.zoom {
            return false;
        }
        let shift = u32::from(other.zoom - self.zoom);
        other.x >> shift == self.x && other.y >> shift == self.y
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

pub fn tiles_per_axis(zoom: u8) -> u32 {
    assert!(
        zoom <= MAX_SUPPORTED_ZOOM,
        "tile zoom {zoom} exceeds supported maximum {MAX_SUPPORTED_ZOOM}"
    );
    1u32 << zoom
}

/// Fractional tile-space position at a continuous zoom level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileCoord {
    pub column: f64,
    pub row: f64,
    pub zoom: f64,
}

impl TileCoord {
    pub fn new(column: f64, row: f64, zoom: f64) -> Self {
        Self { column, row, zoom }
    }

    /// Same geographic point expressed at another zoom level.
    pub fn zoom_to(self, zoom: f64) -> TileCoord {
        let scale = 2f64.powf(zoom - self.zoom);
        TileCoord {
            column: self.column * scale,
            row: self.row * scale,
            zoom,
        }
    }

    pub fn offset_by(self, delta_column: f64, delta_row: f64) -> TileCoord {
        TileCoord {
            column: self.column + delta_column,
            row: self.row + delta_row,
            zoom: self.zoom,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.column.is_finite() && self.row.is_finite() && self.zoom.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Decoded tile pixels, tightly packed RGBA8.
#[derive(Clone, PartialEq, Eq)]
pub struct RawImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RawImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, FetchError> {
        if width == 0 || height == 0 {
            return Err(FetchError::Malformed {
                reason: format!("empty image {width}x{height}"),
            });
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|count| count.checked_mul(RGBA8_BYTES_PER_PIXEL))
            .ok_or_else(|| FetchError::Malformed {
                reason: format!("image {width}x{height} overflows addressable size"),
            })?;
        if pixels.len() != expected {
            return Err(FetchError::Malformed {
                reason: format!(
                    "image {width}x{height} needs {expected} bytes, got {}",
                    pixels.len()
                ),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

impl fmt::Debug for RawImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Opaque texture id handed out by a [`TextureUploader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureHandle(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("tile {key} is not available from this source")]
    NotFound { key: TileKey },
    #[error("tile {key} could not be read: {reason}")]
    Io { key: TileKey, reason: String },
    #[error("tile payload is malformed: {reason}")]
    Malformed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("texture upload rejected for {width}x{height} image: {reason}")]
    Rejected {
        width: u32,
        height: u32,
        reason: String,
    },
    #[error("graphics device is no longer available")]
    DeviceLost,
}

/// Source of decoded tile pixels. Called concurrently from worker threads with
/// independent keys; any on-disk caching lives behind this trait.
pub trait TileFetcher: Send + Sync {
    fn fetch(&self, key: TileKey) -> Result<RawImage, FetchError>;
}

/// Owner of GPU texture objects. Only ever called from the render thread.
pub trait TextureUploader {
    fn upload(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<TextureHandle, UploadError>;

    fn free(&mut self, texture: TextureHandle);
}

/// Geographic position <-> fractional tile coordinate conversion.
pub trait Projection {
    fn project(&self, position: LatLon, zoom: f64) -> TileCoord;
    fn unproject(&self, coord: TileCoord) -> LatLon;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_order_is_zoom_then_x_then_y() {
        let mut keys = vec![
            TileKey::new(2, 1, 0),
            TileKey::new(1, 1, 1),
            TileKey::new(2, 0, 3),
            TileKey::new(2, 0, 1),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                TileKey::new(1, 1, 1),
                TileKey::new(2, 0, 1),
                TileKey::new(2, 0, 3),
                TileKey::new(2, 1, 0),
            ]
        );
    }

    #[test]
    fn ancestor_chain_halves_down_to_root() {
        let chain = TileKey::new(5, 10, 12).ancestor_chain();
        assert_eq!(
            chain.as_slice(),
            &[
                TileKey::new(4, 5, 6),
                TileKey::new(3, 2, 3),
                TileKey::new(2, 1, 1),
                TileKey::new(1, 0, 0),
                TileKey::ROOT,
            ]
        );
        assert!(TileKey::ROOT.ancestor_chain().is_empty());
    }

    #[test]
    fn protection_covers_zoom_zero_and_one_only() {
        assert!(TileKey::ROOT.is_protected());
        assert!(TileKey::new(1, 1, 0).is_protected());
        assert!(!TileKey::new(2, 3, 3).is_protected());
    }

    #[test]
    fn contains_matches_descendants() {
        let ancestor = TileKey::new(3, 2, 3);
        assert!(ancestor.contains(TileKey::new(5, 10, 12)));
        assert!(ancestor.contains(ancestor));
        assert!(!ancestor.contains(TileKey::new(5, 12, 12)));
        assert!(!ancestor.contains(TileKey::new(2, 1, 1)));
    }

    #[test]
    #[should_panic(expected = "lies outside")]
    fn new_rejects_out_of_grid_index() {
        let _ = TileKey::new(1, 2, 0);
    }

    #[test]
    fn raw_image_validates_byte_length() {
        assert!(RawImage::new(2, 2, vec![0; 16]).is_ok());
        assert!(matches!(
            RawImage::new(2, 2, vec![0; 15]),
            Err(FetchError::Malformed { .. })
        ));
        assert!(matches!(
            RawImage::new(0, 2, Vec::new()),
            Err(FetchError::Malformed { .. })
        ));
    }

    #[test]
    fn zoom_to_rescales_by_power_of_two() {
        let coord = TileCoord::new(3.0, 5.0, 2.0).zoom_to(4.0);
        assert_eq!(coord, TileCoord::new(12.0, 20.0, 4.0));
    }
}
