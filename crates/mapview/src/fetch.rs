use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use protocol::{FetchError, RGBA8_BYTES_PER_PIXEL, RawImage, TileFetcher, TileKey};
use tracing::debug;

/// Reads pre-rendered tiles from `{root}/{z}/{x}/{y}.{extension}`.
#[derive(Debug, Clone)]
pub struct DirectoryFetcher {
    root: PathBuf,
    extension: String,
}

impl DirectoryFetcher {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tile_path(&self, key: TileKey) -> PathBuf {
        self.root
            .join(key.zoom.to_string())
            .join(key.x.to_string())
            .join(format!("{}.{}", key.y, self.extension))
    }
}

impl TileFetcher for DirectoryFetcher {
    fn fetch(&self, key: TileKey) -> Result<RawImage, FetchError> {
        let path = self.tile_path(key);
        let reader = image::ImageReader::open(&path).map_err(|error| match error.kind() {
            io::ErrorKind::NotFound => FetchError::NotFound { key },
            _ => FetchError::Io {
                key,
                reason: format!("{}: {error}", path.display()),
            },
        })?;
        let decoded = reader
            .decode()
            .map_err(|error| FetchError::Malformed {
                reason: format!("{}: {error}", path.display()),
            })?
            .to_rgba8();
        debug!(%key, path = %path.display(), "tile decoded");
        RawImage::new(decoded.width(), decoded.height(), decoded.into_raw())
    }
}

/// Generates flat-colored tiles with a darker border, derived from the key so
/// every zoom level is visually distinct.
#[derive(Debug, Clone)]
pub struct SyntheticFetcher {
    tile_size: u32,
    latency: Duration,
}

impl SyntheticFetcher {
    pub fn new(tile_size: u32, latency: Duration) -> Self {
        assert!(tile_size > 0, "synthetic tile size must be non-zero");
        Self { tile_size, latency }
    }

    pub fn tile_color(key: TileKey) -> [u8; 4] {
        let mix = key
            .x
            .wrapping_mul(0x9E37_79B1)
            .wrapping_add(key.y.wrapping_mul(0x85EB_CA6B))
            .wrapping_add(u32::from(key.zoom).wrapping_mul(0xC2B2_AE35));
        [
            (mix >> 24) as u8 | 0x40,
            (mix >> 16) as u8 | 0x40,
            (mix >> 8) as u8 | 0x40,
            u8::MAX,
        ]
    }
}

impl TileFetcher for SyntheticFetcher {
    fn fetch(&self, key: TileKey) -> Result<RawImage, FetchError> {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        let size = self.tile_size as usize;
        let fill = Self::tile_color(key);
        let border = [fill[0] / 2, fill[1] / 2, fill[2] / 2, u8::MAX];
        let mut pixels = Vec::with_capacity(size * size * RGBA8_BYTES_PER_PIXEL);
        for row in 0..size {
            for column in 0..size {
                let edge = row == 0 || column == 0 || row + 1 == size || column + 1 == size;
                pixels.extend_from_slice(if edge { &border } else { &fill });
            }
        }
        RawImage::new(self.tile_size, self.tile_size, pixels)
    }
}
