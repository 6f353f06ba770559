use crate::{TextureHandle, TileKey};

/// Axis-aligned square in screen pixels, relative to the viewport center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub x: f32,
    pub y: f32,
    pub size: f32,
}

impl Quad {
    pub fn max_x(&self) -> f32 {
        self.x + self.size
    }

    pub fn max_y(&self) -> f32 {
        self.y + self.size
    }
}

/// Normalized sub-rectangle of a texture: `uv = offset + local * scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexRect {
    pub offset: [f32; 2],
    pub scale: [f32; 2],
}

impl TexRect {
    pub const FULL: TexRect = TexRect {
        offset: [0.0, 0.0],
        scale: [1.0, 1.0],
    };

    pub fn uv_min(&self) -> [f32; 2] {
        self.offset
    }

    pub fn uv_max(&self) -> [f32; 2] {
        [
            self.offset[0] + self.scale[0],
            self.offset[1] + self.scale[1],
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextureSource {
    Own(TextureHandle),
    /// Borrowed region of a coarser tile. The ancestor is looked up, never retained.
    Ancestor {
        key: TileKey,
        texture: TextureHandle,
        rect: TexRect,
    },
}

impl TextureSource {
    pub fn texture(&self) -> TextureHandle {
        match self {
            TextureSource::Own(texture) => *texture,
            TextureSource::Ancestor { texture, .. } => *texture,
        }
    }

    pub fn rect(&self) -> TexRect {
        match self {
            TextureSource::Own(_) => TexRect::FULL,
            TextureSource::Ancestor { rect, .. } => *rect,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, TextureSource::Ancestor { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    pub key: TileKey,
    pub quad: Quad,
    pub source: TextureSource,
}
