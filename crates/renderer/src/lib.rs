//! CPU-side preparation of the tile draw list and the wgpu texture collaborator.
//!
//! - `geometry`: projection matrices for center-relative pixel space.
//! - `vertex`: vertex/index buffers and per-texture batches from a draw list.
//! - `gpu`: [`WgpuTextureUploader`], the render-thread owner of tile textures.

mod geometry;
mod gpu;
mod vertex;

pub use geometry::{orthographic_off_center, transform_point, viewport_clip_matrix};
pub use gpu::{TileTexture, WgpuTextureUploader};
pub use vertex::{
    DrawBatch, DrawBatches, INDICES_PER_QUAD, TileVertex, VERTICES_PER_QUAD, build_draw_batches,
    quad_vertices,
};

pub type TransformMatrix4x4 = [f32; 16];
