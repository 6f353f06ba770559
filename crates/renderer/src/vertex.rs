use protocol::{DrawItem, TextureHandle};

pub const VERTICES_PER_QUAD: u32 = 4;
pub const INDICES_PER_QUAD: u32 = 6;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TileVertex {
    /// Pixels relative to the viewport center, y down.
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

/// Consecutive quads sampling the same texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawBatch {
    pub texture: TextureHandle,
    pub first_index: u32,
    pub index_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawBatches {
    pub vertices: Vec<TileVertex>,
    pub indices: Vec<u32>,
    pub batches: Vec<DrawBatch>,
}

impl DrawBatches {
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn quad_count(&self) -> usize {
        self.vertices.len() / VERTICES_PER_QUAD as usize
    }
}

/// Corners in top-left, bottom-left, top-right, bottom-right order.
pub fn quad_vertices(item: &DrawItem) -> [TileVertex; 4] {
    let quad = item.quad;
    let rect = item.source.rect();
    let [u0, v0] = rect.uv_min();
    let [u1, v1] = rect.uv_max();
    [
        TileVertex {
            position: [quad.x, quad.y],
            uv: [u0, v0],
        },
        TileVertex {
            position: [quad.x, quad.max_y()],
            uv: [u0, v1],
        },
        TileVertex {
            position: [quad.max_x(), quad.y],
            uv: [u1, v0],
        },
        TileVertex {
            position: [quad.max_x(), quad.max_y()],
            uv: [u1, v1],
        },
    ]
}

/// Builds indexed triangle lists for `items`, merging runs that share a texture
/// into a single batch so each run needs one bind.
pub fn build_draw_batches(items: &[DrawItem]) -> DrawBatches {
    let mut output = DrawBatches {
        vertices: Vec::with_capacity(items.len() * VERTICES_PER_QUAD as usize),
        indices: Vec::with_capacity(items.len() * INDICES_PER_QUAD as usize),
        batches: Vec::new(),
    };

    for item in items {
        let base = u32::try_from(output.vertices.len()).expect("tile vertex count overflow");
        output.vertices.extend_from_slice(&quad_vertices(item));
        let first_index = u32::try_from(output.indices.len()).expect("tile index count overflow");
        output
            .indices
            .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 1, base + 3]);

        let texture = item.source.texture();
        match output.batches.last_mut() {
            Some(batch) if batch.texture == texture => batch.index_count += INDICES_PER_QUAD,
            _ => output.batches.push(DrawBatch {
                texture,
                first_index,
                index_count: INDICES_PER_QUAD,
            }),
        }
    }
    output
}
