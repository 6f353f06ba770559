use std::collections::HashMap;

use protocol::{RGBA8_BYTES_PER_PIXEL, TextureHandle, TextureUploader, UploadError};

const TILE_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

#[derive(Debug)]
pub struct TileTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

/// Owns one GPU texture per uploaded tile. Lives on the render thread.
pub struct WgpuTextureUploader {
    device: wgpu::Device,
    queue: wgpu::Queue,
    textures: HashMap<TextureHandle, TileTexture>,
    next_handle: u64,
}

impl WgpuTextureUploader {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            textures: HashMap::new(),
            next_handle: 1,
        }
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&TileTexture> {
        self.textures.get(&handle)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

impl TextureUploader for WgpuTextureUploader {
    fn upload(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<TextureHandle, UploadError> {
        let max_dimension = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max_dimension || height > max_dimension {
            return Err(UploadError::Rejected {
                width,
                height,
                reason: format!("dimensions outside 1..={max_dimension}"),
            });
        }
        let expected_len = width as usize * height as usize * RGBA8_BYTES_PER_PIXEL;
        if pixels.len() != expected_len {
            return Err(UploadError::Rejected {
                width,
                height,
                reason: format!("expected {expected_len} bytes, got {}", pixels.len()),
            });
        }

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("renderer.tile_texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TILE_TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * RGBA8_BYTES_PER_PIXEL as u32),
                rows_per_image: Some(height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let handle = TextureHandle(self.next_handle);
        self.next_handle += 1;
        self.textures.insert(
            handle,
            TileTexture {
                texture,
                view,
                width,
                height,
            },
        );
        Ok(handle)
    }

    fn free(&mut self, handle: TextureHandle) {
        match self.textures.remove(&handle) {
            Some(tile) => tile.texture.destroy(),
            None => tracing::warn!(handle = handle.0, "free of unknown tile texture"),
        }
    }
}
