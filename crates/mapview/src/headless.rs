use std::collections::HashMap;

use protocol::{RGBA8_BYTES_PER_PIXEL, TextureHandle, TextureUploader, UploadError};
use tracing::warn;

/// CPU-only texture owner that tracks what a GPU uploader would hold.
#[derive(Debug, Default)]
pub struct HeadlessUploader {
    live: HashMap<TextureHandle, usize>,
    next_handle: u64,
    uploads: u64,
    uploaded_bytes: u64,
}

impl HeadlessUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_textures(&self) -> usize {
        self.live.len()
    }

    pub fn live_bytes(&self) -> usize {
        self.live.values().sum()
    }

    pub fn uploads(&self) -> u64 {
        self.uploads
    }

    pub fn uploaded_bytes(&self) -> u64 {
        self.uploaded_bytes
    }
}

impl TextureUploader for HeadlessUploader {
    fn upload(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<TextureHandle, UploadError> {
        let expected_len = width as usize * height as usize * RGBA8_BYTES_PER_PIXEL;
        if expected_len == 0 || pixels.len() != expected_len {
            return Err(UploadError::Rejected {
                width,
                height,
                reason: format!("expected {expected_len} bytes, got {}", pixels.len()),
            });
        }
        self.next_handle += 1;
        let handle = TextureHandle(self.next_handle);
        self.live.insert(handle, pixels.len());
        self.uploads += 1;
        self.uploaded_bytes += pixels.len() as u64;
        Ok(handle)
    }

    fn free(&mut self, texture: TextureHandle) {
        if self.live.remove(&texture).is_none() {
            warn!(texture = texture.0, "free of unknown headless texture");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_live_textures_and_bytes() {
        let mut uploader = HeadlessUploader::new();
        let first = uploader.upload(2, 2, &[0; 16]).expect("upload");
        let second = uploader.upload(1, 1, &[0; 4]).expect("upload");
        assert_eq!(uploader.live_textures(), 2);
        assert_eq!(uploader.live_bytes(), 20);

        uploader.free(first);
        uploader.free(first);
        assert_eq!(uploader.live_textures(), 1);
        assert_eq!(uploader.uploads(), 2);
        assert_eq!(uploader.uploaded_bytes(), 20);

        uploader.free(second);
        assert_eq!(uploader.live_bytes(), 0);
    }

    #[test]
    fn rejects_short_pixel_buffers() {
        let mut uploader = HeadlessUploader::new();
        assert!(matches!(
            uploader.upload(2, 2, &[0; 3]),
            Err(UploadError::Rejected { .. })
        ));
        assert_eq!(uploader.live_textures(), 0);
    }
}
