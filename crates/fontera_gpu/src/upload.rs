//! Streaming texture upload
//!
//! A [`TextureUpload`] owns one texture and one staging pixel buffer. The first
//! upload allocates both; an upload with different dimensions releases them and
//! allocates again; an upload with the same dimensions reuses them. Resources
//! are freed only by an explicit [`TextureUpload::release`].

use crate::error::{GpuError, Result};
use fontera_text::canvas::normalize;
use image::{DynamicImage, RgbaImage};

/// Unpack parameters describing source pixels and the staging buffer rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelLayout {
    pub width: u32,
    pub height: u32,
    /// Source row length in pixels
    pub row_length: u32,
    pub skip_pixels: u32,
    pub skip_rows: u32,
    /// Source row alignment in bytes
    pub alignment: u32,
    /// Staging buffer row pitch, padded to the backend's copy alignment
    pub bytes_per_row: u32,
}

impl PixelLayout {
    pub const BYTES_PER_PIXEL: u32 = 4;
    pub const UNPACK_ALIGNMENT: u32 = 4;

    /// Layout for tightly packed RGBA8 rows, padded to `row_alignment` in the staging buffer
    pub fn tightly_packed(width: u32, height: u32, row_alignment: u32) -> Self {
        let row_bytes = width * Self::BYTES_PER_PIXEL;
        let align = row_alignment.max(1);
        Self {
            width,
            height,
            row_length: width,
            skip_pixels: 0,
            skip_rows: 0,
            alignment: Self::UNPACK_ALIGNMENT,
            bytes_per_row: row_bytes.div_ceil(align) * align,
        }
    }

    /// Bytes in one tightly packed source row
    pub fn row_bytes(&self) -> usize {
        (self.row_length * Self::BYTES_PER_PIXEL) as usize
    }

    /// Bytes expected in the source pixel slice
    pub fn source_len(&self) -> usize {
        self.row_bytes() * self.height as usize
    }

    /// Size of the staging buffer in bytes
    pub fn buffer_size(&self) -> u64 {
        self.bytes_per_row as u64 * self.height as u64
    }

    /// Copy source rows into a padded staging region
    pub fn copy_rows(&self, pixels: &[u8], staging: &mut [u8]) {
        let row_bytes = self.row_bytes();
        let pitch = self.bytes_per_row as usize;
        let skip = (self.skip_rows as usize) * row_bytes
            + (self.skip_pixels * Self::BYTES_PER_PIXEL) as usize;

        for row in 0..self.height as usize {
            let src = skip + row * row_bytes;
            let dst = row * pitch;
            let width_bytes = (self.width * Self::BYTES_PER_PIXEL) as usize;
            staging[dst..dst + width_bytes].copy_from_slice(&pixels[src..src + width_bytes]);
        }
    }
}

/// GPU operations the upload pipeline needs
///
/// Handles are owned values; a handle passed to a `release_*` call is never
/// used again.
pub trait UploadBackend {
    type Texture;
    type Buffer;

    /// Row pitch alignment the backend requires for buffer-to-texture copies
    fn row_alignment(&self) -> u32 {
        PixelLayout::UNPACK_ALIGNMENT
    }

    /// Allocate an RGBA8 texture: linear filtering, clamp-to-edge, one mip level
    fn create_texture(&self, label: &str, width: u32, height: u32) -> Self::Texture;

    /// Allocate a staging buffer for `layout`
    fn create_pixel_buffer(&self, label: &str, layout: &PixelLayout) -> Self::Buffer;

    /// Map `buffer`, copy `pixels` in, unmap, then copy the buffer into `texture`
    fn stream_pixels(
        &self,
        texture: &Self::Texture,
        buffer: &Self::Buffer,
        layout: &PixelLayout,
        pixels: &[u8],
    ) -> Result<()>;

    fn release_texture(&self, texture: Self::Texture);

    fn release_buffer(&self, buffer: Self::Buffer);
}

struct UploadResources<B: UploadBackend> {
    texture: B::Texture,
    buffer: B::Buffer,
    layout: PixelLayout,
}

/// One texture plus its staging buffer
pub struct TextureUpload<B: UploadBackend> {
    label: String,
    resources: Option<UploadResources<B>>,
    uploads: u64,
}

impl<B: UploadBackend> TextureUpload<B> {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            resources: None,
            uploads: 0,
        }
    }

    /// Upload any image, converting it to RGBA8 first if needed
    pub fn upload(&mut self, backend: &B, image: &DynamicImage) -> Result<()> {
        let rgba = normalize(image);
        self.upload_rgba(backend, &rgba)
    }

    /// Upload an RGBA8 image
    pub fn upload_rgba(&mut self, backend: &B, image: &RgbaImage) -> Result<()> {
        let (width, height) = image.dimensions();

        let needs_alloc = match &self.resources {
            None => true,
            Some(res) => res.layout.width != width || res.layout.height != height,
        };
        if needs_alloc {
            self.release(backend);
            self.allocate(backend, width, height);
        }

        let Some(res) = &self.resources else {
            return Err(GpuError::BufferMap(format!(
                "{} has no staging buffer",
                self.label
            )));
        };

        let pixels = image.as_raw();
        let streamed = if pixels.len() != res.layout.source_len() {
            Err(GpuError::PixelSizeMismatch {
                expected: res.layout.source_len(),
                actual: pixels.len(),
            })
        } else {
            backend.stream_pixels(&res.texture, &res.buffer, &res.layout, pixels)
        };

        // A failed upload leaves nothing for the caller to release
        if let Err(e) = streamed {
            tracing::warn!("Upload of {} failed: {}", self.label, e);
            self.release(backend);
            return Err(e);
        }
        self.uploads += 1;
        Ok(())
    }

    fn allocate(&mut self, backend: &B, width: u32, height: u32) {
        tracing::debug!("Allocating {}x{} texture for {}", width, height, self.label);

        let layout = PixelLayout::tightly_packed(width, height, backend.row_alignment());
        let texture = backend.create_texture(&self.label, width, height);
        let buffer = backend.create_pixel_buffer(&self.label, &layout);
        self.resources = Some(UploadResources {
            texture,
            buffer,
            layout,
        });
    }

    /// Release the texture and staging buffer; safe to call more than once
    pub fn release(&mut self, backend: &B) {
        if let Some(res) = self.resources.take() {
            backend.release_texture(res.texture);
            backend.release_buffer(res.buffer);
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn texture(&self) -> Option<&B::Texture> {
        self.resources.as_ref().map(|res| &res.texture)
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.resources
            .as_ref()
            .map(|res| (res.layout.width, res.layout.height))
    }

    /// Whether at least one upload has completed since the last allocation
    pub fn is_uploaded(&self) -> bool {
        self.resources.is_some() && self.uploads > 0
    }

    /// Total completed uploads
    pub fn upload_count(&self) -> u64 {
        self.uploads
    }
}

impl<B: UploadBackend> Drop for TextureUpload<B> {
    fn drop(&mut self) {
        if self.resources.is_some() {
            tracing::warn!("{} dropped without releasing its GPU resources", self.label);
        }
    }
}
