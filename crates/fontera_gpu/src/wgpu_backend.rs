//! wgpu upload backend
//!
//! Pixels are streamed through a `COPY_DST | COPY_SRC` staging buffer: rows are
//! padded to the required pitch, written with `Queue::write_buffer`, then
//! copied into the texture on the same submission. The queue owns the write
//! staging, so an upload never waits on a buffer map; the cost is one extra
//! CPU-side copy of the padded rows. Textures are sampled with bilinear
//! filtering, clamp-to-edge addressing and no mipmaps.

use crate::error::{GpuError, Result};
use crate::upload::{PixelLayout, UploadBackend};
use std::sync::Arc;

/// A texture allocated by [`WgpuBackend`]
pub struct WgpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl WgpuTexture {
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    /// View for binding in a draw call
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

/// Upload backend over a wgpu device and queue
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    sampler: wgpu::Sampler,
}

impl WgpuBackend {
    /// Wrap an existing device, typically the host renderer's
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Fontera Text Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            lod_min_clamp: 0.0,
            lod_max_clamp: 0.0,
            ..Default::default()
        });

        Self {
            device,
            queue,
            sampler,
        }
    }

    /// Create a backend on its own headless device
    pub fn new_headless() -> Result<Self> {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });

            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::LowPower,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .ok_or(GpuError::AdapterNotFound)?;

            let (device, queue) = adapter
                .request_device(
                    &wgpu::DeviceDescriptor {
                        label: Some("Fontera GPU Device"),
                        required_features: wgpu::Features::empty(),
                        required_limits: wgpu::Limits::downlevel_defaults(),
                        memory_hints: wgpu::MemoryHints::MemoryUsage,
                    },
                    None,
                )
                .await?;

            tracing::info!("Created headless device on {:?}", adapter.get_info().backend);
            Ok(Self::new(Arc::new(device), Arc::new(queue)))
        })
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    /// Shared sampler for all text textures
    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }
}

impl UploadBackend for WgpuBackend {
    type Texture = WgpuTexture;
    type Buffer = wgpu::Buffer;

    fn row_alignment(&self) -> u32 {
        wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
    }

    fn create_texture(&self, label: &str, width: u32, height: u32) -> WgpuTexture {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        WgpuTexture { texture, view }
    }

    fn create_pixel_buffer(&self, label: &str, layout: &PixelLayout) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: layout.buffer_size(),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        })
    }

    fn stream_pixels(
        &self,
        texture: &WgpuTexture,
        buffer: &wgpu::Buffer,
        layout: &PixelLayout,
        pixels: &[u8],
    ) -> Result<()> {
        let mut staging = vec![0u8; layout.buffer_size() as usize];
        layout.copy_rows(pixels, &mut staging);
        self.queue.write_buffer(buffer, 0, &staging);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Fontera Upload Encoder"),
            });
        encoder.copy_buffer_to_texture(
            wgpu::ImageCopyBuffer {
                buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(layout.bytes_per_row),
                    rows_per_image: Some(layout.height),
                },
            },
            wgpu::ImageCopyTexture {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: layout.width,
                height: layout.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        Ok(())
    }

    fn release_texture(&self, texture: WgpuTexture) {
        texture.texture.destroy();
    }

    fn release_buffer(&self, buffer: wgpu::Buffer) {
        buffer.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::TextureUpload;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_headless_upload_and_release() {
        let Ok(backend) = WgpuBackend::new_headless() else {
            // Skip test if no GPU available
            return;
        };

        let mut upload = TextureUpload::new("fontera:render/test");
        let image = RgbaImage::from_pixel(10, 3, Rgba([255, 0, 0, 255]));
        upload.upload_rgba(&backend, &image).unwrap();
        assert!(upload.is_uploaded());
        assert_eq!(upload.dimensions(), Some((10, 3)));

        // Same size re-upload goes through the existing staging buffer
        upload.upload_rgba(&backend, &image).unwrap();
        assert_eq!(upload.upload_count(), 2);

        upload.release(&backend);
        assert!(upload.texture().is_none());
    }

    #[test]
    fn test_headless_repeated_uploads_do_not_map() {
        let Ok(backend) = WgpuBackend::new_headless() else {
            // Skip test if no GPU available
            return;
        };

        let mut upload = TextureUpload::new("fontera:render/stream");
        for shade in 0..16u8 {
            let image = RgbaImage::from_pixel(33, 5, Rgba([shade, 0, 0, 255]));
            upload.upload_rgba(&backend, &image).unwrap();
        }
        assert_eq!(upload.upload_count(), 16);

        // Flush queued copies before release
        backend.device().poll(wgpu::Maintain::Wait);
        upload.release(&backend);
    }

    #[test]
    fn test_wgpu_row_alignment() {
        let layout = PixelLayout::tightly_packed(10, 3, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        assert_eq!(layout.bytes_per_row, 256);
        assert_eq!(layout.buffer_size(), 768);
    }
}
