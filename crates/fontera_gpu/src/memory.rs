//! CPU-memory upload backend
//!
//! Keeps textures as [`RgbaImage`]s and records every backend call. Used for
//! headless rendering (read a cached texture back as an image) and for
//! exercising the upload pipeline without a GPU.

use crate::error::{GpuError, Result};
use crate::upload::{PixelLayout, UploadBackend};
use image::{Rgba, RgbaImage};
use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};

/// A backend call, in the order it was made
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOp {
    CreateTexture { width: u32, height: u32 },
    CreateBuffer { size: u64 },
    Stream { width: u32, height: u32 },
    ReleaseTexture { id: u64 },
    ReleaseBuffer { id: u64 },
}

/// Texture handle
#[derive(Debug)]
pub struct MemoryTexture {
    id: u64,
    width: u32,
    height: u32,
}

impl MemoryTexture {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Staging buffer handle
#[derive(Debug)]
pub struct MemoryBuffer {
    id: u64,
}

#[derive(Default)]
struct MemoryState {
    next_id: u64,
    ops: Vec<BackendOp>,
    textures: FxHashMap<u64, RgbaImage>,
    buffers: FxHashMap<u64, Vec<u8>>,
}

impl MemoryState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Upload backend that stores pixels in memory
pub struct MemoryBackend {
    state: RefCell<MemoryState>,
    row_alignment: u32,
    fail_streams: Cell<bool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_row_alignment(PixelLayout::UNPACK_ALIGNMENT)
    }

    /// Backend that pads staging rows to `row_alignment` bytes
    pub fn with_row_alignment(row_alignment: u32) -> Self {
        Self {
            state: RefCell::new(MemoryState::default()),
            row_alignment,
            fail_streams: Cell::new(false),
        }
    }

    /// Make every following `stream_pixels` call fail, as a lost device would
    pub fn set_fail_streams(&self, fail: bool) {
        self.fail_streams.set(fail);
    }

    /// All calls made so far
    pub fn ops(&self) -> Vec<BackendOp> {
        self.state.borrow().ops.clone()
    }

    /// Number of recorded calls matching `pred`
    pub fn count(&self, pred: impl Fn(&BackendOp) -> bool) -> usize {
        self.state.borrow().ops.iter().filter(|op| pred(op)).count()
    }

    pub fn live_textures(&self) -> usize {
        self.state.borrow().textures.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.state.borrow().buffers.len()
    }

    /// Copy of a texture's current contents
    pub fn read_texture(&self, texture: &MemoryTexture) -> Option<RgbaImage> {
        self.state.borrow().textures.get(&texture.id).cloned()
    }

    pub fn pixel(&self, texture: &MemoryTexture, x: u32, y: u32) -> Option<Rgba<u8>> {
        let state = self.state.borrow();
        let image = state.textures.get(&texture.id)?;
        (x < image.width() && y < image.height()).then(|| *image.get_pixel(x, y))
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadBackend for MemoryBackend {
    type Texture = MemoryTexture;
    type Buffer = MemoryBuffer;

    fn row_alignment(&self) -> u32 {
        self.row_alignment
    }

    fn create_texture(&self, _label: &str, width: u32, height: u32) -> MemoryTexture {
        let mut state = self.state.borrow_mut();
        let id = state.next_id();
        state.textures.insert(id, RgbaImage::new(width, height));
        state.ops.push(BackendOp::CreateTexture { width, height });
        MemoryTexture { id, width, height }
    }

    fn create_pixel_buffer(&self, _label: &str, layout: &PixelLayout) -> MemoryBuffer {
        let mut state = self.state.borrow_mut();
        let id = state.next_id();
        let size = layout.buffer_size();
        state.buffers.insert(id, vec![0; size as usize]);
        state.ops.push(BackendOp::CreateBuffer { size });
        MemoryBuffer { id }
    }

    fn stream_pixels(
        &self,
        texture: &MemoryTexture,
        buffer: &MemoryBuffer,
        layout: &PixelLayout,
        pixels: &[u8],
    ) -> Result<()> {
        if self.fail_streams.get() {
            return Err(GpuError::BufferMap(format!(
                "stream to texture {} failed",
                texture.id
            )));
        }

        let mut state = self.state.borrow_mut();
        let MemoryState {
            ops,
            textures,
            buffers,
            ..
        } = &mut *state;

        let staging = buffers
            .get_mut(&buffer.id)
            .ok_or_else(|| GpuError::BufferMap(format!("unknown buffer {}", buffer.id)))?;
        layout.copy_rows(pixels, staging);

        let target = textures
            .get_mut(&texture.id)
            .ok_or_else(|| GpuError::BufferMap(format!("unknown texture {}", texture.id)))?;
        let row_bytes = (layout.width * PixelLayout::BYTES_PER_PIXEL) as usize;
        let pitch = layout.bytes_per_row as usize;
        let dest_pitch = (target.width() * PixelLayout::BYTES_PER_PIXEL) as usize;
        let raw: &mut [u8] = target;
        for row in 0..layout.height as usize {
            raw[row * dest_pitch..row * dest_pitch + row_bytes]
                .copy_from_slice(&staging[row * pitch..row * pitch + row_bytes]);
        }

        ops.push(BackendOp::Stream {
            width: layout.width,
            height: layout.height,
        });
        Ok(())
    }

    fn release_texture(&self, texture: MemoryTexture) {
        let mut state = self.state.borrow_mut();
        state.textures.remove(&texture.id);
        state.ops.push(BackendOp::ReleaseTexture { id: texture.id });
    }

    fn release_buffer(&self, buffer: MemoryBuffer) {
        let mut state = self.state.borrow_mut();
        state.buffers.remove(&buffer.id);
        state.ops.push(BackendOp::ReleaseBuffer { id: buffer.id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_round_trips_through_padded_buffer() {
        let backend = MemoryBackend::with_row_alignment(256);
        let texture = backend.create_texture("t", 3, 2);
        let layout = PixelLayout::tightly_packed(3, 2, backend.row_alignment());
        let buffer = backend.create_pixel_buffer("t", &layout);

        let source = RgbaImage::from_fn(3, 2, |x, y| Rgba([x as u8, y as u8, 7, 255]));
        backend
            .stream_pixels(&texture, &buffer, &layout, source.as_raw())
            .unwrap();

        assert_eq!(backend.read_texture(&texture), Some(source));
        assert_eq!(backend.count(|op| *op == BackendOp::CreateBuffer { size: 512 }), 1);
    }

    #[test]
    fn test_released_buffer_fails_to_map() {
        let backend = MemoryBackend::new();
        let texture = backend.create_texture("t", 1, 1);
        let layout = PixelLayout::tightly_packed(1, 1, 4);
        let buffer = backend.create_pixel_buffer("t", &layout);
        let stale = MemoryBuffer { id: buffer.id };
        backend.release_buffer(buffer);

        let result = backend.stream_pixels(&texture, &stale, &layout, &[0; 4]);
        assert!(matches!(result, Err(GpuError::BufferMap(_))));
    }
}
