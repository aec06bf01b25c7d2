//! Fontera GPU upload
//!
//! Streams composited text images into textures and caches them per request.
//!
//! - [`upload`]: the backend trait and the per-texture streaming upload
//! - [`lifecycle`]: device readiness and the deferred work queue
//! - [`cache`]: request-keyed texture cache with batch eviction
//! - [`wgpu_backend`]: the wgpu implementation
//! - [`memory`]: an in-memory implementation for headless use

pub mod cache;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod upload;
pub mod wgpu_backend;

pub use cache::{
    next_texture_id, texture_dimension, texture_size, BuiltTexture, CachedTexture, EvictionPolicy,
    TextureCache, TextureCacheKey, TextureCacheStats,
};
pub use error::{GpuError, Result};
pub use lifecycle::{GpuContext, UploadStatus};
pub use memory::{BackendOp, MemoryBackend, MemoryTexture};
pub use upload::{PixelLayout, TextureUpload, UploadBackend};
pub use wgpu_backend::{WgpuBackend, WgpuTexture};
