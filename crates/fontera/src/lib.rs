//! Fontera
//!
//! Renders `&`/`§` formatted, optionally animated text into cached GPU
//! textures for overlay drawing.
//!
//! # Example
//!
//! ```ignore
//! use fontera::prelude::*;
//!
//! let mut fontera: Fontera<WgpuBackend> = Fontera::new(FonteraConfig::default());
//! fontera.client_started(WgpuBackend::new(device, queue))?;
//!
//! let options = RenderOptions::default().with_align(Alignment::Center);
//! if let Some(quad) = fontera.text_renderer().render(&mut host, "&aReady&r!", 100.0, 20.0, &options)? {
//!     // draw quad.texture_id at (quad.x, quad.y) sized quad.width x quad.height
//! }
//! ```

pub mod config;
pub mod host;
pub mod logging;
pub mod pool;
pub mod renderer;
pub mod runtime;

pub use config::{CacheConfig, ConfigError, FonteraConfig, RenderOptions};
pub use host::{RenderHost, StaticHost};
pub use logging::init_logging;
pub use pool::{renderer_key, IdleTracker, RendererPool};
pub use renderer::{TextQuad, TextRenderer};
pub use runtime::Fontera;

pub use fontera_gpu;
pub use fontera_text;

use std::path::PathBuf;
use thiserror::Error;

/// Fontera errors
#[derive(Error, Debug)]
pub enum FonteraError {
    #[error(transparent)]
    Text(#[from] fontera_text::TextError),

    #[error(transparent)]
    Gpu(#[from] fontera_gpu::GpuError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("No usable font for {0:?} and no system font installed")]
    NoFont(PathBuf),
}

pub type Result<T> = std::result::Result<T, FonteraError>;

pub mod prelude {
    pub use crate::config::{FonteraConfig, RenderOptions};
    pub use crate::host::RenderHost;
    pub use crate::renderer::{TextQuad, TextRenderer};
    pub use crate::runtime::Fontera;
    pub use crate::{FonteraError, Result};
    pub use fontera_gpu::{GpuContext, MemoryBackend, UploadBackend, WgpuBackend};
    pub use fontera_text::{Alignment, Background};
}
