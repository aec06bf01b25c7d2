//! Error types for the upload pipeline

use thiserror::Error;

/// GPU upload and cache errors
#[derive(Error, Debug)]
pub enum GpuError {
    #[error("No suitable GPU adapter found")]
    AdapterNotFound,

    #[error("Failed to request GPU device: {0}")]
    DeviceError(#[from] wgpu::RequestDeviceError),

    #[error("GPU device is already ready; work can no longer be deferred")]
    AlreadyReady,

    #[error("Failed to map pixel buffer: {0}")]
    BufferMap(String),

    #[error("Pixel data is {actual} bytes, expected {expected}")]
    PixelSizeMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Text(#[from] fontera_text::TextError),
}

pub type Result<T> = std::result::Result<T, GpuError>;
