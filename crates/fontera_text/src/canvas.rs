//! Offscreen image allocation and format normalization
//!
//! Every image that reaches the GPU is 8-bit RGBA, row-major, non-premultiplied,
//! with alpha last.

use crate::{Result, TextError};
use image::{DynamicImage, RgbaImage};
use std::borrow::Cow;

/// Allocate a transparent RGBA image
pub fn create_image(width: u32, height: u32) -> Result<RgbaImage> {
    if width == 0 || height == 0 {
        return Err(TextError::InvalidDimensions { width, height });
    }
    Ok(RgbaImage::new(width, height))
}

/// View an image as tightly packed RGBA8, converting only when needed
pub fn normalize(image: &DynamicImage) -> Cow<'_, RgbaImage> {
    match image {
        DynamicImage::ImageRgba8(rgba) => Cow::Borrowed(rgba),
        other => {
            tracing::debug!("Converting {:?} image to RGBA8", other.color());
            Cow::Owned(other.to_rgba8())
        }
    }
}
