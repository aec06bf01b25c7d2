//! Formatted text rasterization for Fontera
//!
//! This crate provides:
//! - Inline format-code parsing (`&a`, `&l`, `&k`, ...)
//! - Font loading (TTF/OTF via ttf-parser) and system font discovery (fontdb)
//! - Per-codepoint font fallback
//! - Line layout with color, style and animated runs
//! - Glyph rasterization (swash) and compositing into RGBA images

pub mod canvas;
pub mod compositor;
pub mod fallback;
pub mod font;
pub mod layout;
pub mod markup;
pub mod palette;
pub mod rasterizer;
pub mod registry;

pub use canvas::{create_image, normalize};
pub use compositor::{line_x, Alignment, Background, Compositor, RenderConfig, SHADOW_OFFSET_FACTOR};
pub use fallback::FallbackCache;
pub use font::{FontFace, FontMetrics};
pub use layout::{parse, parse_with_rng, FontSet, GlyphRun, LayoutBuilder, ParsedTextLayout, PlacedGlyph};
pub use markup::{
    contains_animation, parse_markup, parse_markup_with_rng, AnimatedSegment, FormatCode,
    FormatSpan, ParsedMarkup, StyleKind,
};
pub use palette::Palette;
pub use rasterizer::{GlyphRasterizer, GlyphStyle, RasterizedGlyph};
pub use registry::{FontRegistry, GenericFont};

use thiserror::Error;

/// Text rendering errors
#[derive(Error, Debug)]
pub enum TextError {
    #[error("Failed to load font: {0}")]
    FontLoadError(String),

    #[error("Failed to parse font: {0}")]
    FontParseError(String),

    #[error("Invalid font data")]
    InvalidFontData,

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

pub type Result<T> = std::result::Result<T, TextError>;
