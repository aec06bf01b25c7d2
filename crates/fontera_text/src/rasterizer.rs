//! Glyph rasterization using swash
//!
//! Converts font glyph outlines to 8-bit coverage masks. Bold is synthesized by
//! emboldening the outline and italic by a fixed horizontal skew, so a single
//! regular face serves all four style combinations.

use crate::font::FontFace;
use crate::{Result, TextError};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use swash::scale::{Render, ScaleContext, Source, StrikeWith};
use swash::zeno::{Angle, Format, Transform};

/// Maximum number of rasterized glyphs kept in memory
const GLYPH_CACHE_CAPACITY: usize = 2048;

/// Synthetic italic slant
const ITALIC_SKEW_DEGREES: f32 = 12.0;

/// Synthetic bold outline growth, as a fraction of the font size
const BOLD_STRENGTH: f32 = 0.04;

/// Synthesized style applied at rasterization time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GlyphStyle {
    pub bold: bool,
    pub italic: bool,
}

/// Rasterized glyph coverage mask with placement
#[derive(Debug, Clone, Default)]
pub struct RasterizedGlyph {
    /// One coverage byte per pixel, row-major
    pub bitmap: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Offset from the pen position to the left edge
    pub bearing_x: i32,
    /// Offset from the baseline up to the top edge
    pub bearing_y: i32,
}

impl RasterizedGlyph {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Coverage at `(x, y)` inside the mask
    pub fn coverage(&self, x: u32, y: u32) -> u8 {
        self.bitmap
            .get((y * self.width + x) as usize)
            .copied()
            .unwrap_or(0)
    }
}

/// Cache key: (face key, glyph id, size in 1/64 px, style)
type GlyphKey = (u64, u16, u32, GlyphStyle);

/// Glyph rasterizer using swash
pub struct GlyphRasterizer {
    /// Swash scale context (caches scaling state)
    scale_context: ScaleContext,
    cache: LruCache<GlyphKey, Arc<RasterizedGlyph>>,
}

impl GlyphRasterizer {
    pub fn new() -> Self {
        Self {
            scale_context: ScaleContext::new(),
            cache: LruCache::new(NonZeroUsize::new(GLYPH_CACHE_CAPACITY).unwrap()),
        }
    }

    /// Rasterize a glyph at the given font size, reusing a cached mask when possible
    pub fn rasterize(
        &mut self,
        font: &FontFace,
        glyph_id: u16,
        font_size: f32,
        style: GlyphStyle,
    ) -> Result<Arc<RasterizedGlyph>> {
        let key = (
            font.key(),
            glyph_id,
            (font_size * 64.0).round() as u32,
            style,
        );
        if let Some(glyph) = self.cache.get(&key) {
            return Ok(Arc::clone(glyph));
        }

        let glyph = Arc::new(self.render(font, glyph_id, font_size, style)?);
        self.cache.put(key, Arc::clone(&glyph));
        Ok(glyph)
    }

    fn render(
        &mut self,
        font: &FontFace,
        glyph_id: u16,
        font_size: f32,
        style: GlyphStyle,
    ) -> Result<RasterizedGlyph> {
        let swash_font = swash::FontRef::from_index(font.data(), font.face_index() as usize)
            .ok_or(TextError::InvalidFontData)?;

        let mut scaler = self
            .scale_context
            .builder(swash_font)
            .size(font_size)
            .build();

        let mut render = Render::new(&[
            Source::ColorOutline(0),
            Source::ColorBitmap(StrikeWith::BestFit),
            Source::Outline,
        ]);
        render.format(Format::Alpha);
        if style.bold {
            render.embolden(font_size * BOLD_STRENGTH);
        }
        if style.italic {
            render.transform(Some(Transform::skew(
                Angle::from_degrees(ITALIC_SKEW_DEGREES),
                Angle::from_degrees(0.0),
            )));
        }

        let Some(image) = render.render(&mut scaler, glyph_id) else {
            // Empty glyph (like space)
            return Ok(RasterizedGlyph::default());
        };

        let width = image.placement.width;
        let height = image.placement.height;
        let pixels = (width * height) as usize;

        // Color sources come back as RGBA; keep only their alpha as coverage
        let bitmap = if image.data.len() == pixels * 4 {
            image.data.chunks_exact(4).map(|px| px[3]).collect()
        } else {
            image.data
        };

        Ok(RasterizedGlyph {
            bitmap,
            width,
            height,
            bearing_x: image.placement.left,
            bearing_y: image.placement.top,
        })
    }

    /// Number of cached glyph masks
    pub fn cached_glyphs(&self) -> usize {
        self.cache.len()
    }
}

impl Default for GlyphRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FontRegistry, GenericFont};

    #[test]
    fn test_rasterizer_creation() {
        let rasterizer = GlyphRasterizer::new();
        assert_eq!(rasterizer.cached_glyphs(), 0);
    }

    #[test]
    fn test_glyphs_are_memoized() {
        let mut registry = FontRegistry::new();
        let Ok(font) = registry.load_generic(GenericFont::SansSerif) else {
            println!("No fonts available - skipping test (CI environment)");
            return;
        };
        let Some(glyph_id) = font.glyph_id('A') else {
            return;
        };

        let mut rasterizer = GlyphRasterizer::new();
        let regular = rasterizer
            .rasterize(&font, glyph_id, 24.0, GlyphStyle::default())
            .unwrap();
        let again = rasterizer
            .rasterize(&font, glyph_id, 24.0, GlyphStyle::default())
            .unwrap();
        assert!(Arc::ptr_eq(&regular, &again));
        assert!(!regular.is_empty());

        let bold = GlyphStyle {
            bold: true,
            italic: false,
        };
        rasterizer.rasterize(&font, glyph_id, 24.0, bold).unwrap();
        assert_eq!(rasterizer.cached_glyphs(), 2);
    }
}
