//! Font faces backed by ttf-parser

use crate::{Result, TextError};
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;
use ttf_parser::{name_id, Face, GlyphId};

/// Vertical metrics in font units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontMetrics {
    pub units_per_em: u16,
    pub ascender: i16,
    /// Negative for fonts that descend below the baseline
    pub descender: i16,
    pub line_gap: i16,
    /// Underline `(position, thickness)`, position relative to the baseline (up is positive)
    pub underline: Option<(i16, i16)>,
    /// Strikeout `(position, thickness)`, position relative to the baseline (up is positive)
    pub strikeout: Option<(i16, i16)>,
}

impl FontMetrics {
    fn scale(&self, font_size: f32) -> f32 {
        font_size / self.units_per_em.max(1) as f32
    }

    /// Distance from baseline to the top of the tallest glyphs
    pub fn ascender_px(&self, font_size: f32) -> f32 {
        self.ascender as f32 * self.scale(font_size)
    }

    /// Distance from baseline to the bottom of the lowest glyphs, as a positive number
    pub fn descender_px(&self, font_size: f32) -> f32 {
        -(self.descender as f32) * self.scale(font_size)
    }

    pub fn line_height_px(&self, font_size: f32) -> f32 {
        (self.ascender as f32 - self.descender as f32 + self.line_gap as f32)
            * self.scale(font_size)
    }

    /// Underline offset below the baseline and thickness, in pixels
    pub fn underline_px(&self, font_size: f32) -> Option<(f32, f32)> {
        self.underline
            .map(|(pos, thick)| self.to_px_line(pos, thick, font_size))
    }

    /// Strikeout offset below the baseline (negative is above) and thickness, in pixels
    pub fn strikeout_px(&self, font_size: f32) -> Option<(f32, f32)> {
        self.strikeout
            .map(|(pos, thick)| self.to_px_line(pos, thick, font_size))
    }

    fn to_px_line(&self, position: i16, thickness: i16, font_size: f32) -> (f32, f32) {
        let scale = self.scale(font_size);
        (-(position as f32) * scale, thickness as f32 * scale)
    }
}

/// A parsed font face with its raw data
///
/// The underlying data is shared, so cloning is cheap. Glyph queries re-parse
/// the face tables on demand; ttf-parser parsing is lazy and allocation free.
#[derive(Clone)]
pub struct FontFace {
    data: Arc<Vec<u8>>,
    face_index: u32,
    family_name: String,
    metrics: FontMetrics,
    glyph_count: u16,
    key: u64,
}

impl FontFace {
    /// Parse the first face in `data`
    pub fn from_data(data: Vec<u8>) -> Result<Self> {
        Self::from_data_with_index(data, 0)
    }

    /// Parse the face at `face_index` of a font collection
    pub fn from_data_with_index(data: Vec<u8>, face_index: u32) -> Result<Self> {
        let face = Face::parse(&data, face_index)
            .map_err(|e| TextError::FontParseError(e.to_string()))?;

        let family_name = face
            .names()
            .into_iter()
            .filter(|name| name.name_id == name_id::FAMILY)
            .find_map(|name| name.to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        let metrics = FontMetrics {
            units_per_em: face.units_per_em(),
            ascender: face.ascender(),
            descender: face.descender(),
            line_gap: face.line_gap(),
            underline: face
                .underline_metrics()
                .map(|m| (m.position, m.thickness)),
            strikeout: face
                .strikeout_metrics()
                .map(|m| (m.position, m.thickness)),
        };
        let glyph_count = face.number_of_glyphs();

        // Glyph caches key on the face contents
        let mut hasher = FxHasher::default();
        data.hash(&mut hasher);
        face_index.hash(&mut hasher);
        let key = hasher.finish();

        Ok(Self {
            data: Arc::new(data),
            face_index,
            family_name,
            metrics,
            glyph_count,
            key,
        })
    }

    /// Load and parse a font file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            TextError::FontLoadError(format!("Failed to read font file {:?}: {}", path, e))
        })?;
        Self::from_data(data)
    }

    fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, self.face_index).ok()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn face_index(&self) -> u32 {
        self.face_index
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    pub fn metrics(&self) -> &FontMetrics {
        &self.metrics
    }

    pub fn glyph_count(&self) -> u16 {
        self.glyph_count
    }

    /// Stable identity used for glyph cache keys
    pub fn key(&self) -> u64 {
        self.key
    }

    /// Glyph id for a character, `None` if the face has no mapping
    pub fn glyph_id(&self, c: char) -> Option<u16> {
        self.face()?
            .glyph_index(c)
            .map(|id| id.0)
            .filter(|&id| id != 0)
    }

    /// Whether this face can display `c`
    pub fn has_glyph(&self, c: char) -> bool {
        self.glyph_id(c).is_some()
    }

    /// Horizontal advance of a glyph in pixels
    pub fn advance_px(&self, glyph_id: u16, font_size: f32) -> f32 {
        let advance = self
            .face()
            .and_then(|face| face.glyph_hor_advance(GlyphId(glyph_id)))
            .unwrap_or(0);
        advance as f32 * font_size / self.metrics.units_per_em.max(1) as f32
    }
}

impl PartialEq for FontFace {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.face_index == other.face_index
    }
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFace")
            .field("family_name", &self.family_name)
            .field("face_index", &self.face_index)
            .field("glyph_count", &self.glyph_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> FontMetrics {
        FontMetrics {
            units_per_em: 1000,
            ascender: 800,
            descender: -200,
            line_gap: 100,
            underline: Some((-100, 50)),
            strikeout: None,
        }
    }

    #[test]
    fn test_metrics_scale_to_pixels() {
        let m = metrics();
        assert_eq!(m.ascender_px(10.0), 8.0);
        assert_eq!(m.descender_px(10.0), 2.0);
        assert_eq!(m.line_height_px(10.0), 11.0);
    }

    #[test]
    fn test_underline_is_below_baseline() {
        let (offset, thickness) = metrics().underline_px(10.0).unwrap();
        assert_eq!(offset, 1.0);
        assert_eq!(thickness, 0.5);
        assert!(metrics().strikeout_px(10.0).is_none());
    }

    #[test]
    fn test_invalid_font_data() {
        let result = FontFace::from_data(vec![0u8; 16]);
        assert!(matches!(result, Err(TextError::FontParseError(_))));
    }

    #[test]
    fn test_key_follows_font_bytes() {
        let mut registry = crate::registry::FontRegistry::new();
        let Some(face) = registry.first_available() else {
            println!("No fonts available - skipping test (CI environment)");
            return;
        };
        let index = face.face_index();
        let with_tail = |tail: u8| {
            let mut data = face.data().to_vec();
            data.push(tail);
            FontFace::from_data_with_index(data, index).unwrap()
        };

        let a = with_tail(0);
        let b = with_tail(1);
        assert_eq!(a.family_name(), b.family_name());
        assert_eq!(a.glyph_count(), b.glyph_count());
        assert_ne!(a.key(), b.key());
        assert_eq!(a.key(), with_tail(0).key());
    }

    #[test]
    fn test_missing_font_file() {
        let result = FontFace::from_file("/nonexistent/fontera/missing.ttf");
        assert!(matches!(result, Err(TextError::FontLoadError(_))));
    }
}
