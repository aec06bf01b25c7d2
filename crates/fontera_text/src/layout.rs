//! Glyph layout builder
//!
//! Assigns a font to every character of a parsed line, overlays color and style
//! attributes from the markup spans, and measures the result.
//!
//! Font assignment runs before styling:
//! 1. Outside animated segments each character uses the primary font if it has
//!    a glyph, else the designated fallback font, else the first installed font
//!    that covers it (cached per codepoint), else the fallback font anyway.
//! 2. Animated segments are forced onto the monospace font.

use crate::font::FontFace;
use crate::markup::{parse_markup, parse_markup_with_rng, AnimatedSegment, ParsedMarkup, StyleKind};
use crate::palette::Palette;
use crate::rasterizer::GlyphStyle;
use crate::registry::{FontRegistry, GenericFont};
use image::Rgba;
use rand::Rng;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// The three fonts a line is laid out with
#[derive(Debug, Clone)]
pub struct FontSet {
    pub primary: Arc<FontFace>,
    pub monospace: Arc<FontFace>,
    pub fallback: Arc<FontFace>,
    /// Render size of the primary font in pixels
    pub size: f32,
}

impl FontSet {
    pub fn new(
        primary: Arc<FontFace>,
        monospace: Arc<FontFace>,
        fallback: Arc<FontFace>,
        size: f32,
    ) -> Self {
        Self {
            primary,
            monospace,
            fallback,
            size,
        }
    }

    /// Resolve monospace and fallback faces from the registry
    ///
    /// Missing generic families degrade to the primary face.
    pub fn resolve(registry: &mut FontRegistry, primary: Arc<FontFace>, size: f32) -> Self {
        let monospace = registry
            .load_generic(GenericFont::Monospace)
            .unwrap_or_else(|e| {
                tracing::warn!("{}; using primary font for animated text", e);
                Arc::clone(&primary)
            });
        let fallback = registry
            .load_generic(GenericFont::SansSerif)
            .unwrap_or_else(|_| Arc::clone(&primary));

        Self::new(primary, monospace, fallback, size)
    }

    /// Size used for the monospace and fallback fonts (rounded to whole pixels)
    pub fn fallback_size(&self) -> f32 {
        (self.size + 0.5).floor()
    }
}

/// One glyph positioned on the line
#[derive(Debug, Clone)]
pub struct PlacedGlyph {
    pub font: Arc<FontFace>,
    pub glyph_id: u16,
    /// Pen position relative to the line origin
    pub x: f32,
    pub advance: f32,
    pub size: f32,
    /// Explicit color from a color span; `None` draws in the run's default color
    pub color: Option<Rgba<u8>>,
    pub style: GlyphStyle,
    pub underline: bool,
    pub strikethrough: bool,
}

/// A drawable sequence of glyphs
#[derive(Debug, Clone, Default)]
pub struct GlyphRun {
    pub glyphs: Vec<PlacedGlyph>,
}

impl GlyphRun {
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }
}

/// A parsed and measured line
///
/// Equality and hashing consider the metrics and animated segments only; the
/// drawable runs are not compared.
#[derive(Debug, Clone)]
pub struct ParsedTextLayout {
    pub animations: Vec<AnimatedSegment>,
    /// Advance including trailing whitespace
    pub total_width: f32,
    /// Advance excluding trailing whitespace
    pub visible_width: f32,
    pub ascent: f32,
    pub descent: f32,
    pub main: GlyphRun,
    pub shadow: Option<GlyphRun>,
}

impl ParsedTextLayout {
    pub fn has_animation(&self) -> bool {
        !self.animations.is_empty()
    }
}

impl PartialEq for ParsedTextLayout {
    fn eq(&self, other: &Self) -> bool {
        self.animations == other.animations
            && self.total_width.to_bits() == other.total_width.to_bits()
            && self.visible_width.to_bits() == other.visible_width.to_bits()
            && self.ascent.to_bits() == other.ascent.to_bits()
            && self.descent.to_bits() == other.descent.to_bits()
    }
}

impl Eq for ParsedTextLayout {}

impl Hash for ParsedTextLayout {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.animations.hash(state);
        self.total_width.to_bits().hash(state);
        self.visible_width.to_bits().hash(state);
        self.ascent.to_bits().hash(state);
        self.descent.to_bits().hash(state);
    }
}

#[derive(Default, Clone, Copy)]
struct CharAttrs {
    main_color: Option<Rgba<u8>>,
    shadow_color: Option<Rgba<u8>>,
    style: GlyphStyle,
    underline: bool,
    strikethrough: bool,
}

/// Builds measured line layouts against a font set
pub struct LayoutBuilder<'a> {
    fonts: &'a FontSet,
    registry: &'a mut FontRegistry,
}

impl<'a> LayoutBuilder<'a> {
    pub fn new(fonts: &'a FontSet, registry: &'a mut FontRegistry) -> Self {
        Self { fonts, registry }
    }

    /// Lay out a parsed line; the shadow run is built only when requested
    pub fn build(&mut self, markup: &ParsedMarkup, want_shadow: bool) -> ParsedTextLayout {
        let chars: Vec<char> = markup.text.chars().collect();
        let fonts = self.assign_fonts(&chars, &markup.animations);
        let attrs = apply_spans(chars.len(), markup);

        let mut main = GlyphRun {
            glyphs: Vec::with_capacity(chars.len()),
        };
        let mut pen = 0.0f32;
        let mut visible_width = 0.0f32;
        let mut ascent = 0.0f32;
        let mut descent = 0.0f32;

        for ((&c, (font, size)), attr) in chars.iter().zip(&fonts).zip(&attrs) {
            let glyph_id = font.glyph_id(c).unwrap_or(0);
            let advance = font.advance_px(glyph_id, *size);
            ascent = ascent.max(font.metrics().ascender_px(*size));
            descent = descent.max(font.metrics().descender_px(*size));

            main.glyphs.push(PlacedGlyph {
                font: Arc::clone(font),
                glyph_id,
                x: pen,
                advance,
                size: *size,
                color: attr.main_color,
                style: attr.style,
                underline: attr.underline,
                strikethrough: attr.strikethrough,
            });

            pen += advance;
            if !c.is_whitespace() {
                visible_width = pen;
            }
        }

        if chars.is_empty() {
            let metrics = self.fonts.primary.metrics();
            ascent = metrics.ascender_px(self.fonts.size);
            descent = metrics.descender_px(self.fonts.size);
        }

        let shadow = want_shadow.then(|| GlyphRun {
            glyphs: main
                .glyphs
                .iter()
                .zip(&attrs)
                .map(|(glyph, attr)| PlacedGlyph {
                    color: attr.shadow_color,
                    ..glyph.clone()
                })
                .collect(),
        });

        ParsedTextLayout {
            animations: markup.animations.clone(),
            total_width: pen,
            visible_width,
            ascent,
            descent,
            main,
            shadow,
        }
    }

    fn assign_fonts(
        &mut self,
        chars: &[char],
        animations: &[AnimatedSegment],
    ) -> Vec<(Arc<FontFace>, f32)> {
        let primary_size = self.fonts.size;
        let fallback_size = self.fonts.fallback_size();

        chars
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                if animations.iter().any(|seg| seg.contains(i)) {
                    (Arc::clone(&self.fonts.monospace), fallback_size)
                } else if self.fonts.primary.has_glyph(c) {
                    (Arc::clone(&self.fonts.primary), primary_size)
                } else {
                    (self.fallback_for(c), fallback_size)
                }
            })
            .collect()
    }

    fn fallback_for(&mut self, c: char) -> Arc<FontFace> {
        if self.fonts.fallback.has_glyph(c) {
            return Arc::clone(&self.fonts.fallback);
        }
        self.registry
            .fallback_for_char(c)
            .unwrap_or_else(|| Arc::clone(&self.fonts.fallback))
    }
}

fn apply_spans(len: usize, markup: &ParsedMarkup) -> Vec<CharAttrs> {
    let mut attrs = vec![CharAttrs::default(); len];

    for span in &markup.spans {
        let range = span.start.min(len)..span.end.min(len);
        if span.is_color() {
            let main = Palette::Primary.color(span.code);
            let shadow = Palette::Shadow.color(span.code);
            for attr in &mut attrs[range] {
                attr.main_color = main;
                attr.shadow_color = shadow;
            }
            continue;
        }

        let Some(kind) = span.style() else {
            continue;
        };
        for attr in &mut attrs[range] {
            match kind {
                StyleKind::Bold => attr.style.bold = true,
                StyleKind::Italic => attr.style.italic = true,
                StyleKind::Strikethrough => attr.strikethrough = true,
                StyleKind::Underline => attr.underline = true,
            }
        }
    }

    attrs
}

/// Parse a marked-up line and lay it out
pub fn parse(
    text: &str,
    want_shadow: bool,
    fonts: &FontSet,
    registry: &mut FontRegistry,
) -> ParsedTextLayout {
    LayoutBuilder::new(fonts, registry).build(&parse_markup(text), want_shadow)
}

/// Like [`parse`], drawing animated substitutes from `rng`
pub fn parse_with_rng<R: Rng + ?Sized>(
    text: &str,
    want_shadow: bool,
    fonts: &FontSet,
    registry: &mut FontRegistry,
    rng: &mut R,
) -> ParsedTextLayout {
    LayoutBuilder::new(fonts, registry).build(&parse_markup_with_rng(text, rng), want_shadow)
}
