//! Render compositor
//!
//! Rasterizes measured lines into an RGBA image: optional background, optional
//! drop shadow, then the main glyph run. Output depends only on the
//! [`RenderConfig`]; the glyph cache inside [`Compositor`] affects speed, not
//! pixels.

use crate::layout::{FontSet, GlyphRun, ParsedTextLayout};
use crate::palette::{BACKGROUND_COLOR, SHADOW_COLOR, TEXT_COLOR};
use crate::rasterizer::GlyphRasterizer;
use image::{Rgba, RgbaImage};

/// Shadow offset as a fraction of the font size, applied on both axes
pub const SHADOW_OFFSET_FACTOR: f32 = 0.1;

/// Horizontal alignment of lines within the block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Alignment {
    #[default]
    Left,
    Right,
    Center,
}

/// Translucent backdrop behind the text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Background {
    #[default]
    None,
    /// One rectangle behind the whole block
    Full,
    /// One rectangle per line, sized to its visible width
    PerLine,
}

/// Everything the compositor reads
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub alignment: Alignment,
    pub shadow: bool,
    pub background: Background,
    pub font_size: f32,
    /// Ascent of the primary font; distance from a line's top to its baseline
    pub baseline: f32,
    pub layouts: Vec<ParsedTextLayout>,
    pub max_visible_width: f32,
}

impl RenderConfig {
    pub fn new(
        alignment: Alignment,
        shadow: bool,
        background: Background,
        fonts: &FontSet,
        layouts: Vec<ParsedTextLayout>,
    ) -> Self {
        let max_visible_width = layouts
            .iter()
            .map(|layout| layout.visible_width)
            .fold(0.0, f32::max);

        Self {
            alignment,
            shadow,
            background,
            font_size: fonts.size,
            baseline: fonts.primary.metrics().ascender_px(fonts.size).ceil(),
            layouts,
            max_visible_width,
        }
    }

    /// Widest total advance across lines
    pub fn max_text_width(&self) -> f32 {
        self.layouts
            .iter()
            .map(|layout| layout.total_width)
            .fold(0.0, f32::max)
    }

    pub fn shadow_offset(&self) -> f32 {
        self.font_size * SHADOW_OFFSET_FACTOR
    }
}

/// X origin of a line of `line_width` within a block of `max_width`
pub fn line_x(alignment: Alignment, max_width: f32, line_width: f32) -> f32 {
    match alignment {
        Alignment::Left => 0.0,
        Alignment::Right => max_width - line_width,
        Alignment::Center => (max_width - line_width) * 0.5,
    }
}

/// Draws render configurations into images
#[derive(Default)]
pub struct Compositor {
    rasterizer: GlyphRasterizer,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw `config` into `image` and return it for chaining
    pub fn composite<'i>(
        &mut self,
        image: &'i mut RgbaImage,
        config: &RenderConfig,
    ) -> &'i mut RgbaImage {
        if config.background == Background::Full {
            fill_rect(
                image,
                0,
                0,
                (config.max_visible_width + 0.5) as i64,
                (config.layouts.len() as f32 * config.font_size + 0.5) as i64,
                BACKGROUND_COLOR,
            );
        }

        for (index, layout) in config.layouts.iter().enumerate() {
            let y = index as f32 * config.font_size + config.baseline;
            let x = line_x(
                config.alignment,
                config.max_visible_width,
                layout.visible_width,
            );

            if config.background == Background::PerLine {
                fill_rect(
                    image,
                    x as i64,
                    (y - config.baseline) as i64,
                    layout.visible_width.ceil() as i64,
                    config.font_size.ceil() as i64,
                    BACKGROUND_COLOR,
                );
            }

            if config.shadow {
                if let Some(shadow) = &layout.shadow {
                    let offset = config.shadow_offset();
                    self.draw_run(image, shadow, x + offset, y + offset, SHADOW_COLOR);
                }
            }

            self.draw_run(image, &layout.main, x, y, TEXT_COLOR);
        }

        image
    }

    fn draw_run(
        &mut self,
        image: &mut RgbaImage,
        run: &GlyphRun,
        x: f32,
        baseline: f32,
        default_color: Rgba<u8>,
    ) {
        for glyph in &run.glyphs {
            let color = glyph.color.unwrap_or(default_color);
            let pen_x = x + glyph.x;

            match self
                .rasterizer
                .rasterize(&glyph.font, glyph.glyph_id, glyph.size, glyph.style)
            {
                Ok(mask) => {
                    let left = pen_x.round() as i64 + mask.bearing_x as i64;
                    let top = baseline.round() as i64 - mask.bearing_y as i64;
                    for row in 0..mask.height {
                        for col in 0..mask.width {
                            let coverage = mask.coverage(col, row);
                            if coverage > 0 {
                                blend_at(image, left + col as i64, top + row as i64, color, coverage);
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to rasterize glyph {}: {}", glyph.glyph_id, e);
                }
            }

            let metrics = glyph.font.metrics();
            if glyph.underline {
                let (offset, thickness) = metrics.underline_px(glyph.size).unwrap_or((
                    metrics.descender_px(glyph.size) * 0.5,
                    1.0,
                ));
                draw_bar(image, pen_x, baseline + offset, glyph.advance, thickness, color);
            }
            if glyph.strikethrough {
                let (offset, thickness) = metrics.strikeout_px(glyph.size).unwrap_or((
                    -metrics.ascender_px(glyph.size) / 3.0,
                    1.0,
                ));
                draw_bar(image, pen_x, baseline + offset, glyph.advance, thickness, color);
            }
        }
    }
}

fn draw_bar(image: &mut RgbaImage, x: f32, y: f32, width: f32, thickness: f32, color: Rgba<u8>) {
    let height = thickness.round().max(1.0);
    fill_rect(
        image,
        x.round() as i64,
        y.round() as i64,
        width.round() as i64,
        height as i64,
        color,
    );
}

/// Blend a rectangle into the image, clipped to its bounds
fn fill_rect(image: &mut RgbaImage, x: i64, y: i64, width: i64, height: i64, color: Rgba<u8>) {
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + width).min(image.width() as i64);
    let y1 = (y + height).min(image.height() as i64);

    for py in y0..y1 {
        for px in x0..x1 {
            blend_at(image, px, py, color, u8::MAX);
        }
    }
}

fn blend_at(image: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>, coverage: u8) {
    if x < 0 || y < 0 || x >= image.width() as i64 || y >= image.height() as i64 {
        return;
    }
    let dst = image.get_pixel_mut(x as u32, y as u32);
    *dst = blend(*dst, color, coverage);
}

/// Non-premultiplied source-over
fn blend(dst: Rgba<u8>, src: Rgba<u8>, coverage: u8) -> Rgba<u8> {
    let sa = src[3] as f32 / 255.0 * coverage as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |i: usize| {
        let c = (src[i] as f32 * sa + dst[i] as f32 * da * (1.0 - sa)) / out_a;
        c.round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(0),
        channel(1),
        channel(2),
        (out_a * 255.0).round() as u8,
    ])
}
