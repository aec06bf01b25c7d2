//! Text renderer
//!
//! Turns marked-up lines into a cached texture and reports where to draw it.
//! Each renderer owns one primary font and a texture cache; fonts are
//! re-derived whenever the effective render size changes.

use crate::config::RenderOptions;
use crate::host::RenderHost;
use crate::{FonteraError, Result};
use fontera_gpu::{
    texture_size, BuiltTexture, EvictionPolicy, GpuContext, TextureCache, TextureCacheKey,
    UploadBackend,
};
use fontera_text::{
    contains_animation, create_image, parse, Alignment, Background, Compositor, FontFace,
    FontRegistry, FontSet, RenderConfig,
};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Where and how large to draw a cached texture, in host units
#[derive(Debug, Clone, PartialEq)]
pub struct TextQuad {
    pub texture_id: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// `[u0, v0, u1, v1]`
    pub uv: [f32; 4],
    /// Widest line advance in pixels
    pub max_text_width: f32,
}

/// Renders formatted text blocks for one font and base size
pub struct TextRenderer<B: UploadBackend + 'static> {
    font_path: PathBuf,
    base_size: f32,
    registry: Rc<RefCell<FontRegistry>>,
    primary: Arc<FontFace>,
    fonts: Option<FontSet>,
    compositor: Compositor,
    cache: TextureCache<B>,
    created: Instant,
}

impl<B: UploadBackend + 'static> TextRenderer<B> {
    /// Create a renderer for the font at `font_path`
    ///
    /// A font file that cannot be loaded falls back to the first available
    /// system font.
    pub fn new(
        font_path: impl Into<PathBuf>,
        base_size: f32,
        registry: Rc<RefCell<FontRegistry>>,
        context: GpuContext<B>,
    ) -> Result<Self> {
        Self::with_policy(
            font_path,
            base_size,
            registry,
            context,
            EvictionPolicy::default(),
        )
    }

    pub fn with_policy(
        font_path: impl Into<PathBuf>,
        base_size: f32,
        registry: Rc<RefCell<FontRegistry>>,
        context: GpuContext<B>,
        policy: EvictionPolicy,
    ) -> Result<Self> {
        let font_path = font_path.into();
        let primary = registry
            .borrow_mut()
            .load_font_file_or_default(&font_path)
            .ok_or_else(|| FonteraError::NoFont(font_path.clone()))?;

        tracing::debug!(
            "Text renderer for {:?} at base size {} uses '{}'",
            font_path,
            base_size,
            primary.family_name()
        );

        Ok(Self {
            font_path,
            base_size,
            registry,
            primary,
            fonts: None,
            compositor: Compositor::new(),
            cache: TextureCache::with_policy(context, policy),
            created: Instant::now(),
        })
    }

    /// Render one marked-up line at `(x, y)`
    pub fn render<H: RenderHost<B>>(
        &mut self,
        host: &mut H,
        text: &str,
        x: f32,
        y: f32,
        options: &RenderOptions,
    ) -> Result<Option<TextQuad>> {
        self.render_lines_at(host, &[text], x, y, options, Instant::now())
    }

    /// Render a block of marked-up lines at `(x, y)`
    pub fn render_lines<H: RenderHost<B>, S: AsRef<str>>(
        &mut self,
        host: &mut H,
        lines: &[S],
        x: f32,
        y: f32,
        options: &RenderOptions,
    ) -> Result<Option<TextQuad>> {
        self.render_lines_at(host, lines, x, y, options, Instant::now())
    }

    /// [`render_lines`](Self::render_lines) with an explicit clock
    ///
    /// Returns `None` when nothing should be drawn this frame: the host hides
    /// the GUI or the texture is still waiting for the device.
    pub fn render_lines_at<H: RenderHost<B>, S: AsRef<str>>(
        &mut self,
        host: &mut H,
        lines: &[S],
        x: f32,
        y: f32,
        options: &RenderOptions,
        now: Instant,
    ) -> Result<Option<TextQuad>> {
        let gui_scale = host.gui_scale();
        let size = self.base_size * gui_scale * options.scale;
        self.update_fonts(size);

        let lines: Vec<String> = lines.iter().map(|line| line.as_ref().to_string()).collect();
        let elapsed = now.saturating_duration_since(self.created);
        let frame = animation_frame(&lines, options.animation_interval, elapsed);
        let key = TextureCacheKey::new(lines, options.shadow, options.background, options.align)
            .with_size(size)
            .with_frame(frame);

        let Self {
            registry,
            fonts,
            compositor,
            cache,
            ..
        } = self;
        let Some(fonts) = fonts.as_ref() else {
            return Ok(None);
        };

        let entry = cache.get_or_create_at(key.clone(), now, || {
            build_texture(
                compositor,
                &mut registry.borrow_mut(),
                fonts,
                &key.lines,
                key.shadow,
                key.background,
                key.align,
            )
        })?;

        let uploaded = entry.is_uploaded();
        if uploaded && !entry.is_registered() {
            {
                let upload = entry.upload().borrow();
                if let Some(texture) = upload.texture() {
                    host.register_texture(entry.texture_id(), texture);
                }
            }
            entry.mark_registered();
        }

        let texture_id = entry.texture_id().to_string();
        let max_text_width = entry.max_text_width();
        let (texture_width, texture_height) = entry.dimensions();

        cache.maybe_evict_at(now);

        if host.hide_gui() || !uploaded {
            return Ok(None);
        }

        let inv_scale = 1.0 / gui_scale;
        let x = match options.align {
            Alignment::Left => x,
            Alignment::Right => x - max_text_width * inv_scale,
            Alignment::Center => x - max_text_width * inv_scale * 0.5,
        };

        Ok(Some(TextQuad {
            texture_id,
            x,
            y,
            width: texture_width as f32 * inv_scale,
            height: texture_height as f32 * inv_scale,
            uv: [0.0, 0.0, 1.0, 1.0],
            max_text_width,
        }))
    }

    /// Re-derive the font set when the render size changes
    ///
    /// Cached textures stay put; their keys carry the size they were built at.
    fn update_fonts(&mut self, size: f32) {
        if self.fonts.as_ref().is_some_and(|fonts| fonts.size == size) {
            return;
        }
        tracing::debug!("Render size changed to {}", size);

        let fonts = FontSet::resolve(
            &mut self.registry.borrow_mut(),
            Arc::clone(&self.primary),
            size,
        );
        self.fonts = Some(fonts);
    }

    /// Current render size, once a render has happened
    pub fn render_size(&self) -> Option<f32> {
        self.fonts.as_ref().map(|fonts| fonts.size)
    }

    pub fn font_path(&self) -> &Path {
        &self.font_path
    }

    pub fn base_size(&self) -> f32 {
        self.base_size
    }

    pub fn primary_font(&self) -> &Arc<FontFace> {
        &self.primary
    }

    pub fn cache(&self) -> &TextureCache<B> {
        &self.cache
    }

    /// Release every cached texture
    pub fn dispose(&mut self) {
        tracing::debug!("Disposing text renderer for {:?}", self.font_path);
        self.cache.dispose_all();
    }
}

/// Animation bucket for a request, if animated text opts into re-rolling
fn animation_frame(lines: &[String], interval: Option<Duration>, elapsed: Duration) -> Option<u64> {
    let interval = interval?;
    if !lines.iter().any(|line| contains_animation(line)) {
        return None;
    }
    let bucket = elapsed.as_nanos() / interval.as_nanos().max(1);
    Some(bucket as u64)
}

/// Lay out and composite `lines` into a power-of-two sized image
fn build_texture(
    compositor: &mut Compositor,
    registry: &mut FontRegistry,
    fonts: &FontSet,
    lines: &[String],
    shadow: bool,
    background: Background,
    align: Alignment,
) -> fontera_gpu::Result<BuiltTexture> {
    let layouts = lines
        .iter()
        .map(|line| parse(line, shadow, fonts, registry))
        .collect();
    let config = RenderConfig::new(align, shadow, background, fonts, layouts);

    let (width, height) = raster_size(&config, fonts.size, lines.len());
    let (texture_width, texture_height) = texture_size(width, height);
    let mut image = create_image(texture_width, texture_height)?;
    compositor.composite(&mut image, &config);

    Ok(BuiltTexture {
        image,
        max_text_width: config.max_text_width(),
    })
}

/// Pixel area the composited block needs, including the shadow offset and a spare line
fn raster_size(config: &RenderConfig, size: f32, line_count: usize) -> (u32, u32) {
    let shadow_offset = if config.shadow {
        config.shadow_offset()
    } else {
        0.0
    };
    let width = (config.max_text_width() + shadow_offset).ceil();
    let height = (size * (line_count as f32 + 1.0) + shadow_offset).ceil();
    (width as u32, height as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_text_has_no_frame() {
        let lines = vec!["plain".to_string()];
        let frame = animation_frame(&lines, Some(Duration::from_millis(100)), Duration::from_secs(3));
        assert_eq!(frame, None);
    }

    #[test]
    fn test_animated_text_buckets_by_interval() {
        let lines = vec!["&kscramble".to_string()];
        let interval = Some(Duration::from_millis(250));
        assert_eq!(animation_frame(&lines, interval, Duration::ZERO), Some(0));
        assert_eq!(animation_frame(&lines, interval, Duration::from_millis(249)), Some(0));
        assert_eq!(animation_frame(&lines, interval, Duration::from_millis(250)), Some(1));
        assert_eq!(animation_frame(&lines, interval, Duration::from_secs(1)), Some(4));
    }

    #[test]
    fn test_animation_without_interval_is_baked() {
        let lines = vec!["&kscramble".to_string()];
        assert_eq!(animation_frame(&lines, None, Duration::from_secs(9)), None);
    }

    #[test]
    fn test_zero_interval_does_not_divide_by_zero() {
        let lines = vec!["§kx".to_string()];
        assert!(animation_frame(&lines, Some(Duration::ZERO), Duration::from_secs(1)).is_some());
    }
}
