//! Renderers shared by font and base size
//!
//! One [`TextRenderer`] exists per `(font path, base size)` pair. A renderer
//! that goes unused for the idle timeout is disposed, checked at most once per
//! check interval.

use crate::config::{CacheConfig, RenderOptions};
use crate::host::RenderHost;
use crate::renderer::{TextQuad, TextRenderer};
use crate::Result;
use fontera_gpu::{EvictionPolicy, GpuContext, UploadBackend};
use fontera_text::FontRegistry;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Pool key for a render request: `"<font path or default>_<base size>"`
pub fn renderer_key(options: &RenderOptions) -> String {
    let path = options
        .font_path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "default".to_string());
    format!("{}_{}", path, options.base_size)
}

/// Last-use timestamps with a throttled idle sweep
#[derive(Debug, Clone)]
pub struct IdleTracker {
    usage: FxHashMap<String, Instant>,
    idle_timeout: Duration,
    check_interval: Duration,
    last_check: Option<Instant>,
}

impl IdleTracker {
    pub fn new(idle_timeout: Duration, check_interval: Duration) -> Self {
        Self {
            usage: FxHashMap::default(),
            idle_timeout,
            check_interval,
            last_check: None,
        }
    }

    pub fn touch(&mut self, key: &str, now: Instant) {
        self.usage.insert(key.to_string(), now);
    }

    pub fn forget(&mut self, key: &str) {
        self.usage.remove(key);
    }

    /// Keys idle longer than the timeout, or empty if the last sweep was too recent
    pub fn sweep(&mut self, now: Instant) -> Vec<String> {
        if let Some(last) = self.last_check {
            if now.saturating_duration_since(last) < self.check_interval {
                return Vec::new();
            }
        }
        self.last_check = Some(now);

        let expired: Vec<String> = self
            .usage
            .iter()
            .filter(|(_, used)| now.saturating_duration_since(**used) > self.idle_timeout)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.usage.remove(key);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.usage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.usage.is_empty()
    }
}

impl Default for IdleTracker {
    fn default() -> Self {
        Self::new(Duration::from_secs(300), Duration::from_secs(60))
    }
}

/// Renderers keyed by font path and base size
pub struct RendererPool<B: UploadBackend + 'static> {
    renderers: FxHashMap<String, TextRenderer<B>>,
    idle: IdleTracker,
    context: GpuContext<B>,
    registry: Rc<RefCell<FontRegistry>>,
    default_font_path: PathBuf,
    policy: EvictionPolicy,
}

impl<B: UploadBackend + 'static> RendererPool<B> {
    pub fn new(
        context: GpuContext<B>,
        registry: Rc<RefCell<FontRegistry>>,
        default_font_path: impl Into<PathBuf>,
    ) -> Self {
        Self::with_config(context, registry, default_font_path, &CacheConfig::default())
    }

    pub fn with_config(
        context: GpuContext<B>,
        registry: Rc<RefCell<FontRegistry>>,
        default_font_path: impl Into<PathBuf>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            renderers: FxHashMap::default(),
            idle: IdleTracker::new(config.renderer_idle(), config.idle_check_interval()),
            context,
            registry,
            default_font_path: default_font_path.into(),
            policy: config.eviction_policy(),
        }
    }

    /// Render one line with the renderer for `options`
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

    pub fn render_lines_at<H: RenderHost<B>, S: AsRef<str>>(
        &mut self,
        host: &mut H,
        lines: &[S],
        x: f32,
        y: f32,
        options: &RenderOptions,
        now: Instant,
    ) -> Result<Option<TextQuad>> {
        let key = renderer_key(options);
        let renderer = self.renderer_for(&key, options)?;
        let quad = renderer.render_lines_at(host, lines, x, y, options, now);

        self.idle.touch(&key, now);
        self.cleanup_at(now);
        quad
    }

    fn renderer_for(&mut self, key: &str, options: &RenderOptions) -> Result<&mut TextRenderer<B>> {
        match self.renderers.entry(key.to_string()) {
            Entry::Occupied(occupied) => Ok(occupied.into_mut()),
            Entry::Vacant(vacant) => {
                let path = options
                    .font_path
                    .clone()
                    .unwrap_or_else(|| self.default_font_path.clone());
                let renderer = TextRenderer::with_policy(
                    path,
                    options.base_size,
                    Rc::clone(&self.registry),
                    self.context.clone(),
                    self.policy,
                )?;
                tracing::debug!("Created renderer {}", key);
                Ok(vacant.insert(renderer))
            }
        }
    }

    /// Dispose renderers idle past the timeout; returns how many were removed
    pub fn cleanup_at(&mut self, now: Instant) -> usize {
        let expired = self.idle.sweep(now);
        for key in &expired {
            if let Some(mut renderer) = self.renderers.remove(key) {
                tracing::debug!("Disposing idle renderer {}", key);
                renderer.dispose();
            }
        }
        expired.len()
    }

    pub fn get(&self, options: &RenderOptions) -> Option<&TextRenderer<B>> {
        self.renderers.get(&renderer_key(options))
    }

    pub fn contains(&self, options: &RenderOptions) -> bool {
        self.renderers.contains_key(&renderer_key(options))
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }

    /// Dispose every renderer
    pub fn dispose_all(&mut self) {
        for (key, mut renderer) in self.renderers.drain() {
            renderer.dispose();
            self.idle.forget(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renderer_key_format() {
        assert_eq!(renderer_key(&RenderOptions::default()), "default_10");
        let options = RenderOptions::default()
            .with_font_path("/assets/a.ttf")
            .with_base_size(12.5);
        assert_eq!(renderer_key(&options), "/assets/a.ttf_12.5");
    }

    #[test]
    fn test_idle_sweep_removes_stale_keys() {
        let start = Instant::now();
        let mut tracker = IdleTracker::default();
        tracker.touch("old", start);
        tracker.touch("fresh", start + Duration::from_secs(250));

        let expired = tracker.sweep(start + Duration::from_secs(301));

        assert_eq!(expired, vec!["old".to_string()]);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_idle_sweep_is_throttled() {
        let start = Instant::now();
        let mut tracker = IdleTracker::default();
        tracker.touch("a", start);

        assert!(tracker.sweep(start + Duration::from_secs(10)).is_empty());
        tracker.touch("b", start);
        assert_eq!(tracker.sweep(start + Duration::from_secs(400)).len(), 2);
        tracker.touch("c", start);
        // Within a minute of the previous sweep
        assert!(tracker.sweep(start + Duration::from_secs(420)).is_empty());
    }

    #[test]
    fn test_idle_at_exact_timeout_is_kept() {
        let start = Instant::now();
        let mut tracker = IdleTracker::default();
        tracker.touch("a", start);
        assert!(tracker.sweep(start + Duration::from_secs(300)).is_empty());
    }
}
