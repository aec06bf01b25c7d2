//! Texture cache with batch eviction
//!
//! Maps a render request to a rasterized and uploaded texture. Entries are
//! stamped on every access. Eviction is checked at most once per interval and
//! only trims when the cache has grown past its limit, removing the least
//! recently used entries until the retain count is reached.

use crate::error::Result;
use crate::lifecycle::{GpuContext, UploadStatus};
use crate::upload::{TextureUpload, UploadBackend};
use fontera_text::{Alignment, Background};
use image::RgbaImage;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Minimum texture width is `1 << WIDTH_MIN_SHIFT`
pub const WIDTH_MIN_SHIFT: u32 = 1;
/// Minimum texture height is `1 << HEIGHT_MIN_SHIFT`
pub const HEIGHT_MIN_SHIFT: u32 = 2;

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(0);

/// Next process-unique texture identifier (`fontera:render/cache_<n>`)
pub fn next_texture_id() -> String {
    let n = NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed);
    format!("fontera:render/cache_{}", n)
}

/// Smallest power of two that holds `value`, but at least `1 << min_shift`
pub fn texture_dimension(value: u32, min_shift: u32) -> u32 {
    value.max(1).next_power_of_two().max(1 << min_shift)
}

/// Texture size for a raster of `width` x `height`
pub fn texture_size(width: u32, height: u32) -> (u32, u32) {
    (
        texture_dimension(width, WIDTH_MIN_SHIFT),
        texture_dimension(height, HEIGHT_MIN_SHIFT),
    )
}

/// Everything that determines a cached texture's contents
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureCacheKey {
    pub lines: Vec<String>,
    pub shadow: bool,
    pub background: Background,
    pub align: Alignment,
    /// Render size as `f32` bits; `0` when the caller does not vary size
    pub size_bits: u32,
    /// Animation time bucket; `None` unless animated text opts into re-rolling
    pub frame: Option<u64>,
}

impl TextureCacheKey {
    pub fn new(lines: Vec<String>, shadow: bool, background: Background, align: Alignment) -> Self {
        Self {
            lines,
            shadow,
            background,
            align,
            size_bits: 0,
            frame: None,
        }
    }

    /// Key the texture to the font size it was rasterized at
    pub fn with_size(mut self, size: f32) -> Self {
        self.size_bits = size.to_bits();
        self
    }

    pub fn with_frame(mut self, frame: Option<u64>) -> Self {
        self.frame = frame;
        self
    }
}

/// Output of a cache-miss builder
pub struct BuiltTexture {
    pub image: RgbaImage,
    /// Widest total line advance, used to position aligned text
    pub max_text_width: f32,
}

/// A rasterized block owned by the cache
pub struct CachedTexture<B: UploadBackend> {
    upload: Rc<RefCell<TextureUpload<B>>>,
    texture_id: String,
    max_text_width: f32,
    width: u32,
    height: u32,
    last_used: Instant,
    registered: bool,
}

impl<B: UploadBackend> CachedTexture<B> {
    pub fn texture_id(&self) -> &str {
        &self.texture_id
    }

    pub fn max_text_width(&self) -> f32 {
        self.max_text_width
    }

    /// Texture size in pixels
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn last_used(&self) -> Instant {
        self.last_used
    }

    pub fn upload(&self) -> &Rc<RefCell<TextureUpload<B>>> {
        &self.upload
    }

    /// Whether pixels have reached the GPU (false while deferred)
    pub fn is_uploaded(&self) -> bool {
        self.upload.borrow().is_uploaded()
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn mark_registered(&mut self) {
        self.registered = true;
    }
}

/// When and how far the cache is trimmed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Minimum time between eviction checks
    pub interval: Duration,
    /// Trim only when the cache holds more than this many entries
    pub max_entries: usize,
    /// Entries kept after a trim
    pub retain_entries: usize,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            max_entries: 20,
            retain_entries: 15,
        }
    }
}

/// Statistics for texture cache performance monitoring
#[derive(Debug, Default, Clone)]
pub struct TextureCacheStats {
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that built a new texture
    pub misses: u64,
    /// Entries removed by eviction
    pub evictions: u64,
    /// Entries currently cached
    pub entries: usize,
}

impl TextureCacheStats {
    /// Cache hit rate (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Request-keyed texture cache
pub struct TextureCache<B: UploadBackend + 'static> {
    entries: FxHashMap<TextureCacheKey, CachedTexture<B>>,
    context: GpuContext<B>,
    policy: EvictionPolicy,
    last_check: Instant,
    stats: TextureCacheStats,
}

impl<B: UploadBackend + 'static> TextureCache<B> {
    pub fn new(context: GpuContext<B>) -> Self {
        Self::with_policy(context, EvictionPolicy::default())
    }

    pub fn with_policy(context: GpuContext<B>, policy: EvictionPolicy) -> Self {
        Self {
            entries: FxHashMap::default(),
            context,
            policy,
            last_check: Instant::now(),
            stats: TextureCacheStats::default(),
        }
    }

    /// Return the entry for `key`, building and uploading it on a miss
    pub fn get_or_create(
        &mut self,
        key: TextureCacheKey,
        builder: impl FnOnce() -> Result<BuiltTexture>,
    ) -> Result<&mut CachedTexture<B>> {
        self.get_or_create_at(key, Instant::now(), builder)
    }

    /// [`get_or_create`](Self::get_or_create) with an explicit clock
    pub fn get_or_create_at(
        &mut self,
        key: TextureCacheKey,
        now: Instant,
        builder: impl FnOnce() -> Result<BuiltTexture>,
    ) -> Result<&mut CachedTexture<B>> {
        match self.entries.entry(key) {
            Entry::Occupied(occupied) => {
                self.stats.hits += 1;
                let entry = occupied.into_mut();
                entry.last_used = now;
                Ok(entry)
            }
            Entry::Vacant(vacant) => {
                self.stats.misses += 1;

                let built = builder()?;
                let (width, height) = built.image.dimensions();
                let texture_id = next_texture_id();
                let upload = Rc::new(RefCell::new(TextureUpload::new(texture_id.clone())));

                let status = self.context.upload_or_defer(&upload, built.image)?;
                tracing::debug!(
                    "Texture cache miss: {} ({}x{}, {:?})",
                    texture_id,
                    width,
                    height,
                    status
                );
                if status == UploadStatus::Deferred {
                    tracing::debug!("{} waits for the GPU device", texture_id);
                }

                self.stats.entries += 1;
                Ok(vacant.insert(CachedTexture {
                    upload,
                    texture_id,
                    max_text_width: built.max_text_width,
                    width,
                    height,
                    last_used: now,
                    registered: false,
                }))
            }
        }
    }

    /// Stamp an entry as used; returns whether it exists
    pub fn touch(&mut self, key: &TextureCacheKey) -> bool {
        self.touch_at(key, Instant::now())
    }

    pub fn touch_at(&mut self, key: &TextureCacheKey, now: Instant) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.last_used = now;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, key: &TextureCacheKey) -> Option<&CachedTexture<B>> {
        self.entries.get(key)
    }

    /// Entry registered under `texture_id`
    pub fn find_by_texture_id(&self, texture_id: &str) -> Option<&CachedTexture<B>> {
        self.entries
            .values()
            .find(|entry| entry.texture_id == texture_id)
    }

    /// Run the eviction check if the interval has elapsed; returns entries removed
    pub fn maybe_evict(&mut self) -> usize {
        self.maybe_evict_at(Instant::now())
    }

    pub fn maybe_evict_at(&mut self, now: Instant) -> usize {
        if now.saturating_duration_since(self.last_check) < self.policy.interval {
            return 0;
        }
        self.last_check = now;

        if self.entries.len() <= self.policy.max_entries {
            return 0;
        }

        let mut by_age: Vec<(Instant, TextureCacheKey)> = self
            .entries
            .iter()
            .map(|(key, entry)| (entry.last_used, key.clone()))
            .collect();
        by_age.sort_by_key(|(last_used, _)| *last_used);

        let excess = self.entries.len() - self.policy.retain_entries.min(self.entries.len());
        for (_, key) in by_age.into_iter().take(excess) {
            if let Some(entry) = self.entries.remove(&key) {
                self.release(entry);
            }
        }

        self.stats.evictions += excess as u64;
        self.stats.entries = self.entries.len();
        tracing::debug!(
            "Evicted {} cached texture(s); {} remain",
            excess,
            self.entries.len()
        );
        excess
    }

    /// Release every cached texture and clear the cache
    pub fn dispose_all(&mut self) {
        let entries: Vec<_> = self.entries.drain().map(|(_, entry)| entry).collect();
        for entry in entries {
            self.release(entry);
        }
        self.stats.entries = 0;
    }

    fn release(&self, entry: CachedTexture<B>) {
        // Without a device nothing was allocated; the queued upload sees a dead weak ref
        if let Some(backend) = self.context.backend() {
            entry.upload.borrow_mut().release(&backend);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &TextureCacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn context(&self) -> &GpuContext<B> {
        &self.context
    }

    pub fn policy(&self) -> &EvictionPolicy {
        &self.policy
    }

    /// Get current cache statistics
    pub fn stats(&self) -> &TextureCacheStats {
        &self.stats
    }
}

impl<B: UploadBackend + 'static> Drop for TextureCache<B> {
    fn drop(&mut self) {
        self.dispose_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_dimension_powers_of_two() {
        assert_eq!(texture_dimension(100, WIDTH_MIN_SHIFT), 128);
        assert_eq!(texture_dimension(128, WIDTH_MIN_SHIFT), 128);
        assert_eq!(texture_dimension(129, WIDTH_MIN_SHIFT), 256);
        assert_eq!(texture_dimension(3, HEIGHT_MIN_SHIFT), 4);
        assert_eq!(texture_dimension(5, HEIGHT_MIN_SHIFT), 8);
    }

    #[test]
    fn test_texture_dimension_minimums_differ() {
        assert_eq!(texture_dimension(1, WIDTH_MIN_SHIFT), 2);
        assert_eq!(texture_dimension(1, HEIGHT_MIN_SHIFT), 4);
        assert_eq!(texture_dimension(0, WIDTH_MIN_SHIFT), 2);
        assert_eq!(texture_size(1, 1), (2, 4));
        assert_eq!(texture_size(3, 3), (4, 4));
    }

    #[test]
    fn test_texture_ids_increase() {
        let a = next_texture_id();
        let b = next_texture_id();
        assert!(a.starts_with("fontera:render/cache_"));
        let n = |id: &str| id.rsplit('_').next().and_then(|n| n.parse::<u64>().ok());
        assert!(n(&b) > n(&a));
    }

    #[test]
    fn test_key_frame_distinguishes() {
        let key = TextureCacheKey::new(vec!["&kx".into()], true, Background::None, Alignment::Left);
        assert_ne!(key.clone(), key.clone().with_frame(Some(3)));
        assert_eq!(key.clone().with_frame(None), key);
    }

    #[test]
    fn test_key_size_distinguishes() {
        let key = TextureCacheKey::new(vec!["HUD".into()], true, Background::None, Alignment::Left);
        assert_ne!(key.clone().with_size(10.0), key.clone().with_size(20.0));
        assert_eq!(key.clone().with_size(10.0), key.clone().with_size(10.0));
        assert_ne!(key.clone().with_size(10.0), key);
    }

    #[test]
    fn test_stats_hit_rate() {
        let stats = TextureCacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert_eq!(stats.hit_rate(), 0.75);
        assert_eq!(TextureCacheStats::default().hit_rate(), 0.0);
    }
}
