//! Font registry for system font discovery and caching
//!
//! Uses fontdb to discover system fonts, load font files, and find a face for
//! codepoints the configured fonts cannot display.

use crate::fallback::FallbackCache;
use crate::font::FontFace;
use crate::{Result, TextError};
use fontdb::{Database, Family, Query, Source, Stretch, Style, Weight, ID};
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::Arc;

/// Generic font category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GenericFont {
    #[default]
    SansSerif,
    Monospace,
    Serif,
}

impl GenericFont {
    fn family(self) -> Family<'static> {
        match self {
            GenericFont::SansSerif => Family::SansSerif,
            GenericFont::Monospace => Family::Monospace,
            GenericFont::Serif => Family::Serif,
        }
    }
}

/// Font registry that discovers and caches fonts
pub struct FontRegistry {
    /// fontdb database containing all system fonts
    db: Database,
    /// Cached faces by query key (Some = found, None = not found)
    faces: FxHashMap<String, Option<Arc<FontFace>>>,
    /// Cached faces by database id
    by_id: FxHashMap<ID, Arc<FontFace>>,
    /// Per-codepoint fallback results
    fallback: FallbackCache,
}

impl FontRegistry {
    /// Create a registry over the installed system fonts
    pub fn new() -> Self {
        let mut db = Database::new();
        db.load_system_fonts();
        tracing::info!("Discovered {} system font faces", db.len());
        Self::with_database(db)
    }

    /// Create a registry over an existing database
    pub fn with_database(db: Database) -> Self {
        Self {
            db,
            faces: FxHashMap::default(),
            by_id: FxHashMap::default(),
            fallback: FallbackCache::new(),
        }
    }

    /// Number of faces known to the database
    pub fn face_count(&self) -> usize {
        self.db.len()
    }

    /// Load a generic font category
    pub fn load_generic(&mut self, generic: GenericFont) -> Result<Arc<FontFace>> {
        let cache_key = format!("__generic_{:?}", generic);

        // Check cache first (includes failed lookups as None)
        if let Some(cached) = self.faces.get(&cache_key) {
            return cached.clone().ok_or_else(|| {
                TextError::FontLoadError(format!(
                    "Generic font {:?} not found (cached)",
                    generic
                ))
            });
        }

        let query = Query {
            families: &[generic.family()],
            weight: Weight::NORMAL,
            style: Style::Normal,
            stretch: Stretch::Normal,
        };

        let Some(id) = self.db.query(&query) else {
            self.faces.insert(cache_key, None);
            return Err(TextError::FontLoadError(format!(
                "Generic font {:?} not found",
                generic
            )));
        };

        let face = self.load_face_by_id(id)?;
        self.faces.insert(cache_key, Some(Arc::clone(&face)));
        Ok(face)
    }

    /// Load a font file, caching the result by path
    pub fn load_font_file(&mut self, path: &Path) -> Result<Arc<FontFace>> {
        let cache_key = format!("file:{}", path.display());

        if let Some(cached) = self.faces.get(&cache_key) {
            return cached.clone().ok_or_else(|| {
                TextError::FontLoadError(format!("Font file {:?} failed to load (cached)", path))
            });
        }

        match FontFace::from_file(path) {
            Ok(face) => {
                tracing::info!("Loaded font '{}' from {:?}", face.family_name(), path);
                let face = Arc::new(face);
                self.faces.insert(cache_key, Some(Arc::clone(&face)));
                Ok(face)
            }
            Err(e) => {
                self.faces.insert(cache_key, None);
                Err(e)
            }
        }
    }

    /// Load a font file, falling back to the first available system font
    ///
    /// A missing or corrupt file is not an error; it is logged once and the
    /// system default is used instead. Returns `None` only when no font is
    /// installed at all.
    pub fn load_font_file_or_default(&mut self, path: &Path) -> Option<Arc<FontFace>> {
        let already_tried = self
            .faces
            .contains_key(&format!("file:{}", path.display()));

        match self.load_font_file(path) {
            Ok(face) => Some(face),
            Err(e) => {
                if !already_tried {
                    tracing::warn!("{}; falling back to system font", e);
                }
                self.first_available()
            }
        }
    }

    /// The default sans-serif face, or any installed face if there is none
    pub fn first_available(&mut self) -> Option<Arc<FontFace>> {
        if let Ok(face) = self.load_generic(GenericFont::SansSerif) {
            return Some(face);
        }

        let ids: Vec<ID> = self.db.faces().map(|face| face.id).collect();
        ids.into_iter().find_map(|id| self.load_face_by_id(id).ok())
    }

    /// First installed face that can display `c`
    ///
    /// Results, including misses, are cached per codepoint.
    pub fn fallback_for_char(&mut self, c: char) -> Option<Arc<FontFace>> {
        let Self {
            db, by_id, fallback, ..
        } = self;
        fallback.resolve(c, || scan_for_char(db, by_id, c))
    }

    /// Per-codepoint fallback cache
    pub fn fallback_cache(&self) -> &FallbackCache {
        &self.fallback
    }

    /// List available font families
    pub fn list_families(&self) -> Vec<String> {
        let mut families: Vec<String> = self
            .db
            .faces()
            .filter_map(|face| face.families.first().map(|(name, _)| name.clone()))
            .collect();

        families.sort();
        families.dedup();
        families
    }

    fn load_face_by_id(&mut self, id: ID) -> Result<Arc<FontFace>> {
        let Self { db, by_id, .. } = self;
        load_cached(db, by_id, id)
    }
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn load_cached(
    db: &Database,
    by_id: &mut FxHashMap<ID, Arc<FontFace>>,
    id: ID,
) -> Result<Arc<FontFace>> {
    if let Some(face) = by_id.get(&id) {
        return Ok(Arc::clone(face));
    }

    let (src, face_index) = db
        .face_source(id)
        .ok_or_else(|| TextError::FontLoadError("Font source not found".to_string()))?;

    let data = match src {
        Source::File(path) => std::fs::read(&path).map_err(|e| {
            TextError::FontLoadError(format!("Failed to read font file {:?}: {}", path, e))
        })?,
        Source::Binary(arc) => arc.as_ref().as_ref().to_vec(),
        Source::SharedFile(_path, data) => data.as_ref().as_ref().to_vec(),
    };

    let face = Arc::new(FontFace::from_data_with_index(data, face_index)?);
    by_id.insert(id, Arc::clone(&face));
    Ok(face)
}

fn scan_for_char(
    db: &Database,
    by_id: &mut FxHashMap<ID, Arc<FontFace>>,
    c: char,
) -> Option<Arc<FontFace>> {
    let covering = db.faces().map(|face| face.id).find(|&id| {
        db.with_face_data(id, |data, index| {
            ttf_parser::Face::parse(data, index)
                .ok()
                .and_then(|face| face.glyph_index(c))
                .is_some_and(|glyph| glyph.0 != 0)
        })
        .unwrap_or(false)
    })?;

    match load_cached(db, by_id, covering) {
        Ok(face) => {
            tracing::debug!(
                "Fallback font for U+{:04X}: {}",
                c as u32,
                face.family_name()
            );
            Some(face)
        }
        Err(e) => {
            tracing::warn!("Failed to load fallback face for U+{:04X}: {}", c as u32, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_database_misses_are_cached() {
        let mut registry = FontRegistry::with_database(Database::new());

        assert!(registry.load_generic(GenericFont::Monospace).is_err());
        // Second lookup is served from the negative cache
        let err = registry.load_generic(GenericFont::Monospace).unwrap_err();
        assert!(err.to_string().contains("cached"));

        assert!(registry.first_available().is_none());
        assert!(registry.fallback_for_char('ж').is_none());
        assert!(registry.fallback_for_char('ж').is_none());
        assert_eq!(registry.fallback_cache().len(), 1);
        assert_eq!(registry.fallback_cache().counters(), (1, 1));
    }

    #[test]
    fn test_missing_font_file_falls_back() {
        let mut registry = FontRegistry::with_database(Database::new());
        let path = Path::new("/nonexistent/fontera/default.ttf");

        assert!(registry.load_font_file(path).is_err());
        assert!(registry.load_font_file_or_default(path).is_none());
    }

    #[test]
    fn test_load_generic_fonts() {
        let mut registry = FontRegistry::new();

        let sans = registry.load_generic(GenericFont::SansSerif);
        let mono = registry.load_generic(GenericFont::Monospace);

        if sans.is_err() && mono.is_err() {
            println!("No generic fonts available - skipping test (CI environment)");
            return;
        }

        if let Ok(font) = sans {
            println!("Loaded sans-serif: {}", font.family_name());
            assert!(font.glyph_count() > 0);
        }
        if let Ok(font) = mono {
            println!("Loaded monospace: {}", font.family_name());
        }
    }

    #[test]
    fn test_fallback_face_covers_char() {
        let mut registry = FontRegistry::new();
        if registry.face_count() == 0 {
            println!("No fonts found - skipping test (CI environment)");
            return;
        }

        if let Some(face) = registry.fallback_for_char('A') {
            assert!(face.has_glyph('A'));
        }
    }
}
