//! Font loading and measurement.
//!
//! A [`FontBook`] owns the font database handed to resvg and keeps parsed copies of
//! the regular and bold faces so layout can measure text with real advances.

use std::path::PathBuf;
use std::sync::Arc;

use resvg::usvg::fontdb::{self, Database, Family, Query, Stretch, Style, Weight};
use tracing::debug;

use crate::renderer::RenderError;
use crate::text::{TextMeasure, TextStyle};

/// Family requested when nothing else is configured.
pub const DEFAULT_FONT_FAMILY: &str = "Arial";

/// Where fonts come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontSettings {
    /// Preferred family; generic sans-serif is tried next.
    pub family: String,
    /// Extra directories scanned for font files.
    pub font_dirs: Vec<PathBuf>,
    /// Whether to scan the operating system's font directories.
    pub system_fonts: bool,
}

impl Default for FontSettings {
    fn default() -> Self {
        Self {
            family: DEFAULT_FONT_FAMILY.to_string(),
            font_dirs: Vec::new(),
            system_fonts: true,
        }
    }
}

// ============================================================================
// FontBook
// ============================================================================

/// Resolved fonts for card rendering.
pub struct FontBook {
    db: Arc<Database>,
    family: String,
    regular: FaceMetrics,
    bold: FaceMetrics,
}

impl FontBook {
    /// Loads fonts according to `settings`.
    ///
    /// Fails when no usable face can be found; there is no silent fallback to
    /// rendering without text.
    pub fn load(settings: &FontSettings) -> Result<Self, RenderError> {
        let mut db = Database::new();
        if settings.system_fonts {
            db.load_system_fonts();
        }
        for dir in &settings.font_dirs {
            db.load_fonts_dir(dir);
        }
        Self::from_database(db, &settings.family)
    }

    /// Builds a font book from an already populated database.
    pub fn from_database(db: Database, family: &str) -> Result<Self, RenderError> {
        if db.faces().next().is_none() {
            return Err(RenderError::Font("no font faces were found".to_string()));
        }

        let regular_id = resolve_face(&db, family, Weight::NORMAL)
            .or_else(|| db.faces().next().map(|face| face.id))
            .ok_or_else(|| RenderError::Font(format!("no face matches `{family}`")))?;
        let bold_id = resolve_face(&db, family, Weight::BOLD).unwrap_or(regular_id);

        let resolved_family = db
            .face(regular_id)
            .and_then(|face| face.families.first())
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| family.to_string());

        let regular = FaceMetrics::load(&db, regular_id)?;
        let bold = FaceMetrics::load(&db, bold_id)?;

        debug!(
            requested = family,
            resolved = resolved_family.as_str(),
            faces = db.faces().count(),
            "font book loaded"
        );

        Ok(Self {
            db: Arc::new(db),
            family: resolved_family,
            regular,
            bold,
        })
    }

    /// The database shared with the SVG rasterizer.
    pub fn database(&self) -> Arc<Database> {
        Arc::clone(&self.db)
    }

    /// Family name written into the SVG so resvg picks the measured face.
    pub fn family(&self) -> &str {
        &self.family
    }

    fn face(&self, style: TextStyle) -> &FaceMetrics {
        if style.bold { &self.bold } else { &self.regular }
    }
}

impl TextMeasure for FontBook {
    fn width(&self, text: &str, style: TextStyle) -> f32 {
        self.face(style).width(text, style.size)
    }

    fn ascent(&self, style: TextStyle) -> f32 {
        let face = self.face(style);
        face.ascender * style.size / face.units_per_em
    }
}

fn resolve_face(db: &Database, family: &str, weight: Weight) -> Option<fontdb::ID> {
    let families = [Family::Name(family), Family::SansSerif];
    db.query(&Query {
        families: &families,
        weight,
        stretch: Stretch::Normal,
        style: Style::Normal,
    })
}

// ============================================================================
// FaceMetrics
// ============================================================================

/// An owned copy of one face's data plus the metrics layout needs.
struct FaceMetrics {
    data: Arc<Vec<u8>>,
    index: u32,
    units_per_em: f32,
    ascender: f32,
}

impl FaceMetrics {
    fn load(db: &Database, id: fontdb::ID) -> Result<Self, RenderError> {
        let (data, index) = db
            .with_face_data(id, |data, index| (data.to_vec(), index))
            .ok_or_else(|| RenderError::Font("font face data is unavailable".to_string()))?;

        let (units_per_em, ascender) = {
            let face = ttf_parser::Face::parse(&data, index)
                .map_err(|err| RenderError::Font(format!("failed to parse font face: {err}")))?;
            (f32::from(face.units_per_em()), f32::from(face.ascender()))
        };

        Ok(Self {
            data: Arc::new(data),
            index,
            units_per_em,
            ascender,
        })
    }

    fn width(&self, text: &str, size: f32) -> f32 {
        let missing = self.units_per_em * 0.5;
        let Ok(face) = ttf_parser::Face::parse(&self.data, self.index) else {
            return text.chars().count() as f32 * missing * size / self.units_per_em;
        };

        let units: f32 = text
            .chars()
            .map(|ch| {
                face.glyph_index(ch)
                    .and_then(|glyph| face.glyph_hor_advance(glyph))
                    .map(f32::from)
                    .unwrap_or(missing)
            })
            .sum();
        units * size / self.units_per_em
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_database_is_an_error() {
        let result = FontBook::from_database(Database::new(), DEFAULT_FONT_FAMILY);
        assert!(matches!(result, Err(RenderError::Font(_))));
    }

    #[test]
    fn missing_font_dirs_without_system_fonts_fail() {
        let settings = FontSettings {
            family: DEFAULT_FONT_FAMILY.to_string(),
            font_dirs: vec![PathBuf::from("/nonexistent/og-preview/fonts")],
            system_fonts: false,
        };
        assert!(FontBook::load(&settings).is_err());
    }

    #[test]
    fn default_settings_scan_system_fonts() {
        let settings = FontSettings::default();
        assert_eq!(settings.family, "Arial");
        assert!(settings.system_fonts);
        assert!(settings.font_dirs.is_empty());
    }
}
