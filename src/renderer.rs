//! The preview renderer.
//!
//! [`CardRenderer`] turns [`RenderOptions`] into a 1200×630 PNG. Rendering is
//! pure and deterministic for a given font environment: the same options always
//! produce the same bytes.

use std::fmt;
use std::sync::Arc;

use resvg::usvg::fontdb::Database;
use thiserror::Error;

use crate::fonts::{FontBook, FontSettings};
use crate::layout::CardLayout;
use crate::request::RenderOptions;
use crate::svg;
use crate::text::TextMeasure;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("font error: {0}")]
    Font(String),
    #[error("failed to build card markup: {0}")]
    Svg(#[from] resvg::usvg::Error),
    #[error("failed to allocate a {width}x{height} canvas")]
    Canvas { width: u32, height: u32 },
    #[error("failed to encode PNG: {0}")]
    Encode(#[from] image::ImageError),
}

/// An encoded preview image.
#[derive(Clone, PartialEq, Eq)]
pub struct RenderedImage {
    /// PNG bytes.
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl fmt::Debug for RenderedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedImage")
            .field("bytes", &self.bytes.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Anything that can turn options into an image.
///
/// Implementations run on a blocking thread and may take a while.
pub trait PreviewRenderer: Send + Sync {
    fn render(&self, options: &RenderOptions) -> Result<RenderedImage, RenderError>;
}

// ============================================================================
// CardRenderer
// ============================================================================

/// Renders the gradient card layout.
#[derive(Clone)]
pub struct CardRenderer {
    measure: Arc<dyn TextMeasure>,
    fontdb: Arc<Database>,
    family: String,
}

impl CardRenderer {
    /// Loads fonts and builds a renderer.
    pub fn load(settings: &FontSettings) -> Result<Self, RenderError> {
        FontBook::load(settings).map(Self::from_fonts)
    }

    /// Builds a renderer whose layout and rasterization share one font book.
    pub fn from_fonts(fonts: FontBook) -> Self {
        let fontdb = fonts.database();
        let family = fonts.family().to_string();
        Self {
            measure: Arc::new(fonts),
            fontdb,
            family,
        }
    }

    /// Builds a renderer that lays text out with `measure` but has no fonts to
    /// draw it with. Text is positioned but not painted.
    pub fn with_measure(measure: impl TextMeasure + 'static) -> Self {
        Self {
            measure: Arc::new(measure),
            fontdb: Arc::new(Database::new()),
            family: "sans-serif".to_string(),
        }
    }

    /// Computes the layout without drawing it.
    pub fn layout(&self, options: &RenderOptions) -> CardLayout {
        CardLayout::compute(options, self.measure.as_ref())
    }

    /// Returns the SVG document for `options`.
    pub fn document(&self, options: &RenderOptions) -> String {
        svg::card_document(&self.layout(options), &options.theme, &self.family)
    }

    pub fn render(&self, options: &RenderOptions) -> Result<RenderedImage, RenderError> {
        let document = self.document(options);
        let image = svg::rasterize(&document, Arc::clone(&self.fontdb))?;
        let bytes = svg::encode_png(&image)?;
        Ok(RenderedImage {
            bytes,
            width: image.width(),
            height: image.height(),
        })
    }
}

impl fmt::Debug for CardRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardRenderer")
            .field("family", &self.family)
            .field("faces", &self.fontdb.len())
            .finish()
    }
}

impl PreviewRenderer for CardRenderer {
    fn render(&self, options: &RenderOptions) -> Result<RenderedImage, RenderError> {
        CardRenderer::render(self, options)
    }
}
