//! og-preview: on-demand Open Graph preview images with a filesystem cache
//!
//! This crate renders 1200×630 social preview cards (gradient background, white
//! card, category pill, wrapped title and description, author line, site name)
//! and keeps them in a flat directory keyed by a caller-supplied id. Requests
//! for an id that is already stored are answered from disk.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use og_preview::{CardRenderer, FontSettings, PreviewGenerator, PreviewStore, RenderRequest};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let renderer = CardRenderer::load(&FontSettings::default())?;
//! let store = PreviewStore::new("public/previews", "/previews");
//! let generator = PreviewGenerator::new(store, Arc::new(renderer));
//!
//! let request = RenderRequest::new("blog-42", "Great Tool").with_description("Short desc");
//! let outcome = generator.get_or_create(&request).await?;
//! assert_eq!(outcome.url, "/previews/blog-42.png");
//! # Ok(())
//! # }
//! ```
//!
//! # Rendering without a cache
//!
//! [`CardRenderer`] can be used on its own. With
//! [`CardRenderer::with_measure`] no fonts are needed at all, which is how the
//! tests render:
//!
//! ```
//! use og_preview::{ApproxMetrics, CardRenderer, RenderOptions};
//!
//! let renderer = CardRenderer::with_measure(ApproxMetrics::default());
//! let image = renderer.render(&RenderOptions::new("Great Tool")).unwrap();
//! assert_eq!((image.width, image.height), (1200, 630));
//! ```

mod fonts;
mod generator;
mod layout;
mod renderer;
mod request;
mod store;
mod svg;
mod text;
mod theme;

pub mod links;

#[cfg(feature = "server")]
pub mod config;
#[cfg(feature = "server")]
pub mod server;
#[cfg(feature = "server")]
pub mod telemetry;

pub use fonts::{DEFAULT_FONT_FAMILY, FontBook, FontSettings};
pub use generator::{DEFAULT_RENDER_TIMEOUT, GenerateError, GenerateOutcome, PreviewGenerator};
pub use layout::{Badge, CardLayout, HEIGHT, Line, Rect, TextBlock, WIDTH};
pub use renderer::{CardRenderer, PreviewRenderer, RenderError, RenderedImage};
pub use request::{DEFAULT_SITE_NAME, RenderOptions, RenderRequest, ValidationError};
pub use store::{
    CacheEntry, DEFAULT_URL_PREFIX, InvalidPreviewId, PreviewId, PreviewStore, StoreError,
};
pub use text::{ApproxMetrics, ELLIPSIS, TextMeasure, TextStyle, WrappedText, wrap};
pub use theme::{Color, InvalidColor, Theme};
