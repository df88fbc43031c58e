//! SVG markup for a card and its rasterization with resvg.

use std::fmt::Write as _;
use std::io::Cursor;
use std::sync::Arc;

use image::{ImageFormat, Rgba, RgbaImage};
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::fontdb::Database;
use resvg::usvg::{Options, Tree};

use crate::layout::{self, CardLayout, Line, TextBlock};
use crate::renderer::RenderError;
use crate::text::TextStyle;
use crate::theme::{Color, Theme};

// ============================================================================
// Markup
// ============================================================================

/// Builds the SVG document for a laid-out card.
pub fn card_document(layout: &CardLayout, theme: &Theme, family: &str) -> String {
    let family = escape(&family.replace(['\'', '"'], ""));
    let mut svg = String::with_capacity(4096);
    let [start, middle, end] = theme.gradient;

    // `write!` into a String cannot fail.
    let _ = write!(
        svg,
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"##,
        w = layout::WIDTH,
        h = layout::HEIGHT,
    );
    let _ = write!(
        svg,
        r##"<defs><linearGradient id="bg" gradientUnits="userSpaceOnUse" x1="0" y1="0" x2="{w}" y2="{h}"><stop offset="0" stop-color="{start}"/><stop offset="0.5" stop-color="{middle}"/><stop offset="1" stop-color="{end}"/></linearGradient><filter id="shadow" x="-10%" y="-10%" width="120%" height="130%"><feDropShadow dx="0" dy="10" stdDeviation="10" flood-color="#000000" flood-opacity="0.3"/></filter></defs>"##,
        w = layout::WIDTH,
        h = layout::HEIGHT,
    );
    let _ = write!(
        svg,
        r##"<rect width="{}" height="{}" fill="url(#bg)"/>"##,
        layout::WIDTH,
        layout::HEIGHT,
    );

    let card = layout::CARD;
    let _ = write!(
        svg,
        r##"<rect x="{}" y="{}" width="{}" height="{}" rx="{r}" ry="{r}" fill="#ffffff" fill-opacity="0.97" filter="url(#shadow)"/>"##,
        card.x,
        card.y,
        card.width,
        card.height,
        r = layout::CARD_RADIUS,
    );

    if let Some(badge) = &layout.badge {
        let rect = badge.rect;
        let _ = write!(
            svg,
            r##"<rect x="{}" y="{}" width="{}" height="{}" rx="{r}" ry="{r}" fill="{}"/>"##,
            rect.x,
            rect.y,
            rect.width,
            rect.height,
            theme.badge_fill,
            r = badge.radius(),
        );
        push_line(&mut svg, &badge.label, layout::BADGE_STYLE, theme.badge_text, &family);
    }

    push_block(&mut svg, &layout.title, theme.title, &family);
    if let Some(block) = &layout.description {
        push_block(&mut svg, block, theme.body, &family);
    }
    if let Some(block) = &layout.author {
        push_block(&mut svg, block, theme.muted, &family);
    }
    push_block(&mut svg, &layout.footer, theme.accent, &family);

    svg.push_str("</svg>");
    svg
}

fn push_block(svg: &mut String, block: &TextBlock, color: Color, family: &str) {
    for line in &block.lines {
        push_line(svg, line, block.style, color, family);
    }
}

fn push_line(svg: &mut String, line: &Line, style: TextStyle, color: Color, family: &str) {
    let weight = if style.bold { 700 } else { 400 };
    let _ = write!(
        svg,
        r##"<text x="{}" y="{}" text-anchor="middle" font-family="'{family}', sans-serif" font-size="{}" font-weight="{weight}" fill="{color}">{}</text>"##,
        layout::CENTER_X,
        line.baseline,
        style.size,
        escape(&line.text),
    );
}

/// Escapes text for use as XML character data or an attribute value.
pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c if c.is_control() || !is_xml_char(c) => escaped.push(' '),
            c => escaped.push(c),
        }
    }
    escaped
}

/// The XML 1.0 `Char` production.
fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\u{9}' | '\u{a}' | '\u{d}'
            | '\u{20}'..='\u{d7ff}'
            | '\u{e000}'..='\u{fffd}'
            | '\u{10000}'..='\u{10ffff}'
    )
}

// ============================================================================
// Rasterization
// ============================================================================

/// Parses and renders an SVG document at its natural size.
pub fn rasterize(svg: &str, fontdb: Arc<Database>) -> Result<RgbaImage, RenderError> {
    let options = Options {
        fontdb,
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options)?;

    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or(RenderError::Canvas {
            width: size.width(),
            height: size.height(),
        })?;
    resvg::render(&tree, Transform::identity(), &mut pixmap.as_mut());

    pixmap_to_rgba_image(&pixmap)
}

/// Encodes an image as PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, RenderError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Converts a tiny_skia Pixmap to an image::RgbaImage.
fn pixmap_to_rgba_image(pixmap: &Pixmap) -> Result<RgbaImage, RenderError> {
    let (width, height) = (pixmap.width(), pixmap.height());
    let mut data = Vec::with_capacity(pixmap.pixels().len() * 4);
    for pixel in pixmap.pixels() {
        // tiny_skia stores premultiplied alpha.
        let Rgba(rgba) = unpremultiply(pixel.red(), pixel.green(), pixel.blue(), pixel.alpha());
        data.extend_from_slice(&rgba);
    }
    RgbaImage::from_raw(width, height, data).ok_or(RenderError::Canvas { width, height })
}

fn unpremultiply(r: u8, g: u8, b: u8, a: u8) -> Rgba<u8> {
    if a == 0 {
        return Rgba([0, 0, 0, 0]);
    }
    let alpha = a as f32 / 255.0;
    let channel = |value: u8| (value as f32 / alpha).round().min(255.0) as u8;
    Rgba([channel(r), channel(g), channel(b), a])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RenderOptions;
    use crate::text::ApproxMetrics;

    const SIMPLE_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="20" height="10"><rect width="20" height="10" fill="#ff0000"/></svg>"##;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape(r#"<a & "b">"#), "&lt;a &amp; &quot;b&quot;&gt;");
        assert_eq!(escape("Tom's"), "Tom&apos;s");
        assert_eq!(escape("a\u{0}b"), "a b");
    }

    #[test]
    fn replaces_characters_xml_forbids() {
        assert_eq!(escape("Hello\u{ffff}"), "Hello ");
        assert_eq!(escape("a\u{fffe}b"), "a b");
        assert_eq!(escape("caf\u{e9} \u{1f680}"), "caf\u{e9} \u{1f680}");
    }

    #[test]
    fn noncharacter_title_still_renders() {
        let options = RenderOptions::new("Hello\u{ffff}");
        let layout = CardLayout::compute(&options, &ApproxMetrics::default());
        let doc = card_document(&layout, &options.theme, "Arial");
        assert!(!doc.contains('\u{ffff}'));
        assert!(rasterize(&doc, Arc::new(Database::new())).is_ok());
    }

    #[test]
    fn family_name_is_escaped() {
        let options = RenderOptions::new("Title");
        let layout = CardLayout::compute(&options, &ApproxMetrics::default());
        let doc = card_document(&layout, &options.theme, "Fira & <Co>");
        assert!(doc.contains("font-family=\"'Fira &amp; &lt;Co&gt;', sans-serif\""));
        assert!(rasterize(&doc, Arc::new(Database::new())).is_ok());
    }

    #[test]
    fn rasterizes_at_natural_size() {
        let image = rasterize(SIMPLE_SVG, Arc::new(Database::new())).unwrap();
        assert_eq!(image.dimensions(), (20, 10));
        assert_eq!(image.get_pixel(5, 5).0, [255, 0, 0, 255]);
    }

    #[test]
    fn invalid_markup_is_an_error() {
        let result = rasterize("<svg", Arc::new(Database::new()));
        assert!(matches!(result, Err(RenderError::Svg(_))));
    }

    #[test]
    fn unpremultiply_restores_channels() {
        assert_eq!(unpremultiply(10, 20, 0, 51).0, [50, 100, 0, 51]);
        assert_eq!(unpremultiply(10, 10, 10, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn document_contains_escaped_text_and_theme() {
        let mut options = RenderOptions::new("Fast & <Safe>");
        options.category = Some("Dev Tools".to_string());
        let layout = CardLayout::compute(&options, &ApproxMetrics::default());
        let doc = card_document(&layout, &options.theme, "Ar\"ial");

        assert!(doc.contains("Fast &amp; &lt;Safe&gt;"));
        assert!(doc.contains("Dev Tools"));
        assert!(doc.contains("#3b82f6"));
        assert!(doc.contains("#dbeafe"));
        assert!(doc.contains("font-family=\"'Arial', sans-serif\""));
        assert!(doc.ends_with("</svg>"));
    }

    #[test]
    fn encodes_png_signature() {
        let image = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]));
        let png = encode_png(&image).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
