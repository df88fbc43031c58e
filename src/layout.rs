//! Card geometry.
//!
//! Turns [`RenderOptions`] into positioned lines of text on the fixed
//! 1200×630 canvas. Nothing here draws; [`crate::svg`] turns the result into
//! markup. Vertical positions are line tops, and each line's baseline is its top
//! plus the font ascent.

use crate::request::RenderOptions;
use crate::text::{self, TextMeasure, TextStyle};

/// Output width in pixels.
pub const WIDTH: u32 = 1200;
/// Output height in pixels.
pub const HEIGHT: u32 = 630;

/// The white card on top of the gradient.
pub const CARD: Rect = Rect {
    x: 60.0,
    y: 60.0,
    width: 1080.0,
    height: 510.0,
};
/// Corner radius of the card.
pub const CARD_RADIUS: f32 = 20.0;

/// Horizontal center every line is aligned on.
pub const CENTER_X: f32 = WIDTH as f32 / 2.0;
/// Widest a line of text may be.
pub const MAX_TEXT_WIDTH: f32 = 1000.0;

pub const BADGE_STYLE: TextStyle = TextStyle::bold(20.0);
pub const TITLE_STYLE: TextStyle = TextStyle::bold(58.0);
pub const DESCRIPTION_STYLE: TextStyle = TextStyle::regular(28.0);
pub const AUTHOR_STYLE: TextStyle = TextStyle::regular(24.0);
pub const FOOTER_STYLE: TextStyle = TextStyle::bold(36.0);

const BADGE_TOP: f32 = 100.0;
const BADGE_HEIGHT: f32 = 40.0;
const BADGE_PADDING: f32 = 24.0;
const BADGE_MIN_WIDTH: f32 = 120.0;

const TITLE_LINE_HEIGHT: f32 = 70.0;
const TITLE_TOP: f32 = 130.0;
const TITLE_TOP_WITH_BADGE: f32 = 170.0;

const DESCRIPTION_LINE_HEIGHT: f32 = 40.0;
const DESCRIPTION_MAX_LINES: usize = 2;
const DESCRIPTION_TOP: f32 = 280.0;
const DESCRIPTION_TOP_WITH_BADGE: f32 = 300.0;
const DESCRIPTION_GAP: f32 = 16.0;

const AUTHOR_LINE_HEIGHT: f32 = 32.0;
const AUTHOR_TOP: f32 = 420.0;
const AUTHOR_GAP: f32 = 12.0;

const FOOTER_TOP: f32 = 500.0;
const FOOTER_LINE_HEIGHT: f32 = 44.0;

/// Axis-aligned rectangle in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// One line of centered text.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub text: String,
    pub baseline: f32,
}

/// A run of lines sharing one style.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub style: TextStyle,
    pub lines: Vec<Line>,
    pub top: f32,
    pub bottom: f32,
    /// Whether the source text was cut off with an ellipsis.
    pub truncated: bool,
}

impl TextBlock {
    fn new(
        measure: &dyn TextMeasure,
        lines: Vec<String>,
        truncated: bool,
        style: TextStyle,
        top: f32,
        line_height: f32,
    ) -> Self {
        let ascent = measure.ascent(style);
        let lines: Vec<Line> = lines
            .into_iter()
            .enumerate()
            .map(|(index, text)| Line {
                text,
                baseline: top + index as f32 * line_height + ascent,
            })
            .collect();
        let bottom = top + lines.len() as f32 * line_height;
        Self {
            style,
            lines,
            top,
            bottom,
            truncated,
        }
    }

    pub fn text(&self) -> Vec<&str> {
        self.lines.iter().map(|line| line.text.as_str()).collect()
    }
}

/// The category pill.
#[derive(Debug, Clone, PartialEq)]
pub struct Badge {
    pub rect: Rect,
    pub label: Line,
}

impl Badge {
    pub fn radius(&self) -> f32 {
        self.rect.height / 2.0
    }
}

/// Everything needed to draw a card.
#[derive(Debug, Clone, PartialEq)]
pub struct CardLayout {
    pub badge: Option<Badge>,
    pub title: TextBlock,
    pub description: Option<TextBlock>,
    pub author: Option<TextBlock>,
    pub footer: TextBlock,
}

impl CardLayout {
    pub fn compute(options: &RenderOptions, measure: &dyn TextMeasure) -> Self {
        let badge = options
            .category
            .as_deref()
            .map(|category| layout_badge(measure, category));
        let has_badge = badge.is_some();

        let title_lines = if options.description.is_some() { 2 } else { 3 };
        let title_top = if has_badge { TITLE_TOP_WITH_BADGE } else { TITLE_TOP };
        let wrapped = text::wrap(measure, &options.title, TITLE_STYLE, MAX_TEXT_WIDTH, title_lines);
        let title = TextBlock::new(
            measure,
            wrapped.lines,
            wrapped.truncated,
            TITLE_STYLE,
            title_top,
            TITLE_LINE_HEIGHT,
        );

        let description = options.description.as_deref().map(|description| {
            let floor = if has_badge {
                DESCRIPTION_TOP_WITH_BADGE
            } else {
                DESCRIPTION_TOP
            };
            let top = floor.max(title.bottom + DESCRIPTION_GAP);
            let wrapped = text::wrap(
                measure,
                description,
                DESCRIPTION_STYLE,
                MAX_TEXT_WIDTH,
                DESCRIPTION_MAX_LINES,
            );
            TextBlock::new(
                measure,
                wrapped.lines,
                wrapped.truncated,
                DESCRIPTION_STYLE,
                top,
                DESCRIPTION_LINE_HEIGHT,
            )
        });

        let author = options.author.as_deref().map(|author| {
            let above = description.as_ref().map_or(title.bottom, |block| block.bottom);
            let top = AUTHOR_TOP.max(above + AUTHOR_GAP);
            single_line(measure, &format!("By {author}"), AUTHOR_STYLE, top, AUTHOR_LINE_HEIGHT)
        });

        let footer = single_line(
            measure,
            &options.site_name,
            FOOTER_STYLE,
            FOOTER_TOP,
            FOOTER_LINE_HEIGHT,
        );

        Self {
            badge,
            title,
            description,
            author,
            footer,
        }
    }
}

fn single_line(
    measure: &dyn TextMeasure,
    value: &str,
    style: TextStyle,
    top: f32,
    line_height: f32,
) -> TextBlock {
    let wrapped = text::wrap(measure, value, style, MAX_TEXT_WIDTH, 1);
    TextBlock::new(measure, wrapped.lines, wrapped.truncated, style, top, line_height)
}

fn layout_badge(measure: &dyn TextMeasure, category: &str) -> Badge {
    let max_label = MAX_TEXT_WIDTH - 2.0 * BADGE_PADDING;
    let label = text::fit_line(measure, category, BADGE_STYLE, max_label);
    let width = (measure.width(&label, BADGE_STYLE) + 2.0 * BADGE_PADDING)
        .clamp(BADGE_MIN_WIDTH, MAX_TEXT_WIDTH);

    let rect = Rect {
        x: CENTER_X - width / 2.0,
        y: BADGE_TOP,
        width,
        height: BADGE_HEIGHT,
    };
    // Centre the em box vertically inside the pill.
    let baseline = rect.y + (BADGE_HEIGHT - BADGE_STYLE.size) / 2.0 + measure.ascent(BADGE_STYLE);

    Badge {
        rect,
        label: Line {
            text: label,
            baseline,
        },
    }
}
