//! Text measurement and greedy word wrapping.
//!
//! Layout never talks to fonts directly. It asks a [`TextMeasure`] how wide a
//! run of text is, which keeps wrapping testable without any fonts installed.

/// Suffix appended to the last line when text is cut off.
pub const ELLIPSIS: &str = "...";

/// Font size and weight of a run of text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    /// Font size in pixels.
    pub size: f32,
    /// Whether the bold face is used.
    pub bold: bool,
}

impl TextStyle {
    pub const fn regular(size: f32) -> Self {
        Self { size, bold: false }
    }

    pub const fn bold(size: f32) -> Self {
        Self { size, bold: true }
    }
}

/// Measures rendered text.
pub trait TextMeasure: Send + Sync {
    /// Returns the advance width of `text` in pixels.
    fn width(&self, text: &str, style: TextStyle) -> f32;

    /// Returns the distance from the top of a line to its baseline.
    fn ascent(&self, style: TextStyle) -> f32 {
        style.size * 0.8
    }
}

/// Approximate metrics: every character advances by a fixed fraction of the em.
///
/// Used when no font database is available and in tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApproxMetrics {
    /// Advance of one character as a fraction of the font size.
    pub em_ratio: f32,
}

impl ApproxMetrics {
    pub fn new(em_ratio: f32) -> Self {
        Self { em_ratio }
    }
}

impl Default for ApproxMetrics {
    fn default() -> Self {
        Self::new(0.55)
    }
}

impl TextMeasure for ApproxMetrics {
    fn width(&self, text: &str, style: TextStyle) -> f32 {
        let boldness = if style.bold { 1.05 } else { 1.0 };
        text.chars().count() as f32 * style.size * self.em_ratio * boldness
    }
}

// ============================================================================
// Wrapping
// ============================================================================

/// Result of wrapping a block of text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WrappedText {
    pub lines: Vec<String>,
    /// True when words were left over and the last line got an ellipsis.
    pub truncated: bool,
}

impl WrappedText {
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Greedily wraps `text` into at most `max_lines` lines no wider than `max_width`.
///
/// Words are appended while the line still fits; the overflowing word starts the
/// next line. A word that is wider than `max_width` on its own is broken between
/// characters. When the cap is hit with words remaining, the last line is
/// shortened until it fits together with [`ELLIPSIS`].
pub fn wrap(
    measure: &dyn TextMeasure,
    text: &str,
    style: TextStyle,
    max_width: f32,
    max_lines: usize,
) -> WrappedText {
    let mut wrapped = WrappedText::default();
    if max_lines == 0 {
        return wrapped;
    }

    let fits = |candidate: &str| measure.width(candidate, style) <= max_width;
    let mut pieces: Vec<String> = Vec::new();
    for word in text.split_whitespace() {
        if fits(word) {
            pieces.push(word.to_string());
        } else {
            pieces.extend(break_word(word, &fits));
        }
    }

    let mut line = String::new();
    let mut index = 0;
    while index < pieces.len() {
        let word = &pieces[index];
        let candidate = if line.is_empty() {
            word.clone()
        } else {
            format!("{line} {word}")
        };

        if line.is_empty() || fits(&candidate) {
            line = candidate;
            index += 1;
            continue;
        }

        wrapped.lines.push(std::mem::take(&mut line));
        if wrapped.lines.len() == max_lines {
            break;
        }
    }

    if !line.is_empty() && wrapped.lines.len() < max_lines {
        wrapped.lines.push(line);
    }

    if index < pieces.len() {
        if let Some(last) = wrapped.lines.last_mut() {
            *last = with_ellipsis(last, &fits);
            wrapped.truncated = true;
        }
    }

    wrapped
}

/// Truncates a single line so it fits `max_width`, adding [`ELLIPSIS`] if cut.
pub fn fit_line(measure: &dyn TextMeasure, text: &str, style: TextStyle, max_width: f32) -> String {
    let wrapped = wrap(measure, text, style, max_width, 1);
    wrapped.lines.into_iter().next().unwrap_or_default()
}

/// Splits a word into chunks that each fit on a line.
fn break_word(word: &str, fits: &dyn Fn(&str) -> bool) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for ch in word.chars() {
        current.push(ch);
        if !fits(&current) && current.chars().count() > 1 {
            current.pop();
            chunks.push(std::mem::take(&mut current));
            current.push(ch);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Appends an ellipsis, dropping trailing words and then characters until it fits.
fn with_ellipsis(line: &str, fits: &dyn Fn(&str) -> bool) -> String {
    let mut words: Vec<&str> = line.split(' ').collect();
    while words.len() > 1 {
        let candidate = format!("{}{ELLIPSIS}", words.join(" "));
        if fits(&candidate) {
            return candidate;
        }
        words.pop();
    }

    let mut chars: Vec<char> = words.first().map(|w| w.chars().collect()).unwrap_or_default();
    loop {
        let candidate = format!("{}{ELLIPSIS}", chars.iter().collect::<String>());
        if fits(&candidate) || chars.is_empty() {
            return candidate;
        }
        chars.pop();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // 10px per character at size 10, so widths are easy to reason about.
    const STYLE: TextStyle = TextStyle::regular(10.0);

    fn metrics() -> ApproxMetrics {
        ApproxMetrics::new(1.0)
    }

    #[test]
    fn short_text_stays_on_one_line() {
        let wrapped = wrap(&metrics(), "Great Tool", STYLE, 200.0, 3);
        assert_eq!(wrapped.lines, vec!["Great Tool"]);
        assert!(!wrapped.truncated);
    }

    #[test]
    fn breaks_before_overflowing_word() {
        // "aaaa bbbb" is 90px wide; the limit is 80px.
        let wrapped = wrap(&metrics(), "aaaa bbbb cc", STYLE, 80.0, 3);
        assert_eq!(wrapped.lines, vec!["aaaa", "bbbb cc"]);
        assert!(!wrapped.truncated);
    }

    #[test]
    fn exact_fit_does_not_break() {
        let wrapped = wrap(&metrics(), "aaaa bbb", STYLE, 80.0, 3);
        assert_eq!(wrapped.lines, vec!["aaaa bbb"]);
    }

    #[test]
    fn collapses_whitespace() {
        let wrapped = wrap(&metrics(), "  one \n two\tthree  ", STYLE, 500.0, 2);
        assert_eq!(wrapped.lines, vec!["one two three"]);
    }

    #[test]
    fn text_over_the_cap_ends_with_ellipsis() {
        let text = "one two three four five six seven eight nine ten";
        let wrapped = wrap(&metrics(), text, STYLE, 100.0, 2);
        assert_eq!(wrapped.len(), 2);
        assert!(wrapped.truncated);
        let last = wrapped.lines.last().unwrap();
        assert!(last.ends_with(ELLIPSIS), "last line was {last:?}");
        assert!(metrics().width(last, STYLE) <= 100.0);
        assert!(!wrapped.lines[0].ends_with(ELLIPSIS));
    }

    #[test]
    fn text_within_the_cap_has_no_ellipsis() {
        let wrapped = wrap(&metrics(), "one two three four", STYLE, 100.0, 2);
        assert_eq!(wrapped.lines, vec!["one two", "three four"]);
        assert!(!wrapped.truncated);
        assert!(wrapped.lines.iter().all(|l| !l.ends_with(ELLIPSIS)));
    }

    #[test]
    fn long_word_is_broken_between_characters() {
        let wrapped = wrap(&metrics(), "abcdefghijkl", STYLE, 50.0, 5);
        assert_eq!(wrapped.lines, vec!["abcde", "fghij", "kl"]);
        assert!(wrapped.lines.iter().all(|l| metrics().width(l, STYLE) <= 50.0));
    }

    #[test]
    fn pathological_word_respects_cap() {
        let word = "x".repeat(10_000);
        let wrapped = wrap(&metrics(), &word, STYLE, 100.0, 2);
        assert_eq!(wrapped.len(), 2);
        assert!(wrapped.truncated);
        assert_eq!(wrapped.lines[1], format!("{}{ELLIPSIS}", "x".repeat(7)));
    }

    #[test]
    fn empty_text_produces_no_lines() {
        assert!(wrap(&metrics(), "   ", STYLE, 100.0, 3).is_empty());
        assert!(wrap(&metrics(), "words", STYLE, 100.0, 0).is_empty());
    }

    #[test]
    fn fit_line_truncates_single_line() {
        assert_eq!(fit_line(&metrics(), "By Jane", STYLE, 100.0), "By Jane");
        let fitted = fit_line(&metrics(), "By Someone With A Long Name", STYLE, 100.0);
        assert!(fitted.ends_with(ELLIPSIS));
        assert!(metrics().width(&fitted, STYLE) <= 100.0);
    }
}
