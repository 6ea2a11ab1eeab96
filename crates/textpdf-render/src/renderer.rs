//! Renderer capability consumed by the paginator, plus an in-memory
//! implementation that records pages as draw commands.

use core::fmt;
use std::sync::Arc;

use crate::render_ir::{
    DrawCommand, FontSpec, FontStyle, PageLayer, RenderPage, RuleCommand, TextCommand, MM_PER_PT,
};

/// Failure inside a renderer primitive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderError {
    /// Stable machine-readable code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: Box<str>,
}

impl RenderError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into().into_boxed_str(),
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for RenderError {}

/// Drawing surface the paginator emits into.
///
/// Font family, style, size, and color travel with every call.
pub trait PageRenderer {
    /// Wrap `text` into lines no wider than `max_width` millimetres.
    fn measure_and_wrap(
        &mut self,
        text: &str,
        max_width: f32,
        font: &FontSpec,
    ) -> Result<Vec<String>, RenderError>;

    fn draw_text(&mut self, cmd: TextCommand) -> Result<(), RenderError>;

    fn draw_rule(&mut self, cmd: RuleCommand) -> Result<(), RenderError>;

    /// Finalize the current page and start the next one.
    fn new_page(&mut self) -> Result<(), RenderError>;
}

/// Text width measurement hook.
pub trait TextMeasurer: Send + Sync {
    /// Rendered width of `text` in millimetres.
    fn measure_text_mm(&self, text: &str, font: &FontSpec) -> f32;
}

/// Glyph-class width model used when no font metrics are available.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeuristicMeasurer;

impl TextMeasurer for HeuristicMeasurer {
    fn measure_text_mm(&self, text: &str, font: &FontSpec) -> f32 {
        heuristic_measure_text(text, font)
    }
}

fn heuristic_measure_text(text: &str, font: &FontSpec) -> f32 {
    if text.is_empty() || font.size_pt <= 0.0 {
        return 0.0;
    }
    let family = font.family.to_ascii_lowercase();
    let proportional = !(family.contains("mono") || family.contains("courier"));
    let mut em_sum = 0.0f32;
    for ch in text.chars() {
        em_sum += if is_wide_glyph(ch) {
            1.0
        } else if proportional {
            proportional_glyph_em_width(ch)
        } else {
            0.6
        };
    }

    let mut style_scale = 1.0;
    if matches!(font.style, FontStyle::Bold | FontStyle::BoldItalic) {
        style_scale += 0.03;
    }
    if matches!(font.style, FontStyle::Italic | FontStyle::BoldItalic) {
        style_scale += 0.01;
    }
    em_sum * font.size_pt * MM_PER_PT * style_scale
}

fn proportional_glyph_em_width(ch: char) -> f32 {
    match ch {
        ' ' | '\u{00A0}' => 0.28,
        'i' | 'l' | 'I' | '|' | '!' => 0.24,
        '.' | ',' | ':' | ';' | '\'' | '"' | '`' => 0.26,
        '-' | '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' => 0.33,
        '(' | ')' | '[' | ']' | '{' | '}' => 0.33,
        'f' | 't' | 'j' | 'r' => 0.32,
        'm' | 'w' | 'M' | 'W' | '@' | '%' | '&' | '#' | '\u{2014}' => 0.86,
        '\u{2022}' => 0.35,
        c if c.is_ascii_digit() => 0.56,
        c if c.is_ascii_uppercase() => 0.67,
        c if c.is_ascii_lowercase() => 0.52,
        c if c.is_whitespace() => 0.28,
        c if c.is_ascii_punctuation() => 0.45,
        _ => 0.56,
    }
}

/// Full-width CJK and fullwidth-form glyphs.
fn is_wide_glyph(ch: char) -> bool {
    matches!(
        ch as u32,
        0x1100..=0x115F
            | 0x2E80..=0x303E
            | 0x3041..=0x33FF
            | 0x3400..=0x4DBF
            | 0x4E00..=0x9FFF
            | 0xAC00..=0xD7A3
            | 0xF900..=0xFAFF
            | 0xFE30..=0xFE4F
            | 0xFF00..=0xFF60
            | 0xFFE0..=0xFFE6
    )
}

/// Greedy line wrapping.
///
/// Breaks at spaces, and between any two wide glyphs. A token that alone
/// exceeds `max_width` is split at character boundaries. Explicit newlines
/// always break.
pub fn wrap_text<M: TextMeasurer + ?Sized>(
    measurer: &M,
    text: &str,
    max_width: f32,
    font: &FontSpec,
) -> Vec<String> {
    let mut lines = Vec::with_capacity(4);
    for paragraph in text.split('\n') {
        wrap_paragraph(measurer, paragraph, max_width, font, &mut lines);
    }
    lines
}

fn wrap_paragraph<M: TextMeasurer + ?Sized>(
    measurer: &M,
    paragraph: &str,
    max_width: f32,
    font: &FontSpec,
    lines: &mut Vec<String>,
) {
    let mut line = String::new();
    for token in break_tokens(paragraph) {
        if line.is_empty() {
            place_token(measurer, token.trim_start(), max_width, font, &mut line, lines);
            continue;
        }
        let mut candidate = String::with_capacity(line.len() + token.len());
        candidate.push_str(&line);
        candidate.push_str(token);
        if measurer.measure_text_mm(candidate.trim_end(), font) <= max_width {
            line = candidate;
        } else {
            lines.push(line.trim_end().to_string());
            line.clear();
            place_token(measurer, token.trim_start(), max_width, font, &mut line, lines);
        }
    }
    let tail = line.trim_end();
    if !tail.is_empty() {
        lines.push(tail.to_string());
    }
}

/// Start a fresh line with `token`, hard-splitting it if it cannot fit.
fn place_token<M: TextMeasurer + ?Sized>(
    measurer: &M,
    token: &str,
    max_width: f32,
    font: &FontSpec,
    line: &mut String,
    lines: &mut Vec<String>,
) {
    if measurer.measure_text_mm(token.trim_end(), font) <= max_width {
        line.push_str(token);
        return;
    }
    for ch in token.chars() {
        line.push(ch);
        if line.chars().count() > 1 && measurer.measure_text_mm(line.trim_end(), font) > max_width {
            line.pop();
            lines.push(line.trim_end().to_string());
            line.clear();
            if !ch.is_whitespace() {
                line.push(ch);
            }
        }
    }
}

/// Split text into break units; each keeps its leading whitespace.
fn break_tokens(text: &str) -> Vec<&str> {
    let mut tokens = Vec::with_capacity(text.len() / 4 + 1);
    let mut start = 0usize;
    let mut prev: Option<char> = None;
    for (idx, ch) in text.char_indices() {
        let boundary = match prev {
            None => false,
            Some(p) => {
                (ch.is_whitespace() && !p.is_whitespace()) || is_wide_glyph(ch) || is_wide_glyph(p)
            }
        };
        if boundary
            && idx > start
            && (!text[start..idx].trim().is_empty() || ch.is_whitespace())
        {
            tokens.push(&text[start..idx]);
            start = idx;
        }
        prev = Some(ch);
    }
    if start < text.len() {
        tokens.push(&text[start..]);
    }
    tokens
}

/// Renderer that records draw commands into [`RenderPage`] values.
pub struct RecordingRenderer {
    pages: Vec<RenderPage>,
    measurer: Arc<dyn TextMeasurer>,
}

impl fmt::Debug for RecordingRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingRenderer")
            .field("pages", &self.pages.len())
            .finish_non_exhaustive()
    }
}

impl Default for RecordingRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingRenderer {
    /// Renderer with one open page and the heuristic measurer.
    pub fn new() -> Self {
        Self::with_text_measurer(Arc::new(HeuristicMeasurer))
    }

    /// Renderer using an explicit measurer.
    pub fn with_text_measurer(measurer: Arc<dyn TextMeasurer>) -> Self {
        Self {
            pages: vec![RenderPage::new(1)],
            measurer,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[RenderPage] {
        &self.pages
    }

    /// Consume the renderer and return its pages.
    pub fn finish(self) -> Vec<RenderPage> {
        self.pages
    }

    fn current_page(&mut self) -> Result<&mut RenderPage, RenderError> {
        self.pages
            .last_mut()
            .ok_or_else(|| RenderError::new("RENDER_NO_PAGE", "no open page"))
    }
}

impl PageRenderer for RecordingRenderer {
    fn measure_and_wrap(
        &mut self,
        text: &str,
        max_width: f32,
        font: &FontSpec,
    ) -> Result<Vec<String>, RenderError> {
        if !max_width.is_finite() || max_width <= 0.0 {
            return Err(RenderError::new(
                "RENDER_INVALID_WIDTH",
                format!("wrap width must be positive, got {}", max_width),
            ));
        }
        Ok(wrap_text(self.measurer.as_ref(), text, max_width, font))
    }

    fn draw_text(&mut self, cmd: TextCommand) -> Result<(), RenderError> {
        let layer = cmd.layer;
        self.current_page()?
            .push_command(layer, DrawCommand::Text(cmd));
        Ok(())
    }

    fn draw_rule(&mut self, cmd: RuleCommand) -> Result<(), RenderError> {
        self.current_page()?
            .push_content_command(DrawCommand::Rule(cmd));
        Ok(())
    }

    fn new_page(&mut self) -> Result<(), RenderError> {
        let next = self.pages.len() + 1;
        self.pages.push(RenderPage::new(next));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_ir::{PageLayer, Rgb, TextAlign};

    /// Every glyph is one millimetre wide.
    struct UnitMeasurer;

    impl TextMeasurer for UnitMeasurer {
        fn measure_text_mm(&self, text: &str, _font: &FontSpec) -> f32 {
            text.chars().count() as f32
        }
    }

    fn font(size: f32) -> FontSpec {
        FontSpec::new(Arc::from("helvetica"), size)
    }

    #[test]
    fn wraps_at_spaces_greedily() {
        let lines = wrap_text(&UnitMeasurer, "aaa bbb ccc dddd", 7.0, &font(11.0));
        assert_eq!(lines, vec!["aaa bbb", "ccc", "dddd"]);
    }

    #[test]
    fn splits_overlong_words() {
        let lines = wrap_text(&UnitMeasurer, "abcdefghij xy", 4.0, &font(11.0));
        assert_eq!(lines, vec!["abcd", "efgh", "ij", "xy"]);
    }

    #[test]
    fn breaks_between_wide_glyphs_without_spaces() {
        let lines = wrap_text(&UnitMeasurer, "中文文本排版测试", 3.0, &font(11.0));
        assert_eq!(lines, vec!["中文文", "本排版", "测试"]);
    }

    #[test]
    fn honours_explicit_newlines_and_skips_blank_input() {
        let lines = wrap_text(&UnitMeasurer, "one\ntwo", 50.0, &font(11.0));
        assert_eq!(lines, vec!["one", "two"]);
        assert!(wrap_text(&UnitMeasurer, "   ", 50.0, &font(11.0)).is_empty());
    }

    #[test]
    fn heuristic_widths_scale_with_size_and_script() {
        let m = HeuristicMeasurer;
        let small = m.measure_text_mm("hello", &font(10.0));
        let large = m.measure_text_mm("hello", &font(20.0));
        assert!((large - small * 2.0).abs() < 1e-3);
        let cjk = m.measure_text_mm("中文", &font(10.0));
        assert!((cjk - 2.0 * 10.0 * MM_PER_PT).abs() < 1e-3);
        let bold = m.measure_text_mm("hello", &font(10.0).with_style(FontStyle::Bold));
        assert!(bold > small);
        assert_eq!(m.measure_text_mm("x", &font(-2.0)), 0.0);
    }

    #[test]
    fn recording_renderer_tracks_pages_and_layers() {
        let mut renderer = RecordingRenderer::with_text_measurer(Arc::new(UnitMeasurer));
        let body = font(11.0);
        renderer
            .draw_text(TextCommand {
                text: "line".to_string(),
                x: 20.0,
                y: 30.0,
                align: TextAlign::Left,
                font: body.clone(),
                layer: PageLayer::Content,
            })
            .expect("draw text");
        renderer.new_page().expect("new page");
        renderer
            .draw_text(TextCommand {
                text: "Page 2".to_string(),
                x: 190.0,
                y: 15.0,
                align: TextAlign::Right,
                font: body.with_color(Rgb::gray(150)),
                layer: PageLayer::Chrome,
            })
            .expect("draw header");
        renderer
            .draw_rule(RuleCommand::horizontal(20.0, 190.0, 40.0, Rgb::gray(200)))
            .expect("draw rule");

        let pages = renderer.finish();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].content_lines(), vec!["line"]);
        assert_eq!(pages[1].page_number, 2);
        assert_eq!(pages[1].chrome_lines(), vec!["Page 2"]);
        assert_eq!(pages[1].content_commands.len(), 1);
    }

    #[test]
    fn non_positive_wrap_width_is_an_error() {
        let mut renderer = RecordingRenderer::new();
        let err = renderer
            .measure_and_wrap("text", 0.0, &font(11.0))
            .expect_err("zero width rejected");
        assert_eq!(err.code, "RENDER_INVALID_WIDTH");
    }
}
