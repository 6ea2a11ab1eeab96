use chrono::NaiveDate;
use core::fmt;
use core::fmt::Write as _;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use textpdf::{ContentBlock, FontHandle};

use crate::progress::{ProgressEvent, ProgressReporter};
use crate::render_ir::{
    FontSpec, FontStyle, LayoutCursor, PageGeometry, PageLayer, Rgb, RuleCommand, TextAlign,
    TextCommand,
};
use crate::renderer::{PageRenderer, RenderError};

/// Fallback when the configured date pattern cannot be formatted.
const FALLBACK_DATE_FORMAT: &str = "%Y-%m-%d";

/// Layout configuration for page construction.
///
/// Sizes are points, distances are millimetres.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub geometry: PageGeometry,
    /// Line advance as a multiple of font size.
    pub line_height_ratio: f32,
    /// Gap after each block as a multiple of its line height.
    pub block_gap_ratio: f32,

    /// Baseline of the header line, independent of margins.
    pub header_y: f32,
    pub header_font_size: f32,
    pub header_color: Rgb,
    /// Title characters kept in the header before `...`.
    pub header_title_max_chars: usize,
    /// Prefix of the right-aligned page label.
    pub page_label: String,

    pub title_font_size: f32,
    /// Advance after each title line.
    pub title_line_advance: f32,
    /// Gap between the title and the divider.
    pub title_rule_gap: f32,
    pub rule_color: Rgb,
    /// Gap between the divider and the date line.
    pub rule_date_gap: f32,
    pub date_font_size: f32,
    pub date_color: Rgb,
    pub date_label: String,
    /// `chrono` strftime pattern for the generation date.
    pub date_format: String,
    /// Gap between the date line and the first body block.
    pub date_body_gap: f32,

    /// Heading size is `heading_base_size - heading_size_step * (level - 1)`, unclamped.
    pub heading_base_size: f32,
    pub heading_size_step: f32,
    /// Headings break the page early unless `size * ratio` still fits.
    pub heading_keep_ahead_ratio: f32,
    pub paragraph_font_size: f32,
    pub list_font_size: f32,
    pub list_indent: f32,
    pub quote_font_size: f32,
    pub quote_indent: f32,
    pub quote_color: Rgb,
    pub quote_open: String,
    pub quote_close: String,

    pub footer_text: String,
    pub footer_font_size: f32,
    pub footer_color: Rgb,
    /// Footer baseline offset below the bottom margin line.
    pub footer_offset: f32,

    /// Emit a progress event after this many blocks; `0` disables.
    pub progress_every_blocks: usize,
}

impl LayoutConfig {
    /// Default typography on explicit page geometry.
    pub fn for_geometry(geometry: PageGeometry) -> Self {
        Self {
            geometry,
            ..Self::default()
        }
    }

    /// Heading size for `level`. Deep levels may reach zero or below.
    pub fn heading_font_size(&self, level: u8) -> f32 {
        self.heading_base_size - self.heading_size_step * (f32::from(level) - 1.0)
    }

    pub fn line_height(&self, font_size: f32) -> f32 {
        font_size * self.line_height_ratio
    }

    /// Typography for a block.
    pub fn block_style(&self, block: &ContentBlock) -> BlockStyle {
        match block {
            ContentBlock::Heading { level, .. } => BlockStyle {
                font_size: self.heading_font_size(*level),
                style: FontStyle::Bold,
                indent: 0.0,
                color: Rgb::BLACK,
            },
            ContentBlock::Paragraph { .. } => BlockStyle {
                font_size: self.paragraph_font_size,
                style: FontStyle::Normal,
                indent: 0.0,
                color: Rgb::BLACK,
            },
            ContentBlock::ListItem { .. } => BlockStyle {
                font_size: self.list_font_size,
                style: FontStyle::Normal,
                indent: self.list_indent,
                color: Rgb::BLACK,
            },
            ContentBlock::Quote { .. } => BlockStyle {
                font_size: self.quote_font_size,
                style: FontStyle::Italic,
                indent: self.quote_indent,
                color: self.quote_color,
            },
        }
    }

    /// Header title: first `header_title_max_chars` characters, `...` when cut.
    pub fn header_title(&self, title: &str) -> String {
        let mut chars = title.chars();
        let mut out: String = chars.by_ref().take(self.header_title_max_chars).collect();
        if chars.next().is_some() {
            out.push_str("...");
        }
        out
    }

    /// Generation-date line text.
    pub fn date_line(&self, date: NaiveDate) -> String {
        let mut out = self.date_label.clone();
        let prefix_len = out.len();
        if write!(out, "{}", date.format(&self.date_format)).is_err() {
            log::warn!(
                "[layout] invalid date format {:?}; using {}",
                self.date_format,
                FALLBACK_DATE_FORMAT
            );
            out.truncate(prefix_len);
            let _ = write!(out, "{}", date.format(FALLBACK_DATE_FORMAT));
        }
        out
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            geometry: PageGeometry::a4_portrait(),
            line_height_ratio: 0.5,
            block_gap_ratio: 0.5,
            header_y: 15.0,
            header_font_size: 10.0,
            header_color: Rgb::gray(150),
            header_title_max_chars: 50,
            page_label: "Page ".to_string(),
            title_font_size: 18.0,
            title_line_advance: 10.0,
            title_rule_gap: 5.0,
            rule_color: Rgb::gray(200),
            rule_date_gap: 10.0,
            date_font_size: 10.0,
            date_color: Rgb::gray(100),
            date_label: "Generated: ".to_string(),
            date_format: "%Y/%-m/%-d".to_string(),
            date_body_gap: 15.0,
            heading_base_size: 16.0,
            heading_size_step: 2.0,
            heading_keep_ahead_ratio: 0.8,
            paragraph_font_size: 11.0,
            list_font_size: 11.0,
            list_indent: 5.0,
            quote_font_size: 10.0,
            quote_indent: 10.0,
            quote_color: Rgb::gray(80),
            quote_open: "\u{300c}".to_string(),
            quote_close: "\u{300d}".to_string(),
            footer_text: "Generated by textpdf".to_string(),
            footer_font_size: 8.0,
            footer_color: Rgb::gray(150),
            footer_offset: 10.0,
            progress_every_blocks: 10,
        }
    }
}

/// Resolved typography for one block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlockStyle {
    pub font_size: f32,
    pub style: FontStyle,
    pub indent: f32,
    pub color: Rgb,
}

/// Paginator state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutPhase {
    AwaitingBlock,
    RenderingLine,
    PageBreak,
    Done,
}

/// Input to one layout run.
#[derive(Clone, Copy, Debug)]
pub struct LayoutDocument<'a> {
    pub title: &'a str,
    pub generated_on: NaiveDate,
    pub blocks: &'a [ContentBlock],
}

/// Result of a completed layout run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutSummary {
    /// Final page number, equal to the total page count.
    pub page_count: usize,
    pub blocks_processed: usize,
    /// Body lines placed, excluding preamble and chrome.
    pub lines_placed: usize,
}

/// Terminal layout failure raised by a renderer primitive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayoutError {
    /// 1-based page the failure happened on.
    pub page: usize,
    /// Body block being laid out, `None` during preamble or footer.
    pub block_index: Option<usize>,
    pub source: RenderError,
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layout failed on page {}", self.page)?;
        if let Some(idx) = self.block_index {
            write!(f, " at block {}", idx)?;
        }
        write!(f, ": {}", self.source)
    }
}

impl std::error::Error for LayoutError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Deterministic paginator over content blocks.
#[derive(Clone, Debug, Default)]
pub struct LayoutEngine {
    cfg: LayoutConfig,
}

impl LayoutEngine {
    pub fn new(cfg: LayoutConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.cfg
    }

    /// Lay out `doc` with `font` into `renderer`.
    ///
    /// The renderer must have its first page open. Any renderer failure aborts
    /// the run.
    pub fn layout<R: PageRenderer + ?Sized>(
        &self,
        doc: &LayoutDocument<'_>,
        font: &FontHandle,
        renderer: &mut R,
        progress: &ProgressReporter,
    ) -> Result<LayoutSummary, LayoutError> {
        let mut st = LayoutState {
            cfg: &self.cfg,
            renderer,
            family: Arc::from(font.canonical_name.as_str()),
            header_title: self.cfg.header_title(doc.title),
            cursor: LayoutCursor::start(&self.cfg.geometry),
            phase: LayoutPhase::AwaitingBlock,
            block_index: None,
            lines_placed: 0,
        };

        st.emit_header()?;
        st.emit_preamble(doc.title, doc.generated_on)?;

        let total = doc.blocks.len();
        for (idx, block) in doc.blocks.iter().enumerate() {
            st.block_index = Some(idx);
            st.emit_block(block)?;
            let processed = idx + 1;
            if self.cfg.progress_every_blocks > 0
                && processed % self.cfg.progress_every_blocks == 0
            {
                progress.emit(ProgressEvent::layout(processed, total));
            }
        }
        st.block_index = None;

        st.emit_footer()?;
        st.phase = LayoutPhase::Done;
        let summary = LayoutSummary {
            page_count: st.cursor.page_number(),
            blocks_processed: total,
            lines_placed: st.lines_placed,
        };
        log::debug!(
            "[layout] done: pages={} blocks={} lines={}",
            summary.page_count,
            summary.blocks_processed,
            summary.lines_placed
        );
        Ok(summary)
    }
}

struct LayoutState<'a, R: ?Sized> {
    cfg: &'a LayoutConfig,
    renderer: &'a mut R,
    family: Arc<str>,
    header_title: String,
    cursor: LayoutCursor,
    phase: LayoutPhase,
    block_index: Option<usize>,
    lines_placed: usize,
}

impl<R: PageRenderer + ?Sized> LayoutState<'_, R> {
    fn fail(&self, source: RenderError) -> LayoutError {
        log::warn!(
            "[layout] renderer failed in {:?} on page {}: {}",
            self.phase,
            self.cursor.page_number(),
            source
        );
        LayoutError {
            page: self.cursor.page_number(),
            block_index: self.block_index,
            source,
        }
    }

    fn font(&self, size_pt: f32, style: FontStyle, color: Rgb) -> FontSpec {
        FontSpec::new(self.family.clone(), size_pt)
            .with_style(style)
            .with_color(color)
    }

    fn draw(&mut self, cmd: TextCommand) -> Result<(), LayoutError> {
        self.renderer.draw_text(cmd).map_err(|e| self.fail(e))
    }

    fn wrap(
        &mut self,
        text: &str,
        max_width: f32,
        font: &FontSpec,
    ) -> Result<Vec<String>, LayoutError> {
        self.renderer
            .measure_and_wrap(text, max_width, font)
            .map_err(|e| self.fail(e))
    }

    fn emit_header(&mut self) -> Result<(), LayoutError> {
        let cfg = self.cfg;
        let font = self.font(cfg.header_font_size, FontStyle::Normal, cfg.header_color);
        self.draw(TextCommand {
            text: self.header_title.clone(),
            x: cfg.geometry.margin_left,
            y: cfg.header_y,
            align: TextAlign::Left,
            font: font.clone(),
            layer: PageLayer::Chrome,
        })?;
        self.draw(TextCommand {
            text: format!("{}{}", cfg.page_label, self.cursor.page_number()),
            x: cfg.geometry.width - cfg.geometry.margin_right,
            y: cfg.header_y,
            align: TextAlign::Right,
            font,
            layer: PageLayer::Chrome,
        })
    }

    /// Break the page when `required` more millimetres would cross the bottom margin.
    fn ensure_space(&mut self, required: f32) -> Result<(), LayoutError> {
        if !self.cursor.would_overflow(required, &self.cfg.geometry) {
            return Ok(());
        }
        let previous = self.phase;
        self.phase = LayoutPhase::PageBreak;
        self.renderer.new_page().map_err(|e| self.fail(e))?;
        self.cursor.break_page(&self.cfg.geometry);
        log::debug!(
            "[layout] page break -> page {} (block {:?})",
            self.cursor.page_number(),
            self.block_index
        );
        self.emit_header()?;
        self.phase = previous;
        Ok(())
    }

    fn emit_preamble(&mut self, title: &str, date: chrono::NaiveDate) -> Result<(), LayoutError> {
        let cfg = self.cfg;
        let geometry = cfg.geometry;

        let title_font = self.font(cfg.title_font_size, FontStyle::Bold, Rgb::BLACK);
        for line in self.wrap(title, geometry.content_width(), &title_font)? {
            self.ensure_space(cfg.title_line_advance)?;
            self.draw(TextCommand {
                text: line,
                x: geometry.margin_left,
                y: self.cursor.y,
                align: TextAlign::Left,
                font: title_font.clone(),
                layer: PageLayer::Content,
            })?;
            self.cursor.y += cfg.title_line_advance;
        }

        self.cursor.y += cfg.title_rule_gap;
        self.ensure_space(0.0)?;
        let rule = RuleCommand::horizontal(
            geometry.margin_left,
            geometry.width - geometry.margin_right,
            self.cursor.y,
            cfg.rule_color,
        );
        self.renderer.draw_rule(rule).map_err(|e| self.fail(e))?;
        self.cursor.y += cfg.rule_date_gap;

        let date_font = self.font(cfg.date_font_size, FontStyle::Normal, cfg.date_color);
        self.ensure_space(cfg.line_height(cfg.date_font_size))?;
        self.draw(TextCommand {
            text: cfg.date_line(date),
            x: geometry.margin_left,
            y: self.cursor.y,
            align: TextAlign::Left,
            font: date_font,
            layer: PageLayer::Content,
        })?;
        self.cursor.y += cfg.date_body_gap;
        Ok(())
    }

    fn emit_block(&mut self, block: &ContentBlock) -> Result<(), LayoutError> {
        let cfg = self.cfg;
        self.phase = LayoutPhase::AwaitingBlock;
        let style = cfg.block_style(block);
        if matches!(block, ContentBlock::Heading { .. }) {
            self.ensure_space(style.font_size * cfg.heading_keep_ahead_ratio)?;
        }

        let font = self.font(style.font_size, style.style, style.color);
        let lines = match block {
            ContentBlock::Quote { text } => {
                let quoted = format!("{}{}{}", cfg.quote_open, text, cfg.quote_close);
                self.wrap(&quoted, cfg.geometry.content_width() - style.indent, &font)?
            }
            other => {
                self.wrap(other.text(), cfg.geometry.content_width() - style.indent, &font)?
            }
        };

        let line_height = cfg.line_height(style.font_size);
        let x = cfg.geometry.margin_left + style.indent;
        for line in lines {
            self.phase = LayoutPhase::RenderingLine;
            self.ensure_space(line_height)?;
            self.draw(TextCommand {
                text: line,
                x,
                y: self.cursor.y,
                align: TextAlign::Left,
                font: font.clone(),
                layer: PageLayer::Content,
            })?;
            self.cursor.y += line_height;
            self.lines_placed += 1;
        }
        self.cursor.y += line_height * cfg.block_gap_ratio;
        self.phase = LayoutPhase::AwaitingBlock;
        Ok(())
    }

    /// Centered caption below the bottom margin of the final page.
    fn emit_footer(&mut self) -> Result<(), LayoutError> {
        let cfg = self.cfg;
        let font = self.font(cfg.footer_font_size, FontStyle::Normal, cfg.footer_color);
        self.draw(TextCommand {
            text: cfg.footer_text.clone(),
            x: cfg.geometry.width / 2.0,
            y: cfg.geometry.content_bottom() + cfg.footer_offset,
            align: TextAlign::Center,
            font,
            layer: PageLayer::Chrome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_ir::{DrawCommand, RenderPage};
    use crate::renderer::{RecordingRenderer, TextMeasurer};

    /// One millimetre per glyph regardless of size.
    struct UnitMeasurer;

    impl TextMeasurer for UnitMeasurer {
        fn measure_text_mm(&self, text: &str, _font: &FontSpec) -> f32 {
            text.chars().count() as f32
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).expect("valid date")
    }

    fn run(
        cfg: LayoutConfig,
        title: &str,
        blocks: &[ContentBlock],
    ) -> (LayoutSummary, Vec<RenderPage>) {
        let mut renderer = RecordingRenderer::with_text_measurer(Arc::new(UnitMeasurer));
        let doc = LayoutDocument {
            title,
            generated_on: date(),
            blocks,
        };
        let summary = LayoutEngine::new(cfg)
            .layout(&doc, &FontHandle::default(), &mut renderer, &ProgressReporter::none())
            .expect("layout succeeds");
        (summary, renderer.finish())
    }

    /// Paragraph that wraps to exactly `lines` lines at 170 mm with [`UnitMeasurer`].
    fn paragraph_of_lines(lines: usize) -> ContentBlock {
        let word = "x".repeat(100);
        ContentBlock::Paragraph {
            text: vec![word; lines].join(" "),
        }
    }

    fn text_commands(page: &RenderPage) -> Vec<&TextCommand> {
        page.merged_commands_iter()
            .filter_map(|cmd| match cmd {
                DrawCommand::Text(t) => Some(t),
                DrawCommand::Rule(_) => None,
            })
            .collect()
    }

    #[test]
    fn heading_sizes_follow_unclamped_formula() {
        let cfg = LayoutConfig::default();
        let sizes: Vec<f32> = (1..=6).map(|lvl| cfg.heading_font_size(lvl)).collect();
        assert_eq!(sizes, vec![16.0, 14.0, 12.0, 10.0, 8.0, 6.0]);
        assert_eq!(cfg.heading_font_size(9), 0.0);
        assert!(cfg.heading_font_size(12) < 0.0);
    }

    #[test]
    fn forty_line_paragraph_breaks_exactly_once() {
        let blocks = [paragraph_of_lines(40)];
        let (summary, pages) = run(LayoutConfig::default(), "Short title", &blocks);

        assert_eq!(summary.page_count, 2);
        assert_eq!(pages.len(), 2);
        assert_eq!(summary.lines_placed, 40);
        // Body starts at 65 mm; (272 - 65) / 5.5 leaves room for 37 lines.
        let first_body = pages[0]
            .content_commands
            .iter()
            .filter(|cmd| cmd.text().is_some_and(|t| t.starts_with('x')))
            .count();
        assert_eq!(first_body, 37);
        assert_eq!(pages[1].content_lines().len(), 3);
        assert_eq!(pages[1].chrome_lines()[1], "Page 2");
        let second_first_y = text_commands(&pages[1])
            .into_iter()
            .find(|cmd| cmd.layer == PageLayer::Content)
            .map(|cmd| cmd.y);
        assert_eq!(second_first_y, Some(25.0));
    }

    #[test]
    fn every_page_has_header_and_only_last_has_footer() {
        let blocks: Vec<ContentBlock> = (0..6).map(|_| paragraph_of_lines(20)).collect();
        let (summary, pages) = run(LayoutConfig::default(), "Title", &blocks);
        assert_eq!(summary.page_count, pages.len());
        for (idx, page) in pages.iter().enumerate() {
            let chrome = page.chrome_lines();
            assert_eq!(chrome[0], "Title");
            assert_eq!(chrome[1], format!("Page {}", idx + 1));
            let has_footer = chrome.contains(&"Generated by textpdf");
            assert_eq!(has_footer, idx + 1 == pages.len());
        }
    }

    #[test]
    fn no_command_crosses_bottom_margin_except_footer() {
        let cfg = LayoutConfig::default();
        let bottom = cfg.geometry.content_bottom();
        let mut blocks = vec![ContentBlock::Heading {
            level: 1,
            text: "Intro".to_string(),
        }];
        for i in 0..30 {
            blocks.push(paragraph_of_lines(1 + i % 4));
            blocks.push(ContentBlock::Quote {
                text: "quoted words here".to_string(),
            });
            blocks.push(ContentBlock::ListItem {
                text: "\u{2022} item".to_string(),
            });
        }
        let (_, pages) = run(cfg.clone(), "Bounds", &blocks);
        let mut footer_seen = 0;
        for page in &pages {
            for cmd in page.merged_commands_iter() {
                if let DrawCommand::Text(t) = cmd {
                    if t.align == TextAlign::Center {
                        footer_seen += 1;
                        assert_eq!(t.y, bottom + cfg.footer_offset);
                        continue;
                    }
                }
                assert!(cmd.y() <= bottom, "y={} on page {}", cmd.y(), page.page_number);
            }
        }
        assert_eq!(footer_seen, 1);
    }

    #[test]
    fn page_count_tracks_consumed_height() {
        let cfg = LayoutConfig {
            block_gap_ratio: 0.0,
            ..LayoutConfig::default()
        };
        let lines = 400usize;
        let line_height = cfg.line_height(cfg.paragraph_font_size);
        let blocks = [paragraph_of_lines(lines)];
        let (summary, _) = run(cfg.clone(), "T", &blocks);
        let consumed = lines as f32 * line_height;
        let expected = (consumed / cfg.geometry.content_height()).ceil() as i64;
        assert!((summary.page_count as i64 - expected).abs() <= 1);
    }

    #[test]
    fn block_styles_match_kinds() {
        let blocks = vec![
            ContentBlock::Heading {
                level: 2,
                text: "Sub".to_string(),
            },
            ContentBlock::ListItem {
                text: "\u{2022} A".to_string(),
            },
            ContentBlock::Quote {
                text: "said".to_string(),
            },
        ];
        let (_, pages) = run(LayoutConfig::default(), "T", &blocks);
        let body: Vec<&TextCommand> = text_commands(&pages[0])
            .into_iter()
            .filter(|cmd| cmd.layer == PageLayer::Content)
            .skip(2)
            .collect();
        assert_eq!(body[0].text, "Sub");
        assert_eq!(body[0].font.size_pt, 14.0);
        assert_eq!(body[0].font.style, FontStyle::Bold);
        assert_eq!(body[1].x, 25.0);
        assert_eq!(body[1].font.size_pt, 11.0);
        assert_eq!(body[2].text, "\u{300c}said\u{300d}");
        assert_eq!(body[2].x, 30.0);
        assert_eq!(body[2].font.style, FontStyle::Italic);
        assert_eq!(body[2].font.color, Rgb::gray(80));
        assert!(body.iter().all(|cmd| &*cmd.font.family == "helvetica"));
    }

    #[test]
    fn preamble_places_title_rule_and_date() {
        let (_, pages) = run(LayoutConfig::default(), "Hello", &[]);
        let page = &pages[0];
        assert_eq!(page.content_lines(), vec!["Hello", "Generated: 2026/10/16"]);
        let rule = page
            .content_commands
            .iter()
            .find_map(|cmd| match cmd {
                DrawCommand::Rule(rule) => Some(*rule),
                DrawCommand::Text(_) => None,
            })
            .expect("divider");
        assert_eq!((rule.x1, rule.x2, rule.y1), (20.0, 190.0, 40.0));
        assert_eq!(rule.color, Rgb::gray(200));
    }

    #[test]
    fn header_title_is_truncated_to_fifty_chars() {
        let cfg = LayoutConfig::default();
        let long = "a".repeat(60);
        assert_eq!(cfg.header_title(&long), format!("{}...", "a".repeat(50)));
        assert_eq!(cfg.header_title(&"b".repeat(50)), "b".repeat(50));
        let cjk = "标".repeat(51);
        assert_eq!(cfg.header_title(&cjk).chars().count(), 53);
    }

    #[test]
    fn invalid_date_format_falls_back() {
        let cfg = LayoutConfig {
            date_format: "%Q".to_string(),
            ..LayoutConfig::default()
        };
        assert_eq!(cfg.date_line(date()), "Generated: 2026-10-16");
    }

    #[test]
    fn heading_keep_ahead_moves_heading_to_next_page() {
        // Fill page one so only ~8 mm remain before the bottom margin.
        let cfg = LayoutConfig {
            block_gap_ratio: 0.0,
            ..LayoutConfig::default()
        };
        let blocks = [
            paragraph_of_lines(36),
            ContentBlock::Heading {
                level: 1,
                text: "Next".to_string(),
            },
        ];
        let (_, pages) = run(cfg, "T", &blocks);
        // 65 + 36 * 5.5 = 263; 263 + 12.8 > 272 so the heading starts page two.
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].content_lines(), vec!["Next"]);
    }

    #[test]
    fn progress_emitted_every_ten_blocks() {
        let blocks: Vec<ContentBlock> = (0..25)
            .map(|i| ContentBlock::Paragraph {
                text: format!("p{}", i),
            })
            .collect();
        let (reporter, rx) = ProgressReporter::channel();
        let mut renderer = RecordingRenderer::with_text_measurer(Arc::new(UnitMeasurer));
        let doc = LayoutDocument {
            title: "T",
            generated_on: date(),
            blocks: &blocks,
        };
        LayoutEngine::default()
            .layout(&doc, &FontHandle::default(), &mut renderer, &reporter)
            .expect("layout");
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].status, "Processing content: 10/25");
        assert_eq!(events[0].percent, 54.0);
        assert_eq!(events[1].status, "Processing content: 20/25");
    }

    struct FailingRenderer {
        inner: RecordingRenderer,
        fail_on_page: usize,
    }

    impl PageRenderer for FailingRenderer {
        fn measure_and_wrap(
            &mut self,
            text: &str,
            max_width: f32,
            font: &FontSpec,
        ) -> Result<Vec<String>, RenderError> {
            self.inner.measure_and_wrap(text, max_width, font)
        }

        fn draw_text(&mut self, cmd: TextCommand) -> Result<(), RenderError> {
            if self.inner.page_count() >= self.fail_on_page && cmd.layer == PageLayer::Content {
                return Err(RenderError::new("TEST_FONT_STATE", "font not set"));
            }
            self.inner.draw_text(cmd)
        }

        fn draw_rule(&mut self, cmd: RuleCommand) -> Result<(), RenderError> {
            self.inner.draw_rule(cmd)
        }

        fn new_page(&mut self) -> Result<(), RenderError> {
            self.inner.new_page()
        }
    }

    #[test]
    fn renderer_failure_is_terminal_with_context() {
        let blocks = [paragraph_of_lines(3), paragraph_of_lines(60)];
        let mut renderer = FailingRenderer {
            inner: RecordingRenderer::with_text_measurer(Arc::new(UnitMeasurer)),
            fail_on_page: 2,
        };
        let doc = LayoutDocument {
            title: "T",
            generated_on: date(),
            blocks: &blocks,
        };
        let err = LayoutEngine::default()
            .layout(&doc, &FontHandle::default(), &mut renderer, &ProgressReporter::none())
            .expect_err("renderer failure propagates");
        assert_eq!(err.page, 2);
        assert_eq!(err.block_index, Some(1));
        assert_eq!(err.source.code, "TEST_FONT_STATE");
        assert!(err.to_string().starts_with("layout failed on page 2 at block 1"));
    }

    #[test]
    fn non_positive_heading_size_does_not_crash() {
        let cfg = LayoutConfig {
            heading_base_size: 4.0,
            ..LayoutConfig::default()
        };
        let blocks = [ContentBlock::Heading {
            level: 6,
            text: "tiny".to_string(),
        }];
        let (summary, pages) = run(cfg, "T", &blocks);
        assert_eq!(summary.page_count, 1);
        assert!(pages[0].content_lines().contains(&"tiny"));
    }
}
