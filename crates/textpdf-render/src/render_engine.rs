use chrono::NaiveDate;
use core::fmt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use textpdf::{
    output_file_name, parse_html_with, ArticleLocator, ContentBlock, ContentExtractor,
    ContentStats, FontFetcher, FontHandle, FontResolution, FontResolver, FontSource,
    HtmlParseOptions, TreeNode, DEFAULT_FONT_NAME,
};

use crate::progress::{ProgressEvent, ProgressReporter, ProgressStage};
use crate::render_ir::RenderPage;
use crate::render_layout::{
    LayoutConfig, LayoutDocument, LayoutEngine, LayoutError, LayoutSummary,
};
use crate::renderer::{HeuristicMeasurer, PageRenderer, RecordingRenderer, TextMeasurer};

/// Conversion options, loadable from JSON with every field optional.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderEngineOptions {
    pub layout: LayoutConfig,
    pub locator: ArticleLocator,
    pub html: HtmlParseOptions,
    /// Font sources in priority order.
    pub font_sources: Vec<FontSource>,
    /// Built-in font used when every source fails.
    pub default_font: String,
    /// Date printed in the preamble; today in local time when unset.
    pub generated_on: Option<NaiveDate>,
}

impl Default for RenderEngineOptions {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            locator: ArticleLocator::default(),
            html: HtmlParseOptions::default(),
            font_sources: FontSource::simhei_defaults(),
            default_font: DEFAULT_FONT_NAME.to_string(),
            generated_on: None,
        }
    }
}

/// Errors returned by the conversion pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderEngineError {
    /// No content selector matched the page.
    ContentNotFound,
    /// A renderer primitive failed during layout.
    Layout(LayoutError),
}

impl fmt::Display for RenderEngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContentNotFound => write!(f, "article content not found"),
            Self::Layout(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for RenderEngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ContentNotFound => None,
            Self::Layout(err) => Some(err),
        }
    }
}

impl From<LayoutError> for RenderEngineError {
    fn from(value: LayoutError) -> Self {
        Self::Layout(value)
    }
}

/// Everything one conversion produced.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConversionOutput {
    pub title: String,
    /// Suggested output file name.
    pub file_name: String,
    pub blocks: Vec<ContentBlock>,
    pub stats: ContentStats,
    pub font: FontHandle,
    /// Font resolver reasoning, one entry per attempt.
    pub font_trace: Vec<String>,
    pub summary: LayoutSummary,
    pub pages: Vec<RenderPage>,
}

/// Locate, extract, resolve font, and paginate.
pub struct RenderEngine {
    opts: RenderEngineOptions,
    layout: LayoutEngine,
    resolver: FontResolver,
    measurer: Arc<dyn TextMeasurer>,
    progress: ProgressReporter,
}

impl fmt::Debug for RenderEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderEngine")
            .field("opts", &self.opts)
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}

impl Default for RenderEngine {
    fn default() -> Self {
        Self::new(RenderEngineOptions::default())
    }
}

impl RenderEngine {
    pub fn new(opts: RenderEngineOptions) -> Self {
        let resolver = FontResolver::new(opts.font_sources.clone())
            .with_default_font(opts.default_font.clone());
        Self {
            layout: LayoutEngine::new(opts.layout.clone()),
            resolver,
            measurer: Arc::new(HeuristicMeasurer),
            progress: ProgressReporter::none(),
            opts,
        }
    }

    pub fn options(&self) -> &RenderEngineOptions {
        &self.opts
    }

    /// Replace the font fallback chain built from the options.
    pub fn with_font_resolver(mut self, resolver: FontResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replace the width measurer used by [`RenderEngine::convert_html`].
    pub fn with_text_measurer(mut self, measurer: Arc<dyn TextMeasurer>) -> Self {
        self.measurer = measurer;
        self
    }

    /// Register or replace the progress sink.
    pub fn set_progress_sink<F>(&mut self, sink: F)
    where
        F: FnMut(ProgressEvent) + Send + 'static,
    {
        self.progress = ProgressReporter::from_fn(sink);
    }

    pub fn set_progress_reporter(&mut self, reporter: ProgressReporter) {
        self.progress = reporter;
    }

    /// Convert raw page markup.
    pub fn convert_html<F: FontFetcher + ?Sized>(
        &self,
        bytes: &[u8],
        fetcher: &mut F,
    ) -> Result<ConversionOutput, RenderEngineError> {
        let root = parse_html_with(bytes, self.opts.html);
        self.convert_tree(&root, fetcher)
    }

    /// Convert an already parsed page tree.
    pub fn convert_tree<N, F>(
        &self,
        root: &N,
        fetcher: &mut F,
    ) -> Result<ConversionOutput, RenderEngineError>
    where
        N: TreeNode,
        F: FontFetcher + ?Sized,
    {
        self.progress.stage(ProgressStage::Locating);
        let Some(article) = self.opts.locator.locate(root) else {
            log::warn!("[engine] no content selector matched");
            return Err(RenderEngineError::ContentNotFound);
        };

        self.progress.stage(ProgressStage::Extracting);
        let blocks = ContentExtractor::new().extract(article.content);
        let stats = ContentStats::from_blocks(&blocks);
        log::info!(
            "[engine] extracted {} blocks ({} chars) titled {:?}",
            stats.blocks(),
            stats.total_chars,
            article.title
        );

        self.progress.stage(ProgressStage::Generating);
        let FontResolution {
            handle: font,
            reason_chain: font_trace,
            ..
        } = self.resolver.resolve(fetcher);

        let mut renderer = RecordingRenderer::with_text_measurer(self.measurer.clone());
        let summary = self.render_blocks(&article.title, &blocks, &font, &mut renderer)?;

        self.progress.stage(ProgressStage::Preparing);
        let file_name = output_file_name(&article.title, unix_millis_now());
        let pages = renderer.finish();
        log::info!(
            "[engine] laid out {} pages with font '{}' -> {}",
            summary.page_count,
            font.canonical_name,
            file_name
        );
        self.progress.stage(ProgressStage::Done);

        Ok(ConversionOutput {
            title: article.title,
            file_name,
            blocks,
            stats,
            font,
            font_trace,
            summary,
            pages,
        })
    }

    /// Paginate pre-extracted blocks into any renderer.
    pub fn render_blocks<R: PageRenderer + ?Sized>(
        &self,
        title: &str,
        blocks: &[ContentBlock],
        font: &FontHandle,
        renderer: &mut R,
    ) -> Result<LayoutSummary, LayoutError> {
        let doc = LayoutDocument {
            title,
            generated_on: self.generated_on(),
            blocks,
        };
        self.layout.layout(&doc, font, renderer, &self.progress)
    }

    fn generated_on(&self) -> NaiveDate {
        self.opts
            .generated_on
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

fn unix_millis_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}
