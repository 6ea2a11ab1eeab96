//! Content extraction and font resolution for deterministic text-PDF layout.
//!
//! The crate turns a loosely structured content tree into an ordered sequence
//! of [`ContentBlock`] values and picks the font every later draw call uses.
//! Pagination lives in `textpdf-render`.

#![cfg_attr(
    not(test),
    deny(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

pub mod content_tree;
pub mod error;
pub mod extract;
pub mod file_name;
pub mod fonts;
pub mod html;
pub mod locate;

pub use content_tree::{ContentNode, NodeKind, Selector, TreeNode};
pub use error::{FontError, FontErrorKind};
pub use extract::{collapse_whitespace, BlockKind, ContentBlock, ContentExtractor, ContentStats};
pub use file_name::{output_file_name, sanitize_title};
#[cfg(feature = "http")]
pub use fonts::HttpFontFetcher;
pub use fonts::{
    FontFetcher, FontHandle, FontPayloadFormat, FontResolution, FontResolver, FontSource,
    FontValidator, OfflineFetcher, TtfFontValidator, DEFAULT_FONT_NAME, DEFAULT_FONT_TIMEOUT,
    SIMHEI_FAMILY,
};
pub use html::{parse_html, parse_html_with, HtmlParseOptions};
pub use locate::{locate_article, ArticleLocator, LocatedArticle, TitleSource};
