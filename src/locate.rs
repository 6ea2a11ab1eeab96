//! Article discovery inside a full page tree.

use serde::{Deserialize, Serialize};

use crate::content_tree::{Selector, TreeNode};

/// Content selectors in priority order.
pub const DEFAULT_CONTENT_SELECTORS: &[&str] = &[
    ".post-content",
    ".article-content",
    ".content",
    ".detail-content",
    "[class*=\"content\"]",
    "article",
    "main",
];

/// Title selectors in priority order.
pub const DEFAULT_TITLE_SELECTORS: &[&str] = &[
    ".post-title",
    ".article-title",
    "h1.title",
    "h1",
    "[class*=\"title\"]",
    ".content-title",
    ".detail-title",
];

/// Title used when the page offers none.
pub const UNTITLED_DOCUMENT: &str = "Untitled document";

/// Selector lists and thresholds for article discovery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticleLocator {
    pub content_selectors: Vec<Selector>,
    pub title_selectors: Vec<Selector>,
    /// A content candidate qualifies when its trimmed text is longer than this.
    pub min_content_chars: usize,
    pub untitled: String,
}

impl Default for ArticleLocator {
    fn default() -> Self {
        Self {
            content_selectors: parse_all(DEFAULT_CONTENT_SELECTORS),
            title_selectors: parse_all(DEFAULT_TITLE_SELECTORS),
            min_content_chars: 100,
            untitled: UNTITLED_DOCUMENT.to_string(),
        }
    }
}

fn parse_all(raw: &[&str]) -> Vec<Selector> {
    raw.iter().filter_map(|s| Selector::parse(s)).collect()
}

/// Where the article title came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TitleSource {
    /// Matched the title selector at this index.
    Selector(usize),
    /// Document `<title>` element.
    DocumentTitle,
    /// No title found.
    Fallback,
}

/// Discovered article root and title.
#[derive(Clone, Debug)]
pub struct LocatedArticle<'a, N> {
    pub title: String,
    pub title_source: TitleSource,
    pub content: &'a N,
    /// Index of the content selector that produced `content`.
    pub content_selector: usize,
}

impl ArticleLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locate article content and title. `None` when no content selector matches.
    pub fn locate<'a, N: TreeNode>(&self, root: &'a N) -> Option<LocatedArticle<'a, N>> {
        let (content_selector, content) = self.find_content(root)?;
        let (title, title_source) = self.find_title(root);
        log::debug!(
            "[locate] content via selector #{} title={:?} ({:?})",
            content_selector,
            title,
            title_source
        );
        Some(LocatedArticle {
            title,
            title_source,
            content,
            content_selector,
        })
    }

    /// First selector whose match holds enough text; otherwise the last selector's match.
    fn find_content<'a, N: TreeNode>(&self, root: &'a N) -> Option<(usize, &'a N)> {
        let mut last = None;
        for (idx, selector) in self.content_selectors.iter().enumerate() {
            let Some(node) = selector.find_first(root) else {
                continue;
            };
            if node.text_content().trim().chars().count() > self.min_content_chars {
                return Some((idx, node));
            }
            last = Some((idx, node));
        }
        last
    }

    fn find_title<N: TreeNode>(&self, root: &N) -> (String, TitleSource) {
        for (idx, selector) in self.title_selectors.iter().enumerate() {
            if let Some(node) = selector.find_first(root) {
                let text = collapse(&node.text_content());
                if !text.is_empty() {
                    return (text, TitleSource::Selector(idx));
                }
            }
        }
        let document_title = Selector::Tag("title".to_string())
            .find_first(root)
            .map(|node| collapse(&node.text_content()))
            .filter(|text| !text.is_empty());
        match document_title {
            Some(text) => (text, TitleSource::DocumentTitle),
            None => (self.untitled.clone(), TitleSource::Fallback),
        }
    }
}

fn collapse(text: &str) -> String {
    crate::extract::collapse_whitespace(text)
}

/// Locate with the default selector lists.
pub fn locate_article<N: TreeNode>(root: &N) -> Option<LocatedArticle<'_, N>> {
    ArticleLocator::default().locate(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_tree::ContentNode;

    fn long_text() -> String {
        "lorem ipsum ".repeat(12)
    }

    #[test]
    fn default_selector_lists_all_parse() {
        let locator = ArticleLocator::default();
        assert_eq!(
            locator.content_selectors.len(),
            DEFAULT_CONTENT_SELECTORS.len()
        );
        assert_eq!(locator.title_selectors.len(), DEFAULT_TITLE_SELECTORS.len());
    }

    #[test]
    fn skips_short_candidates_for_longer_ones() {
        let root = ContentNode::element("body").with_children([
            ContentNode::element("div")
                .with_class("post-content")
                .with_child(ContentNode::text("short")),
            ContentNode::element("div")
                .with_class("article-content")
                .with_child(ContentNode::text(long_text())),
            ContentNode::element_with_text("h1", "Headline"),
        ]);
        let found = locate_article(&root).expect("article");
        assert_eq!(found.content_selector, 1);
        assert_eq!(found.title, "Headline");
        assert_eq!(found.title_source, TitleSource::Selector(3));
    }

    #[test]
    fn falls_back_to_last_matching_selector() {
        let root = ContentNode::element("body")
            .with_child(ContentNode::element("main").with_child(ContentNode::text("tiny")));
        let found = locate_article(&root).expect("article");
        assert_eq!(found.content_selector, 6);
        assert_eq!(found.content.tag.as_deref(), Some("main"));
    }

    #[test]
    fn trailing_misses_keep_earlier_short_match() {
        let root = ContentNode::element("body").with_child(
            ContentNode::element("div")
                .with_class("post-content")
                .with_child(ContentNode::text("short")),
        );
        let found = locate_article(&root).expect("article");
        // `[class*="content"]` is the last selector that matched.
        assert_eq!(found.content_selector, 4);
        assert_eq!(found.content.text_content(), "short");
    }

    #[test]
    fn missing_content_yields_none() {
        let root =
            ContentNode::element("body").with_child(ContentNode::element_with_text("p", "x"));
        assert!(locate_article(&root).is_none());
    }

    #[test]
    fn title_falls_back_to_document_title_then_placeholder() {
        let with_doc_title = ContentNode::element("html").with_children([
            ContentNode::element("head")
                .with_child(ContentNode::element_with_text("title", " Page  Title ")),
            ContentNode::element("article").with_child(ContentNode::text(long_text())),
        ]);
        let found = locate_article(&with_doc_title).expect("article");
        assert_eq!(found.title, "Page Title");
        assert_eq!(found.title_source, TitleSource::DocumentTitle);

        let bare = ContentNode::element("article").with_child(ContentNode::text(long_text()));
        let found = locate_article(&bare).expect("article");
        assert_eq!(found.title, UNTITLED_DOCUMENT);
        assert_eq!(found.title_source, TitleSource::Fallback);
    }
}
