//! Content extraction: content tree -> ordered typed blocks.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::content_tree::{NodeKind, TreeNode};

/// Prefix prepended to every list item's text.
pub const LIST_BULLET: &str = "• ";

/// Characters per estimated output page used by [`ContentStats::estimated_pages`].
pub const CHARS_PER_ESTIMATED_PAGE: usize = 500;

/// Structural block context a text node can belong to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockKind {
    /// `p` / `div`: text accumulates into a paragraph buffer.
    Paragraph,
    /// `li`.
    ListItem,
    /// `h1`..`h6` with level.
    Heading(u8),
    /// `blockquote`.
    Quote,
}

/// Classification of a tag name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TagClass {
    /// Block-context element.
    Block(BlockKind),
    /// Subtree is skipped entirely.
    Pruned,
    /// Any other element; transparent to classification.
    Inline,
}

fn classify_tag(tag: &str) -> TagClass {
    let lower = tag.to_ascii_lowercase();
    match lower.as_str() {
        "p" | "div" => TagClass::Block(BlockKind::Paragraph),
        "li" => TagClass::Block(BlockKind::ListItem),
        "blockquote" => TagClass::Block(BlockKind::Quote),
        "h1" => TagClass::Block(BlockKind::Heading(1)),
        "h2" => TagClass::Block(BlockKind::Heading(2)),
        "h3" => TagClass::Block(BlockKind::Heading(3)),
        "h4" => TagClass::Block(BlockKind::Heading(4)),
        "h5" => TagClass::Block(BlockKind::Heading(5)),
        "h6" => TagClass::Block(BlockKind::Heading(6)),
        "script" | "style" => TagClass::Pruned,
        _ => TagClass::Inline,
    }
}

/// One classified unit of extracted text.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Heading with level `1..=6`.
    Heading { level: u8, text: String },
    /// Paragraph text.
    Paragraph { text: String },
    /// List item text, bullet already prepended.
    ListItem { text: String },
    /// Quotation text.
    Quote { text: String },
}

impl ContentBlock {
    /// Text payload.
    pub fn text(&self) -> &str {
        match self {
            Self::Heading { text, .. }
            | Self::Paragraph { text }
            | Self::ListItem { text }
            | Self::Quote { text } => text,
        }
    }

    /// Block kind of this block.
    pub fn kind(&self) -> BlockKind {
        match self {
            Self::Heading { level, .. } => BlockKind::Heading(*level),
            Self::Paragraph { .. } => BlockKind::Paragraph,
            Self::ListItem { .. } => BlockKind::ListItem,
            Self::Quote { .. } => BlockKind::Quote,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct BlockCtx {
    kind: BlockKind,
    id: usize,
}

/// Inline text buffer awaiting a paragraph flush.
#[derive(Debug, Default)]
struct InlineBuffer {
    text: String,
    /// Block context (`p`/`div` element id) owning the buffer, `None` for loose text.
    owner: Option<usize>,
}

impl InlineBuffer {
    fn push(&mut self, text: &str) {
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(text);
    }

    fn flush<F: FnMut(ContentBlock)>(&mut self, on_block: &mut F) {
        if !self.text.is_empty() {
            on_block(ContentBlock::Paragraph {
                text: core::mem::take(&mut self.text),
            });
        }
        self.owner = None;
    }
}

/// Walks a content tree and emits [`ContentBlock`]s in document order.
///
/// Extraction never fails and keeps no state between calls.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContentExtractor;

impl ContentExtractor {
    /// Create an extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract all blocks into a vector.
    pub fn extract<N: TreeNode>(&self, root: &N) -> Vec<ContentBlock> {
        let mut blocks = Vec::with_capacity(16);
        self.extract_with(root, |block| blocks.push(block));
        blocks
    }

    /// Extract blocks and stream each one via callback.
    pub fn extract_with<N, F>(&self, root: &N, mut on_block: F)
    where
        N: TreeNode,
        F: FnMut(ContentBlock),
    {
        struct Frame<'a, N> {
            children: &'a [N],
            next: usize,
            pushed_ctx: bool,
        }

        let mut buffer = InlineBuffer::default();
        let mut contexts: SmallVec<[BlockCtx; 8]> = SmallVec::new();
        let mut next_ctx_id = 0usize;
        let mut frames: Vec<Frame<'_, N>> = Vec::with_capacity(16);

        match root.kind() {
            NodeKind::Text => {
                handle_text(root, None, &mut buffer, &mut on_block);
            }
            NodeKind::Element => {
                if let Some(pushed_ctx) = enter_element(root, &mut contexts, &mut next_ctx_id) {
                    frames.push(Frame {
                        children: root.children(),
                        next: 0,
                        pushed_ctx,
                    });
                }
            }
        }

        while let Some(frame) = frames.last_mut() {
            let Some(child) = frame.children.get(frame.next) else {
                if frame.pushed_ctx {
                    contexts.pop();
                }
                frames.pop();
                continue;
            };
            frame.next += 1;
            match child.kind() {
                NodeKind::Text => {
                    handle_text(child, contexts.last().copied(), &mut buffer, &mut on_block);
                }
                NodeKind::Element => {
                    if let Some(pushed_ctx) =
                        enter_element(child, &mut contexts, &mut next_ctx_id)
                    {
                        frames.push(Frame {
                            children: child.children(),
                            next: 0,
                            pushed_ctx,
                        });
                    }
                }
            }
        }

        buffer.flush(&mut on_block);
    }
}

/// Push the element's block context if it has one.
///
/// Returns `None` when the subtree is pruned, otherwise whether a context was pushed.
fn enter_element<N: TreeNode>(
    node: &N,
    contexts: &mut SmallVec<[BlockCtx; 8]>,
    next_ctx_id: &mut usize,
) -> Option<bool> {
    let Some(tag) = node.tag_name() else {
        return Some(false);
    };
    match classify_tag(tag) {
        TagClass::Pruned => None,
        TagClass::Inline => Some(false),
        TagClass::Block(kind) => {
            contexts.push(BlockCtx {
                kind,
                id: *next_ctx_id,
            });
            *next_ctx_id += 1;
            Some(true)
        }
    }
}

fn handle_text<N, F>(
    node: &N,
    ctx: Option<BlockCtx>,
    buffer: &mut InlineBuffer,
    on_block: &mut F,
) where
    N: TreeNode,
    F: FnMut(ContentBlock),
{
    let Some(raw) = node.text_value() else {
        return;
    };
    let text = collapse_whitespace(raw);
    if text.is_empty() {
        return;
    }

    let Some(ctx) = ctx else {
        buffer.push(&text);
        return;
    };

    match ctx.kind {
        BlockKind::Heading(level) => {
            buffer.flush(on_block);
            on_block(ContentBlock::Heading { level, text });
        }
        BlockKind::ListItem => {
            buffer.flush(on_block);
            let mut item = String::with_capacity(LIST_BULLET.len() + text.len());
            item.push_str(LIST_BULLET);
            item.push_str(&text);
            on_block(ContentBlock::ListItem { text: item });
        }
        BlockKind::Quote => {
            buffer.flush(on_block);
            on_block(ContentBlock::Quote { text });
        }
        BlockKind::Paragraph => {
            let same_owner = buffer.owner == Some(ctx.id);
            if !same_owner && !buffer.text.is_empty() {
                buffer.flush(on_block);
            }
            buffer.owner = Some(ctx.id);
            buffer.push(&text);
        }
    }
}

/// Collapse whitespace runs to single spaces and trim both ends.
pub fn collapse_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_space = true;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                result.push(' ');
                prev_space = true;
            }
        } else {
            result.push(ch);
            prev_space = false;
        }
    }
    if result.ends_with(' ') {
        result.pop();
    }
    result
}

/// Per-kind block counts and character totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentStats {
    pub paragraphs: usize,
    pub headings: usize,
    pub list_items: usize,
    pub quotes: usize,
    /// Sum of block text lengths in characters.
    pub total_chars: usize,
}

impl ContentStats {
    /// Tally a block sequence.
    pub fn from_blocks(blocks: &[ContentBlock]) -> Self {
        let mut stats = Self::default();
        for block in blocks {
            match block.kind() {
                BlockKind::Paragraph => stats.paragraphs += 1,
                BlockKind::Heading(_) => stats.headings += 1,
                BlockKind::ListItem => stats.list_items += 1,
                BlockKind::Quote => stats.quotes += 1,
            }
            stats.total_chars += block.text().chars().count();
        }
        stats
    }

    /// Total block count.
    pub fn blocks(&self) -> usize {
        self.paragraphs + self.headings + self.list_items + self.quotes
    }

    /// Rough output page estimate shown before layout runs.
    pub fn estimated_pages(&self) -> usize {
        self.total_chars.div_ceil(CHARS_PER_ESTIMATED_PAGE)
    }
}
