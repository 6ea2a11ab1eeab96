//! Generic content tree consumed by the extractor.

use serde::{Deserialize, Serialize};

/// Node kind in a content tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Element with an optional tag name and children.
    #[default]
    Element,
    /// Text leaf.
    Text,
}

/// Tree-walkable node.
///
/// The extractor and article locator are generic over this trait so callers can
/// feed their own DOM representation without converting it to [`ContentNode`].
pub trait TreeNode: Sized {
    /// Element or text.
    fn kind(&self) -> NodeKind;

    /// Tag name for element nodes.
    fn tag_name(&self) -> Option<&str>;

    /// Raw text payload for text nodes.
    fn text_value(&self) -> Option<&str>;

    /// Child nodes in document order.
    fn children(&self) -> &[Self];

    /// Class list for element nodes.
    ///
    /// Default is empty; only the article locator reads it.
    fn classes(&self) -> &[String] {
        &[]
    }

    /// Concatenated text of this node and all descendants, in document order.
    fn text_content(&self) -> String {
        let mut out = String::with_capacity(64);
        append_text_content(self, &mut out);
        out
    }
}

/// Pre-order walk over an explicit stack of sibling iterators.
fn append_text_content<N: TreeNode>(node: &N, out: &mut String) {
    if node.kind() == NodeKind::Text {
        if let Some(text) = node.text_value() {
            out.push_str(text);
        }
        return;
    }
    let mut stack: Vec<core::slice::Iter<'_, N>> = Vec::with_capacity(16);
    stack.push(node.children().iter());
    while let Some(siblings) = stack.last_mut() {
        let Some(child) = siblings.next() else {
            stack.pop();
            continue;
        };
        match child.kind() {
            NodeKind::Text => {
                if let Some(text) = child.text_value() {
                    out.push_str(text);
                }
            }
            NodeKind::Element => stack.push(child.children().iter()),
        }
    }
}

/// Owned content tree node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentNode {
    /// Node kind.
    pub kind: NodeKind,
    /// Lowercase tag name for elements.
    pub tag: Option<String>,
    /// Text payload for text nodes (empty for elements).
    pub text: String,
    /// Class list for elements.
    pub classes: Vec<String>,
    /// Children in document order.
    pub children: Vec<ContentNode>,
}

impl ContentNode {
    /// Element node with the given tag.
    pub fn element(tag: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Element,
            tag: Some(tag.into().to_ascii_lowercase()),
            text: String::new(),
            classes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Element node without a tag (document/fragment root).
    pub fn fragment() -> Self {
        Self::default()
    }

    /// Text leaf.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Text,
            tag: None,
            text: text.into(),
            classes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Append a child.
    pub fn with_child(mut self, child: ContentNode) -> Self {
        self.children.push(child);
        self
    }

    /// Append several children.
    pub fn with_children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = ContentNode>,
    {
        self.children.extend(children);
        self
    }

    /// Add a class name.
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// Shorthand for an element wrapping a single text child.
    pub fn element_with_text(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self::element(tag).with_child(Self::text(text))
    }
}

impl TreeNode for ContentNode {
    fn kind(&self) -> NodeKind {
        self.kind
    }

    fn tag_name(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    fn text_value(&self) -> Option<&str> {
        match self.kind {
            NodeKind::Text => Some(self.text.as_str()),
            NodeKind::Element => None,
        }
    }

    fn children(&self) -> &[Self] {
        &self.children
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }
}

/// Minimal element selector used for article discovery.
///
/// Supports the forms `tag`, `.class`, `tag.class`, and `[class*="part"]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selector {
    /// Tag name match.
    Tag(String),
    /// Exact class list membership.
    Class(String),
    /// Tag plus class membership.
    TagWithClass { tag: String, class: String },
    /// Substring match against the space-joined class attribute.
    ClassContains(String),
}

impl Selector {
    /// Parse a selector string. Returns `None` for unsupported forms.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Some(inner) = raw
            .strip_prefix("[class*=")
            .and_then(|rest| rest.strip_suffix(']'))
        {
            let part = inner.trim().trim_matches('"').trim_matches('\'');
            if part.is_empty() {
                return None;
            }
            return Some(Self::ClassContains(part.to_string()));
        }
        if let Some(class) = raw.strip_prefix('.') {
            if class.is_empty() || class.contains(['.', ' ', '[']) {
                return None;
            }
            return Some(Self::Class(class.to_string()));
        }
        if let Some((tag, class)) = raw.split_once('.') {
            if tag.is_empty() || class.is_empty() || class.contains(['.', ' ']) {
                return None;
            }
            return Some(Self::TagWithClass {
                tag: tag.to_ascii_lowercase(),
                class: class.to_string(),
            });
        }
        if raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Some(Self::Tag(raw.to_ascii_lowercase()));
        }
        None
    }

    /// Whether an element node matches.
    pub fn matches<N: TreeNode>(&self, node: &N) -> bool {
        if node.kind() != NodeKind::Element {
            return false;
        }
        let tag_is = |wanted: &str| {
            node.tag_name()
                .is_some_and(|tag| tag.eq_ignore_ascii_case(wanted))
        };
        match self {
            Self::Tag(tag) => tag_is(tag),
            Self::Class(class) => node.classes().iter().any(|c| c == class),
            Self::TagWithClass { tag, class } => {
                tag_is(tag) && node.classes().iter().any(|c| c == class)
            }
            Self::ClassContains(part) => {
                !node.classes().is_empty() && node.classes().join(" ").contains(part.as_str())
            }
        }
    }

    /// First matching node in pre-order document order, including `root`.
    pub fn find_first<'a, N: TreeNode>(&self, root: &'a N) -> Option<&'a N> {
        if self.matches(root) {
            return Some(root);
        }
        let mut stack: Vec<core::slice::Iter<'a, N>> = Vec::with_capacity(16);
        stack.push(root.children().iter());
        while let Some(siblings) = stack.last_mut() {
            let Some(child) = siblings.next() else {
                stack.pop();
                continue;
            };
            if self.matches(child) {
                return Some(child);
            }
            stack.push(child.children().iter());
        }
        None
    }
}
