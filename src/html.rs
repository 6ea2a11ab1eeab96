//! Tolerant HTML/XHTML front end producing a [`ContentNode`] tree.
//!
//! Parsing never fails. Tokenizer errors are logged and whatever was built
//! up to that point is returned, with open elements closed implicitly.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde::{Deserialize, Serialize};

use crate::content_tree::{ContentNode, NodeKind};

/// Parser limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HtmlParseOptions {
    /// Elements nested deeper than this are flattened into their ancestor.
    pub max_depth: usize,
    /// Skip `script`/`style` bodies while tokenizing.
    pub skip_raw_text: bool,
}

impl Default for HtmlParseOptions {
    fn default() -> Self {
        Self {
            max_depth: 256,
            skip_raw_text: true,
        }
    }
}

/// Elements that never have children in HTML.
fn is_void_tag(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

fn is_raw_text_tag(tag: &str) -> bool {
    matches!(tag, "script" | "style")
}

/// Parse markup with default options.
pub fn parse_html(bytes: &[u8]) -> ContentNode {
    parse_html_with(bytes, HtmlParseOptions::default())
}

/// Parse markup into a fragment root whose children are the top-level nodes.
pub fn parse_html_with(bytes: &[u8], options: HtmlParseOptions) -> ContentNode {
    let input = escape_stray_lt(bytes);
    let mut reader = Reader::from_reader(input.as_ref());
    {
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.allow_dangling_amp = true;
    }
    let mut buf = Vec::with_capacity(64);
    let mut skip_buf = Vec::new();
    let mut builder = TreeBuilder::new(options.max_depth);

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if let Some(tag) = decode_tag_name(&reader, e.name().as_ref()) {
                    let node = element_from_start(&reader, &tag, &e);
                    if is_void_tag(&tag) {
                        builder.append(node);
                    } else if options.skip_raw_text && is_raw_text_tag(&tag) {
                        // Keep the element for structure, drop its body.
                        builder.append(node);
                        let end = e.to_end().into_owned();
                        if let Err(err) = reader.read_to_end_into(end.name(), &mut skip_buf) {
                            log::warn!("[html] unterminated <{}>: {}", tag, err);
                            break;
                        }
                        skip_buf.clear();
                    } else {
                        builder.open(node);
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if let Some(tag) = decode_tag_name(&reader, e.name().as_ref()) {
                    let node = element_from_start(&reader, &tag, &e);
                    builder.append(node);
                }
            }
            Ok(Event::End(e)) => {
                if let Some(tag) = decode_tag_name(&reader, e.name().as_ref()) {
                    builder.close(&tag);
                }
            }
            Ok(Event::Text(e)) => match e.decode() {
                Ok(text) => builder.text(text.as_ref()),
                Err(err) => log::warn!("[html] text decode error: {:?}", err),
            },
            Ok(Event::CData(e)) => match reader.decoder().decode(&e) {
                Ok(text) => builder.text(text.as_ref()),
                Err(err) => log::warn!("[html] cdata decode error: {:?}", err),
            },
            Ok(Event::GeneralRef(e)) => {
                if let Ok(Some(ch)) = e.resolve_char_ref() {
                    let mut tmp = [0u8; 4];
                    builder.text(ch.encode_utf8(&mut tmp));
                } else {
                    match e.decode() {
                        Ok(name) => match named_entity(name.as_ref()) {
                            Some(resolved) => builder.text(resolved),
                            None => builder.text(&format!("&{};", name)),
                        },
                        Err(err) => log::warn!("[html] entity decode error: {:?}", err),
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                log::warn!(
                    "[html] tokenizer error at byte {}: {}; returning partial tree",
                    reader.buffer_position(),
                    err
                );
                break;
            }
        }
        buf.clear();
    }

    builder.finish()
}

/// Whether the byte after `<` starts a tag, end tag, comment, doctype, or PI.
fn opens_markup(next: Option<&u8>) -> bool {
    next.is_some_and(|b| b.is_ascii_alphabetic() || matches!(b, b'/' | b'!' | b'?'))
}

/// Rewrite `<` that cannot open markup (`a < b`, `<3`, `x<=y`) as `&lt;` so it
/// stays in the text stream instead of swallowing the text after it.
fn escape_stray_lt(bytes: &[u8]) -> Cow<'_, [u8]> {
    let is_stray = |idx: usize, b: u8| b == b'<' && !opens_markup(bytes.get(idx + 1));
    let Some(first) = bytes.iter().enumerate().position(|(idx, &b)| is_stray(idx, b)) else {
        return Cow::Borrowed(bytes);
    };
    let mut out = Vec::with_capacity(bytes.len() + 16);
    out.extend_from_slice(&bytes[..first]);
    for (idx, &b) in bytes.iter().enumerate().skip(first) {
        if is_stray(idx, b) {
            out.extend_from_slice(b"&lt;");
        } else {
            out.push(b);
        }
    }
    Cow::Owned(out)
}

fn decode_tag_name(reader: &Reader<&[u8]>, raw: &[u8]) -> Option<String> {
    let decoded = reader.decoder().decode(raw).ok()?;
    let local_name = decoded.rsplit(':').next().unwrap_or(decoded.as_ref());
    Some(local_name.to_ascii_lowercase())
}

fn element_from_start(reader: &Reader<&[u8]>, tag: &str, e: &BytesStart<'_>) -> ContentNode {
    let mut node = ContentNode::element(tag);
    for attr in e.html_attributes().flatten() {
        let key = match reader.decoder().decode(attr.key.as_ref()) {
            Ok(v) => v.to_ascii_lowercase(),
            Err(_) => continue,
        };
        if key != "class" {
            continue;
        }
        let val = match reader.decoder().decode(&attr.value) {
            Ok(v) => v.to_string(),
            Err(_) => continue,
        };
        node.classes = val.split_whitespace().map(str::to_string).collect();
    }
    node
}

fn named_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        "ensp" => "\u{2002}",
        "emsp" => "\u{2003}",
        "thinsp" => "\u{2009}",
        "mdash" => "\u{2014}",
        "ndash" => "\u{2013}",
        "hellip" => "\u{2026}",
        "middot" => "\u{b7}",
        "bull" => "\u{2022}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "trade" => "\u{2122}",
        "laquo" => "\u{ab}",
        "raquo" => "\u{bb}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "times" => "\u{d7}",
        "deg" => "\u{b0}",
        _ => return None,
    })
}

/// Open-element stack. `stack[0]` is the fragment root.
struct TreeBuilder {
    stack: Vec<ContentNode>,
    max_depth: usize,
    /// Elements ignored past `max_depth`, by tag, so their end tags are swallowed.
    flattened: Vec<String>,
}

impl TreeBuilder {
    fn new(max_depth: usize) -> Self {
        let mut stack = Vec::with_capacity(32);
        stack.push(ContentNode::fragment());
        Self {
            stack,
            max_depth,
            flattened: Vec::new(),
        }
    }

    fn current(&mut self) -> &mut ContentNode {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn append(&mut self, node: ContentNode) {
        self.current().children.push(node);
    }

    fn open(&mut self, node: ContentNode) {
        if self.stack.len() > self.max_depth {
            if let Some(tag) = node.tag.clone() {
                self.flattened.push(tag);
            }
            return;
        }
        self.stack.push(node);
    }

    /// Close the nearest open element named `tag`; stray end tags are ignored.
    fn close(&mut self, tag: &str) {
        if self.flattened.last().is_some_and(|t| t == tag) {
            self.flattened.pop();
            return;
        }
        let Some(pos) = self
            .stack
            .iter()
            .rposition(|node| node.tag.as_deref() == Some(tag))
        else {
            log::debug!("[html] ignoring stray </{}>", tag);
            return;
        };
        if pos == 0 {
            return;
        }
        while self.stack.len() > pos {
            self.pop_into_parent();
        }
    }

    fn pop_into_parent(&mut self) {
        if self.stack.len() <= 1 {
            return;
        }
        if let Some(node) = self.stack.pop() {
            self.current().children.push(node);
        }
    }

    fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let current = self.current();
        if let Some(last) = current.children.last_mut() {
            if last.kind == NodeKind::Text {
                last.text.push_str(text);
                return;
            }
        }
        current.children.push(ContentNode::text(text));
    }

    fn finish(mut self) -> ContentNode {
        while self.stack.len() > 1 {
            self.pop_into_parent();
        }
        self.stack.pop().unwrap_or_default()
    }
}
