//! Single-pass tag scanner
//!
//! The scanner consumes markup in arbitrary chunks and reports the opening
//! tags that carry the marker attribute. Everything else is reported as text,
//! unchanged and as soon as it is known not to belong to a tag. Only a partial
//! tag at the end of a chunk is held back until the next chunk completes it.
//!
//! The scanner is not an HTML parser. It tracks just enough structure to find
//! where each marker ends: a stack of open elements, quoted attribute values,
//! comments, void elements, and the raw text of `script` and `style`. A marker
//! also ends when an element enclosing it closes, or when it is an `li`, `p`
//! or similar element followed by a sibling of the same name. Markup it
//! cannot make sense of is passed through as text.

use std::mem;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{DEFAULT_MARKER_ATTRIBUTE, DEFAULT_MAX_TAG_LENGTH};

static TAG_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^<(/)?([A-Za-z][A-Za-z0-9:._-]*)").expect("Invalid tag name regex")
});

static ATTRIBUTE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([^\s"'<>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("Invalid attribute regex")
});

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta",
    "param", "source", "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Elements closed by the start tag of a sibling with the same name
const OPTIONAL_END_ELEMENTS: &[&str] = &["dd", "dt", "li", "option", "p", "td", "th", "tr"];

/// An opening tag carrying the marker attribute
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerTag {
    /// Value of the marker attribute
    pub id: String,
    /// Lowercase element name
    pub name: String,
    /// The opening tag exactly as it appeared in the input
    pub raw: String,
    /// Whether the element has no content or close tag
    pub self_closing: bool,
    /// Byte offset in the input immediately after the opening tag
    pub end: usize,
}

/// What the scanner found in the input
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// Input that is not a marker tag, unchanged
    Text(String),
    /// The opening tag of a marker element
    Marker(MarkerTag),
    /// The end of the innermost open marker element: its close tag, or an
    /// empty string when the element was closed implicitly
    MarkerEnd(String),
    /// A tag that could not be parsed; its markup is still reported as text
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ScanState {
    Text,
    TagOpen,
    InTag,
    Comment,
}

#[derive(Debug)]
struct OpenMarker {
    id: String,
    /// Position of the marker element in the open element stack
    element: usize,
}

#[derive(Debug)]
struct ParsedTag {
    name: String,
    closing: bool,
    self_closing: bool,
    id: Option<String>,
}

/// Incremental scanner for marker elements
#[derive(Debug)]
pub struct TagScanner {
    attribute: String,
    max_tag_length: usize,
    state: ScanState,
    position: usize,
    text: String,
    tag: String,
    quote: Option<char>,
    after_equals: bool,
    comment_dashes: u8,
    raw_text: Option<String>,
    elements: Vec<String>,
    open: Vec<OpenMarker>,
    events: Vec<ScanEvent>,
}

impl TagScanner {
    /// Create a scanner matching the `id` attribute
    pub fn new() -> Self {
        Self::with_attribute(DEFAULT_MARKER_ATTRIBUTE)
    }

    /// Create a scanner matching a custom attribute (case-insensitive)
    pub fn with_attribute<S: Into<String>>(attribute: S) -> Self {
        Self {
            attribute: attribute.into(),
            max_tag_length: DEFAULT_MAX_TAG_LENGTH,
            state: ScanState::Text,
            position: 0,
            text: String::new(),
            tag: String::new(),
            quote: None,
            after_equals: false,
            comment_dashes: 0,
            raw_text: None,
            elements: Vec::new(),
            open: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Set the largest partial tag held back before it is passed through
    pub fn with_max_tag_length(mut self, length: usize) -> Self {
        self.max_tag_length = length;
        self
    }

    /// Scan the next chunk of input
    pub fn feed(&mut self, chunk: &str) -> Vec<ScanEvent> {
        for c in chunk.chars() {
            self.advance(c);
        }
        self.flush_text();
        mem::take(&mut self.events)
    }

    /// Signal the end of input
    ///
    /// A tag left incomplete is passed through as text. Each marker still
    /// open is reported as [`ScanEvent::Malformed`], since content after it
    /// may have been dropped.
    pub fn finish(&mut self) -> Vec<ScanEvent> {
        if !self.tag.is_empty() {
            tracing::debug!(length = self.tag.len(), "input ended inside a tag");
            let tag = mem::take(&mut self.tag);
            self.text.push_str(&tag);
        }
        self.state = ScanState::Text;
        self.quote = None;
        self.raw_text = None;
        self.flush_text();

        if !self.open.is_empty() {
            tracing::debug!(open = self.open.len(), "input ended with unclosed markers");
        }
        for marker in self.open.drain(..) {
            self.events.push(ScanEvent::Malformed(format!(
                "marker {} not closed before end of input",
                marker.id
            )));
        }
        self.elements.clear();
        mem::take(&mut self.events)
    }

    /// Number of marker elements whose close tag has not been seen
    pub fn open_markers(&self) -> usize {
        self.open.len()
    }

    fn advance(&mut self, c: char) {
        self.position += c.len_utf8();
        self.step(c);
    }

    fn step(&mut self, c: char) {
        match self.state {
            ScanState::Text => {
                if c == '<' {
                    self.state = ScanState::TagOpen;
                    self.tag.push(c);
                } else {
                    self.text.push(c);
                }
            }
            ScanState::TagOpen => {
                let accepted = if self.raw_text.is_some() {
                    c == '/'
                } else {
                    c.is_ascii_alphabetic() || c == '/' || c == '!'
                };
                if accepted {
                    self.tag.push(c);
                    self.state = ScanState::InTag;
                    self.quote = None;
                    self.after_equals = false;
                } else {
                    // `<` followed by anything else is text; rescan `c` from TEXT
                    let tag = mem::take(&mut self.tag);
                    self.text.push_str(&tag);
                    self.state = ScanState::Text;
                    self.step(c);
                }
            }
            ScanState::InTag => {
                self.tag.push(c);
                if self.tag == "<!--" {
                    let tag = mem::take(&mut self.tag);
                    self.text.push_str(&tag);
                    self.state = ScanState::Comment;
                    self.comment_dashes = 0;
                    return;
                }
                match self.quote {
                    Some(quote) => {
                        if c == quote {
                            self.quote = None;
                            self.after_equals = false;
                        }
                    }
                    None => match c {
                        '>' => {
                            self.complete_tag();
                            return;
                        }
                        '"' | '\'' if self.after_equals => self.quote = Some(c),
                        '=' => self.after_equals = true,
                        c if c.is_whitespace() => {}
                        _ => self.after_equals = false,
                    },
                }
                if self.tag.len() > self.max_tag_length {
                    tracing::debug!(
                        limit = self.max_tag_length,
                        "tag exceeds the length limit, passing it through as text"
                    );
                    self.events.push(ScanEvent::Malformed(format!(
                        "tag longer than {} bytes",
                        self.max_tag_length
                    )));
                    let tag = mem::take(&mut self.tag);
                    self.text.push_str(&tag);
                    self.state = ScanState::Text;
                    self.quote = None;
                }
            }
            ScanState::Comment => {
                self.text.push(c);
                match c {
                    '-' => self.comment_dashes = (self.comment_dashes + 1).min(2),
                    '>' if self.comment_dashes == 2 => self.state = ScanState::Text,
                    _ => self.comment_dashes = 0,
                }
            }
        }
    }

    fn complete_tag(&mut self) {
        self.state = ScanState::Text;
        let raw = mem::take(&mut self.tag);

        if let Some(raw_name) = self.raw_text.clone() {
            match parse_tag(&raw, &self.attribute) {
                Some(tag) if tag.closing && tag.name == raw_name => self.raw_text = None,
                _ => {}
            }
            self.text.push_str(&raw);
            return;
        }

        match parse_tag(&raw, &self.attribute) {
            Some(tag) => self.handle_tag(raw, tag),
            None => self.rescan_literal(raw),
        }
    }

    /// Pass a malformed tag through as text
    ///
    /// Only the part from its last `<` on can start another tag, so that part
    /// alone is scanned again.
    fn rescan_literal(&mut self, raw: String) {
        tracing::trace!(tag = %raw, "malformed tag passed through as text");
        if TAG_NAME_REGEX.is_match(&raw) {
            self.events
                .push(ScanEvent::Malformed(format!("malformed tag {}", raw)));
        }
        match raw[1..].rfind('<').map(|offset| offset + 1) {
            Some(split) => {
                self.text.push_str(&raw[..split]);
                let end = self.position;
                self.position = end - (raw.len() - split);
                for c in raw[split..].chars() {
                    self.advance(c);
                }
                debug_assert_eq!(self.position, end);
            }
            None => self.text.push_str(&raw),
        }
    }

    fn handle_tag(&mut self, raw: String, tag: ParsedTag) {
        if tag.closing {
            match self.elements.iter().rposition(|name| *name == tag.name) {
                Some(index) => self.close_elements(index, Some(raw)),
                None => self.text.push_str(&raw),
            }
            return;
        }

        if self.elements.last() == Some(&tag.name)
            && OPTIONAL_END_ELEMENTS.contains(&tag.name.as_str())
        {
            self.close_elements(self.elements.len() - 1, None);
        }

        let container = !tag.self_closing && !VOID_ELEMENTS.contains(&tag.name.as_str());

        if container && RAW_TEXT_ELEMENTS.contains(&tag.name.as_str()) {
            self.raw_text = Some(tag.name);
            self.text.push_str(&raw);
            return;
        }

        match tag.id.filter(|id| !id.is_empty()) {
            Some(id) => {
                self.flush_text();
                self.events.push(ScanEvent::Marker(MarkerTag {
                    id: id.clone(),
                    name: tag.name.clone(),
                    raw,
                    self_closing: !container,
                    end: self.position,
                }));
                if container {
                    self.open.push(OpenMarker {
                        id,
                        element: self.elements.len(),
                    });
                    self.elements.push(tag.name);
                }
            }
            None => {
                if container {
                    self.elements.push(tag.name);
                }
                self.text.push_str(&raw);
            }
        }
    }

    /// Close the open elements from `index` up, ending the markers among them
    ///
    /// `close_tag` ends the element at `index`; elements above it have no
    /// close tag of their own.
    fn close_elements(&mut self, index: usize, mut close_tag: Option<String>) {
        while let Some(marker) = self.open.last() {
            if marker.element < index {
                break;
            }
            let end = if marker.element == index {
                close_tag.take()
            } else {
                None
            };
            if end.is_none() {
                tracing::trace!(marker = %marker.id, "marker closed implicitly");
            }
            self.open.pop();
            self.flush_text();
            self.events.push(ScanEvent::MarkerEnd(end.unwrap_or_default()));
        }
        self.elements.truncate(index);
        if let Some(close_tag) = close_tag {
            self.text.push_str(&close_tag);
        }
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            let text = mem::take(&mut self.text);
            self.events.push(ScanEvent::Text(text));
        }
    }
}

impl Default for TagScanner {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_tag(raw: &str, attribute: &str) -> Option<ParsedTag> {
    let caps = TAG_NAME_REGEX.captures(raw)?;
    let closing = caps.get(1).is_some();
    let name = caps.get(2)?.as_str().to_ascii_lowercase();
    let name_end = caps.get(0)?.end();

    let body = raw.get(name_end..raw.len().checked_sub(1)?)?;
    if !body.is_empty() && !body.starts_with(|c: char| c.is_whitespace() || c == '/') {
        return None;
    }

    let mut body = body.trim_end();
    let self_closing = body.ends_with('/');
    if self_closing {
        body = &body[..body.len() - 1];
    }

    if closing {
        return body.trim().is_empty().then_some(ParsedTag {
            name,
            closing,
            self_closing: false,
            id: None,
        });
    }

    let separator = |c: char| c.is_whitespace() || c == '/';
    let mut id = None;
    let mut last = 0;
    for attr in ATTRIBUTE_REGEX.captures_iter(body) {
        let whole = attr.get(0)?;
        if !body[last..whole.start()].trim_matches(separator).is_empty() {
            return None;
        }
        last = whole.end();

        if id.is_none() && attr[1].eq_ignore_ascii_case(attribute) {
            id = Some(
                attr.get(2)
                    .or_else(|| attr.get(3))
                    .or_else(|| attr.get(4))
                    .map(|value| value.as_str().to_string())
                    .unwrap_or_default(),
            );
        }
    }
    if !body[last..].trim_matches(separator).is_empty() {
        return None;
    }

    Some(ParsedTag {
        name,
        closing,
        self_closing,
        id,
    })
}
