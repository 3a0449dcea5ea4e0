//! Test utilities for page rendering tests
//!
//! HTML comparison helpers, chunked sources for exercising split markup, and
//! small module implementations for building registries in tests.
//!
//! Compiled with the `test-utils` feature, which is on by default. Builds that
//! turn default features off leave out this module and `dom_query`.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dom_query::Document;

use crate::context::ErrorBus;
use crate::error::BoxError;
use crate::module::{Module, ModuleContext};
use crate::streaming::from_chunks;
use crate::types::ContentStream;

/// Normalize HTML for comparison by parsing and re-serializing
///
/// ```
/// use html_placeholder::test_utils::normalize_html;
///
/// let html1 = "<div  id=\"main\" ><p>Hello</p></div>";
/// let html2 = "<div id=\"main\"><p>Hello</p></div>";
///
/// assert_eq!(normalize_html(html1), normalize_html(html2));
/// ```
pub fn normalize_html(html: &str) -> String {
    let doc = Document::from(html);
    doc.html().trim().to_string()
}

/// Assert that two HTML strings are equivalent
///
/// Both sides are normalized first, so differences in tag whitespace do not
/// count.
#[macro_export]
macro_rules! assert_html_eq {
    ($left:expr, $right:expr) => {
        {
            let left_normalized = $crate::test_utils::normalize_html($left);
            let right_normalized = $crate::test_utils::normalize_html($right);

            if left_normalized != right_normalized {
                panic!(
                    "HTML assertion failed\n\nLeft (normalized):\n{}\n\nRight (normalized):\n{}\n\nOriginal left:\n{}\n\nOriginal right:\n{}",
                    left_normalized,
                    right_normalized,
                    $left,
                    $right
                );
            }
        }
    };
    ($left:expr, $right:expr, $($arg:tt)*) => {
        {
            let left_normalized = $crate::test_utils::normalize_html($left);
            let right_normalized = $crate::test_utils::normalize_html($right);

            if left_normalized != right_normalized {
                panic!(
                    "HTML assertion failed: {}\n\nLeft (normalized):\n{}\n\nRight (normalized):\n{}\n\nOriginal left:\n{}\n\nOriginal right:\n{}",
                    format!($($arg)*),
                    left_normalized,
                    right_normalized,
                    $left,
                    $right
                );
            }
        }
    };
}

/// Compare two HTML strings after normalization
pub fn html_eq(html1: &str, html2: &str) -> bool {
    normalize_html(html1) == normalize_html(html2)
}

/// Strip inline side-effect scripts, leaving only the page markup
pub fn without_scripts(html: &str) -> String {
    let mut output = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find("<script") {
        output.push_str(&rest[..start]);
        match rest[start..].find("</script>") {
            Some(end) => rest = &rest[start + end + "</script>".len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    output.push_str(rest);
    output
}

/// Split `text` into chunks of at most `size` bytes, respecting character
/// boundaries
pub fn chunked(text: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if !current.is_empty() && current.len() + ch.len_utf8() > size {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// A content stream over `text` split into chunks of `size` bytes
pub fn chunked_source(text: &str, size: usize) -> ContentStream {
    from_chunks(chunked(text, size))
}

/// Collects the message of every error reported to a bus
#[derive(Debug, Clone, Default)]
pub struct ErrorRecorder {
    messages: Arc<Mutex<Vec<String>>>,
}

impl ErrorRecorder {
    /// Subscribe a new recorder to `bus`
    pub fn attach(bus: &ErrorBus) -> Self {
        let recorder = Self::default();
        let messages = Arc::clone(&recorder.messages);
        bus.subscribe(move |error| {
            if let Ok(mut messages) = messages.lock() {
                messages.push(error.to_string());
            }
        });
        recorder
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A module whose render call does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopModule;

#[async_trait]
impl Module for NoopModule {
    async fn render(&self, _context: &mut ModuleContext) -> Result<(), BoxError> {
        Ok(())
    }
}

/// A module whose render call runs a closure
pub struct FnModule<F> {
    render: F,
}

impl<F> FnModule<F>
where
    F: Fn(&mut ModuleContext) -> Result<(), BoxError> + Send + Sync,
{
    pub fn new(render: F) -> Self {
        Self { render }
    }
}

#[async_trait]
impl<F> Module for FnModule<F>
where
    F: Fn(&mut ModuleContext) -> Result<(), BoxError> + Send + Sync,
{
    async fn render(&self, context: &mut ModuleContext) -> Result<(), BoxError> {
        (self.render)(context)
    }
}
