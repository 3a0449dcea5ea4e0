//! Composite identifier helpers
//!
//! A marker element names the placeholder it stands for with a composite
//! identifier built from the module name and the placeholder name. The same
//! identifier keys the placeholder index and the already-rendered set.

use std::borrow::Cow;

use crate::types::{ERROR_PLACEHOLDER_NAME, IDENTIFIER_SEPARATOR, ROOT_PLACEHOLDER_NAME};

/// Join a module name and a placeholder name into a composite identifier
///
/// The root placeholder of a module is identified by the module name alone.
///
/// # Examples
///
/// ```
/// use html_placeholder::utils::join_module_and_placeholder;
///
/// assert_eq!(join_module_and_placeholder("news", "feed"), "news_feed");
/// assert_eq!(join_module_and_placeholder("news", "__index"), "news");
/// ```
pub fn join_module_and_placeholder<'a>(module: &'a str, placeholder: &str) -> Cow<'a, str> {
    if is_root_placeholder(placeholder) {
        return Cow::Borrowed(module);
    }
    let mut id = String::with_capacity(module.len() + placeholder.len() + 1);
    id.push_str(module);
    id.push(IDENTIFIER_SEPARATOR);
    id.push_str(placeholder);
    Cow::Owned(id)
}

/// Split a composite identifier at its first separator
///
/// Returns `None` for an empty identifier. A missing separator or a trailing
/// separator yields an empty placeholder part.
///
/// # Examples
///
/// ```
/// use html_placeholder::utils::split_module_and_placeholder;
///
/// assert_eq!(
///     split_module_and_placeholder("module-cool_placeholder-nice"),
///     Some(("module-cool", "placeholder-nice"))
/// );
/// assert_eq!(split_module_and_placeholder("some_"), Some(("some", "")));
/// ```
pub fn split_module_and_placeholder(id: &str) -> Option<(&str, &str)> {
    if id.is_empty() {
        return None;
    }
    match id.split_once(IDENTIFIER_SEPARATOR) {
        Some((module, placeholder)) => Some((module, placeholder)),
        None => Some((id, "")),
    }
}

/// Whether a placeholder name denotes a module's page root
pub fn is_root_placeholder(name: &str) -> bool {
    name == ROOT_PLACEHOLDER_NAME
}

/// Whether a placeholder name denotes a module's error placeholder
pub fn is_error_placeholder(name: &str) -> bool {
    name == ERROR_PLACEHOLDER_NAME
}

/// Quote a string as a single-quoted JavaScript literal body
///
/// Values are embedded exactly as given; only the characters that would end
/// the literal or the surrounding script element are escaped.
pub fn js_single_quoted(value: &str) -> Cow<'_, str> {
    if !value.contains(['\\', '\'', '\n', '\r', '<']) {
        return Cow::Borrowed(value);
    }
    let mut escaped = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '<' => escaped.push_str("\\x3C"),
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}
