//! Error handling for html-placeholder
//!
//! This module provides the error type shared by every stage of a page render:
//! tag scanning, placeholder resolution, module rendering and template
//! streaming. All errors implement the standard `std::error::Error` trait.
//!
//! # Error Types
//!
//! - [`Error::ModuleNotDefined`] - a render unit was built without a module
//! - [`Error::PlaceholderNotDefined`] - a render unit was built without a placeholder
//! - [`Error::RenderFailure`] - a module's render call failed
//! - [`Error::TemplateFailure`] - a placeholder's content stream failed
//! - [`Error::ScanFailure`] - markup could not be scanned (degrades to pass-through)
//! - [`Error::UpstreamFailure`] - the page source stream failed
//! - [`Error::CookieError`] - a module passed an invalid cookie
//! - [`Error::ConfigError`] - configuration or registry setup is invalid
//! - [`Error::JsonError`] - JSON parsing and serialization errors
//!
//! # Usage
//!
//! Errors travel through the same channel as content: a content stream yields
//! `Result<String>` items and an `Err` item ends the stream.
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use html_placeholder::Error;
//!
//! while let Some(chunk) = page.next().await {
//!     match chunk {
//!         Ok(html) => body.push_str(&html),
//!         Err(Error::RenderFailure { module, .. }) => return internal_error(&module),
//!         Err(err) => return Err(err),
//!     }
//! }
//! ```

use std::borrow::Cow;
use thiserror::Error;

/// Boxed error returned by module and template implementations
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for all html-placeholder operations
#[derive(Error, Debug)]
pub enum Error {
    /// The render unit has no module to render
    #[error("Module not defined")]
    ModuleNotDefined,

    /// The render unit has no placeholder to render
    #[error("Placeholder not defined")]
    PlaceholderNotDefined,

    /// A module's render call returned an error
    ///
    /// Wraps whatever the module implementation failed with. In server mode
    /// this error is recovered with the module's error placeholder and only
    /// reported to the error bus.
    #[error("Render failure in module '{module}' ({placeholder}): {source}")]
    RenderFailure {
        module: String,
        placeholder: String,
        #[source]
        source: BoxError,
    },

    /// A placeholder's content stream could not be created or failed mid-flight
    #[error("Template failure in '{placeholder}': {source}")]
    TemplateFailure {
        placeholder: String,
        #[source]
        source: BoxError,
    },

    /// Markup that could not be scanned
    ///
    /// The scanner never fails a stream with this error; it is reported to the
    /// error bus while the offending fragment is passed through as text.
    #[error("Scan error: {0}")]
    ScanFailure(Cow<'static, str>),

    /// The page source stream failed
    #[error("Upstream error: {0}")]
    UpstreamFailure(#[from] std::io::Error),

    /// Invalid cookie key or value passed to a module context
    #[error("Cookie error: {0}")]
    CookieError(Cow<'static, str>),

    /// Invalid configuration or registry setup
    #[error("Config error: {0}")]
    ConfigError(Cow<'static, str>),

    /// JSON parsing and serialization errors
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl Error {
    /// Wrap a module failure
    pub fn render_failure(
        module: impl Into<String>,
        placeholder: impl Into<String>,
        source: BoxError,
    ) -> Self {
        Error::RenderFailure {
            module: module.into(),
            placeholder: placeholder.into(),
            source,
        }
    }

    /// Wrap a template stream failure
    pub fn template_failure(placeholder: impl Into<String>, source: BoxError) -> Self {
        Error::TemplateFailure {
            placeholder: placeholder.into(),
            source,
        }
    }

    /// Create a scan error with a static string
    pub fn scan_static(msg: &'static str) -> Self {
        Error::ScanFailure(Cow::Borrowed(msg))
    }

    /// Create a scan error with an owned string
    pub fn scan_owned(msg: String) -> Self {
        Error::ScanFailure(Cow::Owned(msg))
    }

    /// Create a cookie error with a static string
    pub fn cookie_static(msg: &'static str) -> Self {
        Error::CookieError(Cow::Borrowed(msg))
    }

    /// Create a cookie error with an owned string
    pub fn cookie_owned(msg: String) -> Self {
        Error::CookieError(Cow::Owned(msg))
    }

    /// Create a config error with a static string
    pub fn config_static(msg: &'static str) -> Self {
        Error::ConfigError(Cow::Borrowed(msg))
    }

    /// Create a config error with an owned string
    pub fn config_owned(msg: String) -> Self {
        Error::ConfigError(Cow::Owned(msg))
    }

    /// Create an upstream IO error from a message
    ///
    /// For more specific IO errors, use the standard `std::io::Error`
    /// constructors and let them be converted.
    pub fn upstream(msg: String) -> Self {
        Error::UpstreamFailure(std::io::Error::new(std::io::ErrorKind::Other, msg))
    }

    /// Whether an error placeholder may stand in for this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::RenderFailure { .. })
    }
}

/// Result type alias for html-placeholder operations
pub type Result<T> = std::result::Result<T, Error>;
