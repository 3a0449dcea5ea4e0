//! Core types and configuration
//!
//! This module contains the stream type every stage of a page render speaks,
//! the render configuration, and the reserved placeholder names.
//!
//! # Key Types
//!
//! - [`ContentStream`] - a lazy, single-use stream of markup chunks
//! - [`RenderConfig`] - configuration options for page rendering
//!
//! # Usage
//!
//! ```rust,ignore
//! use html_placeholder::RenderConfig;
//!
//! let config = RenderConfig::server()
//!     .with_release(true)
//!     .with_marker_attribute("id");
//! ```

use futures::stream::BoxStream;
use serde::Deserialize;

use crate::error::{Error, Result};

/// A lazy, single-use, finite stream of markup chunks
///
/// An `Err` item ends the stream. Chunks already yielded are never taken back.
pub type ContentStream = BoxStream<'static, Result<String>>;

/// Name of a module's page-root placeholder
pub const ROOT_PLACEHOLDER_NAME: &str = "__index";

/// Name of a module's error placeholder
pub const ERROR_PLACEHOLDER_NAME: &str = "__error";

/// Separator between module name and placeholder name in identifiers
pub const IDENTIFIER_SEPARATOR: char = '_';

/// Class attribute of the inline side-effect script
///
/// Client bootstrap code finds and removes these scripts by this class.
pub const DEFAULT_SCRIPT_CLASS: &str = "catberry-inline-script";

/// Attribute carrying a marker element's identifier
pub const DEFAULT_MARKER_ATTRIBUTE: &str = "id";

/// Largest partial tag buffered before it is passed through as text
pub const DEFAULT_MAX_TAG_LENGTH: usize = 64 * 1024;

/// Configuration for a page render
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub(crate) release: bool,
    pub(crate) substitute_errors: bool,
    pub(crate) marker_attribute: String,
    pub(crate) script_class: String,
    pub(crate) max_tag_length: usize,
}

impl RenderConfig {
    /// Create a new render configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for full-page server renders
    ///
    /// Module failures are replaced with the module's error placeholder.
    pub fn server() -> Self {
        Self {
            substitute_errors: true,
            ..Self::default()
        }
    }

    /// Configuration that surfaces every module failure as a stream error
    pub fn strict() -> Self {
        Self {
            substitute_errors: false,
            ..Self::default()
        }
    }

    /// Load a configuration from JSON, missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set release mode
    pub fn with_release(mut self, release: bool) -> Self {
        self.release = release;
        self
    }

    /// Enable or disable error placeholder substitution
    pub fn with_error_substitution(mut self, enabled: bool) -> Self {
        self.substitute_errors = enabled;
        self
    }

    /// Set the attribute that identifies marker elements
    pub fn with_marker_attribute<S: Into<String>>(mut self, attribute: S) -> Self {
        self.marker_attribute = attribute.into();
        self
    }

    /// Set the class of emitted inline scripts
    pub fn with_script_class<S: Into<String>>(mut self, class: S) -> Self {
        self.script_class = class.into();
        self
    }

    /// Set the largest partial tag the scanner buffers
    pub fn with_max_tag_length(mut self, length: usize) -> Self {
        self.max_tag_length = length;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.marker_attribute.trim().is_empty() {
            return Err(Error::config_static("marker attribute must not be empty"));
        }
        if self.script_class.contains('"') {
            return Err(Error::config_owned(format!(
                "script class '{}' must not contain quotes",
                self.script_class
            )));
        }
        if self.max_tag_length < 2 {
            return Err(Error::config_static("max tag length is too small"));
        }
        Ok(())
    }

    // Accessors
    pub fn release(&self) -> bool {
        self.release
    }
    pub fn substitute_errors(&self) -> bool {
        self.substitute_errors
    }
    pub fn marker_attribute(&self) -> &str {
        &self.marker_attribute
    }
    pub fn script_class(&self) -> &str {
        &self.script_class
    }
    pub fn max_tag_length(&self) -> usize {
        self.max_tag_length
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            release: false,
            substitute_errors: true,
            marker_attribute: DEFAULT_MARKER_ATTRIBUTE.to_string(),
            script_class: DEFAULT_SCRIPT_CLASS.to_string(),
            max_tag_length: DEFAULT_MAX_TAG_LENGTH,
        }
    }
}
