//! Module render life-cycle and side-effect capture
//!
//! A module renders by mutating state; it never writes markup itself. Anything
//! that has to happen in the browser (cookies, navigation, clearing the URL
//! fragment) is requested through the [`ModuleContext`] handed to
//! [`Module::render`] and recorded in order, to be replayed by the inline
//! script emitted ahead of the module's content.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::cookies::Cookie;
use crate::error::{BoxError, Result};

/// The render life-cycle of a module
///
/// # Examples
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use html_placeholder::{BoxError, Module, ModuleContext};
///
/// struct Login;
///
/// #[async_trait]
/// impl Module for Login {
///     async fn render(&self, context: &mut ModuleContext) -> Result<(), BoxError> {
///         if context.cookie("session").is_empty() {
///             context.redirect("/login");
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Module: Send + Sync {
    /// Prepare state for rendering `context.placeholder()`
    async fn render(&self, context: &mut ModuleContext) -> std::result::Result<(), BoxError>;
}

/// A state change requested during a render call
#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    SetCookie(Cookie),
    Redirect(String),
    ClearHash,
}

/// Side effects of one render call, in call order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SideEffectLog {
    entries: Vec<SideEffect>,
}

impl SideEffectLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, effect: SideEffect) {
        self.entries.push(effect);
    }

    pub fn entries(&self) -> &[SideEffect] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the render call asked to navigate away
    pub fn has_redirect(&self) -> bool {
        self.entries
            .iter()
            .any(|effect| matches!(effect, SideEffect::Redirect(_)))
    }
}

/// Capabilities available to a module while it renders
///
/// A fresh context is created for every render call, so effects recorded here
/// belong to exactly one module and one placeholder.
pub struct ModuleContext {
    module: String,
    placeholder: String,
    release: bool,
    cookies: Arc<IndexMap<String, String>>,
    log: SideEffectLog,
}

impl ModuleContext {
    pub(crate) fn new(
        module: impl Into<String>,
        placeholder: impl Into<String>,
        release: bool,
        cookies: Arc<IndexMap<String, String>>,
    ) -> Self {
        Self {
            module: module.into(),
            placeholder: placeholder.into(),
            release,
            cookies,
            log: SideEffectLog::new(),
        }
    }

    /// Name of the module being rendered
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Name of the placeholder being rendered
    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Whether the application runs in release mode
    pub fn is_release(&self) -> bool {
        self.release
    }

    /// Value of a request cookie, empty when absent
    pub fn cookie(&self, name: &str) -> &str {
        self.cookies.get(name).map(String::as_str).unwrap_or("")
    }

    /// Ask the browser to set a cookie
    pub fn set_cookie(&mut self, cookie: Cookie) -> Result<()> {
        cookie.validate()?;
        tracing::trace!(module = %self.module, key = %cookie.key, "cookie recorded");
        self.log.push(SideEffect::SetCookie(cookie));
        Ok(())
    }

    /// Ask the browser to navigate to `uri`
    ///
    /// The placeholder's content is not rendered once a redirect is recorded.
    pub fn redirect<S: Into<String>>(&mut self, uri: S) {
        let uri = uri.into();
        tracing::trace!(module = %self.module, %uri, "redirect recorded");
        self.log.push(SideEffect::Redirect(uri));
    }

    /// Ask the browser to clear the URL fragment
    pub fn clear_hash(&mut self) {
        tracing::trace!(module = %self.module, "hash clear recorded");
        self.log.push(SideEffect::ClearHash);
    }

    pub(crate) fn into_log(self) -> SideEffectLog {
        self.log
    }
}
