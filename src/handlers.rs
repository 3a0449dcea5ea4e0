//! Marker handlers
//!
//! A [`MarkerHandler`] decides what replaces the content of a marker element.
//! [`PlaceholderTransform`] is the handler used for page renders: it resolves
//! identifiers against the module registry and renders the owning module.

use std::sync::Arc;

use futures::Stream;

use crate::context::RenderContext;
use crate::error::{Error, Result};
use crate::renderer::ModuleRenderUnit;
use crate::scanner::TagScanner;
use crate::streaming::splice;
use crate::types::ContentStream;

/// Supplies replacement content for marker elements
pub trait MarkerHandler: Send {
    /// Replacement for the content of the marker identified by `id`, or `None`
    /// to leave the element untouched
    fn resolve(&mut self, id: &str) -> Option<ContentStream>;

    /// Called for markup the scanner passed through because it could not
    /// parse it
    fn malformed(&mut self, _reason: &str) {}
}

impl<F> MarkerHandler for F
where
    F: FnMut(&str) -> Option<ContentStream> + Send,
{
    fn resolve(&mut self, id: &str) -> Option<ContentStream> {
        self(id)
    }
}

/// Resolves marker identifiers to module renders within one page render
///
/// Each resolved placeholder's output is itself spliced by a fresh transform
/// sharing the same context, so placeholders nested in module content are
/// resolved too. A placeholder is rendered at most once per page.
#[derive(Debug, Clone)]
pub struct PlaceholderTransform {
    context: Arc<RenderContext>,
}

impl PlaceholderTransform {
    pub fn new(context: Arc<RenderContext>) -> Self {
        Self { context }
    }

    /// Scanner configured for this render
    pub fn scanner(&self) -> TagScanner {
        let config = self.context.config();
        TagScanner::with_attribute(config.marker_attribute())
            .with_max_tag_length(config.max_tag_length())
    }

    /// Resolve every placeholder marker in `source`
    pub fn transform<S>(self, source: S) -> ContentStream
    where
        S: Stream<Item = Result<String>> + Send + 'static,
    {
        let scanner = self.scanner();
        splice(source, scanner, self)
    }
}

impl MarkerHandler for PlaceholderTransform {
    fn resolve(&mut self, id: &str) -> Option<ContentStream> {
        let registry = self.context.registry();

        let placeholder = match registry.placeholder(id) {
            Some(placeholder) => placeholder.clone(),
            None => {
                tracing::trace!(%id, "marker does not name a placeholder");
                return None;
            }
        };

        // Marked before recursing so nested content cannot resolve it again
        if !self.context.mark_rendered(id) {
            tracing::debug!(%id, "placeholder already rendered, leaving marker as is");
            return None;
        }

        tracing::debug!(%id, module = %placeholder.module_name(), "resolving placeholder");
        let module = registry.module(placeholder.module_name()).cloned();
        let unit = ModuleRenderUnit::new(module, Some(placeholder), Arc::clone(&self.context));

        Some(PlaceholderTransform::new(Arc::clone(&self.context)).transform(unit.render()))
    }

    fn malformed(&mut self, reason: &str) {
        self.context
            .errors()
            .report(&Error::scan_owned(reason.to_string()));
    }
}
