//! Builder pattern API for constructing page renderers
//!
//! A [`PageRenderer`] owns everything that outlives a single request: the
//! module registry, the render configuration and the error bus. Each call to
//! [`PageRenderer::render`] starts a fresh [`RenderContext`], so the
//! rendered-once bookkeeping never leaks between pages.

use std::sync::Arc;

use futures::{Stream, StreamExt};

use crate::context::{ErrorBus, RenderContext};
use crate::error::Result;
use crate::handlers::PlaceholderTransform;
use crate::registry::{ModuleDescriptor, ModuleRegistry};
use crate::renderer::ModuleRenderUnit;
use crate::streaming::{collect_string, from_chunks};
use crate::types::{ContentStream, RenderConfig};
use crate::utils::split_module_and_placeholder;

/// Builder for constructing [`PageRenderer`] instances
///
/// # Examples
///
/// ```rust,ignore
/// use html_placeholder::{ModuleDescriptor, PageRendererBuilder, RenderConfig};
///
/// let renderer = PageRendererBuilder::new()
///     .with_module(ModuleDescriptor::new("news", News).with_static_placeholder("feed", "..."))
///     .with_config(RenderConfig::server())
///     .build()?;
///
/// let page = renderer.render_to_string(r#"<div id="news_feed"></div>"#).await?;
/// ```
#[derive(Debug, Default)]
pub struct PageRendererBuilder {
    registry: Option<ModuleRegistry>,
    modules: Vec<ModuleDescriptor>,
    config: RenderConfig,
    errors: Option<Arc<ErrorBus>>,
}

impl PageRendererBuilder {
    /// Create a new page renderer builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already populated registry
    pub fn with_registry(mut self, registry: ModuleRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Register a module when the renderer is built
    pub fn with_module(mut self, module: ModuleDescriptor) -> Self {
        self.modules.push(module);
        self
    }

    /// Use a custom render configuration
    pub fn with_config(mut self, config: RenderConfig) -> Self {
        self.config = config;
        self
    }

    /// Report errors to an existing bus instead of a private one
    pub fn with_error_bus(mut self, errors: Arc<ErrorBus>) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Build the renderer
    ///
    /// Fails when the configuration is invalid or a module cannot be
    /// registered.
    pub fn build(self) -> Result<PageRenderer> {
        self.config.validate()?;

        let mut registry = self.registry.unwrap_or_default();
        for module in self.modules {
            registry.register(module)?;
        }

        tracing::debug!(
            modules = registry.len(),
            release = self.config.release(),
            "page renderer built"
        );

        Ok(PageRenderer {
            registry: Arc::new(registry),
            config: Arc::new(self.config),
            errors: self.errors.unwrap_or_default(),
        })
    }
}

/// Renders pages by resolving placeholder markers against a module registry
#[derive(Debug, Clone)]
pub struct PageRenderer {
    registry: Arc<ModuleRegistry>,
    config: Arc<RenderConfig>,
    errors: Arc<ErrorBus>,
}

impl PageRenderer {
    pub fn builder() -> PageRendererBuilder {
        PageRendererBuilder::new()
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Error bus every render reports to
    pub fn errors(&self) -> &Arc<ErrorBus> {
        &self.errors
    }

    fn context(&self, cookie_header: Option<&str>) -> Arc<RenderContext> {
        let context = RenderContext::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.config),
            Arc::clone(&self.errors),
        );
        Arc::new(match cookie_header {
            Some(header) => context.with_cookie_header(header),
            None => context,
        })
    }

    /// Resolve every placeholder marker in a page source
    pub fn render<S>(&self, source: S) -> ContentStream
    where
        S: Stream<Item = Result<String>> + Send + 'static,
    {
        self.render_in(self.context(None), source)
    }

    /// Like [`PageRenderer::render`], exposing the request's `Cookie` header to
    /// modules
    pub fn render_with_cookies<S>(&self, source: S, cookie_header: &str) -> ContentStream
    where
        S: Stream<Item = Result<String>> + Send + 'static,
    {
        self.render_in(self.context(Some(cookie_header)), source)
    }

    fn render_in<S>(&self, context: Arc<RenderContext>, source: S) -> ContentStream
    where
        S: Stream<Item = Result<String>> + Send + 'static,
    {
        let reporter = Arc::clone(&context);
        let source = source.inspect(move |chunk| {
            if let Err(error) = chunk {
                reporter.errors().report(error);
            }
        });
        PlaceholderTransform::new(context).transform(source)
    }

    /// Render a single placeholder, typically a module's page root
    ///
    /// The placeholder counts as rendered, so markers for it inside its own
    /// content are left as they are.
    pub fn render_placeholder(&self, id: &str) -> ContentStream {
        let context = self.context(None);
        let registry = context.registry();

        let (module, placeholder) = match registry.placeholder(id) {
            Some(placeholder) => (
                registry.module(placeholder.module_name()).cloned(),
                Some(placeholder.clone()),
            ),
            None => {
                tracing::debug!(%id, "unknown placeholder requested");
                (None, None)
            }
        };
        if placeholder.is_some() {
            context.mark_rendered(id);
        }

        let module = module.or_else(|| {
            let name = split_module_and_placeholder(id).map_or(id, |(name, _)| name);
            registry.module(name).cloned()
        });

        let unit = ModuleRenderUnit::new(module, placeholder, Arc::clone(&context));
        PlaceholderTransform::new(context).transform(unit.render())
    }

    /// Render a complete page held in memory
    pub async fn render_to_string(&self, source: &str) -> Result<String> {
        collect_string(self.render(from_chunks(vec![source.to_string()]))).await
    }

    /// Render a single placeholder into one string
    pub async fn render_placeholder_to_string(&self, id: &str) -> Result<String> {
        collect_string(self.render_placeholder(id)).await
    }
}
