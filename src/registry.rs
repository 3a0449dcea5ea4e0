//! Module and placeholder registry
//!
//! Modules are discovered elsewhere and registered here before a render
//! begins. The registry indexes every placeholder by its composite identifier,
//! which is what marker elements carry in markup.

use std::fmt;
use std::sync::Arc;

use futures::stream;
use indexmap::IndexMap;

use crate::error::{BoxError, Error, Result};
use crate::module::Module;
use crate::types::{ContentStream, IDENTIFIER_SEPARATOR};
use crate::utils::{is_error_placeholder, is_root_placeholder, join_module_and_placeholder};

/// Producer of a placeholder's rendered content
///
/// Every call returns a fresh single-use stream. Failing to produce one is
/// reported as a template failure.
pub trait TemplateSource: Send + Sync {
    fn stream(&self) -> std::result::Result<ContentStream, BoxError>;
}

impl<F> TemplateSource for F
where
    F: Fn() -> std::result::Result<ContentStream, BoxError> + Send + Sync,
{
    fn stream(&self) -> std::result::Result<ContentStream, BoxError> {
        self()
    }
}

/// Template whose content is a fixed string, emitted as one chunk
#[derive(Debug, Clone)]
pub struct StaticTemplate {
    content: String,
}

impl StaticTemplate {
    pub fn new<S: Into<String>>(content: S) -> Self {
        Self {
            content: content.into(),
        }
    }
}

impl TemplateSource for StaticTemplate {
    fn stream(&self) -> std::result::Result<ContentStream, BoxError> {
        let chunk = self.content.clone();
        Ok(Box::pin(stream::once(async move { Ok(chunk) })))
    }
}

/// A named template region of a module
#[derive(Clone)]
pub struct PlaceholderDescriptor {
    name: String,
    module_name: String,
    source: Arc<dyn TemplateSource>,
}

impl PlaceholderDescriptor {
    pub fn new<S: Into<String>>(name: S, source: impl TemplateSource + 'static) -> Self {
        Self {
            name: name.into(),
            module_name: String::new(),
            source: Arc::new(source),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Composite identifier of this placeholder
    pub fn id(&self) -> String {
        join_module_and_placeholder(&self.module_name, &self.name).into_owned()
    }

    pub fn is_root(&self) -> bool {
        is_root_placeholder(&self.name)
    }

    /// Open a fresh content stream
    pub fn content(&self) -> std::result::Result<ContentStream, BoxError> {
        self.source.stream()
    }
}

impl fmt::Debug for PlaceholderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaceholderDescriptor")
            .field("name", &self.name)
            .field("module_name", &self.module_name)
            .finish()
    }
}

/// A named module, its render life-cycle and its placeholders
#[derive(Clone)]
pub struct ModuleDescriptor {
    name: String,
    implementation: Arc<dyn Module>,
    placeholders: IndexMap<String, PlaceholderDescriptor>,
    error_placeholder: Option<PlaceholderDescriptor>,
}

impl ModuleDescriptor {
    pub fn new<S: Into<String>>(name: S, implementation: impl Module + 'static) -> Self {
        Self::from_arc(name, Arc::new(implementation))
    }

    pub fn from_arc<S: Into<String>>(name: S, implementation: Arc<dyn Module>) -> Self {
        Self {
            name: name.into(),
            implementation,
            placeholders: IndexMap::new(),
            error_placeholder: None,
        }
    }

    /// Add a placeholder
    ///
    /// A placeholder named `__error` becomes the module's error placeholder.
    pub fn with_placeholder(mut self, mut placeholder: PlaceholderDescriptor) -> Self {
        placeholder.module_name = self.name.clone();
        if is_error_placeholder(&placeholder.name) {
            self.error_placeholder = Some(placeholder);
        } else {
            self.placeholders
                .insert(placeholder.name.clone(), placeholder);
        }
        self
    }

    /// Add a placeholder with static content
    pub fn with_static_placeholder<N: Into<String>, C: Into<String>>(
        self,
        name: N,
        content: C,
    ) -> Self {
        self.with_placeholder(PlaceholderDescriptor::new(name, StaticTemplate::new(content)))
    }

    /// Set the placeholder rendered in place of a failed one
    pub fn with_error_placeholder(self, source: impl TemplateSource + 'static) -> Self {
        self.with_placeholder(PlaceholderDescriptor::new(
            crate::types::ERROR_PLACEHOLDER_NAME,
            source,
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn implementation(&self) -> &Arc<dyn Module> {
        &self.implementation
    }

    pub fn placeholder(&self, name: &str) -> Option<&PlaceholderDescriptor> {
        self.placeholders.get(name)
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &PlaceholderDescriptor> {
        self.placeholders.values()
    }

    pub fn error_placeholder(&self) -> Option<&PlaceholderDescriptor> {
        self.error_placeholder.as_ref()
    }
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.name)
            .field("placeholders", &self.placeholders.keys().collect::<Vec<_>>())
            .field("error_placeholder", &self.error_placeholder.is_some())
            .finish()
    }
}

/// Registry of modules and their placeholders
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: IndexMap<String, Arc<ModuleDescriptor>>,
    placeholders: IndexMap<String, PlaceholderDescriptor>,
}

impl ModuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module and index its placeholders
    pub fn register(&mut self, module: ModuleDescriptor) -> Result<()> {
        if module.name.is_empty() {
            return Err(Error::config_static("module name must not be empty"));
        }
        if module.name.contains(IDENTIFIER_SEPARATOR) {
            return Err(Error::config_owned(format!(
                "module name '{}' must not contain '{}'",
                module.name, IDENTIFIER_SEPARATOR
            )));
        }
        if self.modules.contains_key(&module.name) {
            return Err(Error::config_owned(format!(
                "module '{}' is already registered",
                module.name
            )));
        }

        let mut indexed = Vec::with_capacity(module.placeholders.len());
        for placeholder in module.placeholders.values() {
            if placeholder.name.is_empty() {
                return Err(Error::config_owned(format!(
                    "module '{}' has a placeholder without a name",
                    module.name
                )));
            }
            let id = placeholder.id();
            if self.placeholders.contains_key(&id) {
                return Err(Error::config_owned(format!(
                    "placeholder identifier '{}' is already registered",
                    id
                )));
            }
            indexed.push((id, placeholder.clone()));
        }

        tracing::debug!(
            module = %module.name,
            placeholders = indexed.len(),
            "module registered"
        );
        self.placeholders.extend(indexed);
        self.modules.insert(module.name.clone(), Arc::new(module));
        Ok(())
    }

    /// Builder-style [`ModuleRegistry::register`]
    pub fn with_module(mut self, module: ModuleDescriptor) -> Result<Self> {
        self.register(module)?;
        Ok(self)
    }

    pub fn module(&self, name: &str) -> Option<&Arc<ModuleDescriptor>> {
        self.modules.get(name)
    }

    /// Look up a placeholder by composite identifier
    pub fn placeholder(&self, id: &str) -> Option<&PlaceholderDescriptor> {
        self.placeholders.get(id)
    }

    pub fn contains_placeholder(&self, id: &str) -> bool {
        self.placeholders.contains_key(id)
    }

    /// Composite identifiers of every registered placeholder
    pub fn placeholder_ids(&self) -> impl Iterator<Item = &str> {
        self.placeholders.keys().map(String::as_str)
    }

    /// Placeholders that may be re-rendered in the browser
    ///
    /// Root placeholders are page containers and never leave the server.
    pub fn browser_placeholders(&self) -> impl Iterator<Item = &PlaceholderDescriptor> {
        self.placeholders.values().filter(|p| !p.is_root())
    }

    pub fn modules(&self) -> impl Iterator<Item = &Arc<ModuleDescriptor>> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
