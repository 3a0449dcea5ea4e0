//! Per-render state shared across nested placeholder resolution
//!
//! One [`RenderContext`] exists per page render. Every nested transform and
//! render unit receives it by reference; the already-rendered set is the only
//! part of it that changes while the page streams.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use indexmap::IndexMap;

use crate::cookies::parse_cookie_header;
use crate::error::Error;
use crate::registry::ModuleRegistry;
use crate::types::RenderConfig;

type Subscriber = Box<dyn Fn(&Error) + Send + Sync>;

/// Sink for render errors, recovered or not
///
/// Reporting never fails and never aborts the render. Every report is also
/// logged through `tracing`.
#[derive(Default)]
pub struct ErrorBus {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl ErrorBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every error reported from now on
    pub fn subscribe<F>(&self, subscriber: F)
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        if let Ok(mut subscribers) = self.subscribers.write() {
            subscribers.push(Box::new(subscriber));
        }
    }

    pub fn report(&self, error: &Error) {
        if error.is_recoverable() {
            tracing::warn!(%error, "render error reported");
        } else {
            tracing::error!(%error, "render error reported");
        }
        if let Ok(subscribers) = self.subscribers.read() {
            for subscriber in subscribers.iter() {
                subscriber(error);
            }
        }
    }
}

impl fmt::Debug for ErrorBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.subscribers.read().map(|s| s.len()).unwrap_or(0);
        f.debug_struct("ErrorBus").field("subscribers", &count).finish()
    }
}

/// State of one page render
#[derive(Debug)]
pub struct RenderContext {
    registry: Arc<ModuleRegistry>,
    config: Arc<RenderConfig>,
    errors: Arc<ErrorBus>,
    cookies: Arc<IndexMap<String, String>>,
    rendered: Mutex<HashSet<String>>,
}

impl RenderContext {
    pub fn new(
        registry: Arc<ModuleRegistry>,
        config: Arc<RenderConfig>,
        errors: Arc<ErrorBus>,
    ) -> Self {
        Self {
            registry,
            config,
            errors,
            cookies: Arc::new(IndexMap::new()),
            rendered: Mutex::new(HashSet::new()),
        }
    }

    /// Expose the request's `Cookie` header to modules
    pub fn with_cookie_header(mut self, header: &str) -> Self {
        self.cookies = Arc::new(parse_cookie_header(header));
        self
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn errors(&self) -> &ErrorBus {
        &self.errors
    }

    pub(crate) fn cookies(&self) -> Arc<IndexMap<String, String>> {
        Arc::clone(&self.cookies)
    }

    /// Mark a placeholder as rendered
    ///
    /// Returns `false` when it was already rendered in this page.
    pub fn mark_rendered(&self, id: &str) -> bool {
        match self.rendered.lock() {
            Ok(mut rendered) => rendered.insert(id.to_string()),
            Err(poisoned) => poisoned.into_inner().insert(id.to_string()),
        }
    }

    pub fn is_rendered(&self, id: &str) -> bool {
        match self.rendered.lock() {
            Ok(rendered) => rendered.contains(id),
            Err(poisoned) => poisoned.into_inner().contains(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> RenderContext {
        RenderContext::new(
            Arc::new(ModuleRegistry::new()),
            Arc::new(RenderConfig::default()),
            Arc::new(ErrorBus::new()),
        )
    }

    #[test]
    fn test_mark_rendered_once() {
        let context = context();
        assert!(!context.is_rendered("news_feed"));
        assert!(context.mark_rendered("news_feed"));
        assert!(!context.mark_rendered("news_feed"));
        assert!(context.is_rendered("news_feed"));
    }

    #[test]
    fn test_error_bus_notifies_subscribers() {
        let bus = ErrorBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(move |error| sink.lock().unwrap().push(error.to_string()));

        bus.report(&Error::ModuleNotDefined);
        assert_eq!(*seen.lock().unwrap(), vec!["Module not defined".to_string()]);
    }

    #[test]
    fn test_cookie_header() {
        let context = context().with_cookie_header("a=1; b=2");
        assert_eq!(context.cookies().get("b").map(String::as_str), Some("2"));
    }
}
