//! Placeholder manifest for browser bundles
//!
//! The browser re-renders placeholders by identifier after the page has
//! loaded. Root placeholders are the page itself and are left out.

use serde::Serialize;

use crate::error::Result;
use crate::registry::ModuleRegistry;

/// A placeholder the browser may re-render
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserPlaceholder {
    pub module_name: String,
    pub name: String,
    pub id: String,
}

/// Every browser-renderable placeholder, in registration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlaceholderManifest {
    pub placeholders: Vec<BrowserPlaceholder>,
}

impl PlaceholderManifest {
    pub fn from_registry(registry: &ModuleRegistry) -> Self {
        let placeholders = registry
            .browser_placeholders()
            .map(|placeholder| BrowserPlaceholder {
                module_name: placeholder.module_name().to_string(),
                name: placeholder.name().to_string(),
                id: placeholder.id(),
            })
            .collect();
        Self { placeholders }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.placeholders.iter().any(|p| p.id == id)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
