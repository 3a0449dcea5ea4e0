//! Streaming placeholder resolution for server-rendered HTML
//!
//! Pages are composed of modules. Markup refers to a module's placeholder with
//! a marker element whose `id` is the placeholder's composite identifier
//! (`module_placeholder`). While the page streams, every marker's content is
//! replaced by the module's rendered placeholder, preceded by an inline script
//! that replays the side effects (cookies, redirects, hash clearing) the
//! module requested during its render call. Resolution is recursive and each
//! placeholder renders at most once per page.
//!
//! # Examples
//!
//! ```rust,ignore
//! use html_placeholder::{ModuleDescriptor, PageRenderer, RenderConfig};
//! use html_placeholder::test_utils::NoopModule;
//!
//! # async fn example() -> html_placeholder::Result<()> {
//! let renderer = PageRenderer::builder()
//!     .with_module(
//!         ModuleDescriptor::new("news", NoopModule)
//!             .with_static_placeholder("feed", "<li>Rust 2024 released</li>"),
//!     )
//!     .with_config(RenderConfig::server())
//!     .build()?;
//!
//! let page = renderer
//!     .render_to_string(r#"<ul id="news_feed">loading</ul>"#)
//!     .await?;
//! assert!(page.ends_with("<li>Rust 2024 released</li></ul>"));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod types;
pub mod utils;
pub mod cookies;
pub mod module;
pub mod registry;
pub mod context;
pub mod scanner;
pub mod streaming;
pub mod handlers;
pub mod renderer;
pub mod builder;
pub mod browser;
#[cfg(feature = "test-utils")]
pub mod test_utils;

// Re-export commonly used types
pub use error::{BoxError, Error, Result};
pub use types::{ContentStream, RenderConfig};
pub use cookies::Cookie;
pub use module::{Module, ModuleContext, SideEffect, SideEffectLog};
pub use registry::{
    ModuleDescriptor, ModuleRegistry, PlaceholderDescriptor, StaticTemplate, TemplateSource,
};
pub use context::{ErrorBus, RenderContext};
pub use scanner::{MarkerTag, ScanEvent, TagScanner};
pub use streaming::{collect_string, decode_utf8, from_chunks, splice};
pub use handlers::{MarkerHandler, PlaceholderTransform};
pub use renderer::{inline_script, ModuleRenderUnit};
pub use builder::{PageRenderer, PageRendererBuilder};
pub use browser::{BrowserPlaceholder, PlaceholderManifest};
