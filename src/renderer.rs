//! Module render unit
//!
//! A [`ModuleRenderUnit`] renders one placeholder of one module: it runs the
//! module's render call, replays the side effects the call recorded as an
//! inline script, and then streams the placeholder's content. On failure it
//! falls back to the module's error placeholder when error substitution is on.
//!
//! # Output
//!
//! ```text
//! <script class="catberry-inline-script">
//!   if(!window.__cache){window.__cache = {};}
//!   if(!window.__cache['news']){window.__cache['news'] = {};}
//!   window.__cache['news']['feed']={};
//!   window.document.cookie = 'seen=1';
//! </script>
//! ...placeholder content...
//! ```
//!
//! (shown wrapped; the script is emitted on a single line)

use std::sync::Arc;

use async_stream::stream;
use futures::StreamExt;

use crate::context::RenderContext;
use crate::error::Error;
use crate::module::{ModuleContext, SideEffect};
use crate::registry::{ModuleDescriptor, PlaceholderDescriptor};
use crate::types::ContentStream;
use crate::utils::js_single_quoted;

/// Build the inline script that marks a placeholder as rendered and replays
/// side effects in the browser
pub fn inline_script(
    class: &str,
    module: &str,
    placeholder: &str,
    effects: &[SideEffect],
) -> String {
    let module = js_single_quoted(module);
    let placeholder = js_single_quoted(placeholder);

    let mut script = format!(
        "<script class=\"{class}\">\
         if(!window.__cache){{window.__cache = {{}};}}\
         if(!window.__cache['{module}']){{window.__cache['{module}'] = {{}};}}\
         window.__cache['{module}']['{placeholder}']={{}};"
    );

    for effect in effects {
        match effect {
            SideEffect::SetCookie(cookie) => {
                script.push_str("window.document.cookie = '");
                script.push_str(&js_single_quoted(&cookie.to_cookie_string()));
                script.push_str("';");
            }
            SideEffect::Redirect(uri) => {
                script.push_str("window.location.assign('");
                script.push_str(&js_single_quoted(uri));
                script.push_str("');");
            }
            SideEffect::ClearHash => script.push_str("window.location.hash = '';"),
        }
    }

    script.push_str("</script>");
    script
}

/// Renders one placeholder of one module
pub struct ModuleRenderUnit {
    module: Option<Arc<ModuleDescriptor>>,
    placeholder: Option<PlaceholderDescriptor>,
    context: Arc<RenderContext>,
    substitute_errors: bool,
}

impl ModuleRenderUnit {
    /// Create a render unit
    ///
    /// A missing module or placeholder is reported when the output is first
    /// polled, before anything is emitted.
    pub fn new(
        module: Option<Arc<ModuleDescriptor>>,
        placeholder: Option<PlaceholderDescriptor>,
        context: Arc<RenderContext>,
    ) -> Self {
        let substitute_errors = context.config().substitute_errors();
        Self {
            module,
            placeholder,
            context,
            substitute_errors,
        }
    }

    /// Override whether a failed render call falls back to the error placeholder
    pub fn with_error_substitution(mut self, enabled: bool) -> Self {
        self.substitute_errors = enabled;
        self
    }

    /// Run the module's render call and stream the result
    ///
    /// Every error is reported to the context's error bus. Errors recovered
    /// with the error placeholder end the stream normally; all others are
    /// yielded as the last item.
    ///
    /// With error substitution enabled, the error bus is therefore the only
    /// channel on which a recovered failure is observed. Subscribe to it to
    /// see errors the stream itself does not carry.
    pub fn render(self) -> ContentStream {
        let Self {
            module,
            placeholder,
            context,
            substitute_errors,
        } = self;

        Box::pin(stream! {
            let module = match module {
                Some(module) => module,
                None => {
                    let error = Error::ModuleNotDefined;
                    context.errors().report(&error);
                    yield Err(error);
                    return;
                }
            };
            let placeholder = match placeholder {
                Some(placeholder) => placeholder,
                None => {
                    let error = Error::PlaceholderNotDefined;
                    context.errors().report(&error);
                    yield Err(error);
                    return;
                }
            };

            let class = context.config().script_class().to_string();
            tracing::debug!(
                module = %module.name(),
                placeholder = %placeholder.name(),
                "module render started"
            );

            let mut module_context = ModuleContext::new(
                module.name(),
                placeholder.name(),
                context.config().release(),
                context.cookies(),
            );
            let outcome = module
                .implementation()
                .render(&mut module_context)
                .await;
            let log = module_context.into_log();

            let (content, id) = match outcome {
                Ok(()) => {
                    tracing::debug!(
                        module = %module.name(),
                        placeholder = %placeholder.name(),
                        effects = log.len(),
                        "module render finished"
                    );
                    yield Ok(inline_script(&class, module.name(), placeholder.name(), log.entries()));
                    if log.has_redirect() {
                        return;
                    }
                    (placeholder.content(), placeholder.id())
                }
                Err(source) => {
                    let error = Error::render_failure(module.name(), placeholder.name(), source);
                    context.errors().report(&error);

                    match module.error_placeholder().filter(|_| substitute_errors) {
                        Some(fallback) => {
                            tracing::debug!(
                                module = %module.name(),
                                placeholder = %placeholder.name(),
                                "rendering error placeholder"
                            );
                            yield Ok(inline_script(&class, module.name(), placeholder.name(), &[]));
                            (fallback.content(), fallback.id())
                        }
                        None => {
                            yield Err(error);
                            return;
                        }
                    }
                }
            };

            let mut content = match content {
                Ok(content) => content,
                Err(source) => {
                    let error = Error::template_failure(id, source);
                    context.errors().report(&error);
                    yield Err(error);
                    return;
                }
            };

            while let Some(chunk) = content.next().await {
                match chunk {
                    Ok(chunk) => {
                        yield Ok(chunk);
                    }
                    Err(Error::TemplateFailure { placeholder, source }) => {
                        let error = Error::TemplateFailure { placeholder, source };
                        context.errors().report(&error);
                        yield Err(error);
                        return;
                    }
                    Err(other) => {
                        let error = Error::template_failure(id.as_str(), Box::new(other));
                        context.errors().report(&error);
                        yield Err(error);
                        return;
                    }
                }
            }
        })
    }
}
