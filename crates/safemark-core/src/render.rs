use std::borrow::Cow;

use tracing::debug;

use crate::complete::complete_incomplete_tokens_with;
use crate::emit::{DefaultTemplates, Templates, emit_html_with};
use crate::lexer::{Lexer, MarkdownLexer};
use crate::policy::{COMMAND_SCHEME, DATA_SCHEME, SanitizerConfig};
use crate::sanitizer::sanitize;

/// Options for turning Markdown into safe HTML.
#[derive(Clone, Debug, Default)]
pub struct RenderOptions {
    /// Content comes from a trusted source; command links are allowed.
    pub trusted: bool,
    /// Allow `data:` URIs on media attributes.
    pub allow_data_images: bool,
    /// Source may end mid-construct; complete it before emitting.
    pub streaming: bool,
    pub sanitizer: SanitizerConfig,
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trusted(mut self, trusted: bool) -> Self {
        self.trusted = trusted;
        self
    }

    pub fn allow_data_images(mut self, allow: bool) -> Self {
        self.allow_data_images = allow;
        self
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn sanitizer(mut self, sanitizer: SanitizerConfig) -> Self {
        self.sanitizer = sanitizer;
        self
    }
}

/// The caller's sanitizer config with trust and data-image widening applied
/// as augments.
pub fn markdown_sanitizer_config(options: &RenderOptions) -> SanitizerConfig {
    let mut config = options.sanitizer.clone();
    if options.trusted {
        SanitizerConfig::augment_slot(&mut config.allowed_link_protocols, &[COMMAND_SCHEME]);
    }
    if options.allow_data_images {
        SanitizerConfig::augment_slot(&mut config.allowed_media_protocols, &[DATA_SCHEME]);
    }
    config
}

/// Lexes, optionally completes, emits and sanitizes `source`.
pub fn render_markdown(source: &str, options: &RenderOptions) -> String {
    render_markdown_with(&MarkdownLexer, &DefaultTemplates, source, options)
}

pub fn render_markdown_with<L, T>(
    lexer: &L,
    templates: &T,
    source: &str,
    options: &RenderOptions,
) -> String
where
    L: Lexer + ?Sized,
    T: Templates + ?Sized,
{
    let tokens = lexer.lex(source);
    let tokens = if options.streaming {
        complete_incomplete_tokens_with(lexer, &tokens)
    } else {
        Cow::Borrowed(tokens.as_slice())
    };
    let html = emit_html_with(&tokens, templates);
    debug!(
        source_len = source.len(),
        html_len = html.len(),
        streaming = options.streaming,
        "rendered markdown"
    );
    sanitize(&html, &markdown_sanitizer_config(options))
}

#[cfg(test)]
mod tests {
    use super::{RenderOptions, markdown_sanitizer_config, render_markdown};
    use crate::policy::{AllowList, PolicyOverride, SanitizerConfig, SanitizerPolicy};

    #[test]
    fn renders_and_sanitizes() {
        let html = render_markdown(
            "# Hi\n\n[x](javascript:alert(1)) <b onclick=\"y\">b</b>\n",
            &RenderOptions::default(),
        );
        assert_eq!(html, "<h1>Hi</h1>\n<p><a>x</a> <b>b</b></p>\n");
    }

    #[test]
    fn streaming_completes_the_tail() {
        let options = RenderOptions::new().streaming(true);
        assert_eq!(
            render_markdown("some `code", &options),
            "<p>some <code>code</code></p>\n"
        );
    }

    #[test]
    fn trust_widens_link_protocols() {
        let source = "[run](command:workbench.action.reload)";
        assert_eq!(
            render_markdown(source, &RenderOptions::default()),
            "<p><a>run</a></p>\n"
        );
        assert_eq!(
            render_markdown(source, &RenderOptions::new().trusted(true)),
            "<p><a href=\"command:workbench.action.reload\">run</a></p>\n"
        );
    }

    #[test]
    fn widening_augments_caller_overrides() {
        let options = RenderOptions::new()
            .allow_data_images(true)
            .sanitizer(SanitizerConfig {
                allowed_media_protocols: Some(PolicyOverride::replace(AllowList::only(["https"]))),
                ..SanitizerConfig::default()
            });
        let policy = SanitizerPolicy::resolve(&markdown_sanitizer_config(&options));
        assert_eq!(policy.media_protocols, AllowList::only(["https", "data"]));
    }
}
