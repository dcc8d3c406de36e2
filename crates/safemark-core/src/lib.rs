mod complete;
mod config;
mod emit;
mod lexer;
mod policy;
mod protocol;
mod render;
mod sanitizer;
mod token;

pub use complete::{complete_incomplete_tokens, complete_incomplete_tokens_with};
pub use config::{
    ConfigError, ConfigResult, ListConfig, ListValue, RenderConfig, parse_render_options,
};
pub use emit::{
    DefaultTemplates, Templates, emit_html, emit_html_sanitized, emit_html_with, escape_attr,
    escape_html, escape_url_attr,
};
pub use lexer::{Lexer, MarkdownLexer, lex};
pub use policy::{
    AllowList, AttributeHook, COMMAND_SCHEME, DATA_SCHEME, DEFAULT_ATTRIBUTES,
    DEFAULT_LINK_PROTOCOLS, DEFAULT_MEDIA_PROTOCOLS, DEFAULT_TAGS, ElementHook, HookDecision,
    PolicyOverride, SanitizerConfig, SanitizerPolicy, markdown_attribute_policy,
};
pub use protocol::{NEUTRAL_BASE, UriKind, is_allowed_scheme, is_fragment_link, scheme_of, uri_kind};
pub use render::{RenderOptions, markdown_sanitizer_config, render_markdown, render_markdown_with};
pub use sanitizer::{ElementView, HookRegistration, SanitizerEngine, sanitize};
pub use token::{List, ListItem, Table, TableAlign, TableCell, Token, TokenKind, TokenSeq, merge_raw};
