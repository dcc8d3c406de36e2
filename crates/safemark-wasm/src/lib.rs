use std::borrow::Cow;

use safemark_core::{
    DefaultTemplates, RenderConfig, RenderOptions, complete_incomplete_tokens, emit_html_with,
    lex, markdown_sanitizer_config, merge_raw, sanitize,
};
use serde::Serialize;
use wasm_bindgen::prelude::*;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StreamResult {
    html: String,
    /// Whether the tail of the source had to be completed.
    completed: bool,
}

#[wasm_bindgen(js_name = renderMarkdown)]
pub fn render_markdown(source: &str, options: JsValue) -> Result<String, JsValue> {
    let options = options_from_js(options)?;
    Ok(safemark_core::render_markdown(source, &options))
}

/// Renders a partial document, always completing its tail.
#[wasm_bindgen(js_name = renderStream)]
pub fn render_stream(source: &str, options: JsValue) -> Result<JsValue, JsValue> {
    let options = options_from_js(options)?;
    let tokens = lex(source);
    let completed = complete_incomplete_tokens(&tokens);
    let result = StreamResult {
        completed: matches!(completed, Cow::Owned(_)),
        html: sanitize(
            &emit_html_with(&completed, &DefaultTemplates),
            &markdown_sanitizer_config(&options),
        ),
    };
    serde_wasm_bindgen::to_value(&result).map_err(|err| JsValue::from_str(&err.to_string()))
}

#[wasm_bindgen(js_name = sanitizeHtml)]
pub fn sanitize_html(html: &str, options: JsValue) -> Result<String, JsValue> {
    let options = options_from_js(options)?;
    Ok(sanitize(html, &markdown_sanitizer_config(&options)))
}

/// Returns `source` with its trailing incomplete construct closed.
#[wasm_bindgen(js_name = completeMarkdown)]
pub fn complete_markdown(source: &str) -> String {
    let tokens = lex(source);
    match complete_incomplete_tokens(&tokens) {
        Cow::Borrowed(_) => source.to_string(),
        Cow::Owned(tokens) => merge_raw(&tokens),
    }
}

fn options_from_js(value: JsValue) -> Result<RenderOptions, JsValue> {
    if value.is_null() || value.is_undefined() {
        return Ok(RenderOptions::default());
    }
    let config: RenderConfig =
        serde_wasm_bindgen::from_value(value).map_err(|err| JsValue::from_str(&err.to_string()))?;
    config
        .into_options()
        .map_err(|err| JsValue::from_str(&err.to_string()))
}
