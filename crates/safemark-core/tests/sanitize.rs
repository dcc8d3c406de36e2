use pretty_assertions::assert_eq;
use safemark_core::{
    AllowList, HookDecision, PolicyOverride, SanitizerConfig, SanitizerEngine, sanitize,
};

fn defaults() -> SanitizerConfig {
    SanitizerConfig::default()
}

#[test]
fn script_is_dropped_with_its_content() {
    assert_eq!(
        sanitize("<div>safe<script>alert(1)</script>content</div>", &defaults()),
        "<div>safecontent</div>"
    );
}

#[test]
fn javascript_link_loses_its_href() {
    assert_eq!(
        sanitize(r#"<a href="javascript:alert(1)">bad link</a>"#, &defaults()),
        "<a>bad link</a>"
    );
}

#[test]
fn data_images_need_an_explicit_media_protocol() {
    let html = r#"<img src="data:image/png;base64,AAAA">"#;
    assert_eq!(sanitize(html, &defaults()), "<img>");

    let config = SanitizerConfig {
        allowed_media_protocols: Some(PolicyOverride::augment(["data"])),
        ..SanitizerConfig::default()
    };
    assert_eq!(sanitize(html, &config), html);
}

#[test]
fn media_override_does_not_widen_links() {
    let config = SanitizerConfig {
        allowed_media_protocols: Some(PolicyOverride::augment(["data"])),
        ..SanitizerConfig::default()
    };
    assert_eq!(
        sanitize(r#"<a href="data:text/html,x">x</a>"#, &config),
        "<a>x</a>"
    );
}

#[test]
fn relative_urls_are_rejected_by_default() {
    assert_eq!(
        sanitize(r#"<a href="docs/page.html">x</a>"#, &defaults()),
        "<a>x</a>"
    );
}

#[test]
fn fragment_links_survive() {
    let html = r##"<p><a href="#install">Install</a></p>"##;
    assert_eq!(sanitize(html, &defaults()), html);
}

#[test]
fn tag_override_replaces_defaults() {
    let config = SanitizerConfig {
        allowed_tags: Some(PolicyOverride::replace(AllowList::only(["p"]))),
        ..SanitizerConfig::default()
    };
    assert_eq!(
        sanitize("<p><b>bold</b> <i>it</i></p>", &config),
        "<p>bold it</p>"
    );
}

#[test]
fn attribute_augment_extends_defaults() {
    let config = SanitizerConfig {
        allowed_attributes: Some(PolicyOverride::augment(["lang"])),
        ..SanitizerConfig::default()
    };
    assert_eq!(
        sanitize(r#"<p lang="en" id="x">hi</p>"#, &config),
        r#"<p lang="en">hi</p>"#
    );
}

#[test]
fn styles_are_limited_to_theme_spans() {
    let html = concat!(
        r#"<span style="color:var(--theme-error-foreground);">e</span>"#,
        r#"<div style="color:#fff;">d</div>"#,
        r#"<span style="position:fixed;">s</span>"#,
    );
    assert_eq!(
        sanitize(html, &defaults()),
        r#"<span style="color:var(--theme-error-foreground);">e</span><div>d</div><span>s</span>"#
    );
}

#[test]
fn plaintext_mode_shows_rejected_tags_as_text() {
    let config = SanitizerConfig {
        replace_with_plaintext: true,
        ..SanitizerConfig::default()
    };
    assert_eq!(
        sanitize(r#"<p>a <custom x="1">b</custom> <hr2> c</p>"#, &config),
        r#"<p>a &lt;custom x="1"&gt;b&lt;/custom&gt; &lt;hr2&gt; c&lt;/hr2&gt;</p>"#
    );
}

#[test]
fn plaintext_mode_skips_closing_text_for_void_tags() {
    let config = SanitizerConfig {
        allowed_tags: Some(PolicyOverride::replace(AllowList::only(["p"]))),
        replace_with_plaintext: true,
        ..SanitizerConfig::default()
    };
    assert_eq!(
        sanitize("<p>a<br>b</p>", &config),
        "<p>a&lt;br&gt;b</p>"
    );
}

#[test]
fn attribute_hook_replaces_built_in_policy() {
    let config = SanitizerConfig::default().with_attribute_hook(|tag, attr, _| {
        HookDecision::from(!(tag == "img" && attr == "width"))
    });
    assert_eq!(
        sanitize(
            r#"<img width="10" height="5" src="https://a/x.png"><div class="box">x</div>"#,
            &config
        ),
        r#"<img height="5" src="https://a/x.png"><div class="box">x</div>"#
    );
}

#[test]
fn hooks_run_only_for_their_call() {
    let mut engine = SanitizerEngine::new();
    let strict = SanitizerConfig::default().with_element_hook(|tag, _| tag != "b");
    assert_eq!(engine.sanitize("<b>x</b><i>y</i>", &strict), "x<i>y</i>");
    assert!(!engine.has_registered_hooks());
    assert_eq!(engine.sanitize("<b>x</b><i>y</i>", &defaults()), "<b>x</b><i>y</i>");
}

#[test]
fn element_view_exposes_attributes() {
    let config = SanitizerConfig::default().with_element_hook(|tag, element| {
        tag != "a" || element.attributes().all(|(name, _)| name != "data-tracking")
    });
    assert_eq!(
        sanitize(
            r#"<a href="https://a/" data-tracking="1">x</a> <a href="https://b/">y</a>"#,
            &config
        ),
        r#"x <a href="https://b/">y</a>"#
    );
}

#[test]
fn malformed_markup_is_repaired() {
    assert_eq!(
        sanitize("<p><b>unclosed <i>nested</p>tail", &defaults()),
        "<p><b>unclosed <i>nested</i></b></p><b><i>tail</i></b>"
    );
}

#[test]
fn doctype_and_svg_are_dropped() {
    assert_eq!(
        sanitize("<!DOCTYPE html><svg><script>x</script></svg>ok", &defaults()),
        "ok"
    );
}
