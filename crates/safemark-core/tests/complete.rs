use std::borrow::Cow;

use pretty_assertions::assert_eq;
use safemark_core::{
    RenderOptions, TokenKind, complete_incomplete_tokens, lex, merge_raw, render_markdown,
};

fn assert_completes(source: &str, expected: &str) {
    let tokens = lex(source);
    let completed = complete_incomplete_tokens(&tokens);
    assert_eq!(completed.as_ref(), lex(expected).as_slice(), "source {:?}", source);
}

#[test]
fn table_header_gets_a_separator_row() {
    assert_completes("| a | b |", "| a | b |\n| --- | --- |");
}

#[test]
fn open_code_span_is_closed() {
    assert_completes("some text and `some code", "some text and `some code`");
}

#[test]
fn link_text_in_last_list_item_gets_a_target() {
    assert_completes(
        "- item one\n- item two [link",
        "- item one\n- item two [link](https://microsoft.com)",
    );
}

#[test]
fn completed_header_renders_as_a_table() -> Result<(), Box<dyn std::error::Error>> {
    let tokens = lex("| a | b |");
    let completed = complete_incomplete_tokens(&tokens);
    let last = completed.last().ok_or("no tokens")?;
    match &last.kind {
        TokenKind::Table(table) => {
            assert_eq!(table.header.len(), 2);
            assert!(table.rows.is_empty());
            Ok(())
        }
        other => Err(format!("expected a table, got {:?}", other).into()),
    }
}

#[test]
fn completion_is_stable() {
    for source in [
        "| a | b |",
        "some text and `some code",
        "- item one\n- item two [link",
        "see [docs](https://example.com/pa",
    ] {
        let tokens = lex(source);
        let once = complete_incomplete_tokens(&tokens).into_owned();
        let twice = complete_incomplete_tokens(&once);
        assert!(
            matches!(twice, Cow::Borrowed(_)),
            "second pass changed {:?}",
            merge_raw(&once)
        );
    }
}

#[test]
fn complete_documents_are_untouched() {
    for source in [
        "| a | b |\n| --- | --- |\n| 1 | 2 |\n",
        "A [link](https://example.com) here.\n",
        "> quoted\n",
        "```rust\nlet x = 1;\n```\n",
        "***\n",
        "1. one\n2. two\n",
    ] {
        let tokens = lex(source);
        let completed = complete_incomplete_tokens(&tokens);
        assert!(matches!(completed, Cow::Borrowed(_)), "source {:?}", source);
    }
}

#[test]
fn streaming_render_closes_the_tail() {
    let options = RenderOptions::new().streaming(true);
    assert_eq!(
        render_markdown("Ship it **now", &options),
        "<p>Ship it <strong>now</strong></p>\n"
    );
    assert_eq!(
        render_markdown("Ship it **now", &RenderOptions::default()),
        "<p>Ship it **now</p>\n"
    );
}
