//! Repairs the trailing construct of a streaming Markdown token stream.
//!
//! While content is still arriving, the tail of the source is often an
//! unterminated code span, link or table. The completion engine synthesizes the
//! missing closing text, re-lexes it, and splices the result in, so every
//! intermediate render shows well-formed markup.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::lexer::{Lexer, MarkdownLexer};
use crate::token::{List, Token, TokenKind, merge_item_raw, merge_raw};

const MAX_ROUNDS: usize = 3;

/// Neutral content appended to heading-shaped tails so they re-lex as text.
const PLACEHOLDER: &str = " &nbsp;";
/// Target given to a link whose text is still being typed.
const LINK_PLACEHOLDER: &str = "](https://microsoft.com)";

static TABLE_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:\n|^)\|").expect("valid regex"));
static ENDS_IN_PIPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\|\s*$").expect("valid regex"));
static STAR_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\w").expect("valid regex"));
static DOUBLE_UNDERSCORE_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)__\w").expect("valid regex"));
static UNDERSCORE_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)_\w").expect("valid regex"));
static LINK_TEXT_AND_TARGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)\[.*\]\(\w*").expect("valid regex"));
static TARGET_WITHOUT_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\[]*\]\([^\)]*$").expect("valid regex"));
static UNBALANCED_BRACKET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*$").expect("valid regex"));
static TITLE_AFTER_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^ *"[^"]*$"#).expect("valid regex"));
static TITLE_IN_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^[^"]* +"[^"]*$"#).expect("valid regex"));
static LINK_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)\[\w*[^\]]*$").expect("valid regex"));
static LIST_LEAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[-*+]|\d+[.)]) +(?:\[[ xX]\] +)?").expect("valid regex")
});
static TRAILING_DASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"-\s*$").expect("valid regex"));

#[derive(Clone, Copy, Debug)]
enum Rule {
    Table,
    ListItem,
    ListHeading,
    Heading,
    Paragraph,
}

/// Closing text for an unterminated construct.
#[derive(Clone, Copy, Debug)]
enum Closing {
    /// Appended after trailing whitespace is trimmed.
    Trimmed(&'static str),
    /// Appended to the raw text as is.
    Verbatim(&'static str),
}

/// Completes `tokens` with the default [`MarkdownLexer`].
pub fn complete_incomplete_tokens(tokens: &[Token]) -> Cow<'_, [Token]> {
    complete_incomplete_tokens_with(&MarkdownLexer, tokens)
}

/// Repairs the trailing incomplete construct of `tokens`, re-lexing
/// synthesized text with `lexer`.
///
/// Returns `Cow::Borrowed(tokens)` when nothing needed completing. Callers may
/// compare pointers to detect that case.
pub fn complete_incomplete_tokens_with<'t, L>(lexer: &L, tokens: &'t [Token]) -> Cow<'t, [Token]>
where
    L: Lexer + ?Sized,
{
    let mut current = Cow::Borrowed(tokens);
    for round in 1..=MAX_ROUNDS {
        let Some((rule, next)) = complete_once(lexer, &current) else {
            break;
        };
        if next.as_slice() == current.as_ref() {
            debug!(round, ?rule, "completion re-lexed into the same tokens");
            break;
        }
        debug!(round, ?rule, "applied completion");
        current = Cow::Owned(next);
    }
    current
}

fn complete_once<L>(lexer: &L, tokens: &[Token]) -> Option<(Rule, Vec<Token>)>
where
    L: Lexer + ?Sized,
{
    if let Some(idx) = tokens.iter().position(starts_table_row) {
        if let Some(table) = complete_table(lexer, &tokens[idx..]) {
            return Some((Rule::Table, splice(&tokens[..idx], table)));
        }
    }

    let (last, head) = tokens.split_last()?;
    match &last.kind {
        TokenKind::List(list) => complete_list(lexer, list, &last.raw)
            .map(|(rule, token)| (rule, splice(head, vec![token]))),
        TokenKind::Paragraph(_) => complete_single_line(lexer, last)
            .map(|token| (Rule::Paragraph, splice(head, vec![token]))),
        TokenKind::Heading { .. } => {
            complete_heading(lexer, tokens, last).map(|tokens| (Rule::Heading, tokens))
        }
        TokenKind::Space
        | TokenKind::Plain(_)
        | TokenKind::Code { .. }
        | TokenKind::BlockQuote(_)
        | TokenKind::Table(_)
        | TokenKind::Hr
        | TokenKind::Html(_)
        | TokenKind::Comment(_)
        | TokenKind::Text(_)
        | TokenKind::Escape(_)
        | TokenKind::CodeSpan(_)
        | TokenKind::Strong(_)
        | TokenKind::Em(_)
        | TokenKind::Del(_)
        | TokenKind::Link { .. }
        | TokenKind::Image { .. }
        | TokenKind::Br => None,
    }
}

fn starts_table_row(token: &Token) -> bool {
    matches!(token.kind, TokenKind::Paragraph(_)) && TABLE_START.is_match(&token.raw)
}

fn splice(head: &[Token], tail: Vec<Token>) -> Vec<Token> {
    let mut out = Vec::with_capacity(head.len() + tail.len());
    out.extend_from_slice(head);
    out.extend(tail);
    out
}

/// Gives a header row that has no valid separator row a synthesized one.
fn complete_table<L>(lexer: &L, tokens: &[Token]) -> Option<Vec<Token>>
where
    L: Lexer + ?Sized,
{
    let merged = merge_raw(tokens);
    let lines: Vec<&str> = merged.split('\n').collect();
    let mut columns = None;
    let mut has_separator = false;

    for (idx, line) in lines.iter().enumerate() {
        let line = line.trim();
        match columns {
            None => {
                if line.starts_with('|') {
                    let count = header_columns(line);
                    if count > 0 {
                        columns = Some(count);
                    }
                }
            }
            Some(_) => {
                // Only a trailing, partial separator row may follow the header.
                if !line.starts_with('|') || idx != lines.len() - 1 {
                    return None;
                }
                has_separator = true;
            }
        }
    }

    let columns = columns?;
    let mut text = if has_separator {
        lines[..lines.len() - 1].join("\n")
    } else {
        merged.clone()
    };
    if !ENDS_IN_PIPE.is_match(&text) {
        text.push('|');
    }
    text.push_str("\n|");
    text.push_str(&" --- |".repeat(columns));

    let relexed = lexer.lex(&text);
    if relexed
        .iter()
        .any(|token| matches!(token.kind, TokenKind::Table(_)))
    {
        Some(relexed)
    } else {
        debug!(columns, "discarded table completion without a table");
        None
    }
}

/// Number of `|` characters followed by cell content.
fn header_columns(line: &str) -> usize {
    line.split('|')
        .skip(1)
        .filter(|cell| !cell.is_empty())
        .count()
}

fn complete_list<L>(lexer: &L, list: &List, raw: &str) -> Option<(Rule, Token)>
where
    L: Lexer + ?Sized,
{
    let (last_item, earlier_items) = list.items.split_last()?;
    match last_item.tokens.split_last() {
        Some((body @ Token { kind: TokenKind::Plain(_), .. }, earlier_children)) => {
            let completed = complete_single_line(lexer, body)?;
            if !matches!(completed.kind, TokenKind::Paragraph(_)) {
                debug!("discarded list item completion without a paragraph");
                return None;
            }
            let lead = LIST_LEAD.find(&last_item.raw)?.as_str();
            let text = format!(
                "{}{lead}{}{}",
                merge_item_raw(earlier_items),
                merge_raw(earlier_children),
                completed.raw
            );
            relex_list(lexer, &text).map(|token| (Rule::ListItem, token))
        }
        _ if ends_in_heading(list) => {
            let text = format!("{}{PLACEHOLDER}", raw.trim());
            relex_list(lexer, &text).map(|token| (Rule::ListHeading, token))
        }
        _ => None,
    }
}

fn relex_list<L>(lexer: &L, text: &str) -> Option<Token>
where
    L: Lexer + ?Sized,
{
    let first = lexer.lex(text).into_iter().next();
    match first {
        Some(token) if matches!(token.kind, TokenKind::List(_)) => Some(token),
        _ => {
            debug!("discarded list completion that re-lexed without a list");
            None
        }
    }
}

/// A bare sub-item marker under a list item lexes as a setext heading.
fn ends_in_heading(list: &List) -> bool {
    let last = list
        .items
        .last()
        .and_then(|item| item.tokens.last());
    match last.map(|token| &token.kind) {
        Some(TokenKind::Heading { .. }) => true,
        Some(TokenKind::List(nested)) => ends_in_heading(nested),
        _ => false,
    }
}

fn complete_heading<L>(lexer: &L, tokens: &[Token], last: &Token) -> Option<Vec<Token>>
where
    L: Lexer + ?Sized,
{
    if !TRAILING_DASH.is_match(&last.raw) {
        return None;
    }
    Some(lexer.lex(&format!("{}{PLACEHOLDER}", merge_raw(tokens))))
}

/// Closes an unterminated inline construct at the end of `block`, a
/// paragraph or list item body, and returns the re-lexed block.
fn complete_single_line<L>(lexer: &L, block: &Token) -> Option<Token>
where
    L: Lexer + ?Sized,
{
    let children = block.children();
    for (idx, child) in children.iter().enumerate().rev() {
        if !matches!(child.kind, TokenKind::Text(_)) {
            continue;
        }
        let last_line = child
            .raw
            .rfind('\n')
            .map_or(child.raw.as_str(), |pos| &child.raw[pos + 1..]);
        if let Some(closing) = closing_for(last_line, children, idx) {
            let text = match closing {
                Closing::Trimmed(close) => format!("{}{close}", block.raw.trim_end()),
                Closing::Verbatim(close) => format!("{}{close}", block.raw),
            };
            return lexer.lex(&text).into_iter().next();
        }
    }
    None
}

fn closing_for(last_line: &str, children: &[Token], idx: usize) -> Option<Closing> {
    if last_line.contains('`') {
        return Some(Closing::Trimmed("`"));
    }
    if last_line.contains("**") {
        return Some(Closing::Trimmed("**"));
    }
    if STAR_WORD.is_match(last_line) {
        return Some(Closing::Trimmed("*"));
    }
    if DOUBLE_UNDERSCORE_WORD.is_match(last_line) {
        return Some(Closing::Trimmed("__"));
    }
    if UNDERSCORE_WORD.is_match(last_line) {
        return Some(Closing::Trimmed("_"));
    }
    if LINK_TEXT_AND_TARGET.is_match(last_line)
        || (TARGET_WITHOUT_TEXT.is_match(last_line) && opens_link_earlier(&children[..idx]))
    {
        let parsed_title = matches!(
            children.get(idx + 1).map(|token| &token.kind),
            Some(TokenKind::Link { .. })
        ) && children.get(idx + 2).is_some_and(|token| {
            matches!(token.kind, TokenKind::Text(_)) && TITLE_AFTER_LINK.is_match(&token.raw)
        });
        if parsed_title || TITLE_IN_LINE.is_match(last_line) {
            return Some(Closing::Verbatim("\")"));
        }
        return Some(Closing::Verbatim(")"));
    }
    if LINK_TEXT.is_match(last_line) {
        return Some(Closing::Verbatim(LINK_PLACEHOLDER));
    }
    None
}

/// Link text split over several children leaves its `[` in an earlier text.
fn opens_link_earlier(children: &[Token]) -> bool {
    children.iter().any(|token| {
        matches!(token.kind, TokenKind::Text(_)) && UNBALANCED_BRACKET.is_match(&token.raw)
    })
}
