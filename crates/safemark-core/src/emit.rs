use crate::policy::SanitizerConfig;
use crate::sanitizer::sanitize;
use crate::token::{List, Table, TableAlign, TableCell, Token, TokenKind};

/// Markup for each node type. Every method has a default; override the ones
/// a host needs to render differently.
///
/// Bodies passed in are already rendered. Leaf text (`text`, `code`,
/// `codespan`, attribute values) arrives unescaped.
pub trait Templates {
    fn paragraph(&self, body: &str) -> String {
        format!("<p>{}</p>\n", body)
    }

    fn heading(&self, level: u8, body: &str) -> String {
        format!("<h{}>{}</h{}>\n", level, body, level)
    }

    fn code(&self, _lang: Option<&str>, text: &str) -> String {
        let mut out = String::from("<pre><code>");
        out.push_str(&escape_html(text));
        if !text.is_empty() && !text.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("</code></pre>\n");
        out
    }

    fn codespan(&self, text: &str) -> String {
        format!("<code>{}</code>", escape_html(text))
    }

    fn blockquote(&self, body: &str) -> String {
        format!("<blockquote>\n{}</blockquote>\n", body)
    }

    fn list(&self, ordered: bool, start: Option<u64>, body: &str) -> String {
        if !ordered {
            return format!("<ul>\n{}</ul>\n", body);
        }
        let start_attr = start
            .filter(|value| *value != 1)
            .map(|value| format!(" start=\"{}\"", value))
            .unwrap_or_default();
        format!("<ol{}>\n{}</ol>\n", start_attr, body)
    }

    fn list_item(&self, task: Option<bool>, body: &str) -> String {
        match task {
            Some(checked) => format!("<li>{} {}</li>\n", self.checkbox(checked), body),
            None => format!("<li>{}</li>\n", body),
        }
    }

    fn checkbox(&self, checked: bool) -> String {
        if checked {
            "<input type=\"checkbox\" checked disabled>".to_string()
        } else {
            "<input type=\"checkbox\" disabled>".to_string()
        }
    }

    fn table(&self, header: &str, body: &str) -> String {
        let mut out = format!("<table>\n<thead>\n{}</thead>\n", header);
        if !body.is_empty() {
            out.push_str("<tbody>\n");
            out.push_str(body);
            out.push_str("</tbody>\n");
        }
        out.push_str("</table>\n");
        out
    }

    fn table_row(&self, cells: &str) -> String {
        format!("<tr>\n{}</tr>\n", cells)
    }

    fn table_cell(&self, header: bool, align: TableAlign, body: &str) -> String {
        let tag = if header { "th" } else { "td" };
        let align_attr = match align {
            TableAlign::None => "",
            TableAlign::Left => " align=\"left\"",
            TableAlign::Center => " align=\"center\"",
            TableAlign::Right => " align=\"right\"",
        };
        format!("<{}{}>{}</{}>\n", tag, align_attr, body, tag)
    }

    fn hr(&self) -> String {
        "<hr>\n".to_string()
    }

    fn br(&self) -> String {
        "<br>".to_string()
    }

    fn strong(&self, body: &str) -> String {
        format!("<strong>{}</strong>", body)
    }

    fn em(&self, body: &str) -> String {
        format!("<em>{}</em>", body)
    }

    fn del(&self, body: &str) -> String {
        format!("<del>{}</del>", body)
    }

    fn link(&self, href: &str, title: Option<&str>, body: &str) -> String {
        let mut out = format!("<a href=\"{}\"", escape_url_attr(href));
        if let Some(title) = title {
            out.push_str(&format!(" title=\"{}\"", escape_attr(title)));
        }
        out.push('>');
        out.push_str(body);
        out.push_str("</a>");
        out
    }

    fn image(&self, src: &str, title: Option<&str>, alt: &str) -> String {
        let mut out = format!(
            "<img src=\"{}\" alt=\"{}\"",
            escape_url_attr(src),
            escape_attr(alt)
        );
        if let Some(title) = title {
            out.push_str(&format!(" title=\"{}\"", escape_attr(title)));
        }
        out.push('>');
        out
    }

    /// Raw HTML from the source, passed through for the sanitizer to judge.
    fn html(&self, html: &str) -> String {
        html.to_string()
    }

    fn text(&self, text: &str) -> String {
        escape_html(text)
    }
}

/// The stock templates.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultTemplates;

impl Templates for DefaultTemplates {}

/// Emits raw, un-sanitized HTML with the default templates.
pub fn emit_html(tokens: &[Token]) -> String {
    emit_html_with(tokens, &DefaultTemplates)
}

pub fn emit_html_with<T>(tokens: &[Token], templates: &T) -> String
where
    T: Templates + ?Sized,
{
    Emitter { templates }.blocks(tokens)
}

/// Emits HTML and sanitizes it with `config`.
pub fn emit_html_sanitized(tokens: &[Token], config: &SanitizerConfig) -> String {
    sanitize(&emit_html(tokens), config)
}

struct Emitter<'t, T: ?Sized> {
    templates: &'t T,
}

impl<T> Emitter<'_, T>
where
    T: Templates + ?Sized,
{
    fn blocks(&self, tokens: &[Token]) -> String {
        tokens.iter().map(|token| self.block(token)).collect()
    }

    fn block(&self, token: &Token) -> String {
        let templates = self.templates;
        match &token.kind {
            TokenKind::Space => String::new(),
            TokenKind::Paragraph(children) => templates.paragraph(&self.inlines(children)),
            // Tight list item bodies render without a paragraph.
            TokenKind::Plain(children) => self.inlines(children),
            TokenKind::Heading { level, tokens } => {
                templates.heading(*level, &self.inlines(tokens))
            }
            TokenKind::Code { lang, text } => templates.code(lang.as_deref(), text),
            TokenKind::BlockQuote(children) => templates.blockquote(&self.blocks(children)),
            TokenKind::List(list) => self.list(list),
            TokenKind::Table(table) => self.table(table),
            TokenKind::Hr => templates.hr(),
            TokenKind::Html(html) | TokenKind::Comment(html) => templates.html(html),
            TokenKind::Text(_)
            | TokenKind::Escape(_)
            | TokenKind::CodeSpan(_)
            | TokenKind::Strong(_)
            | TokenKind::Em(_)
            | TokenKind::Del(_)
            | TokenKind::Link { .. }
            | TokenKind::Image { .. }
            | TokenKind::Br => self.inline(token),
        }
    }

    fn inlines(&self, tokens: &[Token]) -> String {
        tokens.iter().map(|token| self.inline(token)).collect()
    }

    fn inline(&self, token: &Token) -> String {
        let templates = self.templates;
        match &token.kind {
            TokenKind::Text(text) | TokenKind::Escape(text) => templates.text(text),
            TokenKind::CodeSpan(text) => templates.codespan(text),
            TokenKind::Strong(children) => templates.strong(&self.inlines(children)),
            TokenKind::Em(children) => templates.em(&self.inlines(children)),
            TokenKind::Del(children) => templates.del(&self.inlines(children)),
            TokenKind::Link {
                href,
                title,
                tokens,
            } => templates.link(href, title.as_deref(), &self.inlines(tokens)),
            TokenKind::Image { src, title, alt } => templates.image(src, title.as_deref(), alt),
            TokenKind::Br => templates.br(),
            TokenKind::Html(html) => templates.html(html),
            TokenKind::Space
            | TokenKind::Paragraph(_)
            | TokenKind::Plain(_)
            | TokenKind::Heading { .. }
            | TokenKind::Code { .. }
            | TokenKind::BlockQuote(_)
            | TokenKind::List(_)
            | TokenKind::Table(_)
            | TokenKind::Hr
            | TokenKind::Comment(_) => self.block(token),
        }
    }

    fn list(&self, list: &List) -> String {
        let body: String = list
            .items
            .iter()
            .map(|item| self.templates.list_item(item.task, &self.blocks(&item.tokens)))
            .collect();
        self.templates.list(list.ordered, list.start, &body)
    }

    fn table(&self, table: &Table) -> String {
        let header = self.templates.table_row(&self.cells(&table.header, &table.aligns, true));
        let body: String = table
            .rows
            .iter()
            .map(|row| self.templates.table_row(&self.cells(row, &table.aligns, false)))
            .collect();
        self.templates.table(&header, &body)
    }

    fn cells(&self, cells: &[TableCell], aligns: &[TableAlign], header: bool) -> String {
        cells
            .iter()
            .enumerate()
            .map(|(idx, cell)| {
                let align = aligns.get(idx).copied().unwrap_or(TableAlign::None);
                self.templates
                    .table_cell(header, align, &self.inlines(&cell.tokens))
            })
            .collect()
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn escape_attr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Percent-encodes spaces, backslashes, control and non-ASCII bytes, then
/// escapes the result for a double-quoted attribute.
pub fn escape_url_attr(text: &str) -> String {
    let mut encoded = String::with_capacity(text.len());
    for &byte in text.as_bytes() {
        match byte {
            b' ' => encoded.push_str("%20"),
            b'\\' => encoded.push_str("%5C"),
            0x00..=0x1F | 0x7F..=0xFF => {
                encoded.push_str(&format!("%{:02X}", byte));
            }
            _ => encoded.push(byte as char),
        }
    }
    escape_attr(&encoded)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{Templates, emit_html, emit_html_sanitized, emit_html_with, escape_url_attr};
    use crate::lexer::lex;
    use crate::policy::SanitizerConfig;

    #[test]
    fn emits_paragraph_with_inlines() {
        let html = emit_html(&lex("Some *em* and `a<b`"));
        assert_eq!(html, "<p>Some <em>em</em> and <code>a&lt;b</code></p>\n");
    }

    #[test]
    fn emits_tight_task_list() {
        let html = emit_html(&lex("- [x] done\n- [ ] todo\n"));
        assert_eq!(
            html,
            "<ul>\n<li><input type=\"checkbox\" checked disabled> done</li>\n\
             <li><input type=\"checkbox\" disabled> todo</li>\n</ul>\n"
        );
    }

    #[test]
    fn emits_table_with_alignment() {
        let html = emit_html(&lex("| a | b |\n| :- | -: |\n| 1 | 2 |\n"));
        assert_eq!(
            html,
            "<table>\n<thead>\n<tr>\n<th align=\"left\">a</th>\n<th align=\"right\">b</th>\n</tr>\n</thead>\n\
             <tbody>\n<tr>\n<td align=\"left\">1</td>\n<td align=\"right\">2</td>\n</tr>\n</tbody>\n</table>\n"
        );
    }

    #[test]
    fn custom_templates_override_single_nodes() {
        struct Loud;
        impl Templates for Loud {
            fn strong(&self, body: &str) -> String {
                format!("<b>{}</b>", body.to_uppercase())
            }
        }
        let html = emit_html_with(&lex("a **b**"), &Loud);
        assert_eq!(html, "<p>a <b>B</b></p>\n");
    }

    #[test]
    fn url_attributes_are_percent_encoded() {
        assert_eq!(escape_url_attr("a b\\c\"é"), "a%20b%5Cc&quot;%C3%A9");
    }

    #[test]
    fn sanitized_output_drops_raw_script() {
        let html = emit_html_sanitized(
            &lex("text\n\n<script>alert(1)</script>\n"),
            &SanitizerConfig::default(),
        );
        assert!(html.starts_with("<p>text</p>\n"));
        assert!(!html.contains("script"));
        assert!(!html.contains("alert"));
    }
}
