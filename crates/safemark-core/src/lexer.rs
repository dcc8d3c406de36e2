use std::ops::Range;

use pulldown_cmark::{Alignment, CodeBlockKind, Event, Options, Parser, Tag};

use crate::token::{List, ListItem, Table, TableAlign, TableCell, Token, TokenKind};

/// Turns Markdown source into a token tree whose `raw` fields round-trip.
pub trait Lexer {
    fn lex(&self, source: &str) -> Vec<Token>;
}

/// [`Lexer`] backed by `pulldown-cmark` with GFM tables, strikethrough and
/// task lists enabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct MarkdownLexer;

impl MarkdownLexer {
    fn options() -> Options {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options
    }
}

impl Lexer for MarkdownLexer {
    fn lex(&self, source: &str) -> Vec<Token> {
        let mut builder = TreeBuilder::new(source);
        for (event, range) in Parser::new_ext(source, Self::options()).into_offset_iter() {
            builder.push(event, range);
        }
        builder.finish()
    }
}

/// Lexes `source` with the default [`MarkdownLexer`].
pub fn lex(source: &str) -> Vec<Token> {
    MarkdownLexer.lex(source)
}

enum Container {
    Paragraph,
    Heading(u8),
    BlockQuote,
    CodeBlock(Option<String>),
    HtmlBlock,
    List(Option<u64>),
    Item,
    Table(Vec<TableAlign>),
    TableRow,
    TableCell,
    Emphasis,
    Strong,
    Strikethrough,
    Link { href: String, title: Option<String> },
    Image { src: String, title: Option<String> },
    // Constructs without a token kind; their children are spliced into the parent.
    Transparent,
}

struct Frame {
    container: Container,
    range: Range<usize>,
    task: Option<bool>,
    children: Vec<Node>,
}

struct Node {
    range: Range<usize>,
    inline: bool,
    built: Built,
}

enum Built {
    Token(Token),
    Item { task: Option<bool>, tokens: Vec<Token> },
    Row(Vec<TableCell>),
    Cell(TableCell),
}

struct TreeBuilder<'s> {
    source: &'s str,
    stack: Vec<Frame>,
    root: Vec<Node>,
}

impl<'s> TreeBuilder<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            stack: Vec::new(),
            root: Vec::new(),
        }
    }

    fn slice(&self, range: &Range<usize>) -> &'s str {
        self.source.get(range.clone()).unwrap_or("")
    }

    fn push(&mut self, event: Event<'_>, range: Range<usize>) {
        match event {
            Event::Start(tag) => {
                let container = container_for(tag);
                self.stack.push(Frame {
                    container,
                    range,
                    task: None,
                    children: Vec::new(),
                });
            }
            Event::End(_) => {
                if let Some(frame) = self.stack.pop() {
                    let nodes = self.close(frame);
                    self.attach(nodes);
                }
            }
            Event::Text(text) => {
                let nodes = self.text_nodes(range, &text);
                self.attach(nodes);
            }
            Event::Code(text) => {
                let node = self.leaf(range, true, TokenKind::CodeSpan(text.to_string()));
                self.attach(vec![node]);
            }
            Event::Html(html) => {
                let node = self.leaf(range, false, TokenKind::Html(html.to_string()));
                self.attach(vec![node]);
            }
            Event::InlineHtml(html) => {
                let node = self.leaf(range, true, TokenKind::Html(html.to_string()));
                self.attach(vec![node]);
            }
            Event::SoftBreak => {
                let node = self.leaf(range, true, TokenKind::Text("\n".to_string()));
                self.attach(vec![node]);
            }
            Event::HardBreak => {
                let node = self.leaf(range, true, TokenKind::Br);
                self.attach(vec![node]);
            }
            Event::Rule => {
                let node = self.leaf(range, false, TokenKind::Hr);
                self.attach(vec![node]);
            }
            Event::TaskListMarker(checked) => {
                if let Some(frame) = self
                    .stack
                    .iter_mut()
                    .rev()
                    .find(|frame| matches!(frame.container, Container::Item))
                {
                    frame.task = Some(checked);
                }
            }
            _ => {
                let text = self.slice(&range).to_string();
                let node = self.leaf(range, true, TokenKind::Text(text));
                self.attach(vec![node]);
            }
        }
    }

    fn leaf(&self, range: Range<usize>, inline: bool, kind: TokenKind) -> Node {
        Node {
            inline,
            built: Built::Token(Token::new(self.slice(&range), kind)),
            range,
        }
    }

    /// A text event that starts right after an escaping backslash begins
    /// with the escaped character. That character becomes its own `Escape`
    /// token so the backslash stays out of any merged text run.
    fn text_nodes(&self, range: Range<usize>, text: &str) -> Vec<Node> {
        let escaped = text
            .chars()
            .next()
            .filter(|ch| ch.is_ascii_punctuation() && self.is_escaped_at(range.start, *ch));
        let Some(ch) = escaped else {
            return vec![self.leaf(range, true, TokenKind::Text(text.to_string()))];
        };
        let split = range.start + 1;
        let mut nodes = vec![self.leaf(range.start - 1..split, true, TokenKind::Escape(ch.to_string()))];
        if split < range.end {
            nodes.push(self.leaf(split..range.end, true, TokenKind::Text(text[1..].to_string())));
        }
        nodes
    }

    fn is_escaped_at(&self, pos: usize, ch: char) -> bool {
        let in_raw_block = matches!(
            self.stack.last().map(|frame| &frame.container),
            Some(Container::CodeBlock(_) | Container::HtmlBlock)
        );
        if in_raw_block || !self.source.get(pos..).is_some_and(|rest| rest.starts_with(ch)) {
            return false;
        }
        let backslashes = self.source.as_bytes()[..pos]
            .iter()
            .rev()
            .take_while(|&&byte| byte == b'\\')
            .count();
        backslashes % 2 == 1
    }

    fn attach(&mut self, nodes: Vec<Node>) {
        match self.stack.last_mut() {
            Some(frame) => frame.children.extend(nodes),
            None => self.root.extend(nodes),
        }
    }

    fn close(&self, frame: Frame) -> Vec<Node> {
        let Frame {
            container,
            range,
            task,
            children,
        } = frame;
        let raw = self.slice(&range);
        let block = |kind: TokenKind| Node {
            range: range.clone(),
            inline: false,
            built: Built::Token(Token::new(raw, kind)),
        };
        let inline = |kind: TokenKind| Node {
            range: range.clone(),
            inline: true,
            built: Built::Token(Token::new(raw, kind)),
        };

        match container {
            Container::Paragraph => vec![block(TokenKind::Paragraph(self.inline_tokens(children)))],
            Container::Heading(level) => vec![block(TokenKind::Heading {
                level,
                tokens: self.inline_tokens(children),
            })],
            Container::BlockQuote => {
                let start = children.first().map_or(range.start, |node| node.range.start);
                let tokens = self.fill_gaps(self.group_plain(children), start..range.end);
                vec![block(TokenKind::BlockQuote(tokens))]
            }
            Container::CodeBlock(lang) => {
                let text = children
                    .iter()
                    .filter_map(|node| match &node.built {
                        Built::Token(Token {
                            kind: TokenKind::Text(text),
                            ..
                        }) => Some(text.as_str()),
                        _ => None,
                    })
                    .collect::<String>();
                vec![block(TokenKind::Code { lang, text })]
            }
            Container::HtmlBlock => {
                let html = children
                    .iter()
                    .filter_map(|node| match &node.built {
                        Built::Token(Token {
                            kind: TokenKind::Html(html) | TokenKind::Text(html),
                            ..
                        }) => Some(html.as_str()),
                        _ => None,
                    })
                    .collect::<String>();
                if html.trim_start().starts_with("<!--") {
                    vec![block(TokenKind::Comment(html))]
                } else {
                    vec![block(TokenKind::Html(html))]
                }
            }
            Container::List(start) => vec![block(TokenKind::List(self.build_list(
                start, range.clone(), children,
            )))],
            Container::Item => {
                let start = children.first().map_or(range.end, |node| node.range.start);
                let tokens = self.fill_gaps(self.group_plain(children), start..range.end);
                vec![Node {
                    range: range.clone(),
                    inline: false,
                    built: Built::Item { task, tokens },
                }]
            }
            Container::Table(aligns) => vec![block(TokenKind::Table(build_table(aligns, children)))],
            Container::TableRow => {
                let cells = children
                    .into_iter()
                    .flat_map(|node| match node.built {
                        Built::Cell(cell) => vec![cell],
                        Built::Row(cells) => cells,
                        _ => Vec::new(),
                    })
                    .collect();
                vec![Node {
                    range: range.clone(),
                    inline: false,
                    built: Built::Row(cells),
                }]
            }
            Container::TableCell => {
                let cell = TableCell {
                    raw: raw.to_string(),
                    tokens: self.inline_tokens(children),
                };
                vec![Node {
                    range: range.clone(),
                    inline: false,
                    built: Built::Cell(cell),
                }]
            }
            Container::Emphasis => vec![inline(TokenKind::Em(self.inline_tokens(children)))],
            Container::Strong => vec![inline(TokenKind::Strong(self.inline_tokens(children)))],
            Container::Strikethrough => vec![inline(TokenKind::Del(self.inline_tokens(children)))],
            Container::Link { href, title } => vec![inline(TokenKind::Link {
                href,
                title,
                tokens: self.inline_tokens(children),
            })],
            Container::Image { src, title } => {
                let alt = plain_text(&self.inline_tokens(children));
                vec![inline(TokenKind::Image { src, title, alt })]
            }
            Container::Transparent => children,
        }
    }

    fn build_list(&self, start: Option<u64>, range: Range<usize>, children: Vec<Node>) -> List {
        let spans: Vec<Range<usize>> = children.iter().map(|node| node.range.clone()).collect();
        let mut items = Vec::new();
        for (idx, node) in children.into_iter().enumerate() {
            let Built::Item { task, tokens } = node.built else {
                continue;
            };
            let end = match spans.get(idx + 1) {
                Some(next) => next.start,
                None => node.range.end.max(range.end),
            };
            items.push(ListItem {
                raw: self.slice(&(node.range.start..end)).to_string(),
                task,
                tokens,
            });
        }
        let loose = items.iter().any(|item| {
            item.tokens
                .iter()
                .any(|token| matches!(token.kind, TokenKind::Paragraph(_)))
        });
        List {
            ordered: start.is_some(),
            start,
            loose,
            items,
        }
    }

    /// Flattens inline nodes into tokens, merging runs of adjacent text.
    fn inline_tokens(&self, nodes: Vec<Node>) -> Vec<Token> {
        let mut out: Vec<(Range<usize>, Token)> = Vec::new();
        for node in nodes {
            let Built::Token(token) = node.built else {
                continue;
            };
            if let TokenKind::Text(text) = &token.kind {
                if let Some((range, Token {
                    raw,
                    kind: TokenKind::Text(prev),
                })) = out.last_mut()
                {
                    prev.push_str(text);
                    range.end = node.range.end.max(range.end);
                    *raw = self.slice(range).to_string();
                    continue;
                }
            }
            out.push((node.range, token));
        }
        out.into_iter().map(|(_, token)| token).collect()
    }

    /// Wraps each run of inline nodes (the body of a tight list item) in a
    /// `Plain` block.
    fn group_plain(&self, nodes: Vec<Node>) -> Vec<Node> {
        let mut out = Vec::new();
        let mut run: Vec<Node> = Vec::new();
        for node in nodes {
            if node.inline {
                run.push(node);
                continue;
            }
            if !run.is_empty() {
                out.push(self.plain(std::mem::take(&mut run)));
            }
            out.push(node);
        }
        if !run.is_empty() {
            out.push(self.plain(run));
        }
        out
    }

    fn plain(&self, run: Vec<Node>) -> Node {
        let start = run.first().map_or(0, |node| node.range.start);
        let end = run.last().map_or(start, |node| node.range.end);
        let range = start..end;
        Node {
            built: Built::Token(Token::new(
                self.slice(&range),
                TokenKind::Plain(self.inline_tokens(run)),
            )),
            range,
            inline: false,
        }
    }

    /// Assigns block raws so that they cover `region` exactly: each block takes
    /// its leading indentation and line ending, and leftover runs become
    /// `Space` tokens.
    fn fill_gaps(&self, nodes: Vec<Node>, region: Range<usize>) -> Vec<Token> {
        let source = self.source;
        let starts: Vec<usize> = nodes.iter().map(|node| node.range.start).collect();
        let mut out = Vec::new();
        let mut cursor = region.start;

        for (idx, node) in nodes.into_iter().enumerate() {
            let Built::Token(mut token) = node.built else {
                continue;
            };
            let limit = starts.get(idx + 1).copied().unwrap_or(region.end).max(cursor);
            let start = line_start(source, node.range.start).clamp(cursor, limit);
            if start > cursor {
                out.push(Token::new(&source[cursor..start], TokenKind::Space));
            }
            let mut end = node.range.end.clamp(start, limit);
            if end > start && !source[..end].ends_with('\n') {
                if let Some(offset) = source[end..limit].find('\n') {
                    if source[end..end + offset].trim().is_empty() {
                        end += offset + 1;
                    }
                }
            }
            let suffix_start = node.range.end.clamp(start, end);
            if let TokenKind::List(list) = &mut token.kind {
                if let Some(last) = list.items.last_mut() {
                    last.raw.push_str(&source[suffix_start..end]);
                }
            }
            token.raw = source[start..end].to_string();
            out.push(token);
            cursor = end;
        }

        if cursor < region.end {
            out.push(Token::new(&source[cursor..region.end], TokenKind::Space));
        }
        out
    }

    fn finish(mut self) -> Vec<Token> {
        // Unbalanced frames cannot come out of pulldown-cmark, but close them
        // anyway so no content is lost.
        while let Some(frame) = self.stack.pop() {
            let nodes = self.close(frame);
            self.attach(nodes);
        }
        let root = std::mem::take(&mut self.root);
        let nodes = self.group_plain(root);
        self.fill_gaps(nodes, 0..self.source.len())
    }
}

fn container_for(tag: Tag<'_>) -> Container {
    match tag {
        Tag::Paragraph => Container::Paragraph,
        Tag::Heading { level, .. } => Container::Heading(level as u8),
        Tag::BlockQuote(_) => Container::BlockQuote,
        Tag::CodeBlock(CodeBlockKind::Fenced(info)) => {
            let lang = info.split_whitespace().next().map(str::to_string);
            Container::CodeBlock(lang)
        }
        Tag::CodeBlock(CodeBlockKind::Indented) => Container::CodeBlock(None),
        Tag::HtmlBlock => Container::HtmlBlock,
        Tag::List(start) => Container::List(start),
        Tag::Item => Container::Item,
        Tag::Table(aligns) => Container::Table(
            aligns
                .into_iter()
                .map(|align| match align {
                    Alignment::None => TableAlign::None,
                    Alignment::Left => TableAlign::Left,
                    Alignment::Center => TableAlign::Center,
                    Alignment::Right => TableAlign::Right,
                })
                .collect(),
        ),
        Tag::TableHead | Tag::TableRow => Container::TableRow,
        Tag::TableCell => Container::TableCell,
        Tag::Emphasis => Container::Emphasis,
        Tag::Strong => Container::Strong,
        Tag::Strikethrough => Container::Strikethrough,
        Tag::Link {
            dest_url, title, ..
        } => Container::Link {
            href: dest_url.to_string(),
            title: non_empty(title.to_string()),
        },
        Tag::Image {
            dest_url, title, ..
        } => Container::Image {
            src: dest_url.to_string(),
            title: non_empty(title.to_string()),
        },
        _ => Container::Transparent,
    }
}

fn build_table(aligns: Vec<TableAlign>, children: Vec<Node>) -> Table {
    let mut rows = children.into_iter().filter_map(|node| match node.built {
        Built::Row(cells) => Some(cells),
        _ => None,
    });
    let header = rows.next().unwrap_or_default();
    Table {
        aligns,
        header,
        rows: rows.collect(),
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

fn line_start(source: &str, pos: usize) -> usize {
    source[..pos].rfind('\n').map_or(0, |idx| idx + 1)
}

/// Text content of an inline sequence, used for image alt text.
pub(crate) fn plain_text(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        match &token.kind {
            TokenKind::Text(text) | TokenKind::Escape(text) | TokenKind::CodeSpan(text) => {
                out.push_str(text)
            }
            TokenKind::Image { alt, .. } => out.push_str(alt),
            _ => out.push_str(&plain_text(token.children())),
        }
    }
    out
}
