pub type TokenSeq = Vec<Token>;

/// A lexed unit of Markdown. `raw` is the exact source text it was lexed from.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub raw: String,
    pub kind: TokenKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    /// Blank lines (or other leftover text) between blocks.
    Space,
    Paragraph(TokenSeq),
    /// Inline content of a tight list item, which has no paragraph around it.
    Plain(TokenSeq),
    Heading {
        level: u8,
        tokens: TokenSeq,
    },
    Code {
        lang: Option<String>,
        text: String,
    },
    BlockQuote(TokenSeq),
    List(List),
    Table(Table),
    Hr,
    Html(String),
    Comment(String),
    Text(String),
    /// A backslash-escaped character; `raw` keeps the backslash.
    Escape(String),
    CodeSpan(String),
    Strong(TokenSeq),
    Em(TokenSeq),
    Del(TokenSeq),
    Link {
        href: String,
        title: Option<String>,
        tokens: TokenSeq,
    },
    Image {
        src: String,
        title: Option<String>,
        alt: String,
    },
    Br,
}

#[derive(Clone, Debug, PartialEq)]
pub struct List {
    pub ordered: bool,
    pub start: Option<u64>,
    pub loose: bool,
    pub items: Vec<ListItem>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListItem {
    pub raw: String,
    pub task: Option<bool>,
    pub tokens: TokenSeq,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub aligns: Vec<TableAlign>,
    pub header: Vec<TableCell>,
    pub rows: Vec<Vec<TableCell>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableCell {
    pub raw: String,
    pub tokens: TokenSeq,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TableAlign {
    None,
    Left,
    Center,
    Right,
}

impl Token {
    pub fn new(raw: impl Into<String>, kind: TokenKind) -> Self {
        Self {
            raw: raw.into(),
            kind,
        }
    }

    /// Child tokens of a container, or an empty slice for leaves.
    ///
    /// Lists and tables keep their children in items and cells; those are
    /// reached through [`TokenKind::List`] and [`TokenKind::Table`] directly.
    pub fn children(&self) -> &[Token] {
        match &self.kind {
            TokenKind::Paragraph(tokens)
            | TokenKind::Plain(tokens)
            | TokenKind::BlockQuote(tokens)
            | TokenKind::Strong(tokens)
            | TokenKind::Em(tokens)
            | TokenKind::Del(tokens)
            | TokenKind::Heading { tokens, .. }
            | TokenKind::Link { tokens, .. } => tokens,
            TokenKind::Space
            | TokenKind::Code { .. }
            | TokenKind::List(_)
            | TokenKind::Table(_)
            | TokenKind::Hr
            | TokenKind::Html(_)
            | TokenKind::Comment(_)
            | TokenKind::Text(_)
            | TokenKind::Escape(_)
            | TokenKind::CodeSpan(_)
            | TokenKind::Image { .. }
            | TokenKind::Br => &[],
        }
    }
}

/// Concatenates the `raw` text of a sibling sequence.
pub fn merge_raw<'a, I>(tokens: I) -> String
where
    I: IntoIterator<Item = &'a Token>,
{
    tokens.into_iter().fold(String::new(), |mut out, token| {
        out.push_str(&token.raw);
        out
    })
}

pub(crate) fn merge_item_raw(items: &[ListItem]) -> String {
    items.iter().map(|item| item.raw.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::{Token, TokenKind, merge_raw};

    #[test]
    fn merge_raw_concatenates_in_order() {
        let tokens = vec![
            Token::new("para\n", TokenKind::Paragraph(Vec::new())),
            Token::new("\n", TokenKind::Space),
            Token::new("---", TokenKind::Hr),
        ];
        assert_eq!(merge_raw(&tokens), "para\n\n---");
    }

    #[test]
    fn leaves_have_no_children() {
        let token = Token::new("`x`", TokenKind::CodeSpan("x".to_string()));
        assert!(token.children().is_empty());
    }
}
