use serde::Serialize;

use crate::span::{Position, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Keyword {
    False,
    None,
    True,
    And,
    As,
    Assert,
    Async,
    Await,
    Break,
    Class,
    Continue,
    Def,
    Del,
    Elif,
    Else,
    Except,
    Finally,
    For,
    From,
    Global,
    If,
    Import,
    In,
    Is,
    Lambda,
    Nonlocal,
    Not,
    Or,
    Pass,
    Raise,
    Return,
    Try,
    While,
    With,
    Yield,
}

impl Keyword {
    const ALL: [(&'static str, Keyword); 35] = [
        ("False", Keyword::False),
        ("None", Keyword::None),
        ("True", Keyword::True),
        ("and", Keyword::And),
        ("as", Keyword::As),
        ("assert", Keyword::Assert),
        ("async", Keyword::Async),
        ("await", Keyword::Await),
        ("break", Keyword::Break),
        ("class", Keyword::Class),
        ("continue", Keyword::Continue),
        ("def", Keyword::Def),
        ("del", Keyword::Del),
        ("elif", Keyword::Elif),
        ("else", Keyword::Else),
        ("except", Keyword::Except),
        ("finally", Keyword::Finally),
        ("for", Keyword::For),
        ("from", Keyword::From),
        ("global", Keyword::Global),
        ("if", Keyword::If),
        ("import", Keyword::Import),
        ("in", Keyword::In),
        ("is", Keyword::Is),
        ("lambda", Keyword::Lambda),
        ("nonlocal", Keyword::Nonlocal),
        ("not", Keyword::Not),
        ("or", Keyword::Or),
        ("pass", Keyword::Pass),
        ("raise", Keyword::Raise),
        ("return", Keyword::Return),
        ("try", Keyword::Try),
        ("while", Keyword::While),
        ("with", Keyword::With),
        ("yield", Keyword::Yield),
    ];

    pub fn lookup(ident: &str) -> Option<Keyword> {
        Self::ALL
            .iter()
            .find(|(text, _)| *text == ident)
            .map(|(_, kw)| *kw)
    }

    pub fn as_str(self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(_, kw)| *kw == self)
            .map_or("", |(text, _)| text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    Name,
    Keyword(Keyword),
    Number,
    /// Single- or double-quoted string, any non-f prefix.
    String,
    /// `"""..."""` or `'''...'''`, any non-f prefix.
    TripleString,
    /// Interpolated literal. Spans cover the text between each `{` and `}`.
    FString { interpolations: Vec<Span> },
    Operator,
    /// `@` opening a logical line.
    DecoratorStart,
    Newline,
    Indent,
    Dedent,
    Comment,
    /// Text the lexer rejected; see the matching `LexError`.
    Error,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub text: &'src str,
    pub span: Span,
    pub start: Position,
}

impl<'src> Token<'src> {
    pub fn is_op(&self, op: &str) -> bool {
        self.kind == TokenKind::Operator && self.text == op
    }

    pub fn is_keyword(&self, kw: Keyword) -> bool {
        self.kind == TokenKind::Keyword(kw)
    }

    pub fn is_name(&self) -> bool {
        self.kind == TokenKind::Name
    }

    pub fn is_string(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::String | TokenKind::TripleString | TokenKind::FString { .. }
        )
    }

    /// Comments and layout tokens carry no grammar content of their own.
    pub fn is_significant(&self) -> bool {
        !matches!(
            self.kind,
            TokenKind::Comment
                | TokenKind::Newline
                | TokenKind::Indent
                | TokenKind::Dedent
                | TokenKind::Eof
        )
    }

    /// Short human description used in parse diagnostics.
    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Name => format!("name '{}'", self.text),
            TokenKind::Keyword(kw) => format!("keyword '{}'", kw.as_str()),
            TokenKind::Number => format!("number {}", self.text),
            TokenKind::String | TokenKind::TripleString | TokenKind::FString { .. } => {
                "string literal".to_string()
            }
            TokenKind::Operator => format!("'{}'", self.text),
            TokenKind::DecoratorStart => "decorator".to_string(),
            TokenKind::Newline => "newline".to_string(),
            TokenKind::Indent => "unexpected indent".to_string(),
            TokenKind::Dedent => "end of block".to_string(),
            TokenKind::Comment => "comment".to_string(),
            TokenKind::Error => "invalid token".to_string(),
            TokenKind::Eof => "end of file".to_string(),
        }
    }
}

/// Letters before the opening quote of a string token, lowercased.
pub fn string_prefix(text: &str) -> String {
    text.chars()
        .take_while(|c| *c != '"' && *c != '\'')
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_lookup_roundtrip() {
        assert_eq!(Keyword::lookup("lambda"), Some(Keyword::Lambda));
        assert_eq!(Keyword::lookup("None"), Some(Keyword::None));
        assert_eq!(Keyword::lookup("none"), None);
        assert_eq!(Keyword::Finally.as_str(), "finally");
    }

    #[test]
    fn prefixes() {
        assert_eq!(string_prefix("\"abc\""), "");
        assert_eq!(string_prefix("Rb'x'"), "rb");
        assert_eq!(string_prefix("f\"{x}\""), "f");
    }
}
