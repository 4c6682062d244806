use std::collections::VecDeque;
use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::{LexError, LexErrorKind};
use crate::token::{string_prefix, Keyword, Token, TokenKind};
use crate::span::{LineIndex, Position, Span};

// Longest operators first so prefix matching picks the longest token.
const OPERATORS: [&str; 47] = [
    "**=", "//=", ">>=", "<<=", "...", "**", "//", "<<", ">>", "<=", ">=", "==", "!=", "->",
    "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "@=", ":=", "+", "-", "*", "/", "%", "@",
    "&", "|", "^", "~", "<", ">", "(", ")", "[", "]", "{", "}", ",", ":", ".", ";", "=",
];

const TAB_WIDTH: usize = 4;

/// Streaming tokenizer for indentation-sensitive source.
///
/// Yields `Err` for malformed input and then keeps going from the first
/// character after the offending region, so a caller sees every problem in
/// one pass. After `Eof` the iterator is exhausted; [`Lexer::restart`] rewinds
/// it to offset zero.
pub struct Lexer<'src> {
    source: &'src str,
    chars: Peekable<CharIndices<'src>>,
    position: usize,
    line: usize,
    column: usize,
    at_line_start: bool,
    line_has_tokens: bool,
    indent_stack: Vec<usize>,
    brackets: Vec<(char, Span)>,
    pending: VecDeque<Result<Token<'src>, LexError>>,
    done: bool,
}

impl std::fmt::Debug for Lexer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lexer")
            .field("position", &self.position)
            .field("indent_stack", &self.indent_stack)
            .field("done", &self.done)
            .finish()
    }
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            position: 0,
            line: 1,
            column: 0,
            at_line_start: true,
            line_has_tokens: false,
            indent_stack: vec![0],
            brackets: Vec::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }

    pub fn restart(&mut self) {
        *self = Self::new(self.source);
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn peek_char_n(&self, n: usize) -> Option<char> {
        self.chars.clone().nth(n).map(|(_, c)| c)
    }

    fn advance(&mut self) -> Option<char> {
        let (pos, c) = self.chars.next()?;
        self.position = pos + c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn advance_while(&mut self, predicate: impl Fn(char) -> bool) {
        while self.peek_char().is_some_and(&predicate) {
            self.advance();
        }
    }

    fn here(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn span_from(&self, start: usize) -> Span {
        Span::from(start..self.position)
    }

    fn token(&self, kind: TokenKind, start: usize, at: Position) -> Token<'src> {
        let source = self.source;
        Token {
            kind,
            text: &source[start..self.position],
            span: self.span_from(start),
            start: at,
        }
    }

    fn push(&mut self, token: Token<'src>) {
        self.pending.push_back(Ok(token));
    }

    fn push_error(&mut self, kind: LexErrorKind, span: Span) {
        self.pending.push_back(Err(LexError::new(kind, span)));
    }

    fn step(&mut self) {
        if self.at_line_start && self.brackets.is_empty() {
            self.lex_line_start();
        } else {
            self.lex_token();
        }
    }

    /// Measures indentation and skips blank and comment-only lines.
    fn lex_line_start(&mut self) {
        let start = self.position;
        let at = self.here();
        let mut width = 0;
        while let Some(c) = self.peek_char() {
            match c {
                ' ' => width += 1,
                '\t' => width += TAB_WIDTH,
                '\x0c' => width = 0,
                '\r' => {}
                _ => break,
            }
            self.advance();
        }
        match self.peek_char() {
            None => self.finish(),
            Some('\n') => {
                self.advance();
            }
            Some('#') => {
                self.lex_comment();
            }
            Some(_) => {
                self.at_line_start = false;
                let indent = self.token(TokenKind::Indent, start, at);
                self.apply_indentation(width, indent);
            }
        }
    }

    fn apply_indentation(&mut self, width: usize, indent: Token<'src>) {
        let top = self.indent_stack.last().copied().unwrap_or(0);
        if width > top {
            self.indent_stack.push(width);
            self.push(indent);
            return;
        }
        while self.indent_stack.last().is_some_and(|&level| level > width) {
            self.indent_stack.pop();
            let here = self.position;
            self.push(Token {
                kind: TokenKind::Dedent,
                text: "",
                span: Span::from(here..here),
                start: self.here(),
            });
        }
        if self.indent_stack.last().copied().unwrap_or(0) != width {
            self.push_error(LexErrorKind::InconsistentDedent, indent.span);
        }
    }

    fn lex_comment(&mut self) {
        let start = self.position;
        let at = self.here();
        self.advance_while(|c| c != '\n');
        let mut token = self.token(TokenKind::Comment, start, at);
        // Keep a trailing `\r` of CRLF files out of the comment text.
        token.text = token.text.trim_end_matches('\r');
        self.push(token);
    }

    fn lex_token(&mut self) {
        self.advance_while(|c| matches!(c, ' ' | '\t' | '\x0c' | '\r'));
        let start = self.position;
        let at = self.here();
        let Some(c) = self.peek_char() else {
            self.finish();
            return;
        };
        match c {
            '\n' => {
                self.advance();
                if !self.brackets.is_empty() && declaration_follows(&self.source[self.position..]) {
                    self.close_dangling_brackets();
                }
                if self.brackets.is_empty() {
                    let token = self.token(TokenKind::Newline, start, at);
                    self.push(token);
                    self.at_line_start = true;
                    self.line_has_tokens = false;
                }
            }
            '#' => self.lex_comment(),
            '\\' => {
                self.advance();
                self.advance_while(|c| c == '\r');
                if self.peek_char() == Some('\n') {
                    self.advance();
                } else {
                    self.line_has_tokens = true;
                    self.push_error(LexErrorKind::StrayContinuation, self.span_from(start));
                }
            }
            c if c.is_alphabetic() || c == '_' => self.lex_name(start, at),
            c if c.is_ascii_digit() => self.lex_number(start, at),
            '.' if self.peek_char_n(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.lex_number(start, at)
            }
            '"' | '\'' => self.lex_string(start, at),
            '@' if !self.line_has_tokens && self.brackets.is_empty() => {
                self.advance();
                self.line_has_tokens = true;
                let token = self.token(TokenKind::DecoratorStart, start, at);
                self.push(token);
            }
            _ => self.lex_operator(start, at),
        }
    }

    fn lex_name(&mut self, start: usize, at: Position) {
        self.advance_while(|c| c.is_alphanumeric() || c == '_');
        self.line_has_tokens = true;
        let source = self.source;
        let text = &source[start..self.position];
        let is_prefix = text.len() <= 2
            && text
                .chars()
                .all(|c| matches!(c.to_ascii_lowercase(), 'r' | 'u' | 'f' | 'b'));
        if is_prefix && matches!(self.peek_char(), Some('"' | '\'')) {
            self.lex_string(start, at);
            return;
        }
        let kind = Keyword::lookup(text).map_or(TokenKind::Name, TokenKind::Keyword);
        let token = self.token(kind, start, at);
        self.push(token);
    }

    fn lex_number(&mut self, start: usize, at: Position) {
        self.line_has_tokens = true;
        let radix = self.peek_char() == Some('0')
            && matches!(
                self.peek_char_n(1),
                Some('x' | 'X' | 'o' | 'O' | 'b' | 'B')
            );
        if radix {
            self.advance();
            self.advance();
            self.advance_while(|c| c.is_ascii_hexdigit() || c == '_');
        } else {
            self.advance_while(|c| c.is_ascii_digit() || c == '_');
            if self.peek_char() == Some('.') {
                self.advance();
                self.advance_while(|c| c.is_ascii_digit() || c == '_');
            }
            if matches!(self.peek_char(), Some('e' | 'E')) {
                let signed = matches!(self.peek_char_n(1), Some('+' | '-'));
                let digit_at = if signed { 2 } else { 1 };
                if self.peek_char_n(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                    if signed {
                        self.advance();
                    }
                    self.advance_while(|c| c.is_ascii_digit() || c == '_');
                }
            }
            if matches!(self.peek_char(), Some('j' | 'J')) {
                self.advance();
            }
        }
        let token = self.token(TokenKind::Number, start, at);
        self.push(token);
    }

    /// Lexes a string whose prefix (possibly empty) starts at `start`; the
    /// cursor is on the opening quote.
    fn lex_string(&mut self, start: usize, at: Position) {
        self.line_has_tokens = true;
        let prefix = string_prefix(&self.source[start..self.position + 1]);
        let interpolated = prefix.contains('f');
        let Some(quote) = self.advance() else {
            return;
        };
        let triple = self.peek_char() == Some(quote) && self.peek_char_n(1) == Some(quote);
        if triple {
            self.advance();
            self.advance();
        }

        match self.scan_string_body(quote, triple, interpolated) {
            Ok(interpolations) => {
                let kind = if interpolated {
                    TokenKind::FString { interpolations }
                } else if triple {
                    TokenKind::TripleString
                } else {
                    TokenKind::String
                };
                let token = self.token(kind, start, at);
                self.push(token);
            }
            Err(kind) => self.push_error(kind, self.span_from(start)),
        }
    }

    fn at_closing_quote(&self, quote: char, triple: bool) -> bool {
        let mut ahead = self.chars.clone();
        let count = if triple { 3 } else { 1 };
        (0..count).all(|_| ahead.next().is_some_and(|(_, c)| c == quote))
    }

    fn scan_string_body(
        &mut self,
        quote: char,
        triple: bool,
        interpolated: bool,
    ) -> Result<Vec<Span>, LexErrorKind> {
        let unterminated = if triple {
            LexErrorKind::UnterminatedTripleString
        } else {
            LexErrorKind::UnterminatedString
        };
        let mut interpolations = Vec::new();
        loop {
            match self.peek_char() {
                None => return Err(unterminated),
                Some('\n') if !triple => return Err(unterminated),
                Some('\\') => {
                    self.advance();
                    if self.advance().is_none() {
                        return Err(unterminated);
                    }
                }
                Some(c) if c == quote && self.at_closing_quote(quote, triple) => {
                    let count = if triple { 3 } else { 1 };
                    for _ in 0..count {
                        self.advance();
                    }
                    return Ok(interpolations);
                }
                Some('{') if interpolated => {
                    if self.peek_char_n(1) == Some('{') {
                        self.advance();
                        self.advance();
                    } else {
                        interpolations.push(self.scan_interpolation(quote, triple)?);
                    }
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }

    /// Scans one `{...}` replacement field, returning the span between the
    /// braces.
    fn scan_interpolation(&mut self, quote: char, triple: bool) -> Result<Span, LexErrorKind> {
        self.advance();
        let start = self.position;
        let mut depth = 1usize;
        loop {
            match self.peek_char() {
                None => return Err(LexErrorKind::UnterminatedInterpolation),
                Some('\n') if !triple => return Err(LexErrorKind::UnterminatedInterpolation),
                Some(c) if c == quote && self.at_closing_quote(quote, triple) => {
                    // The literal ends inside the field; consume the closing
                    // quote so lexing resumes after the broken literal.
                    let count = if triple { 3 } else { 1 };
                    for _ in 0..count {
                        self.advance();
                    }
                    return Err(LexErrorKind::UnterminatedInterpolation);
                }
                Some(inner @ ('"' | '\'')) => {
                    self.advance();
                    self.advance_while(|c| c != inner && c != '\n');
                    if self.peek_char() == Some(inner) {
                        self.advance();
                    }
                }
                Some('{') => {
                    depth += 1;
                    self.advance();
                }
                Some('}') => {
                    depth -= 1;
                    if depth == 0 {
                        let span = self.span_from(start);
                        self.advance();
                        return Ok(span);
                    }
                    self.advance();
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }

    fn lex_operator(&mut self, start: usize, at: Position) {
        self.line_has_tokens = true;
        let source = self.source;
        let rest = &source[start..];
        let Some(op) = OPERATORS.iter().find(|op| rest.starts_with(**op)) else {
            let c = self.advance().unwrap_or('\0');
            self.push_error(LexErrorKind::UnexpectedCharacter(c), self.span_from(start));
            return;
        };
        for _ in 0..op.len() {
            self.advance();
        }
        let span = self.span_from(start);
        match *op {
            "(" | "[" | "{" => self.brackets.push((op.chars().next().unwrap_or('('), span)),
            ")" | "]" | "}" => {
                self.brackets.pop();
            }
            _ => {}
        }
        let token = self.token(TokenKind::Operator, start, at);
        self.push(token);
    }

    /// Reports the outermost open bracket and forgets all of them.
    fn close_dangling_brackets(&mut self) {
        if let Some(&(open, span)) = self.brackets.first() {
            self.push_error(LexErrorKind::UnclosedDelimiter(open), span);
            self.brackets.clear();
        }
    }

    /// Closes the stream: final newline, unclosed brackets, dedents, `Eof`.
    fn finish(&mut self) {
        let end = self.position;
        let empty = Span::from(end..end);
        self.close_dangling_brackets();
        let at = self.here();
        let layout = |kind: TokenKind| -> Token<'src> {
            Token {
                kind,
                text: "",
                span: empty,
                start: at,
            }
        };
        if self.line_has_tokens {
            self.push(layout(TokenKind::Newline));
            self.line_has_tokens = false;
        }
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.push(layout(TokenKind::Dedent));
        }
        self.push(layout(TokenKind::Eof));
        self.done = true;
    }
}

/// True when the next non-blank line starts in column zero with `def`,
/// `class` or `async def`, possibly after column-zero decorator lines. Such a
/// line can never continue a bracketed expression.
fn declaration_follows(rest: &str) -> bool {
    let starts_with_word = |line: &str, word: &str| {
        line.strip_prefix(word)
            .is_some_and(|tail| tail.starts_with([' ', '\t']))
    };
    for line in rest.lines() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || line.starts_with('@') {
            continue;
        }
        return starts_with_word(line, "def")
            || starts_with_word(line, "class")
            || (starts_with_word(line, "async") && starts_with_word(line[5..].trim_start(), "def"));
    }
    false
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Result<Token<'src>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            if self.done {
                return None;
            }
            self.step();
        }
    }
}

/// A fully drained token stream, split for the parser.
#[derive(Debug, Clone, Default)]
pub struct Tokens<'src> {
    /// Grammar tokens in source order, ending with `Eof`. Lex errors appear
    /// in place as `TokenKind::Error` tokens.
    pub tokens: Vec<Token<'src>>,
    pub comments: Vec<Token<'src>>,
    pub errors: Vec<LexError>,
}

pub fn tokenize(source: &str) -> Tokens<'_> {
    let lines = LineIndex::new(source);
    let mut out = Tokens::default();
    for item in Lexer::new(source) {
        match item {
            Ok(token) if token.kind == TokenKind::Comment => out.comments.push(token),
            Ok(token) => out.tokens.push(token),
            Err(err) => {
                out.tokens.push(Token {
                    kind: TokenKind::Error,
                    text: err.span.text(source),
                    span: err.span,
                    start: lines.position(err.span.start()),
                });
                out.errors.push(err);
            }
        }
    }
    out
}
