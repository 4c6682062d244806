//! Diagnostics produced by a parse session.
//!
//! Lex and parse failures are recoverable and are reported next to the
//! best-effort facts, never instead of them. Extract failures signal a broken
//! tree invariant and should not occur for trees built by [`crate::parser`].

use serde::Serialize;
use thiserror::Error;

use crate::span::{LineIndex, Span};

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
}

impl LexError {
    pub fn new(kind: LexErrorKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum LexErrorKind {
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated triple-quoted string literal")]
    UnterminatedTripleString,
    #[error("unterminated replacement field in f-string")]
    UnterminatedInterpolation,
    #[error("'{0}' was never closed")]
    UnclosedDelimiter(char),
    #[error("unindent does not match any outer indentation level")]
    InconsistentDedent,
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),
    #[error("unexpected character after line continuation")]
    StrayContinuation,
}

/// A malformed grammar construct.
///
/// `abandoned` is set when statement-level recovery skipped the enclosing
/// top-level statement; it covers everything that was thrown away.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("expected {expected}, found {found}")]
pub struct ParseError {
    pub span: Span,
    pub expected: String,
    pub found: String,
    pub abandoned: Option<Span>,
}

impl ParseError {
    pub fn new(span: Span, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self {
            span,
            expected: expected.into(),
            found: found.into(),
            abandoned: None,
        }
    }
}

/// The syntax tree violated a structural invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum ExtractError {
    #[error("decorator is not attached to a class or function definition")]
    DetachedDecorator { span: Span },
    #[error("module node nested below the root")]
    NestedModule { span: Span },
    #[error("node span {child:?} escapes its parent span {parent:?}")]
    SpanOutsideParent { parent: Span, child: Span },
}

impl ExtractError {
    pub fn span(&self) -> Span {
        match self {
            Self::DetachedDecorator { span } | Self::NestedModule { span } => *span,
            Self::SpanOutsideParent { child, .. } => *child,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Diagnostic {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

impl Diagnostic {
    pub fn span(&self) -> Span {
        match self {
            Self::Lex(e) => e.span,
            Self::Parse(e) => e.span,
            Self::Extract(e) => e.span(),
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            Self::Lex(_) => "lex",
            Self::Parse(_) => "parse",
            Self::Extract(_) => "extract",
        }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }

    /// `file:line:col: stage error: message`
    pub fn render(&self, file: &str, lines: &LineIndex<'_>) -> String {
        let start = lines.position(self.span().start());
        format!("{file}:{start}: {} error: {self}", self.stage())
    }
}
