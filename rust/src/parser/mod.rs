//! Recursive descent parser producing an arena [`SyntaxTree`].
//!
//! The parser works on the drained token vector from [`crate::lexer::tokenize`]
//! (comments removed, lex errors in place as `Error` tokens). It reads one
//! token ahead and rewinds to a [`Checkpoint`] for the few constructs that
//! need a longer look: the `match` soft keyword and parenthesized `with`
//! items.
//!
//! Every production returns `Result<NodeId, ParseError>`. An error unwinds to
//! the module loop, which drops the nodes of the failed top-level statement,
//! skips to the next statement at indentation level zero and keeps going.
//!
//! # Binary operator precedence
//!
//! | Level | Operators | Associativity |
//! |-------|-----------|---------------|
//! | 2  | `or`                                   | Left  |
//! | 4  | `and`                                  | Left  |
//! | 6  | `not` (prefix)                         |       |
//! | 8  | `<` `>` `==` `>=` `<=` `!=` `in` `not in` `is` `is not` | Left |
//! | 10 | `\|`                                   | Left  |
//! | 12 | `^`                                    | Left  |
//! | 14 | `&`                                    | Left  |
//! | 16 | `<<` `>>`                              | Left  |
//! | 18 | `+` `-`                                | Left  |
//! | 20 | `*` `/` `//` `%` `@`                   | Left  |
//! | 22 | unary `+` `-` `~`                      |       |
//! | 23 | `**`                                   | Right |

use tracing::{debug, warn};

use crate::error::ParseError;
use crate::span::Span;
use crate::syntax::{clean_docstring, Expr, LiteralKind, NodeId, NodeKind, SyntaxTree};
use crate::token::{Keyword, Token, TokenKind};

mod declarations;
mod expressions;
mod statements;


pub(super) type ParseResult<T> = Result<T, ParseError>;

const MAX_NESTING_DEPTH: usize = 64;

// ============================================================================
// Pratt binding powers
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub(super) struct BindingPower {
    pub(super) left: u8,
    pub(super) right: u8,
}

impl BindingPower {
    const fn left_assoc(precedence: u8) -> Self {
        Self {
            left: precedence,
            right: precedence + 1,
        }
    }

    const fn right_assoc(precedence: u8) -> Self {
        Self {
            left: precedence + 1,
            right: precedence,
        }
    }
}

/// Operand binding power of prefix `not`.
pub(super) const NOT_POWER: u8 = 6;
/// Lowest power that still parses `a | b`; used for starred items and loop targets.
pub(super) const BITOR_POWER: u8 = 10;
/// Operand binding power of unary `+`, `-` and `~`.
pub(super) const UNARY_POWER: u8 = 22;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum InfixClass {
    Bool,
    Compare,
    Binary,
}

/// Looks up an infix operator at the cursor. `next` is needed for the
/// two-token operators `not in` and `is not`.
///
/// Returns the operator text, its class, its binding power and how many
/// tokens it spans.
pub(super) fn infix_binding_power(
    token: &Token<'_>,
    next: &Token<'_>,
) -> Option<(&'static str, InfixClass, BindingPower, usize)> {
    match &token.kind {
        TokenKind::Keyword(Keyword::Or) => Some(("or", InfixClass::Bool, BindingPower::left_assoc(2), 1)),
        TokenKind::Keyword(Keyword::And) => Some(("and", InfixClass::Bool, BindingPower::left_assoc(4), 1)),
        TokenKind::Keyword(Keyword::In) => Some(("in", InfixClass::Compare, BindingPower::left_assoc(8), 1)),
        TokenKind::Keyword(Keyword::Not) if next.is_keyword(Keyword::In) => {
            Some(("not in", InfixClass::Compare, BindingPower::left_assoc(8), 2))
        }
        TokenKind::Keyword(Keyword::Is) if next.is_keyword(Keyword::Not) => {
            Some(("is not", InfixClass::Compare, BindingPower::left_assoc(8), 2))
        }
        TokenKind::Keyword(Keyword::Is) => Some(("is", InfixClass::Compare, BindingPower::left_assoc(8), 1)),
        TokenKind::Operator => {
            let (op, class, power) = match token.text {
                "<" => ("<", InfixClass::Compare, BindingPower::left_assoc(8)),
                ">" => (">", InfixClass::Compare, BindingPower::left_assoc(8)),
                "==" => ("==", InfixClass::Compare, BindingPower::left_assoc(8)),
                ">=" => (">=", InfixClass::Compare, BindingPower::left_assoc(8)),
                "<=" => ("<=", InfixClass::Compare, BindingPower::left_assoc(8)),
                "!=" => ("!=", InfixClass::Compare, BindingPower::left_assoc(8)),
                "|" => ("|", InfixClass::Binary, BindingPower::left_assoc(10)),
                "^" => ("^", InfixClass::Binary, BindingPower::left_assoc(12)),
                "&" => ("&", InfixClass::Binary, BindingPower::left_assoc(14)),
                "<<" => ("<<", InfixClass::Binary, BindingPower::left_assoc(16)),
                ">>" => (">>", InfixClass::Binary, BindingPower::left_assoc(16)),
                "+" => ("+", InfixClass::Binary, BindingPower::left_assoc(18)),
                "-" => ("-", InfixClass::Binary, BindingPower::left_assoc(18)),
                "*" => ("*", InfixClass::Binary, BindingPower::left_assoc(20)),
                "/" => ("/", InfixClass::Binary, BindingPower::left_assoc(20)),
                "//" => ("//", InfixClass::Binary, BindingPower::left_assoc(20)),
                "%" => ("%", InfixClass::Binary, BindingPower::left_assoc(20)),
                "@" => ("@", InfixClass::Binary, BindingPower::left_assoc(20)),
                // `-x ** 2` is `-(x ** 2)` but `2 ** -x` is legal: the right
                // side of `**` parses at unary level.
                "**" => ("**", InfixClass::Binary, BindingPower::right_assoc(UNARY_POWER + 1)),
                _ => return None,
            };
            Some((op, class, power, 1))
        }
        _ => None,
    }
}

// ============================================================================
// Entry point
// ============================================================================

#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub tree: SyntaxTree,
    pub errors: Vec<ParseError>,
}

/// Parses a token vector ending in `Eof` into a tree rooted at a module node.
///
/// With `recovery` off the first error ends the parse; the top-level
/// statements completed before it are kept.
pub fn parse(tokens: Vec<Token<'_>>, source: &str, recovery: bool) -> ParseOutput {
    let mut parser = Parser::new(tokens, recovery);
    parser.parse_module(source.len());
    debug!(
        nodes = parser.tree.len(),
        errors = parser.errors.len(),
        "parsed module"
    );
    ParseOutput {
        tree: parser.tree,
        errors: parser.errors,
    }
}

#[derive(Debug, Clone, Copy)]
pub(super) struct Checkpoint {
    current: usize,
    nodes: usize,
    last_end: u32,
    indent_depth: usize,
}

pub(super) struct Parser<'src> {
    tokens: Vec<Token<'src>>,
    current: usize,
    pub(super) tree: SyntaxTree,
    errors: Vec<ParseError>,
    recovery: bool,
    /// End of the last consumed significant token.
    last_end: u32,
    /// Indent tokens consumed minus dedent tokens consumed.
    indent_depth: usize,
    nesting_depth: usize,
}

impl<'src> Parser<'src> {
    fn new(mut tokens: Vec<Token<'src>>, recovery: bool) -> Self {
        if !tokens.last().is_some_and(|t| t.kind == TokenKind::Eof) {
            let end = tokens.last().map_or(0, |t| t.span.end());
            let start = tokens.last().map(|t| t.start).unwrap_or_default();
            tokens.push(Token {
                kind: TokenKind::Eof,
                text: "",
                span: Span::new(end, end),
                start,
            });
        }
        Self {
            tokens,
            current: 0,
            tree: SyntaxTree::new(),
            errors: Vec::new(),
            recovery,
            last_end: 0,
            indent_depth: 0,
            nesting_depth: 0,
        }
    }

    // ========================================================================
    // Token management
    // ========================================================================

    pub(super) fn current_token(&self) -> &Token<'src> {
        let last = self.tokens.len() - 1;
        &self.tokens[self.current.min(last)]
    }

    pub(super) fn peek_token(&self, offset: usize) -> &Token<'src> {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.current + offset).min(last)]
    }

    pub(super) fn is_at_end(&self) -> bool {
        self.current_token().kind == TokenKind::Eof
    }

    pub(super) fn advance(&mut self) -> Token<'src> {
        let token = self.current_token().clone();
        if token.kind == TokenKind::Eof {
            return token;
        }
        self.current += 1;
        match token.kind {
            TokenKind::Indent => self.indent_depth += 1,
            TokenKind::Dedent => self.indent_depth = self.indent_depth.saturating_sub(1),
            _ if token.is_significant() => self.last_end = self.last_end.max(token.span.end()),
            _ => {}
        }
        token
    }

    pub(super) fn check_kind(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current_token().kind) == std::mem::discriminant(kind)
    }

    pub(super) fn check_op(&self, op: &str) -> bool {
        self.current_token().is_op(op)
    }

    pub(super) fn check_keyword(&self, kw: Keyword) -> bool {
        self.current_token().is_keyword(kw)
    }

    pub(super) fn match_op(&mut self, op: &str) -> bool {
        if self.check_op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(super) fn match_keyword(&mut self, kw: Keyword) -> bool {
        if self.check_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(super) fn expect_op(&mut self, op: &str) -> ParseResult<Span> {
        if self.check_op(op) {
            Ok(self.advance().span)
        } else {
            Err(self.error_here(format!("'{op}'")))
        }
    }

    pub(super) fn expect_keyword(&mut self, kw: Keyword) -> ParseResult<Span> {
        if self.check_keyword(kw) {
            Ok(self.advance().span)
        } else {
            Err(self.error_here(format!("'{}'", kw.as_str())))
        }
    }

    pub(super) fn expect_name(&mut self, what: &str) -> ParseResult<(String, Span)> {
        if self.current_token().is_name() {
            let token = self.advance();
            Ok((token.text.to_string(), token.span))
        } else {
            Err(self.error_here(what))
        }
    }

    pub(super) fn expect_newline(&mut self) -> ParseResult<()> {
        if self.check_kind(&TokenKind::Newline) {
            self.advance();
            Ok(())
        } else {
            Err(self.error_here("newline"))
        }
    }

    pub(super) fn error_here(&self, expected: impl Into<String>) -> ParseError {
        let token = self.current_token();
        ParseError::new(token.span, expected, token.describe())
    }

    /// Start offset of the current token.
    pub(super) fn start(&self) -> u32 {
        self.current_token().span.start()
    }

    pub(super) fn span_from(&self, start: u32) -> Span {
        Span::new(start, self.last_end.max(start))
    }

    /// Creates a node spanning from `start` to the last consumed token.
    pub(super) fn finish_node(&mut self, kind: NodeKind, start: u32, children: Vec<NodeId>) -> NodeId {
        let span = self.span_from(start);
        self.tree.push(kind, span, children)
    }

    pub(super) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            current: self.current,
            nodes: self.tree.len(),
            last_end: self.last_end,
            indent_depth: self.indent_depth,
        }
    }

    pub(super) fn rewind(&mut self, checkpoint: Checkpoint) {
        self.current = checkpoint.current;
        self.tree.truncate(checkpoint.nodes);
        self.last_end = checkpoint.last_end;
        self.indent_depth = checkpoint.indent_depth;
    }

    /// Runs `parse` one nesting level deeper, failing past [`MAX_NESTING_DEPTH`].
    pub(super) fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<T> {
        if self.nesting_depth >= MAX_NESTING_DEPTH {
            let token = self.current_token();
            return Err(ParseError::new(
                token.span,
                format!("at most {MAX_NESTING_DEPTH} levels of nesting"),
                "deeper nesting",
            ));
        }
        self.nesting_depth += 1;
        let result = parse(self);
        self.nesting_depth -= 1;
        result
    }

    // ========================================================================
    // Module and recovery
    // ========================================================================

    fn parse_module(&mut self, source_len: usize) {
        let root = self.tree.push(NodeKind::Module { docstring: None }, Span::default(), Vec::new());
        let mut statements = Vec::new();
        // A docstring must be the first statement of the module, so nothing
        // may have been abandoned ahead of it.
        let mut docstring_allowed = true;

        while !self.is_at_end() {
            if self.check_kind(&TokenKind::Newline) {
                self.advance();
                continue;
            }
            let checkpoint = self.checkpoint();
            match self.parse_statement() {
                Ok(ids) => statements.extend(ids),
                Err(mut err) => {
                    if statements.is_empty() {
                        docstring_allowed = false;
                    }
                    let abandoned_start = self.tokens[checkpoint.current].span.start();
                    self.rewind_nodes(checkpoint);
                    if !self.recovery {
                        self.errors.push(err);
                        break;
                    }
                    self.synchronize(checkpoint.current);
                    let abandoned = self.span_from(abandoned_start);
                    warn!(
                        start = abandoned.start(),
                        end = abandoned.end(),
                        error = %err,
                        "abandoned top-level statement"
                    );
                    err.abandoned = Some(abandoned);
                    self.errors.push(err);
                }
            }
        }

        let docstring = statements
            .first()
            .filter(|_| docstring_allowed)
            .and_then(|&first| self.mark_docstring(first));
        self.tree
            .finish_root(root, Span::from(0..source_len), statements, docstring);
    }

    /// Discards the nodes and nesting depth of a failed statement but keeps the
    /// token cursor where the error was found.
    fn rewind_nodes(&mut self, checkpoint: Checkpoint) {
        self.tree.truncate(checkpoint.nodes);
        self.nesting_depth = 0;
    }

    /// Skips tokens until the start of a logical line at indentation level
    /// zero. Always consumes at least one token when the failed statement
    /// consumed none.
    fn synchronize(&mut self, statement_start: usize) {
        if self.current == statement_start {
            self.advance();
        }
        while !self.is_at_end() {
            let at_line_start = self.current == 0
                || matches!(
                    self.tokens[self.current - 1].kind,
                    TokenKind::Newline | TokenKind::Dedent
                );
            let layout = matches!(
                self.current_token().kind,
                TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent
            );
            if at_line_start && self.indent_depth == 0 && !layout {
                return;
            }
            self.advance();
        }
    }

    /// Turns `id` into a docstring block when it is a plain string literal
    /// expression statement.
    pub(super) fn mark_docstring(&mut self, id: NodeId) -> Option<NodeId> {
        let is_docstring = matches!(
            self.tree.kind(id),
            NodeKind::Expression(Expr::Literal(LiteralKind::String | LiteralKind::TripleString))
        );
        if !is_docstring {
            return None;
        }
        let span = self.tree.span(id);
        let raw = self
            .tokens
            .iter()
            .find(|t| t.span == span)
            .map(|t| t.text)?;
        self.tree.set_kind(
            id,
            NodeKind::DocstringBlock {
                text: clean_docstring(raw),
            },
        );
        Some(id)
    }
}
