//! Expression productions.
//!
//! Binary and boolean operators go through one Pratt loop driven by
//! [`infix_binding_power`]. Everything tighter than `**` (atoms, calls,
//! subscripts, attribute access) is handled by [`Parser::parse_primary`].

use crate::syntax::{Comprehension, ComprehensionClause, ComprehensionKind, Expr, LiteralKind, NodeId, NodeKind};
use crate::token::{string_prefix, Keyword, Token, TokenKind};

use super::{infix_binding_power, InfixClass, ParseResult, Parser, BITOR_POWER, NOT_POWER, UNARY_POWER};

fn literal_kind(token: &Token<'_>) -> LiteralKind {
    match token.kind {
        TokenKind::FString { .. } => LiteralKind::FString,
        _ if string_prefix(token.text).contains('b') => LiteralKind::Bytes,
        TokenKind::TripleString => LiteralKind::TripleString,
        _ => LiteralKind::String,
    }
}

impl Parser<'_> {
    /// True if the current token can begin an expression.
    pub(super) fn starts_expression(&self) -> bool {
        let token = self.current_token();
        match &token.kind {
            TokenKind::Name
            | TokenKind::Number
            | TokenKind::String
            | TokenKind::TripleString
            | TokenKind::FString { .. } => true,
            TokenKind::Keyword(kw) => matches!(
                kw,
                Keyword::None
                    | Keyword::True
                    | Keyword::False
                    | Keyword::Not
                    | Keyword::Lambda
                    | Keyword::Await
            ),
            TokenKind::Operator => matches!(
                token.text,
                "(" | "[" | "{" | "-" | "+" | "~" | "*" | "..."
            ),
            _ => false,
        }
    }

    fn expr(&mut self, expr: Expr, start: u32, children: Vec<NodeId>) -> NodeId {
        self.finish_node(NodeKind::Expression(expr), start, children)
    }

    /// Comma-separated expressions, starred items allowed. More than one
    /// item, or a trailing comma, makes a tuple.
    pub(super) fn parse_star_expressions(&mut self) -> ParseResult<NodeId> {
        let start = self.start();
        let first = self.parse_star_or_named()?;
        if !self.check_op(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.match_op(",") {
            if !self.starts_expression() {
                break;
            }
            items.push(self.parse_star_or_named()?);
        }
        Ok(self.expr(Expr::Tuple, start, items))
    }

    fn parse_star_or_named(&mut self) -> ParseResult<NodeId> {
        if self.check_op("*") {
            let start = self.start();
            self.advance();
            let operand = self.parse_binary(BITOR_POWER)?;
            Ok(self.expr(Expr::Starred, start, vec![operand]))
        } else {
            self.parse_named_expression()
        }
    }

    /// `NAME := test` or a plain `test`.
    pub(super) fn parse_named_expression(&mut self) -> ParseResult<NodeId> {
        if self.current_token().is_name() && self.peek_token(1).is_op(":=") {
            let start = self.start();
            let (name, _) = self.expect_name("name")?;
            self.advance();
            let value = self.parse_test()?;
            return Ok(self.expr(Expr::NamedExpr(name), start, vec![value]));
        }
        self.parse_test()
    }

    /// A full expression: lambda, or a disjunction with an optional
    /// `if ... else ...` suffix.
    pub(super) fn parse_test(&mut self) -> ParseResult<NodeId> {
        if self.check_keyword(Keyword::Lambda) {
            return self.nested(Self::parse_lambda);
        }
        let start = self.start();
        let body = self.parse_binary(0)?;
        if !self.match_keyword(Keyword::If) {
            return Ok(body);
        }
        let test = self.parse_binary(0)?;
        self.expect_keyword(Keyword::Else)?;
        let orelse = self.nested(Self::parse_test)?;
        Ok(self.expr(Expr::Conditional, start, vec![body, test, orelse]))
    }

    /// Pratt loop over prefix and infix operators. Only operators whose left
    /// binding power is at least `min_power` are consumed.
    pub(super) fn parse_binary(&mut self, min_power: u8) -> ParseResult<NodeId> {
        self.nested(|p| p.parse_binary_inner(min_power))
    }

    fn parse_binary_inner(&mut self, min_power: u8) -> ParseResult<NodeId> {
        let start = self.start();
        let mut lhs = if self.check_keyword(Keyword::Not) {
            self.advance();
            let operand = self.parse_binary(NOT_POWER)?;
            self.expr(Expr::Unary("not".to_string()), start, vec![operand])
        } else if self.check_op("-") || self.check_op("+") || self.check_op("~") {
            let op = self.advance().text.to_string();
            let operand = self.parse_binary(UNARY_POWER)?;
            self.expr(Expr::Unary(op), start, vec![operand])
        } else if self.match_keyword(Keyword::Await) {
            let operand = self.parse_primary()?;
            self.expr(Expr::Await, start, vec![operand])
        } else {
            self.parse_primary()?
        };

        while let Some((op, class, power, width)) =
            infix_binding_power(self.current_token(), self.peek_token(1))
        {
            if power.left < min_power {
                break;
            }
            for _ in 0..width {
                self.advance();
            }
            let rhs = self.parse_binary(power.right)?;
            let expr = match class {
                InfixClass::Bool => Expr::BoolOp(op.to_string()),
                InfixClass::Compare => Expr::Compare(op.to_string()),
                InfixClass::Binary => Expr::Binary(op.to_string()),
            };
            lhs = self.expr(expr, start, vec![lhs, rhs]);
        }
        Ok(lhs)
    }

    /// An atom followed by any number of calls, subscripts and attribute
    /// accesses.
    pub(super) fn parse_primary(&mut self) -> ParseResult<NodeId> {
        let start = self.start();
        let mut node = self.parse_atom()?;
        loop {
            if self.match_op("(") {
                let mut children = vec![node];
                children.extend(self.parse_call_arguments()?);
                self.expect_op(")")?;
                node = self.expr(Expr::Call, start, children);
            } else if self.match_op("[") {
                let index = self.parse_subscript()?;
                self.expect_op("]")?;
                node = self.expr(Expr::Subscript, start, vec![node, index]);
            } else if self.match_op(".") {
                let (name, _) = self.expect_name("attribute name")?;
                node = self.expr(Expr::Attribute(name), start, vec![node]);
            } else {
                return Ok(node);
            }
        }
    }

    /// Arguments up to the closing `)`, which is left for the caller.
    pub(super) fn parse_call_arguments(&mut self) -> ParseResult<Vec<NodeId>> {
        let mut args = Vec::new();
        while !self.check_op(")") {
            let start = self.start();
            let arg = if self.match_op("*") {
                let operand = self.parse_test()?;
                self.expr(Expr::Starred, start, vec![operand])
            } else if self.match_op("**") {
                let operand = self.parse_test()?;
                self.expr(Expr::DoubleStarred, start, vec![operand])
            } else if self.current_token().is_name() && self.peek_token(1).is_op("=") {
                let (name, _) = self.expect_name("argument name")?;
                self.advance();
                let value = self.parse_test()?;
                self.expr(Expr::KeywordArg(name), start, vec![value])
            } else {
                let value = self.parse_named_expression()?;
                if self.at_comprehension_for() {
                    let clauses = self.parse_comprehension_clauses()?;
                    self.push_comprehension(ComprehensionKind::Generator, value, None, clauses, start)
                } else {
                    value
                }
            };
            args.push(arg);
            if !self.match_op(",") {
                break;
            }
        }
        Ok(args)
    }

    fn parse_subscript(&mut self) -> ParseResult<NodeId> {
        let start = self.start();
        let first = self.parse_slice_item()?;
        if !self.check_op(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.match_op(",") {
            if self.check_op("]") {
                break;
            }
            items.push(self.parse_slice_item()?);
        }
        Ok(self.expr(Expr::Tuple, start, items))
    }

    /// `expr` or `[lower] ':' [upper] [':' [step]]`
    fn parse_slice_item(&mut self) -> ParseResult<NodeId> {
        let start = self.start();
        let mut children = Vec::new();
        if !self.check_op(":") {
            let lower = self.parse_star_or_named()?;
            if !self.check_op(":") {
                return Ok(lower);
            }
            children.push(lower);
        }
        self.expect_op(":")?;
        if !self.at_slice_end() {
            children.push(self.parse_test()?);
        }
        if self.match_op(":") && !self.at_slice_end() {
            children.push(self.parse_test()?);
        }
        Ok(self.expr(Expr::Slice, start, children))
    }

    fn at_slice_end(&self) -> bool {
        self.check_op("]") || self.check_op(",") || self.check_op(":")
    }

    // ========================================================================
    // Atoms
    // ========================================================================

    fn parse_atom(&mut self) -> ParseResult<NodeId> {
        let start = self.start();
        let token = self.current_token();
        match &token.kind {
            TokenKind::Name => {
                let name = token.text.to_string();
                self.advance();
                Ok(self.expr(Expr::Name(name), start, Vec::new()))
            }
            TokenKind::Number => self.literal(LiteralKind::Number, start),
            TokenKind::String | TokenKind::TripleString | TokenKind::FString { .. } => {
                self.parse_strings(start)
            }
            TokenKind::Keyword(Keyword::None) => self.literal(LiteralKind::None, start),
            TokenKind::Keyword(Keyword::True) => self.literal(LiteralKind::True, start),
            TokenKind::Keyword(Keyword::False) => self.literal(LiteralKind::False, start),
            TokenKind::Operator => match token.text {
                "(" => self.parse_parenthesized(start),
                "[" => self.parse_list_display(start),
                "{" => self.parse_brace_display(start),
                "..." => self.literal(LiteralKind::Ellipsis, start),
                _ => Err(self.error_here("expression")),
            },
            _ => Err(self.error_here("expression")),
        }
    }

    fn literal(&mut self, kind: LiteralKind, start: u32) -> ParseResult<NodeId> {
        self.advance();
        Ok(self.expr(Expr::Literal(kind), start, Vec::new()))
    }

    /// One string token, or adjacent ones concatenated.
    fn parse_strings(&mut self, start: u32) -> ParseResult<NodeId> {
        let first = self.advance();
        let mut kind = literal_kind(&first);
        while self.current_token().is_string() {
            self.advance();
            kind = LiteralKind::Concatenated;
        }
        Ok(self.expr(Expr::Literal(kind), start, Vec::new()))
    }

    /// `()`, `(expr)`, `(a, b)`, `(yield x)` and generator expressions.
    fn parse_parenthesized(&mut self, start: u32) -> ParseResult<NodeId> {
        self.advance();
        if self.match_op(")") {
            return Ok(self.expr(Expr::Tuple, start, Vec::new()));
        }
        if self.check_keyword(Keyword::Yield) {
            let inner = self.parse_yield()?;
            self.expect_op(")")?;
            return Ok(self.expr(Expr::Paren, start, vec![inner]));
        }
        let first = self.parse_star_or_named()?;
        if self.at_comprehension_for() {
            let clauses = self.parse_comprehension_clauses()?;
            self.expect_op(")")?;
            return Ok(self.push_comprehension(ComprehensionKind::Generator, first, None, clauses, start));
        }
        if !self.check_op(",") {
            self.expect_op(")")?;
            return Ok(self.expr(Expr::Paren, start, vec![first]));
        }
        let mut items = vec![first];
        while self.match_op(",") {
            if self.check_op(")") {
                break;
            }
            items.push(self.parse_star_or_named()?);
        }
        self.expect_op(")")?;
        Ok(self.expr(Expr::Tuple, start, items))
    }

    fn parse_list_display(&mut self, start: u32) -> ParseResult<NodeId> {
        self.advance();
        if self.match_op("]") {
            return Ok(self.expr(Expr::List, start, Vec::new()));
        }
        let first = self.parse_star_or_named()?;
        if self.at_comprehension_for() {
            let clauses = self.parse_comprehension_clauses()?;
            self.expect_op("]")?;
            return Ok(self.push_comprehension(ComprehensionKind::List, first, None, clauses, start));
        }
        let mut items = vec![first];
        while self.match_op(",") {
            if self.check_op("]") {
                break;
            }
            items.push(self.parse_star_or_named()?);
        }
        self.expect_op("]")?;
        Ok(self.expr(Expr::List, start, items))
    }

    /// Dict and set displays and their comprehensions.
    fn parse_brace_display(&mut self, start: u32) -> ParseResult<NodeId> {
        self.advance();
        if self.match_op("}") {
            return Ok(self.expr(Expr::Dict, start, Vec::new()));
        }
        if self.check_op("**") {
            let first = self.parse_dict_item()?;
            return self.finish_dict(start, first);
        }

        let first = self.parse_star_or_named()?;
        if self.match_op(":") {
            let value = self.parse_test()?;
            if self.at_comprehension_for() {
                let clauses = self.parse_comprehension_clauses()?;
                self.expect_op("}")?;
                return Ok(self.push_comprehension(
                    ComprehensionKind::Dict,
                    first,
                    Some(value),
                    clauses,
                    start,
                ));
            }
            let key_start = self.tree.span(first).start();
            let entry = self.expr(Expr::DictEntry, key_start, vec![first, value]);
            return self.finish_dict(start, entry);
        }

        if self.at_comprehension_for() {
            let clauses = self.parse_comprehension_clauses()?;
            self.expect_op("}")?;
            return Ok(self.push_comprehension(ComprehensionKind::Set, first, None, clauses, start));
        }
        let mut items = vec![first];
        while self.match_op(",") {
            if self.check_op("}") {
                break;
            }
            items.push(self.parse_star_or_named()?);
        }
        self.expect_op("}")?;
        Ok(self.expr(Expr::Set, start, items))
    }

    /// Remaining `, key: value` and `, **mapping` items after the first.
    fn finish_dict(&mut self, start: u32, first: NodeId) -> ParseResult<NodeId> {
        let mut entries = vec![first];
        while self.match_op(",") {
            if self.check_op("}") {
                break;
            }
            entries.push(self.parse_dict_item()?);
        }
        self.expect_op("}")?;
        Ok(self.expr(Expr::Dict, start, entries))
    }

    fn parse_dict_item(&mut self) -> ParseResult<NodeId> {
        let start = self.start();
        if self.match_op("**") {
            let operand = self.parse_binary(BITOR_POWER)?;
            return Ok(self.expr(Expr::DoubleStarred, start, vec![operand]));
        }
        let key = self.parse_test()?;
        self.expect_op(":")?;
        let value = self.parse_test()?;
        Ok(self.expr(Expr::DictEntry, start, vec![key, value]))
    }

    // ========================================================================
    // Comprehensions, lambda, yield, targets
    // ========================================================================

    fn at_comprehension_for(&self) -> bool {
        self.check_keyword(Keyword::For)
            || (self.check_keyword(Keyword::Async) && self.peek_token(1).is_keyword(Keyword::For))
    }

    /// `('async'? 'for' targets 'in' iterable ('if' condition)*)+`
    fn parse_comprehension_clauses(&mut self) -> ParseResult<Vec<ComprehensionClause>> {
        let mut clauses = Vec::new();
        while self.at_comprehension_for() {
            let is_async = self.match_keyword(Keyword::Async);
            self.expect_keyword(Keyword::For)?;
            let target = self.parse_target_list()?;
            self.expect_keyword(Keyword::In)?;
            let iterable = self.parse_binary(0)?;
            let mut conditions = Vec::new();
            while self.match_keyword(Keyword::If) {
                conditions.push(self.parse_binary(0)?);
            }
            clauses.push(ComprehensionClause {
                is_async,
                target,
                iterable,
                conditions,
            });
        }
        Ok(clauses)
    }

    fn push_comprehension(
        &mut self,
        kind: ComprehensionKind,
        element: NodeId,
        value: Option<NodeId>,
        clauses: Vec<ComprehensionClause>,
        start: u32,
    ) -> NodeId {
        let mut children = vec![element];
        children.extend(value);
        for clause in &clauses {
            children.push(clause.target);
            children.push(clause.iterable);
            children.extend(&clause.conditions);
        }
        let kind = NodeKind::Comprehension(Comprehension {
            kind,
            element,
            value,
            clauses,
        });
        self.finish_node(kind, start, children)
    }

    fn parse_lambda(&mut self) -> ParseResult<NodeId> {
        let start = self.start();
        self.expect_keyword(Keyword::Lambda)?;
        let (params, mut children) = self.parse_parameters(":", false)?;
        self.expect_op(":")?;
        let body = self.parse_test()?;
        children.push(body);
        Ok(self.finish_node(NodeKind::Lambda { params, body }, start, children))
    }

    pub(super) fn parse_yield(&mut self) -> ParseResult<NodeId> {
        let start = self.start();
        self.expect_keyword(Keyword::Yield)?;
        if self.match_keyword(Keyword::From) {
            let value = self.parse_test()?;
            return Ok(self.expr(Expr::YieldFrom, start, vec![value]));
        }
        let mut children = Vec::new();
        if self.starts_expression() {
            children.push(self.parse_star_expressions()?);
        }
        Ok(self.expr(Expr::Yield, start, children))
    }

    /// Loop targets, `del` targets and comprehension targets: expressions
    /// tighter than comparisons, so `in` ends them.
    pub(super) fn parse_target_list(&mut self) -> ParseResult<NodeId> {
        let start = self.start();
        let first = self.parse_star_target()?;
        if !self.check_op(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.match_op(",") {
            if !self.starts_expression() {
                break;
            }
            items.push(self.parse_star_target()?);
        }
        Ok(self.expr(Expr::Tuple, start, items))
    }

    pub(super) fn parse_star_target(&mut self) -> ParseResult<NodeId> {
        if self.check_op("*") {
            let start = self.start();
            self.advance();
            let operand = self.parse_binary(BITOR_POWER)?;
            return Ok(self.expr(Expr::Starred, start, vec![operand]));
        }
        self.parse_binary(BITOR_POWER)
    }

    /// A `case` pattern. Parsed as expressions without the conditional
    /// suffix so a trailing guard `if` stays for the caller.
    pub(super) fn parse_pattern(&mut self) -> ParseResult<NodeId> {
        let start = self.start();
        let first = self.parse_pattern_item()?;
        if !self.check_op(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.match_op(",") {
            if !self.starts_expression() {
                break;
            }
            items.push(self.parse_pattern_item()?);
        }
        Ok(self.expr(Expr::Tuple, start, items))
    }

    fn parse_pattern_item(&mut self) -> ParseResult<NodeId> {
        if self.check_op("*") {
            return self.parse_star_target();
        }
        self.parse_binary(0)
    }
}
