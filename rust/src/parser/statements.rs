//! Statement productions: simple statements, blocks, control flow, `try`,
//! imports and assignments.

use crate::error::ParseError;
use crate::span::Span;
use crate::syntax::{
    AssignOp, Assignment, Control, ControlKind, ExceptClause, Expr, Import, ImportName, NodeId, NodeKind,
    SimpleKind, TryBlock,
};
use crate::token::{Keyword, TokenKind};

use super::{ParseResult, Parser};

const AUGMENTED_OPS: [&str; 13] = [
    "+=", "-=", "*=", "/=", "//=", "%=", "@=", "&=", "|=", "^=", ">>=", "<<=", "**=",
];

impl Parser<'_> {
    /// Parses one statement line. Simple statements separated by `;` come
    /// back as several nodes.
    pub(super) fn parse_statement(&mut self) -> ParseResult<Vec<NodeId>> {
        self.nested(|p| {
            let start = p.start();
            let kind = p.current_token().kind.clone();
            let soft_match = p.current_token().is_name() && p.current_token().text == "match";
            let compound = match kind {
                TokenKind::DecoratorStart => Some(p.parse_decorated()?),
                TokenKind::Keyword(Keyword::Def) => Some(p.parse_function(start, Vec::new(), false)?),
                TokenKind::Keyword(Keyword::Class) => Some(p.parse_class(start, Vec::new())?),
                TokenKind::Keyword(Keyword::Async) => Some(p.parse_async()?),
                TokenKind::Keyword(Keyword::If) => Some(p.parse_if()?),
                TokenKind::Keyword(Keyword::While) => Some(p.parse_while()?),
                TokenKind::Keyword(Keyword::For) => Some(p.parse_for(start, false)?),
                TokenKind::Keyword(Keyword::Try) => Some(p.parse_try()?),
                TokenKind::Keyword(Keyword::With) => Some(p.parse_with(start, false)?),
                TokenKind::Name if soft_match && p.at_match_statement() => Some(p.parse_match()?),
                TokenKind::Indent => return Err(p.error_here("statement")),
                _ => None,
            };
            match compound {
                Some(node) => Ok(vec![node]),
                None => p.parse_simple_statements(),
            }
        })
    }

    /// `small_stmt (';' small_stmt)* [';'] NEWLINE`
    fn parse_simple_statements(&mut self) -> ParseResult<Vec<NodeId>> {
        let mut statements = vec![self.parse_small_statement()?];
        while self.match_op(";") {
            if self.check_kind(&TokenKind::Newline) {
                break;
            }
            statements.push(self.parse_small_statement()?);
        }
        self.expect_newline()?;
        Ok(statements)
    }

    fn parse_small_statement(&mut self) -> ParseResult<NodeId> {
        let start = self.start();
        let keyword = match self.current_token().kind {
            TokenKind::Keyword(kw) => Some(kw),
            _ => None,
        };
        match keyword {
            Some(Keyword::Pass) => self.parse_bare(SimpleKind::Pass, start),
            Some(Keyword::Break) => self.parse_bare(SimpleKind::Break, start),
            Some(Keyword::Continue) => self.parse_bare(SimpleKind::Continue, start),
            Some(Keyword::Return) => {
                self.advance();
                let mut children = Vec::new();
                if self.starts_expression() {
                    children.push(self.parse_star_expressions()?);
                }
                Ok(self.finish_node(NodeKind::Simple(SimpleKind::Return), start, children))
            }
            Some(Keyword::Raise) => {
                self.advance();
                let mut children = Vec::new();
                if self.starts_expression() {
                    children.push(self.parse_test()?);
                    if self.match_keyword(Keyword::From) {
                        children.push(self.parse_test()?);
                    }
                }
                Ok(self.finish_node(NodeKind::Simple(SimpleKind::Raise), start, children))
            }
            Some(Keyword::Del) => {
                self.advance();
                let target = self.parse_target_list()?;
                Ok(self.finish_node(NodeKind::Simple(SimpleKind::Del), start, vec![target]))
            }
            Some(Keyword::Global) => self.parse_name_list(SimpleKind::Global, start),
            Some(Keyword::Nonlocal) => self.parse_name_list(SimpleKind::Nonlocal, start),
            Some(Keyword::Assert) => {
                self.advance();
                let mut children = vec![self.parse_test()?];
                if self.match_op(",") {
                    children.push(self.parse_test()?);
                }
                Ok(self.finish_node(NodeKind::Simple(SimpleKind::Assert), start, children))
            }
            Some(Keyword::Import) => self.parse_import(start),
            Some(Keyword::From) => self.parse_from_import(start),
            _ => self.parse_expression_statement(start),
        }
    }

    fn parse_bare(&mut self, kind: SimpleKind, start: u32) -> ParseResult<NodeId> {
        self.advance();
        Ok(self.finish_node(NodeKind::Simple(kind), start, Vec::new()))
    }

    fn parse_name_list(&mut self, kind: SimpleKind, start: u32) -> ParseResult<NodeId> {
        self.advance();
        let mut names = Vec::new();
        loop {
            let name_start = self.start();
            let (name, _) = self.expect_name("identifier")?;
            names.push(self.finish_node(
                NodeKind::Expression(Expr::Name(name)),
                name_start,
                Vec::new(),
            ));
            if !self.match_op(",") {
                break;
            }
        }
        Ok(self.finish_node(NodeKind::Simple(kind), start, names))
    }

    /// Expression statements and the three assignment forms.
    fn parse_expression_statement(&mut self, start: u32) -> ParseResult<NodeId> {
        let first = if self.check_keyword(Keyword::Yield) {
            self.parse_yield()?
        } else {
            self.parse_star_expressions()?
        };

        if self.match_op(":") {
            let annotation = self.parse_test()?;
            let mut children = vec![first, annotation];
            let value = if self.match_op("=") {
                let value = self.parse_assigned_value()?;
                children.push(value);
                Some(value)
            } else {
                None
            };
            let kind = NodeKind::Assignment(Assignment {
                op: AssignOp::Annotated,
                targets: vec![first],
                value,
                annotation: Some(annotation),
            });
            return Ok(self.finish_node(kind, start, children));
        }

        if let Some(op) = AUGMENTED_OPS.iter().copied().find(|op| self.check_op(op)) {
            self.advance();
            let value = self.parse_assigned_value()?;
            let kind = NodeKind::Assignment(Assignment {
                op: AssignOp::Augmented(op.to_string()),
                targets: vec![first],
                value: Some(value),
                annotation: None,
            });
            return Ok(self.finish_node(kind, start, vec![first, value]));
        }

        if !self.check_op("=") {
            return Ok(first);
        }
        let mut targets = Vec::new();
        let mut value = first;
        while self.match_op("=") {
            targets.push(value);
            value = self.parse_assigned_value()?;
        }
        let mut children = targets.clone();
        children.push(value);
        let kind = NodeKind::Assignment(Assignment {
            op: AssignOp::Plain,
            targets,
            value: Some(value),
            annotation: None,
        });
        Ok(self.finish_node(kind, start, children))
    }

    fn parse_assigned_value(&mut self) -> ParseResult<NodeId> {
        if self.check_keyword(Keyword::Yield) {
            self.parse_yield()
        } else {
            self.parse_star_expressions()
        }
    }

    // ========================================================================
    // Imports
    // ========================================================================

    fn parse_dotted_name(&mut self) -> ParseResult<String> {
        let (mut name, _) = self.expect_name("module name")?;
        while self.match_op(".") {
            let (part, _) = self.expect_name("module name")?;
            name.push('.');
            name.push_str(&part);
        }
        Ok(name)
    }

    /// `import a.b as c, d`
    fn parse_import(&mut self, start: u32) -> ParseResult<NodeId> {
        self.advance();
        let mut names = Vec::new();
        loop {
            let name = self.parse_dotted_name()?;
            let alias = self.parse_alias()?;
            names.push(ImportName { name, alias });
            if !self.match_op(",") {
                break;
            }
        }
        let kind = NodeKind::Import(Import {
            module: None,
            level: 0,
            names,
        });
        Ok(self.finish_node(kind, start, Vec::new()))
    }

    /// `from ..pkg import (x as y, z)` and `from m import *`
    fn parse_from_import(&mut self, start: u32) -> ParseResult<NodeId> {
        self.advance();
        let mut level = 0;
        loop {
            if self.match_op(".") {
                level += 1;
            } else if self.match_op("...") {
                level += 3;
            } else {
                break;
            }
        }
        let module = if self.current_token().is_name() {
            Some(self.parse_dotted_name()?)
        } else if level == 0 {
            return Err(self.error_here("module name"));
        } else {
            None
        };
        self.expect_keyword(Keyword::Import)?;

        let mut names = Vec::new();
        if self.match_op("*") {
            names.push(ImportName {
                name: "*".to_string(),
                alias: None,
            });
        } else {
            let parenthesized = self.match_op("(");
            loop {
                if parenthesized && self.check_op(")") {
                    break;
                }
                let (name, _) = self.expect_name("imported name")?;
                let alias = self.parse_alias()?;
                names.push(ImportName { name, alias });
                if !self.match_op(",") {
                    break;
                }
            }
            if parenthesized {
                self.expect_op(")")?;
            }
            if names.is_empty() {
                return Err(self.error_here("imported name"));
            }
        }
        let kind = NodeKind::Import(Import {
            module,
            level,
            names,
        });
        Ok(self.finish_node(kind, start, Vec::new()))
    }

    fn parse_alias(&mut self) -> ParseResult<Option<String>> {
        if self.match_keyword(Keyword::As) {
            Ok(Some(self.expect_name("alias")?.0))
        } else {
            Ok(None)
        }
    }

    // ========================================================================
    // Blocks
    // ========================================================================

    /// Parses the body after a header's `:`. Either an indented block or
    /// simple statements on the same line.
    pub(super) fn parse_suite(&mut self, construct: &'static str, header: Span) -> ParseResult<NodeId> {
        let start = self.start();
        let statements = if self.check_kind(&TokenKind::Newline) {
            self.advance();
            if !self.check_kind(&TokenKind::Indent) {
                return Err(self.error_here(format!("an indented block after {construct}")));
            }
            self.advance();
            let mut statements = Vec::new();
            loop {
                if self.check_kind(&TokenKind::Dedent) {
                    self.advance();
                    break;
                }
                if self.is_at_end() {
                    return Err(ParseError::new(
                        header,
                        format!("end of {construct} block"),
                        "end of file",
                    ));
                }
                statements.extend(self.parse_statement()?);
            }
            statements
        } else {
            self.parse_simple_statements()?
        };
        let start = statements
            .first()
            .map_or(start, |&first| self.tree.span(first).start());
        let end = statements
            .last()
            .map_or(start, |&last| self.tree.span(last).end());
        Ok(self
            .tree
            .push(NodeKind::Suite, Span::new(start, end), statements))
    }

    /// `else:` suite, if present.
    fn parse_else(&mut self) -> ParseResult<Option<NodeId>> {
        if !self.check_keyword(Keyword::Else) {
            return Ok(None);
        }
        let start = self.start();
        self.advance();
        let colon = self.expect_op(":")?;
        Ok(Some(self.parse_suite("'else'", Span::new(start, colon.end()))?))
    }

    fn control(
        &mut self,
        keyword: ControlKind,
        is_async: bool,
        start: u32,
        header: Vec<NodeId>,
        body: NodeId,
        orelse: Option<NodeId>,
    ) -> NodeId {
        let mut children = header.clone();
        children.push(body);
        children.extend(orelse);
        let kind = NodeKind::Control(Control {
            keyword,
            is_async,
            header,
            body,
            orelse,
        });
        self.finish_node(kind, start, children)
    }

    // ========================================================================
    // Compound statements
    // ========================================================================

    fn parse_async(&mut self) -> ParseResult<NodeId> {
        let start = self.start();
        self.advance();
        match self.current_token().kind {
            TokenKind::Keyword(Keyword::Def) => self.parse_function(start, Vec::new(), true),
            TokenKind::Keyword(Keyword::For) => self.parse_for(start, true),
            TokenKind::Keyword(Keyword::With) => self.parse_with(start, true),
            _ => Err(self.error_here("'def', 'for' or 'with' after 'async'")),
        }
    }

    /// `if` and `elif` chains. Each `elif` becomes a nested `If` in the
    /// `orelse` of the arm before it; the arms are parsed in a loop and the
    /// nodes built from the last arm back.
    fn parse_if(&mut self) -> ParseResult<NodeId> {
        let mut arms: Vec<(u32, NodeId, NodeId)> = Vec::new();
        loop {
            let start = self.start();
            let construct = if arms.is_empty() { "'if'" } else { "'elif'" };
            self.advance();
            let condition = self.parse_named_expression()?;
            let colon = self.expect_op(":")?;
            let body = self.parse_suite(construct, Span::new(start, colon.end()))?;
            arms.push((start, condition, body));
            if !self.check_keyword(Keyword::Elif) {
                break;
            }
        }
        let mut orelse = self.parse_else()?;
        for &(start, condition, body) in arms[1..].iter().rev() {
            orelse = Some(self.control(ControlKind::If, false, start, vec![condition], body, orelse));
        }
        let (start, condition, body) = arms[0];
        Ok(self.control(ControlKind::If, false, start, vec![condition], body, orelse))
    }

    fn parse_while(&mut self) -> ParseResult<NodeId> {
        let start = self.start();
        self.advance();
        let condition = self.parse_named_expression()?;
        let colon = self.expect_op(":")?;
        let body = self.parse_suite("'while'", Span::new(start, colon.end()))?;
        let orelse = self.parse_else()?;
        Ok(self.control(ControlKind::While, false, start, vec![condition], body, orelse))
    }

    fn parse_for(&mut self, start: u32, is_async: bool) -> ParseResult<NodeId> {
        self.expect_keyword(Keyword::For)?;
        let target = self.parse_target_list()?;
        self.expect_keyword(Keyword::In)?;
        let iterable = self.parse_star_expressions()?;
        let colon = self.expect_op(":")?;
        let body = self.parse_suite("'for'", Span::new(start, colon.end()))?;
        let orelse = self.parse_else()?;
        Ok(self.control(ControlKind::For, is_async, start, vec![target, iterable], body, orelse))
    }

    fn parse_with(&mut self, start: u32, is_async: bool) -> ParseResult<NodeId> {
        self.expect_keyword(Keyword::With)?;
        let header = match self.parse_parenthesized_with_items()? {
            Some(items) => items,
            None => self.parse_with_items()?,
        };
        let colon = self.expect_op(":")?;
        let body = self.parse_suite("'with'", Span::new(start, colon.end()))?;
        Ok(self.control(ControlKind::With, is_async, start, header, body, None))
    }

    /// `item (',' item)*` where `item` is `expr ['as' target]`.
    fn parse_with_items(&mut self) -> ParseResult<Vec<NodeId>> {
        let mut items = Vec::new();
        loop {
            items.push(self.parse_test()?);
            if self.match_keyword(Keyword::As) {
                items.push(self.parse_star_target()?);
            }
            if !self.match_op(",") || self.check_op(":") || self.check_op(")") {
                break;
            }
        }
        Ok(items)
    }

    /// `with (a as b, c as d):`. Rewinds and returns `None` when the
    /// parenthesis turns out to belong to an expression such as `(a, b)`.
    fn parse_parenthesized_with_items(&mut self) -> ParseResult<Option<Vec<NodeId>>> {
        if !self.check_op("(") {
            return Ok(None);
        }
        let checkpoint = self.checkpoint();
        self.advance();
        let items = match self.parse_with_items() {
            Ok(items) if self.check_op(")") && self.peek_token(1).is_op(":") => items,
            _ => {
                self.rewind(checkpoint);
                return Ok(None);
            }
        };
        self.advance();
        Ok(Some(items))
    }

    fn parse_try(&mut self) -> ParseResult<NodeId> {
        let start = self.start();
        self.advance();
        let colon = self.expect_op(":")?;
        let body = self.parse_suite("'try'", Span::new(start, colon.end()))?;

        let mut handlers = Vec::new();
        while self.check_keyword(Keyword::Except) {
            handlers.push(self.parse_except_clause()?);
        }
        let orelse = if handlers.is_empty() {
            None
        } else {
            self.parse_else()?
        };
        let finally = if self.check_keyword(Keyword::Finally) {
            let finally_start = self.start();
            self.advance();
            let colon = self.expect_op(":")?;
            Some(self.parse_suite("'finally'", Span::new(finally_start, colon.end()))?)
        } else {
            None
        };
        if handlers.is_empty() && finally.is_none() {
            return Err(self.error_here("'except' or 'finally'"));
        }

        let mut children = vec![body];
        children.extend(&handlers);
        children.extend(orelse);
        children.extend(finally);
        let kind = NodeKind::TryBlock(TryBlock {
            body,
            handlers,
            orelse,
            finally,
        });
        Ok(self.finish_node(kind, start, children))
    }

    /// `except [*] [expr ['as' NAME]] ':' suite`
    fn parse_except_clause(&mut self) -> ParseResult<NodeId> {
        let start = self.start();
        self.advance();
        let is_group = self.match_op("*");
        let mut children = Vec::new();
        let mut exception = None;
        let mut binding = None;
        if !self.check_op(":") {
            let expr = self.parse_test()?;
            children.push(expr);
            exception = Some(expr);
            if self.match_keyword(Keyword::As) {
                binding = Some(self.expect_name("exception name")?.0);
            }
        }
        let colon = self.expect_op(":")?;
        let body = self.parse_suite("'except'", Span::new(start, colon.end()))?;
        children.push(body);
        let kind = NodeKind::ExceptClause(ExceptClause {
            exception,
            binding,
            is_group,
            body,
        });
        Ok(self.finish_node(kind, start, children))
    }

    /// True when the `match` name at the cursor opens a match statement
    /// rather than naming a variable or function.
    fn at_match_statement(&mut self) -> bool {
        let checkpoint = self.checkpoint();
        self.advance();
        let is_statement = self.starts_expression()
            && self.parse_star_expressions().is_ok()
            && self.check_op(":")
            && matches!(self.peek_token(1).kind, TokenKind::Newline);
        self.rewind(checkpoint);
        is_statement
    }

    fn parse_match(&mut self) -> ParseResult<NodeId> {
        let start = self.start();
        self.advance();
        let subject = self.parse_star_expressions()?;
        let colon = self.expect_op(":")?;
        self.expect_newline()?;
        if !self.check_kind(&TokenKind::Indent) {
            return Err(self.error_here("an indented block of 'case' clauses"));
        }
        self.advance();
        let body_start = self.start();
        let mut cases = Vec::new();
        while !self.check_kind(&TokenKind::Dedent) {
            if !(self.current_token().is_name() && self.current_token().text == "case") {
                return Err(self.error_here("'case'"));
            }
            cases.push(self.parse_case()?);
        }
        self.advance();
        let body_end = cases
            .last()
            .map_or(body_start, |&last| self.tree.span(last).end());
        let body = self
            .tree
            .push(NodeKind::Suite, Span::new(body_start, body_end), cases);
        Ok(self.control(ControlKind::Match, false, start, vec![subject], body, None))
    }

    /// `case pattern ['as' NAME] ['if' guard] ':' suite`. Patterns are parsed
    /// as expressions below the conditional level so a guard is not taken
    /// for a conditional expression.
    fn parse_case(&mut self) -> ParseResult<NodeId> {
        let start = self.start();
        self.advance();
        let mut header = vec![self.parse_pattern()?];
        if self.match_keyword(Keyword::As) {
            let name_start = self.start();
            let (name, _) = self.expect_name("capture name")?;
            header.push(self.finish_node(
                NodeKind::Expression(Expr::Name(name)),
                name_start,
                Vec::new(),
            ));
        }
        if self.match_keyword(Keyword::If) {
            header.push(self.parse_named_expression()?);
        }
        let colon = self.expect_op(":")?;
        let body = self.parse_suite("'case'", Span::new(start, colon.end()))?;
        Ok(self.control(ControlKind::Case, false, start, header, body, None))
    }
}
