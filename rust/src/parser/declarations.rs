//! Class and function definitions, decorators and parameter lists.

use crate::span::Span;
use crate::syntax::{ClassDef, FunctionDef, NodeId, NodeKind, Param, ParamKind};
use crate::token::{Keyword, TokenKind};

use super::{ParseResult, Parser};

impl Parser<'_> {
    /// One or more `@expr NEWLINE` lines followed by the definition they
    /// decorate. The definition's span starts at the first `@`.
    pub(super) fn parse_decorated(&mut self) -> ParseResult<NodeId> {
        let start = self.start();
        let mut decorators = Vec::new();
        while self.check_kind(&TokenKind::DecoratorStart) {
            let at = self.start();
            self.advance();
            let expression = self.parse_named_expression()?;
            let decorator = self.finish_node(NodeKind::Decorator { expression }, at, vec![expression]);
            self.expect_newline()?;
            decorators.push(decorator);
        }
        match self.current_token().kind {
            TokenKind::Keyword(Keyword::Def) => self.parse_function(start, decorators, false),
            TokenKind::Keyword(Keyword::Class) => self.parse_class(start, decorators),
            TokenKind::Keyword(Keyword::Async) if self.peek_token(1).is_keyword(Keyword::Def) => {
                self.advance();
                self.parse_function(start, decorators, true)
            }
            _ => Err(self.error_here("class or function definition after decorator")),
        }
    }

    /// `class NAME ['(' arguments ')'] ':' suite`
    pub(super) fn parse_class(&mut self, start: u32, decorators: Vec<NodeId>) -> ParseResult<NodeId> {
        let header_start = self.expect_keyword(Keyword::Class)?.start();
        let (name, _) = self.expect_name("class name")?;
        let bases = if self.match_op("(") {
            let bases = self.parse_call_arguments()?;
            self.expect_op(")")?;
            bases
        } else {
            Vec::new()
        };
        let colon = self.expect_op(":")?;
        let header = Span::new(header_start, colon.end());
        let body = self.parse_suite("class definition", header)?;
        let docstring = self.body_docstring(body);

        let mut children = decorators.clone();
        children.extend(&bases);
        children.push(body);
        let kind = NodeKind::ClassDef(ClassDef {
            name,
            decorators,
            bases,
            header,
            body,
            docstring,
        });
        Ok(self.finish_node(kind, start, children))
    }

    /// `def NAME '(' parameters ')' ['->' expr] ':' suite`
    ///
    /// `start` is the first `@` of a decorated definition or the `async`
    /// keyword of a coroutine.
    pub(super) fn parse_function(
        &mut self,
        start: u32,
        decorators: Vec<NodeId>,
        is_async: bool,
    ) -> ParseResult<NodeId> {
        // The header of a coroutine begins at the `async` just consumed.
        let header_start = if is_async && self.current > 0 {
            self.tokens[self.current - 1].span.start()
        } else {
            self.start()
        };
        self.expect_keyword(Keyword::Def)?;
        let (name, _) = self.expect_name("function name")?;
        self.expect_op("(")?;
        let (params, mut children) = self.parse_parameters(")", true)?;
        self.expect_op(")")?;
        let returns = if self.match_op("->") {
            let annotation = self.parse_test()?;
            children.push(annotation);
            Some(annotation)
        } else {
            None
        };
        let colon = self.expect_op(":")?;
        let header = Span::new(header_start, colon.end());
        let body = self.parse_suite("function definition", header)?;
        let docstring = self.body_docstring(body);

        let mut all_children = decorators.clone();
        all_children.append(&mut children);
        all_children.push(body);
        let kind = NodeKind::FunctionDef(FunctionDef {
            name,
            is_async,
            decorators,
            params,
            returns,
            header,
            body,
            docstring,
        });
        Ok(self.finish_node(kind, start, all_children))
    }

    fn body_docstring(&mut self, body: NodeId) -> Option<NodeId> {
        let first = *self.tree.children(body).first()?;
        self.mark_docstring(first)
    }

    /// Parameter list up to (not including) `close`. Returns the parameters
    /// and their annotation/default nodes in source order.
    ///
    /// Lambdas pass `close = ":"` and `annotations = false`.
    pub(super) fn parse_parameters(
        &mut self,
        close: &str,
        annotations: bool,
    ) -> ParseResult<(Vec<Param>, Vec<NodeId>)> {
        let mut params = Vec::new();
        let mut children = Vec::new();
        while !self.check_op(close) {
            let start = self.start();
            let (name, kind) = if self.match_op("/") {
                ("/".to_string(), ParamKind::PositionalOnlyMarker)
            } else if self.match_op("**") {
                (self.expect_name("parameter name")?.0, ParamKind::VarKeyword)
            } else if self.match_op("*") {
                if self.current_token().is_name() {
                    (self.expect_name("parameter name")?.0, ParamKind::VarPositional)
                } else {
                    ("*".to_string(), ParamKind::KeywordOnlyMarker)
                }
            } else {
                (self.expect_name("parameter name")?.0, ParamKind::Positional)
            };

            let is_marker = matches!(
                kind,
                ParamKind::PositionalOnlyMarker | ParamKind::KeywordOnlyMarker
            );
            let annotation = if annotations && !is_marker && self.match_op(":") {
                let node = self.parse_test()?;
                children.push(node);
                Some(node)
            } else {
                None
            };
            let default = if !is_marker && self.match_op("=") {
                let node = self.parse_test()?;
                children.push(node);
                Some(node)
            } else {
                None
            };
            params.push(Param {
                name,
                kind,
                annotation,
                default,
                span: self.span_from(start),
            });

            if !self.match_op(",") {
                break;
            }
        }
        Ok((params, children))
    }
}
