//! Arena-backed syntax tree.
//!
//! Nodes live in one flat vector. Children are stored as [`NodeId`]s and every
//! node records its parent's id, so scope chains (qualified names, enclosing
//! class of a method) are walked by index instead of through owned pointers.
//! A node is always created after its children, which lets the parser discard
//! a half-built statement by truncating the arena.

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ExtractError;
use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    pub span: Span,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NodeKind {
    Module {
        docstring: Option<NodeId>,
    },
    ClassDef(ClassDef),
    FunctionDef(FunctionDef),
    Decorator {
        expression: NodeId,
    },
    /// Statements of one indented (or same-line) block.
    Suite,
    Assignment(Assignment),
    Lambda {
        params: Vec<Param>,
        body: NodeId,
    },
    Comprehension(Comprehension),
    TryBlock(TryBlock),
    ExceptClause(ExceptClause),
    DocstringBlock {
        text: String,
    },
    Control(Control),
    Simple(SimpleKind),
    Import(Import),
    Expression(Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassDef {
    pub name: String,
    pub decorators: Vec<NodeId>,
    pub bases: Vec<NodeId>,
    /// `class Name(...):`
    pub header: Span,
    pub body: NodeId,
    pub docstring: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDef {
    pub name: String,
    pub is_async: bool,
    pub decorators: Vec<NodeId>,
    pub params: Vec<Param>,
    pub returns: Option<NodeId>,
    /// `def name(...) -> T:`
    pub header: Span,
    pub body: NodeId,
    pub docstring: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub annotation: Option<NodeId>,
    pub default: Option<NodeId>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParamKind {
    Positional,
    /// `*args`
    VarPositional,
    /// bare `*`
    KeywordOnlyMarker,
    /// `/`
    PositionalOnlyMarker,
    /// `**kwargs`
    VarKeyword,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub op: AssignOp,
    pub targets: Vec<NodeId>,
    pub value: Option<NodeId>,
    pub annotation: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AssignOp {
    Plain,
    /// `+=`, `//=`, ...
    Augmented(String),
    Annotated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comprehension {
    pub kind: ComprehensionKind,
    pub element: NodeId,
    /// Value expression of a dict comprehension.
    pub value: Option<NodeId>,
    pub clauses: Vec<ComprehensionClause>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComprehensionKind {
    List,
    Set,
    Dict,
    Generator,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComprehensionClause {
    pub is_async: bool,
    pub target: NodeId,
    pub iterable: NodeId,
    pub conditions: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TryBlock {
    pub body: NodeId,
    pub handlers: Vec<NodeId>,
    pub orelse: Option<NodeId>,
    pub finally: Option<NodeId>,
}

impl TryBlock {
    pub fn has_finally(&self) -> bool {
        self.finally.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExceptClause {
    pub exception: Option<NodeId>,
    pub binding: Option<String>,
    /// `except*`
    pub is_group: bool,
    pub body: NodeId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Control {
    pub keyword: ControlKind,
    pub is_async: bool,
    /// Conditions, loop targets and iterables, context managers, subjects.
    pub header: Vec<NodeId>,
    pub body: NodeId,
    /// `else` suite, or the nested `if` of an `elif`.
    pub orelse: Option<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ControlKind {
    If,
    While,
    For,
    With,
    Match,
    Case,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SimpleKind {
    Pass,
    Break,
    Continue,
    Return,
    Raise,
    Del,
    Global,
    Nonlocal,
    Assert,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Import {
    /// `from <module> import ...`; `None` for plain `import` and `from . import`.
    pub module: Option<String>,
    /// Leading dots of a relative import.
    pub level: usize,
    pub names: Vec<ImportName>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportName {
    pub name: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Expr {
    Name(String),
    Literal(LiteralKind),
    Attribute(String),
    Call,
    Subscript,
    Slice,
    KeywordArg(String),
    Unary(String),
    Binary(String),
    BoolOp(String),
    Compare(String),
    /// `body if test else orelse`
    Conditional,
    NamedExpr(String),
    Paren,
    Tuple,
    List,
    Set,
    Dict,
    DictEntry,
    Starred,
    DoubleStarred,
    Await,
    Yield,
    YieldFrom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LiteralKind {
    Number,
    String,
    TripleString,
    FString,
    Bytes,
    /// Adjacent string literals.
    Concatenated,
    None,
    True,
    False,
    Ellipsis,
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Module { .. } => "module",
            Self::ClassDef(_) => "class_def",
            Self::FunctionDef(_) => "function_def",
            Self::Decorator { .. } => "decorator",
            Self::Suite => "suite",
            Self::Assignment(_) => "assignment",
            Self::Lambda { .. } => "lambda",
            Self::Comprehension(_) => "comprehension",
            Self::TryBlock(_) => "try_block",
            Self::ExceptClause(_) => "except_clause",
            Self::DocstringBlock { .. } => "docstring_block",
            Self::Control(_) => "control",
            Self::Simple(_) => "simple",
            Self::Import(_) => "import",
            Self::Expression(_) => "expression",
        }
    }

    /// Declared name of a class or function definition.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::ClassDef(class) => Some(&class.name),
            Self::FunctionDef(func) => Some(&func.name),
            _ => None,
        }
    }

    pub fn is_scope(&self) -> bool {
        matches!(self, Self::ClassDef(_) | Self::FunctionDef(_))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyntaxTree {
    nodes: Vec<SyntaxNode>,
}

impl SyntaxTree {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends a node and adopts `children`.
    pub(crate) fn push(&mut self, kind: NodeKind, span: Span, children: Vec<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        for child in &children {
            self.nodes[child.index()].parent = Some(id);
        }
        self.nodes.push(SyntaxNode {
            kind,
            span,
            parent: None,
            children,
        });
        id
    }

    pub(crate) fn set_kind(&mut self, id: NodeId, kind: NodeKind) {
        self.nodes[id.index()].kind = kind;
    }

    /// Fills in the root once all top-level statements exist.
    pub(crate) fn finish_root(
        &mut self,
        root: NodeId,
        span: Span,
        children: Vec<NodeId>,
        docstring: Option<NodeId>,
    ) {
        for child in &children {
            self.nodes[child.index()].parent = Some(root);
        }
        let node = &mut self.nodes[root.index()];
        node.kind = NodeKind::Module { docstring };
        node.span = span;
        node.children = children;
    }

    /// Drops every node created at or after `len`.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.nodes.truncate(len);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The module node. Always the first node of a parsed tree.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.node(id).span
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }

    /// `id` and all its descendants, parents before children.
    pub fn preorder(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    pub fn find_all(&self, pred: impl Fn(&NodeKind) -> bool) -> Vec<NodeId> {
        self.preorder(self.root())
            .into_iter()
            .filter(|&id| pred(self.kind(id)))
            .collect()
    }

    /// The nearest class or function that contains `id`.
    pub fn enclosing_scope(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id).find(|&a| self.kind(a).is_scope())
    }

    /// Dot-joined names of the enclosing classes and functions, outermost
    /// first, ending with `id`'s own name when it has one.
    pub fn qualified_name(&self, id: NodeId) -> String {
        let mut parts: Vec<&str> = self
            .ancestors(id)
            .filter_map(|a| self.kind(a).name())
            .collect();
        parts.reverse();
        if let Some(own) = self.kind(id).name() {
            parts.push(own);
        }
        parts.join(".")
    }

    pub fn docstring(&self, id: NodeId) -> Option<&str> {
        let doc = match self.kind(id) {
            NodeKind::Module { docstring } => *docstring,
            NodeKind::ClassDef(class) => class.docstring,
            NodeKind::FunctionDef(func) => func.docstring,
            _ => None,
        }?;
        match self.kind(doc) {
            NodeKind::DocstringBlock { text } => Some(text),
            _ => None,
        }
    }

    /// Checks the structural invariants the extractor relies on.
    pub fn validate(&self) -> Vec<ExtractError> {
        let mut errors = Vec::new();
        if self.is_empty() {
            return errors;
        }
        for id in self.preorder(self.root()) {
            let node = self.node(id);
            match &node.kind {
                NodeKind::Module { .. } if id != self.root() => {
                    errors.push(ExtractError::NestedModule { span: node.span });
                }
                NodeKind::Decorator { .. } => {
                    let attached = node
                        .parent
                        .is_some_and(|p| self.kind(p).is_scope());
                    if !attached {
                        errors.push(ExtractError::DetachedDecorator { span: node.span });
                    }
                }
                _ => {}
            }
            let mut previous_end = node.span.start();
            for &child in &node.children {
                let span = self.span(child);
                if !node.span.contains(span) || span.start() < previous_end {
                    errors.push(ExtractError::SpanOutsideParent {
                        parent: node.span,
                        child: span,
                    });
                }
                previous_end = span.end();
            }
        }
        errors
    }

    /// Nested JSON view of a subtree: kind, name, byte range and children.
    pub fn to_context(&self, id: NodeId) -> Value {
        let node = self.node(id);
        let mut map = json!({
            "type": node.kind.label(),
            "start": node.span.start(),
            "end": node.span.end(),
        });
        if let Some(name) = node.kind.name() {
            map["name"] = json!(name);
        }
        if !node.children.is_empty() {
            map["children"] = Value::Array(
                node.children
                    .iter()
                    .map(|&child| self.to_context(child))
                    .collect(),
            );
        }
        map
    }
}

/// Strips quotes and prefix from a docstring literal and removes the common
/// indentation of its continuation lines.
pub fn clean_docstring(raw: &str) -> String {
    let body = raw.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    let quote_len = if body.starts_with("\"\"\"") || body.starts_with("'''") {
        3
    } else {
        1
    };
    let inner = body
        .get(quote_len..body.len().saturating_sub(quote_len))
        .unwrap_or("");
    let expanded = inner.replace('\t', "        ");
    let lines: Vec<&str> = expanded.lines().collect();
    let margin = lines
        .iter()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    let mut cleaned: Vec<&str> = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            cleaned.push(line.trim());
        } else {
            cleaned.push(line.get(margin..).unwrap_or("").trim_end());
        }
    }
    while cleaned.first().is_some_and(|l| l.is_empty()) {
        cleaned.remove(0);
    }
    while cleaned.last().is_some_and(|l| l.is_empty()) {
        cleaned.pop();
    }
    cleaned.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(tree: &mut SyntaxTree, text: &str, span: Span) -> NodeId {
        tree.push(NodeKind::Expression(Expr::Name(text.into())), span, vec![])
    }

    fn function(tree: &mut SyntaxTree, fn_name: &str, span: Span, body: NodeId) -> NodeId {
        tree.push(
            NodeKind::FunctionDef(FunctionDef {
                name: fn_name.into(),
                is_async: false,
                decorators: vec![],
                params: vec![],
                returns: None,
                header: span,
                body,
                docstring: None,
            }),
            span,
            vec![body],
        )
    }

    #[test]
    fn qualified_name_walks_parent_chain() {
        let mut tree = SyntaxTree::new();
        let root = tree.push(NodeKind::Module { docstring: None }, Span::default(), vec![]);
        let inner_body_stmt = name(&mut tree, "x", Span::new(30, 31));
        let inner_body = tree.push(NodeKind::Suite, Span::new(30, 31), vec![inner_body_stmt]);
        let inner = function(&mut tree, "inner", Span::new(20, 31), inner_body);
        let outer_body = tree.push(NodeKind::Suite, Span::new(20, 31), vec![inner]);
        let outer = function(&mut tree, "outer", Span::new(0, 31), outer_body);
        tree.finish_root(root, Span::new(0, 31), vec![outer], None);

        assert_eq!(tree.qualified_name(inner), "outer.inner");
        assert_eq!(tree.qualified_name(inner_body_stmt), "outer.inner");
        assert_eq!(tree.enclosing_scope(inner), Some(outer));
        assert_eq!(tree.preorder(root)[..3], [root, outer, outer_body]);
        assert!(tree.validate().is_empty());
    }

    #[test]
    fn validate_flags_detached_decorator_and_overlap() {
        let mut tree = SyntaxTree::new();
        let root = tree.push(NodeKind::Module { docstring: None }, Span::default(), vec![]);
        let expr = name(&mut tree, "dec", Span::new(1, 4));
        let decorator = tree.push(NodeKind::Decorator { expression: expr }, Span::new(0, 4), vec![expr]);
        let overlapping = name(&mut tree, "y", Span::new(2, 6));
        tree.finish_root(root, Span::new(0, 10), vec![decorator, overlapping], None);

        let errors = tree.validate();
        assert!(errors.contains(&ExtractError::DetachedDecorator { span: Span::new(0, 4) }));
        assert!(errors.contains(&ExtractError::SpanOutsideParent {
            parent: Span::new(0, 10),
            child: Span::new(2, 6),
        }));
    }

    #[test]
    fn cleans_docstrings() {
        assert_eq!(clean_docstring("\"\"\"Class docstring.\"\"\""), "Class docstring.");
        assert_eq!(
            clean_docstring("\"\"\"\n    Module level docstring.\n    This covers multiple lines.\n    \"\"\""),
            "Module level docstring.\nThis covers multiple lines."
        );
        assert_eq!(clean_docstring("r'raw \\d'"), "raw \\d");
        assert_eq!(
            clean_docstring("'''Summary.\n\n        Details\n          indented\n        '''"),
            "Summary.\n\nDetails\n  indented"
        );
    }
}
