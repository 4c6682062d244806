//! Flattens a syntax tree into declaration facts.
//!
//! One pre-order walk over the arena emits a [`Fact`] for every class and
//! function, parents before children, plus side records for `try` blocks and
//! imports. The tree is only read.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::warn;

use crate::analyzer::util::compact_whitespace;
use crate::error::ExtractError;
use crate::span::{LineIndex, SourceRange, Span};
use crate::syntax::{FunctionDef, ImportName, NodeId, NodeKind, ParamKind, SyntaxTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
    Class,
    Method,
    Function,
    Property,
}

impl FactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Method => "method",
            Self::Function => "function",
            Self::Property => "property",
        }
    }
}

impl std::fmt::Display for FactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fact {
    pub kind: FactKind,
    pub name: String,
    pub qualified_name: String,
    /// Decorator expressions as written, outermost first.
    pub decorators: Vec<String>,
    pub docstring: Option<String>,
    /// Number of enclosing classes and functions.
    pub depth: usize,
    pub span: Span,
    pub range: SourceRange,
    /// Index of the enclosing declaration's fact.
    pub parent: Option<usize>,
    pub is_async: bool,
    pub parameters: Vec<String>,
    /// `def`/`class` header up to the colon, whitespace compacted.
    pub signature: String,
    pub lambdas: usize,
    pub comprehensions: usize,
    /// The body directly contains a `try` with a `finally` clause.
    pub guaranteed_cleanup: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TryFact {
    /// Qualified name of the enclosing declaration; `None` at module level.
    pub owner: Option<String>,
    pub span: Span,
    pub range: SourceRange,
    pub handlers: usize,
    /// Exception expressions of the except clauses; bare `except` is omitted.
    pub handled: Vec<String>,
    pub has_else: bool,
    /// A `finally` clause runs on every exit path.
    pub guaranteed_cleanup: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportFact {
    pub module: Option<String>,
    pub level: usize,
    pub names: Vec<ImportName>,
    pub span: Span,
    pub range: SourceRange,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Extraction {
    pub facts: Vec<Fact>,
    pub try_blocks: Vec<TryFact>,
    pub imports: Vec<ImportFact>,
    pub errors: Vec<ExtractError>,
}

const PROPERTY_DECORATORS: [&str; 3] = ["property", "cached_property", "functools.cached_property"];
const ACCESSOR_SUFFIXES: [&str; 3] = [".setter", ".getter", ".deleter"];

fn is_property_decorator(text: &str) -> bool {
    PROPERTY_DECORATORS.contains(&text) || ACCESSOR_SUFFIXES.iter().any(|s| text.ends_with(s))
}

pub fn extract_facts(tree: &SyntaxTree, source: &str, lines: &LineIndex<'_>) -> Extraction {
    let mut out = Extraction::default();
    if tree.is_empty() {
        return out;
    }

    let errors = tree.validate();
    debug_assert!(errors.is_empty(), "syntax tree invariants violated: {errors:?}");
    let skipped: HashSet<Span> = errors.iter().map(ExtractError::span).collect();
    for err in &errors {
        warn!(error = %err, "skipping malformed subtree");
    }
    out.errors = errors;

    let mut extractor = Extractor {
        tree,
        source,
        lines,
        scope_facts: HashMap::new(),
        out,
    };
    let mut stack = vec![tree.root()];
    while let Some(id) = stack.pop() {
        if id != tree.root() && skipped.contains(&tree.span(id)) {
            continue;
        }
        extractor.visit(id);
        stack.extend(tree.children(id).iter().rev());
    }
    extractor.out
}

struct Extractor<'a> {
    tree: &'a SyntaxTree,
    source: &'a str,
    lines: &'a LineIndex<'a>,
    /// Fact index of each class/function node visited so far.
    scope_facts: HashMap<NodeId, usize>,
    out: Extraction,
}

impl Extractor<'_> {
    fn visit(&mut self, id: NodeId) {
        let tree = self.tree;
        match tree.kind(id) {
            NodeKind::ClassDef(class) => {
                let decorators = self.decorator_texts(&class.decorators);
                let signature = self.text(class.header);
                let fact = self.declaration(id, FactKind::Class, decorators, false, Vec::new(), signature);
                self.push_fact(id, fact);
            }
            NodeKind::FunctionDef(def) => {
                let decorators = self.decorator_texts(&def.decorators);
                let kind = self.function_kind(id, &decorators);
                let signature = self.text(def.header);
                let fact = self.declaration(id, kind, decorators, def.is_async, parameter_names(def), signature);
                self.push_fact(id, fact);
            }
            NodeKind::TryBlock(block) => {
                let owner = self.owner_fact(id);
                let handled = block
                    .handlers
                    .iter()
                    .filter_map(|&h| match tree.kind(h) {
                        NodeKind::ExceptClause(clause) => clause.exception,
                        _ => None,
                    })
                    .map(|e| self.text(tree.span(e)))
                    .collect();
                if block.has_finally() {
                    if let Some(index) = owner {
                        self.out.facts[index].guaranteed_cleanup = true;
                    }
                }
                let span = tree.span(id);
                self.out.try_blocks.push(TryFact {
                    owner: owner.map(|index| self.out.facts[index].qualified_name.clone()),
                    span,
                    range: self.lines.range(span),
                    handlers: block.handlers.len(),
                    handled,
                    has_else: block.orelse.is_some(),
                    guaranteed_cleanup: block.has_finally(),
                });
            }
            NodeKind::Lambda { .. } => {
                if let Some(index) = self.owner_fact(id) {
                    self.out.facts[index].lambdas += 1;
                }
            }
            NodeKind::Comprehension(_) => {
                if let Some(index) = self.owner_fact(id) {
                    self.out.facts[index].comprehensions += 1;
                }
            }
            NodeKind::Import(import) => {
                let span = tree.span(id);
                self.out.imports.push(ImportFact {
                    module: import.module.clone(),
                    level: import.level,
                    names: import.names.clone(),
                    span,
                    range: self.lines.range(span),
                });
            }
            _ => {}
        }
    }

    fn text(&self, span: Span) -> String {
        compact_whitespace(span.text(self.source))
    }

    fn decorator_texts(&self, decorators: &[NodeId]) -> Vec<String> {
        decorators
            .iter()
            .filter_map(|&d| match self.tree.kind(d) {
                NodeKind::Decorator { expression } => {
                    Some(self.tree.span(*expression).text(self.source).to_string())
                }
                _ => None,
            })
            .collect()
    }

    /// Methods are defs directly inside a class body.
    fn function_kind(&self, id: NodeId, decorators: &[String]) -> FactKind {
        let in_class = self
            .tree
            .parent(id)
            .and_then(|body| self.tree.parent(body))
            .is_some_and(|owner| matches!(self.tree.kind(owner), NodeKind::ClassDef(_)));
        if !in_class {
            FactKind::Function
        } else if decorators.iter().any(|d| is_property_decorator(d)) {
            FactKind::Property
        } else {
            FactKind::Method
        }
    }

    fn owner_fact(&self, id: NodeId) -> Option<usize> {
        let scope = self.tree.enclosing_scope(id)?;
        self.scope_facts.get(&scope).copied()
    }

    fn declaration(
        &self,
        id: NodeId,
        kind: FactKind,
        decorators: Vec<String>,
        is_async: bool,
        parameters: Vec<String>,
        signature: String,
    ) -> Fact {
        let span = self.tree.span(id);
        let parent = self.owner_fact(id);
        Fact {
            kind,
            name: self.tree.kind(id).name().unwrap_or_default().to_string(),
            qualified_name: self.tree.qualified_name(id),
            decorators,
            docstring: self.tree.docstring(id).map(str::to_string),
            depth: parent.map_or(0, |p| self.out.facts[p].depth + 1),
            span,
            range: self.lines.range(span),
            parent,
            is_async,
            parameters,
            signature,
            lambdas: 0,
            comprehensions: 0,
            guaranteed_cleanup: false,
        }
    }

    fn push_fact(&mut self, id: NodeId, fact: Fact) {
        self.scope_facts.insert(id, self.out.facts.len());
        self.out.facts.push(fact);
    }
}

/// Parameter names with their star prefixes; bare `*` and `/` markers are kept.
fn parameter_names(def: &FunctionDef) -> Vec<String> {
    def.params
        .iter()
        .map(|p| match p.kind {
            ParamKind::VarPositional => format!("*{}", p.name),
            ParamKind::VarKeyword => format!("**{}", p.name),
            _ => p.name.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn facts_of(source: &str) -> Extraction {
        let out = parse(tokenize(source).tokens, source, true);
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        extract_facts(&out.tree, source, &LineIndex::new(source))
    }

    #[test]
    fn kinds_and_parent_links() {
        let source = "class A:\n    @property\n    def p(self):\n        return 1\n\n    @p.setter\n    def p(self, v):\n        pass\n\n    def m(self):\n        def helper():\n            pass\n\ndef f():\n    pass\n";
        let extraction = facts_of(source);
        let summary: Vec<(FactKind, &str, usize, Option<usize>)> = extraction
            .facts
            .iter()
            .map(|f| (f.kind, f.qualified_name.as_str(), f.depth, f.parent))
            .collect();
        assert_eq!(
            summary,
            [
                (FactKind::Class, "A", 0, None),
                (FactKind::Property, "A.p", 1, Some(0)),
                (FactKind::Property, "A.p", 1, Some(0)),
                (FactKind::Method, "A.m", 1, Some(0)),
                (FactKind::Function, "A.m.helper", 2, Some(3)),
                (FactKind::Function, "f", 0, None),
            ]
        );
    }

    #[test]
    fn decorator_text_is_verbatim() {
        let source = "@app.route('/x',  methods=[\"GET\"])\n@cached_property\ndef view():\n    pass\n";
        let extraction = facts_of(source);
        assert_eq!(
            extraction.facts[0].decorators,
            ["app.route('/x',  methods=[\"GET\"])", "cached_property"]
        );
        // Not inside a class, so not a property.
        assert_eq!(extraction.facts[0].kind, FactKind::Function);
    }

    #[test]
    fn counts_lambdas_and_comprehensions_of_the_nearest_scope() {
        let source = "def outer():\n    key = lambda x: x\n    data = [i for i in range(3)]\n    def inner():\n        return {k: v for k, v in data}\n";
        let extraction = facts_of(source);
        let outer = &extraction.facts[0];
        assert_eq!((outer.lambdas, outer.comprehensions), (1, 1));
        let inner = &extraction.facts[1];
        assert_eq!((inner.lambdas, inner.comprehensions), (0, 1));
    }

    #[test]
    fn try_finally_marks_guaranteed_cleanup() {
        let source = "def load(path):\n    try:\n        return read(path)\n    except (IOError, ValueError):\n        raise\n    except KeyError as e:\n        pass\n    finally:\n        close()\n\ntry:\n    import fast\nexcept ImportError:\n    fast = None\n";
        let extraction = facts_of(source);
        assert!(extraction.facts[0].guaranteed_cleanup);
        assert_eq!(extraction.try_blocks.len(), 2);
        let inner = &extraction.try_blocks[0];
        assert_eq!(inner.owner.as_deref(), Some("load"));
        assert_eq!(inner.handlers, 2);
        assert_eq!(inner.handled, ["(IOError, ValueError)", "KeyError"]);
        assert!(inner.guaranteed_cleanup);
        let module_level = &extraction.try_blocks[1];
        assert_eq!(module_level.owner, None);
        assert!(!module_level.guaranteed_cleanup);
        assert_eq!(extraction.imports.len(), 1);
    }

    #[test]
    fn signature_and_parameters() {
        let source = "async def fetch(url,\n                *args, timeout: float = 1.0, **kw) -> bytes:\n    ...\n";
        let extraction = facts_of(source);
        let fact = &extraction.facts[0];
        assert!(fact.is_async);
        assert_eq!(fact.parameters, ["url", "*args", "timeout", "**kw"]);
        assert_eq!(
            fact.signature,
            "async def fetch(url, *args, timeout: float = 1.0, **kw) -> bytes:"
        );
        assert_eq!(fact.range.start.line, 1);
        assert_eq!(fact.range.end.line, 3);
    }

    #[test]
    fn empty_tree_has_no_facts() {
        let extraction = extract_facts(&SyntaxTree::default(), "", &LineIndex::new(""));
        assert_eq!(extraction, Extraction::default());
    }
}
