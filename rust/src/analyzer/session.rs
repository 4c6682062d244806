//! One lexer → parser → extractor run over a single file.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analyzer::extractor::{extract_facts, Fact, ImportFact, TryFact};
use crate::error::Diagnostic;
use crate::lexer::tokenize;
use crate::parser::parse;
use crate::query::FactQuery;
use crate::span::{LineIndex, SourceRange, Span};
use crate::syntax::SyntaxTree;
use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Skip a broken top-level statement and keep parsing instead of stopping.
    pub recovery: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self { recovery: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentFact {
    /// Comment text without the leading `#`.
    pub text: String,
    pub span: Span,
    pub range: SourceRange,
}

/// Everything extracted from one file, diagnostics included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFacts {
    pub file: String,
    pub facts: Vec<Fact>,
    pub try_blocks: Vec<TryFact>,
    pub imports: Vec<ImportFact>,
    pub comments: Vec<CommentFact>,
    pub module_docstring: Option<String>,
    /// Ordered by source position.
    pub diagnostics: Vec<Diagnostic>,
    /// Some input was not represented in the facts because of errors.
    pub partial: bool,
}

impl FileFacts {
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn query(&self) -> FactQuery<'_> {
        FactQuery::new(&self.facts)
    }

    pub fn render_diagnostics(&self, source: &str) -> Vec<String> {
        let lines = LineIndex::new(source);
        self.diagnostics
            .iter()
            .map(|d| d.render(&self.file, &lines))
            .collect()
    }
}

/// A parsed file kept around for re-querying the tree.
#[derive(Debug, Clone)]
pub struct ParsedFile<'src> {
    pub file: String,
    pub source: &'src str,
    pub tree: SyntaxTree,
    pub lines: LineIndex<'src>,
    pub tokens: Vec<Token<'src>>,
    pub comments: Vec<Token<'src>>,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'src> ParsedFile<'src> {
    pub fn facts(&self) -> FileFacts {
        let extraction = extract_facts(&self.tree, self.source, &self.lines);
        debug!(
            file = %self.file,
            facts = extraction.facts.len(),
            try_blocks = extraction.try_blocks.len(),
            imports = extraction.imports.len(),
            "extracted facts"
        );

        let mut diagnostics = self.diagnostics.clone();
        diagnostics.extend(extraction.errors.into_iter().map(Diagnostic::from));
        diagnostics.sort_by_key(|d| d.span().start());

        let comments = self
            .comments
            .iter()
            .map(|c| CommentFact {
                text: c.text.trim_start_matches('#').trim().to_string(),
                span: c.span,
                range: self.lines.range(c.span),
            })
            .collect();

        FileFacts {
            file: self.file.clone(),
            partial: !diagnostics.is_empty(),
            facts: extraction.facts,
            try_blocks: extraction.try_blocks,
            imports: extraction.imports,
            comments,
            module_docstring: self.tree.docstring(self.tree.root()).map(str::to_string),
            diagnostics,
        }
    }
}

pub fn parse_file<'src>(file: &str, source: &'src str, options: &ExtractOptions) -> ParsedFile<'src> {
    let lexed = tokenize(source);
    debug!(
        file,
        tokens = lexed.tokens.len(),
        comments = lexed.comments.len(),
        lex_errors = lexed.errors.len(),
        "tokenized"
    );

    let output = parse(lexed.tokens.clone(), source, options.recovery);
    debug!(
        file,
        nodes = output.tree.len(),
        parse_errors = output.errors.len(),
        recovery = options.recovery,
        "parsed"
    );

    let mut diagnostics: Vec<Diagnostic> = lexed.errors.into_iter().map(Diagnostic::from).collect();
    diagnostics.extend(output.errors.into_iter().map(Diagnostic::from));
    diagnostics.sort_by_key(|d| d.span().start());

    ParsedFile {
        file: file.to_string(),
        source,
        tree: output.tree,
        lines: LineIndex::new(source),
        tokens: lexed.tokens,
        comments: lexed.comments,
        diagnostics,
    }
}

/// Runs a full session and drops the tree.
pub fn extract(file: &str, source: &str, options: &ExtractOptions) -> FileFacts {
    parse_file(file, source, options).facts()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::extractor::FactKind;

    #[test]
    fn options_default_to_recovery() {
        let options: ExtractOptions = serde_json::from_str("{}").unwrap();
        assert!(options.recovery);
        let options: ExtractOptions = serde_json::from_str(r#"{"recovery": false}"#).unwrap();
        assert!(!options.recovery);
    }

    #[test]
    fn merges_lex_and_parse_diagnostics_in_order() {
        let source = "x = 'open\nclass Broken:\n    y = = 1\n\ndef ok():\n    pass\n";
        let facts = extract("demo.py", source, &ExtractOptions::default());
        let stages: Vec<&str> = facts.diagnostics.iter().map(Diagnostic::stage).collect();
        assert_eq!(stages.first(), Some(&"lex"));
        assert!(stages.contains(&"parse"));
        assert!(facts.partial);
        assert_eq!(facts.facts.len(), 1);
        assert_eq!(facts.facts[0].kind, FactKind::Function);

        let rendered = facts.render_diagnostics(source);
        assert!(rendered[0].starts_with("demo.py:1:5: lex error:"), "{rendered:?}");
    }

    #[test]
    fn keeps_comments_and_module_docstring() {
        let source = "\"\"\"Top.\"\"\"\n# note\nx = 1  # trailing\n";
        let facts = extract("m.py", source, &ExtractOptions::default());
        assert!(!facts.has_errors());
        assert_eq!(facts.module_docstring.as_deref(), Some("Top."));
        let texts: Vec<&str> = facts.comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["note", "trailing"]);
        assert_eq!(facts.comments[1].range.start.line, 3);
    }

    #[test]
    fn parsed_file_can_be_requeried() {
        let source = "class A:\n    def m(self):\n        pass\n";
        let parsed = parse_file("a.py", source, &ExtractOptions::default());
        assert_eq!(parsed.facts(), parsed.facts());
        assert_eq!(parsed.tree.node(parsed.tree.root()).children.len(), 1);
    }
}
