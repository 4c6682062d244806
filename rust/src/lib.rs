pub mod span;
pub mod error;
pub mod token;
pub mod lexer;
pub mod syntax;
pub mod parser;
pub mod analyzer;
pub mod query;

// Re-export main types and functions
pub use analyzer::{
    extract, parse_file, ExtractOptions, Fact, FactKind, FileFacts, ImportFact, ParsedFile, TryFact,
};
pub use error::{Diagnostic, ExtractError, LexError, LexErrorKind, ParseError};
pub use lexer::{tokenize, Lexer, Tokens};
pub use query::FactQuery;
pub use span::{LineIndex, Position, SourceRange, Span};
pub use syntax::{NodeId, NodeKind, SyntaxTree};
pub use token::{Keyword, Token, TokenKind};
