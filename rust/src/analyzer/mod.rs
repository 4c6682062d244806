pub mod extractor;
pub mod model;
pub mod scanner;
pub mod session;
pub mod util;

pub use extractor::{extract_facts, Extraction, Fact, FactKind, ImportFact, TryFact};
pub use model::{OutputPayload, OutputRecord, VectorFields};
pub use scanner::{analyze_project, discover_sources, scan, write_ndjson, AnalyzeConfig, ScanReport};
pub use session::{extract, parse_file, CommentFact, ExtractOptions, FileFacts, ParsedFile};
