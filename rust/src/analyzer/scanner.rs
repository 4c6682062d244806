use crate::analyzer::model::{OutputPayload, OutputRecord, VectorFields};
use crate::analyzer::session::{parse_file, ExtractOptions, FileFacts};
use crate::analyzer::util::*;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};
use walkdir::{DirEntry, WalkDir};

#[derive(Clone, Debug)]
pub struct AnalyzeConfig {
    pub path: PathBuf,
    pub repo_id: String,
    pub options: ExtractOptions,
}

const EXCLUDED_DIRS: [&str; 7] = [
    "__pycache__",
    ".git",
    ".venv",
    "venv",
    ".tox",
    "node_modules",
    "site-packages",
];

fn is_excluded(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| EXCLUDED_DIRS.contains(&name))
}

fn is_source(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("py" | "pyi"))
}

/// Python sources under `root` in a stable order.
pub fn discover_sources(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_excluded(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_source(e.path()))
        .map(DirEntry::into_path)
        .collect();
    files.sort();
    files
}

/// Output of one directory scan.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub records: Vec<OutputRecord>,
    /// Facts per file, in path order.
    pub files: Vec<FileFacts>,
    pub skipped: Vec<PathBuf>,
    pub cancelled: bool,
}

pub fn analyze_project(cfg: &AnalyzeConfig) -> Result<Vec<OutputRecord>> {
    Ok(scan(cfg, &AtomicBool::new(false))?.records)
}

/// Scans in parallel. `cancel` is checked before each file; files already
/// started still finish.
pub fn scan(cfg: &AnalyzeConfig, cancel: &AtomicBool) -> Result<ScanReport> {
    if !cfg.path.is_dir() {
        anyhow::bail!("{} is not a directory", cfg.path.display());
    }
    let files = discover_sources(&cfg.path);

    let results: Vec<(PathBuf, Option<Result<(FileFacts, Vec<OutputRecord>)>>)> = files
        .into_par_iter()
        .map(|path| {
            if cancel.load(Ordering::Relaxed) {
                return (path, None);
            }
            let result = process_file(&cfg.path, &path, &cfg.repo_id, &cfg.options);
            (path, Some(result))
        })
        .collect();

    let mut report = ScanReport::default();
    for (path, result) in results {
        match result {
            None => report.cancelled = true,
            Some(Ok((facts, mut records))) => {
                if facts.has_errors() {
                    warn!(
                        file = %facts.file,
                        diagnostics = facts.diagnostics.len(),
                        "file parsed with errors"
                    );
                }
                report.records.append(&mut records);
                report.files.push(facts);
            }
            Some(Err(e)) => {
                warn!(path = %path.display(), error = %format!("{e:#}"), "skipping file");
                report.skipped.push(path);
            }
        }
    }
    info!(
        files = report.files.len(),
        records = report.records.len(),
        skipped = report.skipped.len(),
        cancelled = report.cancelled,
        "scan finished"
    );
    Ok(report)
}

fn process_file(
    root: &Path,
    file: &Path,
    repo_id: &str,
    options: &ExtractOptions,
) -> Result<(FileFacts, Vec<OutputRecord>)> {
    let content =
        fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let rel_path = rel_path(root, file);
    let module_path = rel_module_path(root, file);

    let parsed = parse_file(&rel_path, &content, options);
    let facts = parsed.facts();

    let records = facts
        .facts
        .iter()
        .map(|fact| {
            let qual = format!("{}.{}", module_path, fact.qualified_name);
            let code_body = compact_whitespace(&strip_comments(&content, fact.span, &parsed.comments));
            OutputRecord {
                id: sha256_id(repo_id, &rel_path, &qual),
                vector_fields: VectorFields {
                    signature: fact.signature.clone(),
                    identifiers: collect_idents(&parsed.tokens, fact.span),
                    code_body,
                    doc_comment: fact.docstring.clone().unwrap_or_default(),
                },
                payload: OutputPayload {
                    repo_id: repo_id.to_string(),
                    path: rel_path.clone(),
                    kind: fact.kind.to_string(),
                    qual_symbol: qual,
                    decorators: fact.decorators.clone(),
                    start_line: fact.range.start.line,
                    end_line: fact.range.end.line,
                    text: fact.span.text(&content).to_string(),
                },
            }
        })
        .collect();
    Ok((facts, records))
}

/// One JSON object per line.
pub fn write_ndjson(records: &[OutputRecord], out: &mut dyn Write) -> Result<()> {
    let mut buf = BufWriter::new(out);
    for r in records {
        serde_json::to_writer(&mut buf, r)?;
        buf.write_all(b"\n")?;
    }
    buf.flush()?;
    Ok(())
}
