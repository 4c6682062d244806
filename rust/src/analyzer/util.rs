use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::span::Span;
use crate::token::{Token, TokenKind};

pub fn sha256_id(repo_id: &str, rel_path: &str, qual_symbol: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(repo_id.as_bytes());
    hasher.update([0x1f]);
    hasher.update(rel_path.as_bytes());
    hasher.update([0x1f]);
    hasher.update(qual_symbol.as_bytes());
    let digest = hasher.finalize();
    format!("{:x}", digest)
}

pub fn compact_whitespace(s: &str) -> String {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    let re = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("static regex"));
    let compacted = re.replace_all(s.trim(), " ");
    // Line joins inside brackets leave "( x" and "x )" behind.
    compacted.replace("( ", "(").replace(" )", ")").replace("[ ", "[").replace(" ]", "]")
}

/// Text of `span` with every comment inside it removed.
pub fn strip_comments(source: &str, span: Span, comments: &[Token<'_>]) -> String {
    let mut out = String::new();
    let mut cursor = span.start();
    for comment in comments.iter().filter(|c| span.contains(c.span)) {
        out.push_str(Span::new(cursor, comment.span.start()).text(source));
        cursor = comment.span.end();
    }
    out.push_str(Span::new(cursor, span.end()).text(source));
    out
}

/// Distinct identifiers inside `span`, in first-seen order.
pub fn collect_idents(tokens: &[Token<'_>], span: Span) -> String {
    let mut seen = HashSet::new();
    tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Name && span.contains(t.span))
        .map(|t| t.text)
        .filter(|name| seen.insert(*name))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Dotted import path of `file` relative to `root`. `pkg/__init__.py`
/// names the package itself.
pub fn rel_module_path(root: &Path, file: &Path) -> String {
    let rel = pathdiff::diff_paths(file, root).unwrap_or_else(|| file.to_path_buf());
    let comps: Vec<String> = rel
        .components()
        .map(|comp| comp.as_os_str().to_string_lossy().to_string())
        .collect();
    // Remove src/ prefix if present
    let comps = if comps.first().is_some_and(|s| s == "src") {
        &comps[1..]
    } else {
        &comps[..]
    };
    let mut parts = Vec::new();
    for (i, part) in comps.iter().enumerate() {
        if i + 1 == comps.len() {
            let stem = PathBuf::from(part)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            if stem != "__init__" && !stem.is_empty() {
                parts.push(stem);
            }
        } else {
            parts.push(part.clone());
        }
    }
    if parts.is_empty() {
        "__main__".to_string()
    } else {
        parts.join(".")
    }
}

pub fn rel_path(root: &Path, file: &Path) -> String {
    pathdiff::diff_paths(file, root)
        .unwrap_or_else(|| file.to_path_buf())
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    #[test]
    fn module_paths() {
        let root = Path::new("/repo");
        assert_eq!(rel_module_path(root, Path::new("/repo/src/pkg/mod_a.py")), "pkg.mod_a");
        assert_eq!(rel_module_path(root, Path::new("/repo/pkg/__init__.py")), "pkg");
        assert_eq!(rel_module_path(root, Path::new("/repo/tool.pyi")), "tool");
    }

    #[test]
    fn ids_are_stable_and_distinct() {
        let a = sha256_id("r", "a.py", "A.m");
        assert_eq!(a, sha256_id("r", "a.py", "A.m"));
        assert_ne!(a, sha256_id("r", "a.pyA", ".m"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn comments_and_identifiers() {
        let src = "def f(a,  # first\n      b):\n    return a + b  # sum\n";
        let tokens = tokenize(src);
        let all = Span::new(0, src.len() as u32);
        assert_eq!(
            compact_whitespace(&strip_comments(src, all, &tokens.comments)),
            "def f(a, b): return a + b"
        );
        assert_eq!(collect_idents(&tokens.tokens, all), "f a b");
    }
}
