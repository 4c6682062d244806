use code_extractor::analyzer::{analyze_project, scan, write_ndjson, AnalyzeConfig};
use code_extractor::ExtractOptions;
use regex::Regex;
use serde_json::Value;
use std::fs;
use std::sync::atomic::AtomicBool;

fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let pkg = dir.path().join("src").join("pkg");
    fs::create_dir_all(&pkg).unwrap();
    fs::write(pkg.join("__init__.py"), "").unwrap();
    fs::write(pkg.join("comprehensive.py"), include_str!("fixtures/comprehensive.py")).unwrap();
    fs::write(pkg.join("broken.py"), include_str!("fixtures/malformed.py")).unwrap();
    fs::write(pkg.join("notes.txt"), "def ignored():\n    pass\n").unwrap();

    let cache = dir.path().join("src").join("__pycache__");
    fs::create_dir_all(&cache).unwrap();
    fs::write(cache.join("stale.py"), "def stale():\n    pass\n").unwrap();
    dir
}

fn config(dir: &tempfile::TempDir) -> AnalyzeConfig {
    AnalyzeConfig {
        path: dir.path().to_path_buf(),
        repo_id: "test/repo".to_string(),
        options: ExtractOptions::default(),
    }
}

#[test]
fn emits_valid_ndjson_and_metadata() {
    let dir = project();
    let records = analyze_project(&config(&dir)).expect("analyze should succeed");
    assert!(!records.is_empty(), "should produce records");

    let mut buf = Vec::new();
    write_ndjson(&records, &mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();
    assert_eq!(text.lines().count(), records.len());

    let hex64 = Regex::new(r"^[0-9a-f]{64}$").unwrap();
    let mut kinds = std::collections::HashSet::new();
    for line in text.lines() {
        let v: Value = serde_json::from_str(line).unwrap();
        assert!(hex64.is_match(v["id"].as_str().unwrap()), "id must be 64-char hex");
        assert!(!v["vector_fields"]["signature"].as_str().unwrap().is_empty());
        assert_eq!(v["payload"]["repo_id"], "test/repo");
        kinds.insert(v["payload"]["kind"].as_str().unwrap().to_string());
    }
    for kind in ["class", "method", "function", "property"] {
        assert!(kinds.contains(kind), "missing {kind}");
    }
}

#[test]
fn records_carry_module_paths_and_source_text() {
    let dir = project();
    let records = analyze_project(&config(&dir)).unwrap();
    let symbols: Vec<&str> = records.iter().map(|r| r.payload.qual_symbol.as_str()).collect();
    assert!(symbols.contains(&"pkg.comprehensive.Comprehensive.process_data.nested_helper"));
    assert!(symbols.contains(&"pkg.broken.survivor"));
    assert!(!symbols.iter().any(|s| s.contains("stale") || s.contains("ignored")));

    let helper = records
        .iter()
        .find(|r| r.payload.qual_symbol.ends_with("nested_helper"))
        .unwrap();
    assert_eq!(helper.payload.path, "src/pkg/comprehensive.py");
    assert_eq!(helper.vector_fields.doc_comment, "Nested function with docstring.");
    assert_eq!(helper.vector_fields.identifiers, "nested_helper val");
    assert!(helper.payload.text.starts_with("def nested_helper(val):"));
    assert_eq!(helper.payload.start_line, 32);

    let process = records
        .iter()
        .find(|r| r.payload.qual_symbol.ends_with("Comprehensive.process_data"))
        .unwrap();
    // Comments are dropped from the compacted body.
    assert!(!process.vector_fields.code_body.contains("Lambda expression"));
    assert!(process.vector_fields.code_body.contains("sorter = lambda x: x.lower()"));
}

#[test]
fn ids_are_stable_across_runs() {
    let dir = project();
    let first: Vec<String> = analyze_project(&config(&dir)).unwrap().into_iter().map(|r| r.id).collect();
    let second: Vec<String> = analyze_project(&config(&dir)).unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(first, second);
}

#[test]
fn report_lists_partial_files() {
    let dir = project();
    let report = scan(&config(&dir), &AtomicBool::new(false)).unwrap();
    assert!(!report.cancelled);
    assert!(report.skipped.is_empty());
    let files: Vec<(&str, bool)> = report.files.iter().map(|f| (f.file.as_str(), f.partial)).collect();
    assert_eq!(
        files,
        [
            ("src/pkg/__init__.py", false),
            ("src/pkg/broken.py", true),
            ("src/pkg/comprehensive.py", false),
        ]
    );
}

#[test]
fn cancelled_scan_processes_nothing() {
    let dir = project();
    let report = scan(&config(&dir), &AtomicBool::new(true)).unwrap();
    assert!(report.cancelled);
    assert!(report.records.is_empty());
    assert!(report.files.is_empty());
}

#[test]
fn missing_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = AnalyzeConfig {
        path: dir.path().join("nope"),
        repo_id: "r".to_string(),
        options: ExtractOptions::default(),
    };
    let err = scan(&cfg, &AtomicBool::new(false)).unwrap_err();
    assert!(err.to_string().contains("is not a directory"));
}
