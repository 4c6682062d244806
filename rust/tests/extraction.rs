use code_extractor::{extract, parse_file, tokenize, Diagnostic, ExtractOptions, FactKind, LexErrorKind};

const COMPREHENSIVE: &str = include_str!("fixtures/comprehensive.py");
const MALFORMED: &str = include_str!("fixtures/malformed.py");

#[test]
fn comprehensive_fixture_facts() {
    let file = extract("comprehensive.py", COMPREHENSIVE, &ExtractOptions::default());
    assert!(file.diagnostics.is_empty(), "{:?}", file.diagnostics);
    assert!(!file.partial);

    let summary: Vec<(FactKind, &str, usize, Option<usize>)> = file
        .facts
        .iter()
        .map(|f| (f.kind, f.qualified_name.as_str(), f.depth, f.parent))
        .collect();
    assert_eq!(
        summary,
        [
            (FactKind::Class, "Comprehensive", 0, None),
            (FactKind::Method, "Comprehensive.__init__", 1, Some(0)),
            (FactKind::Property, "Comprehensive.formatted_name", 1, Some(0)),
            (FactKind::Method, "Comprehensive.process_data", 1, Some(0)),
            (FactKind::Function, "Comprehensive.process_data.nested_helper", 2, Some(3)),
            (FactKind::Function, "top_level_function", 0, None),
        ]
    );
}

#[test]
fn decorators_keep_source_order() {
    let file = extract("comprehensive.py", COMPREHENSIVE, &ExtractOptions::default());
    let class = &file.facts[0];
    assert_eq!(
        class.decorators,
        ["decorator_one", "decorator_two(param=\"value\")"]
    );
    // The class span starts at its first decorator.
    assert_eq!(class.range.start.line, 12);
    assert_eq!(file.facts[2].decorators, ["property"]);
}

#[test]
fn docstrings_attach_to_first_body_statement() {
    let file = extract("comprehensive.py", COMPREHENSIVE, &ExtractOptions::default());
    assert_eq!(
        file.module_docstring.as_deref(),
        Some("Module level docstring.\nThis covers multiple lines.")
    );
    let docs: Vec<Option<&str>> = file.facts.iter().map(|f| f.docstring.as_deref()).collect();
    assert_eq!(
        docs,
        [
            Some("Class docstring."),
            None,
            None,
            None,
            Some("Nested function with docstring."),
            Some("Function docstring."),
        ]
    );

    let later = extract(
        "later.py",
        "def f():\n    x = 1\n    \"\"\"Not a docstring.\"\"\"\n",
        &ExtractOptions::default(),
    );
    assert_eq!(later.facts[0].docstring, None);
}

#[test]
fn body_structure_counts() {
    let file = extract("comprehensive.py", COMPREHENSIVE, &ExtractOptions::default());
    let process = &file.facts[3];
    assert_eq!(process.lambdas, 1);
    assert_eq!(process.comprehensions, 2);
    assert_eq!(process.parameters, ["self", "items"]);
    assert_eq!(process.signature, "def process_data(self, items):");

    let top = &file.facts[5];
    assert!(top.guaranteed_cleanup);
    assert_eq!(file.try_blocks.len(), 1);
    let block = &file.try_blocks[0];
    assert_eq!(block.owner.as_deref(), Some("top_level_function"));
    assert_eq!(block.handlers, 1);
    assert_eq!(block.handled, ["Exception"]);
    assert!(!block.has_else);
    assert!(block.guaranteed_cleanup);
}

#[test]
fn finally_means_cleanup_whatever_the_handlers() {
    for handlers in ["", "except A:\n    pass\n", "except A:\n    pass\nexcept B:\n    pass\n"] {
        let source = format!("try:\n    run()\n{handlers}finally:\n    stop()\n");
        let file = extract("t.py", &source, &ExtractOptions::default());
        assert!(file.diagnostics.is_empty(), "{source}: {:?}", file.diagnostics);
        assert!(file.try_blocks[0].guaranteed_cleanup, "{source}");
    }
}

#[test]
fn imports_and_comments() {
    let file = extract("comprehensive.py", COMPREHENSIVE, &ExtractOptions::default());
    assert_eq!(file.imports.len(), 2);
    assert_eq!(file.imports[0].module, None);
    assert_eq!(file.imports[0].names[0].name, "os");
    assert_eq!(file.imports[1].module.as_deref(), Some("datetime"));
    assert_eq!(file.imports[1].names[0].name, "datetime");

    let comments: Vec<&str> = file.comments.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(
        comments,
        [
            "A global variable",
            "Instance attribute",
            "Lambda expression",
            "List comprehension (structural pattern)",
        ]
    );
}

#[test]
fn top_level_statements_cover_every_significant_token() {
    let parsed = parse_file("comprehensive.py", COMPREHENSIVE, &ExtractOptions::default());
    let tree = &parsed.tree;
    let statements: Vec<_> = tree
        .children(tree.root())
        .iter()
        .map(|&id| tree.span(id))
        .collect();
    assert!(tree.validate().is_empty());

    for token in tokenize(COMPREHENSIVE).tokens.iter().filter(|t| t.is_significant()) {
        assert!(
            statements.iter().any(|s| s.contains(token.span)),
            "token {:?} at {} is outside every statement",
            token.text,
            token.start
        );
    }
}

#[test]
fn recovery_skips_broken_statements() {
    let file = extract("malformed.py", MALFORMED, &ExtractOptions::default());
    let names: Vec<&str> = file.facts.iter().map(|f| f.qualified_name.as_str()).collect();
    assert_eq!(names, ["survivor", "Tail"]);
    assert_eq!(file.facts[0].docstring.as_deref(), Some("Still extracted."));
    assert_eq!(file.imports.len(), 1);
    assert!(file.partial);

    let parse_errors: Vec<_> = file
        .diagnostics
        .iter()
        .filter_map(|d| match d {
            Diagnostic::Parse(e) => Some(e),
            _ => None,
        })
        .collect();
    assert_eq!(parse_errors.len(), 2);
    assert_eq!(parse_errors[0].expected, "':'");
    let abandoned = parse_errors[0].abandoned.expect("recovered errors record the skipped span");
    let text = abandoned.text(MALFORMED);
    assert!(text.starts_with("class Broken:"), "{text:?}");
    assert!(text.ends_with("pass"), "{text:?}");
}

#[test]
fn broken_class_before_valid_function() {
    let source = "class Broken:\n    def m(self) pass\n\ndef valid():\n    pass\n";
    let file = extract("b.py", source, &ExtractOptions::default());
    assert_eq!(file.facts.len(), 1);
    assert_eq!(file.facts[0].qualified_name, "valid");
    assert_eq!(file.diagnostics.len(), 1);
    let Diagnostic::Parse(err) = &file.diagnostics[0] else {
        panic!("expected a parse error, got {:?}", file.diagnostics[0]);
    };
    let abandoned = err.abandoned.expect("abandoned span");
    assert_eq!(abandoned.text(source), "class Broken:\n    def m(self) pass");
}

#[test]
fn unclosed_bracket_stops_at_the_next_top_level_definition() {
    let sources = [
        "class Broken(Base:\n    def m(self):\n        pass\n\ndef valid():\n    pass\n",
        "class Broken:\n    def m(self):\n        print(1\n\ndef valid():\n    pass\n",
    ];
    for source in sources {
        let file = extract("b.py", source, &ExtractOptions::default());
        let names: Vec<&str> = file.facts.iter().map(|f| f.qualified_name.as_str()).collect();
        assert_eq!(names, ["valid"], "{source:?}");
        assert!(
            file.diagnostics.iter().any(|d| matches!(
                d,
                Diagnostic::Lex(e) if e.kind == LexErrorKind::UnclosedDelimiter('(')
            )),
            "{:?}",
            file.diagnostics
        );
        assert!(file.diagnostics.iter().any(Diagnostic::is_parse));
    }
}

#[test]
fn module_docstring_must_lead_the_file() {
    let source = "x = = 1\n\"\"\"not the module docstring\"\"\"\n";
    let file = extract("d.py", source, &ExtractOptions::default());
    assert!(file.has_errors());
    assert_eq!(file.module_docstring, None);
}

#[test]
fn without_recovery_parsing_stops_at_first_error() {
    let options = ExtractOptions { recovery: false };
    let file = extract("malformed.py", MALFORMED, &options);
    assert!(file.facts.is_empty());
    assert_eq!(file.imports.len(), 1);
    let parse_errors: Vec<_> = file.diagnostics.iter().filter(|d| d.is_parse()).collect();
    assert_eq!(parse_errors.len(), 1);
    match parse_errors[0] {
        Diagnostic::Parse(e) => assert!(e.abandoned.is_none()),
        other => panic!("unexpected diagnostic {other:?}"),
    }
}

#[test]
fn serializes_facts_as_json() {
    let file = extract("comprehensive.py", COMPREHENSIVE, &ExtractOptions::default());
    let value = serde_json::to_value(&file).unwrap();
    assert_eq!(value["facts"][2]["kind"], "property");
    assert_eq!(value["facts"][0]["decorators"][0], "decorator_one");
    assert_eq!(value["facts"][4]["parent"], 3);
}
