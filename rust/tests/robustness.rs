use code_extractor::{extract, parse_file, tokenize, ExtractOptions, Lexer, TokenKind};
use proptest::prelude::*;

const COMPREHENSIVE: &str = include_str!("fixtures/comprehensive.py");

fn fragment() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "def ", "class ", "async ", "lambda", "try:", "except", "finally:", "if ", "else:",
        "return ", "@", "(", ")", "[", "]", "{", "}", ":", ",", "=", "\n", "    ", "\t", "x", "y1",
        "42", "'s'", "\"\"\"doc\"\"\"", "f\"{a}\"", "#c", "\\\n", " for i in z", " if ", "*", "**",
    ])
    .prop_map(str::to_string)
}

const STATEMENTS: [&str; 10] = [
    "x = 1\n",
    "total += len(items)  # running\n",
    "import os.path as p\n",
    "def f(a, *args, b=2, **kw):\n    \"\"\"Doc.\"\"\"\n    return [i * 2 for i in args if i]\n",
    "class Point(Base, metaclass=Meta):\n    x: int = 0\n\n    @property\n    def norm(self):\n        return abs(self.x)\n",
    "try:\n    run()\nexcept (ValueError, KeyError) as e:\n    log(e)\nfinally:\n    close()\n",
    "values = {\n    'a': 1,\n    'b': lambda y: y + 1,\n}\n",
    "for k, v in sorted(d.items()):\n    if k:\n        continue\n    elif v:\n        break\n    else:\n        pass\n",
    "async def fetch(url):\n    async with session() as s:\n        return await s.get(url)\n",
    "with open(path) as fh, lock:\n    data = f\"{fh.read()!r:>10}\"\n",
];

/// Wraps a statement in an enclosing block, indenting every non-blank line.
fn wrap(statement: &str, wrapper: u8, n: usize) -> String {
    let header = match wrapper {
        0 => return statement.to_string(),
        1 => format!("class Outer{n}:\n"),
        2 => format!("@decorate(n={n})\ndef outer{n}():\n"),
        _ => "while True:\n".to_string(),
    };
    let body: String = statement
        .lines()
        .map(|line| if line.is_empty() { "\n".to_string() } else { format!("    {line}\n") })
        .collect();
    header + &body
}

fn valid_module() -> impl Strategy<Value = String> {
    prop::collection::vec((0..STATEMENTS.len(), 0u8..4, prop::bool::ANY), 1..8).prop_map(|parts| {
        parts
            .into_iter()
            .enumerate()
            .map(|(n, (index, wrapper, blank))| {
                let block = wrap(STATEMENTS[index], wrapper, n);
                if blank { block + "\n" } else { block }
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn lexer_is_total_and_ends_with_eof(source in "\\PC{0,200}") {
        let mut count = 0usize;
        let mut last = None;
        for item in Lexer::new(&source) {
            count += 1;
            prop_assert!(count <= source.len() * 4 + 16, "lexer did not terminate");
            if let Ok(token) = item {
                prop_assert!(token.span.end() as usize <= source.len());
                last = Some(token.kind);
            }
        }
        prop_assert_eq!(last, Some(TokenKind::Eof));
    }

    #[test]
    fn sessions_never_panic_and_trees_stay_valid(parts in prop::collection::vec(fragment(), 0..40)) {
        let source = parts.concat();
        let parsed = parse_file("fuzz.py", &source, &ExtractOptions::default());
        prop_assert!(parsed.tree.validate().is_empty());
        let facts = parsed.facts();
        for fact in &facts.facts {
            prop_assert!(fact.span.end() as usize <= source.len());
            if let Some(parent) = fact.parent {
                prop_assert!(parent < facts.facts.len());
                prop_assert!(facts.facts[parent].span.contains(fact.span));
            }
        }
    }

    #[test]
    fn top_level_spans_cover_every_token_of_valid_modules(source in valid_module()) {
        let parsed = parse_file("gen.py", &source, &ExtractOptions::default());
        prop_assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
        let tree = &parsed.tree;
        prop_assert!(tree.validate().is_empty());
        let statements: Vec<_> = tree.children(tree.root()).iter().map(|&id| tree.span(id)).collect();
        for token in parsed.tokens.iter().filter(|t| t.is_significant()) {
            prop_assert!(
                statements.iter().any(|s| s.contains(token.span)),
                "token {:?} at {} is outside every statement",
                token.text,
                token.start
            );
        }
    }

    #[test]
    fn truncated_fixture_keeps_a_prefix_of_facts(cut in 0usize..COMPREHENSIVE.len()) {
        let cut = (0..=cut).rev().find(|&i| COMPREHENSIVE.is_char_boundary(i)).unwrap_or(0);
        let source = &COMPREHENSIVE[..cut];
        let file = extract("cut.py", source, &ExtractOptions::default());
        let full = extract("full.py", COMPREHENSIVE, &ExtractOptions::default());
        for fact in &file.facts {
            prop_assert!(full.facts.iter().any(|f| f.qualified_name == fact.qualified_name));
        }
    }
}

#[test]
fn deeply_nested_input_reports_instead_of_overflowing() {
    let source = format!("x = {}1{}\n", "(".repeat(5000), ")".repeat(5000));
    let file = extract("deep.py", &source, &ExtractOptions::default());
    assert!(file.diagnostics.iter().any(|d| d.to_string().contains("nesting")));

    let source = (0..200).fold(String::new(), |mut acc, depth| {
        acc.push_str(&"    ".repeat(depth));
        acc.push_str("if x:\n");
        acc
    }) + &"    ".repeat(200) + "pass\n";
    let file = extract("deep_blocks.py", &source, &ExtractOptions::default());
    assert!(file.has_errors());

    let nesting_reported = |source: &str| {
        extract("deep.py", source, &ExtractOptions::default())
            .diagnostics
            .iter()
            .any(|d| d.to_string().contains("nesting"))
    };
    assert!(nesting_reported(&format!("x = {}0\n", "lambda: ".repeat(5_000))));
    assert!(nesting_reported(&format!("x = {}1\n", "1 if c else ".repeat(100_000))));
}

#[test]
fn long_elif_chains_are_not_nesting() {
    let mut source = String::from("if a:\n    pass\n");
    for _ in 1..5_000 {
        source.push_str("elif a:\n    pass\n");
    }
    source.push_str("elif b:\n    def last():\n        pass\n");
    let parsed = parse_file("elif.py", &source, &ExtractOptions::default());
    assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics.first());
    assert!(parsed.tree.validate().is_empty());
    let facts = parsed.facts();
    assert_eq!(facts.facts.len(), 1);
    assert_eq!(facts.facts[0].qualified_name, "last");
    assert_eq!(facts.facts[0].depth, 0);
}

#[test]
fn crlf_input_matches_lf_input() {
    let crlf_source = COMPREHENSIVE.replace('\n', "\r\n");
    let lf = extract("lf.py", COMPREHENSIVE, &ExtractOptions::default());
    let crlf = extract("crlf.py", &crlf_source, &ExtractOptions::default());
    assert!(crlf.diagnostics.is_empty(), "{:?}", crlf.diagnostics);
    let names = |f: &code_extractor::FileFacts| {
        f.facts.iter().map(|f| f.qualified_name.clone()).collect::<Vec<_>>()
    };
    assert_eq!(names(&lf), names(&crlf));
    assert_eq!(lf.facts[0].docstring, crlf.facts[0].docstring);
    assert_eq!(tokenize(COMPREHENSIVE).tokens.len(), tokenize(&crlf_source).tokens.len());
}
