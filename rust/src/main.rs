use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use code_extractor::analyzer::{scan, AnalyzeConfig};
use code_extractor::{parse_file, ExtractOptions, Fact, FactKind, FileFacts};
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("code-extractor")
        .version("0.1.0")
        .about("Extract declarations, decorators and docstrings from Python sources")
        .subcommand_required(true)
        .subcommand(
            Command::new("parse")
                .about("Parse one file and print its facts and diagnostics")
                .arg(
                    Arg::new("path")
                        .short('p')
                        .long("path")
                        .value_name("PATH")
                        .help("Path to a Python source file")
                        .value_parser(clap::value_parser!(PathBuf))
                        .required(true),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print the facts as JSON")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("tree")
                        .long("tree")
                        .help("Print the syntax tree as JSON")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("no-recovery")
                        .long("no-recovery")
                        .help("Stop at the first syntax error")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("index")
                .about("Summarize the declarations of every source file in a project")
                .arg(
                    Arg::new("project")
                        .short('p')
                        .long("project")
                        .value_name("PROJECT_PATH")
                        .help("Path to the project directory")
                        .value_parser(clap::value_parser!(PathBuf))
                        .required(true),
                )
                .arg(
                    Arg::new("no-recovery")
                        .long("no-recovery")
                        .help("Stop each file at its first syntax error")
                        .action(ArgAction::SetTrue),
                ),
        )
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    match matches.subcommand() {
        Some(("parse", sub)) => run_parse(sub),
        Some(("index", sub)) => run_index(sub),
        _ => Ok(ExitCode::FAILURE),
    }
}

fn options(sub: &ArgMatches) -> ExtractOptions {
    ExtractOptions {
        recovery: !sub.get_flag("no-recovery"),
    }
}

fn run_parse(sub: &ArgMatches) -> Result<ExitCode> {
    let Some(path) = sub.get_one::<PathBuf>("path") else {
        return Ok(ExitCode::FAILURE);
    };
    let source =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let parsed = parse_file(&path.to_string_lossy(), &source, &options(sub));
    let facts = parsed.facts();

    if sub.get_flag("tree") {
        let tree = parsed.tree.to_context(parsed.tree.root());
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else if sub.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&facts)?);
    } else {
        print_facts(&facts);
    }

    for line in facts.render_diagnostics(&source) {
        eprintln!("{}", line.red());
    }
    Ok(if facts.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn run_index(sub: &ArgMatches) -> Result<ExitCode> {
    let Some(project) = sub.get_one::<PathBuf>("project") else {
        return Ok(ExitCode::FAILURE);
    };
    let cfg = AnalyzeConfig {
        path: project.clone(),
        repo_id: project.to_string_lossy().to_string(),
        options: options(sub),
    };
    let report = scan(&cfg, &AtomicBool::new(false))?;
    for file in &report.files {
        let status = if file.partial {
            "partial".yellow()
        } else {
            "ok".green()
        };
        println!(
            "{} [{}] {} classes, {} functions, {} methods",
            file.file.bold(),
            status,
            file.query().classes().count(),
            file.query().functions().count(),
            file.query().methods().count() + file.query().properties().count(),
        );
    }
    for path in &report.skipped {
        println!("{} {}", "skipped".red(), path.display());
    }
    Ok(ExitCode::SUCCESS)
}

fn print_facts(facts: &FileFacts) {
    if let Some(doc) = &facts.module_docstring {
        println!("{} {}", "module".cyan(), first_line(doc).dimmed());
    }
    for import in &facts.imports {
        let names: Vec<&str> = import.names.iter().map(|n| n.name.as_str()).collect();
        let from = match &import.module {
            Some(module) => format!("{}{module}", ".".repeat(import.level)),
            None if import.level > 0 => ".".repeat(import.level),
            None => String::new(),
        };
        if from.is_empty() {
            println!("{} {}", "import".blue(), names.join(", "));
        } else {
            println!("{} {from} {}", "from".blue(), names.join(", "));
        }
    }
    for fact in &facts.facts {
        print_fact(fact);
    }
    for comment in &facts.comments {
        println!("{} {} {}", "comment".dimmed(), comment.range.start, comment.text);
    }
}

fn print_fact(fact: &Fact) {
    let indent = "  ".repeat(fact.depth);
    let kind = match fact.kind {
        FactKind::Class => fact.kind.as_str().magenta(),
        FactKind::Function => fact.kind.as_str().green(),
        FactKind::Method | FactKind::Property => fact.kind.as_str().yellow(),
    };
    for decorator in &fact.decorators {
        println!("{indent}{}", format!("@{decorator}").dimmed());
    }
    println!(
        "{indent}{kind} {} ({}-{})",
        fact.qualified_name.bold(),
        fact.range.start,
        fact.range.end
    );
    if let Some(doc) = &fact.docstring {
        println!("{indent}  {}", first_line(doc).dimmed());
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
