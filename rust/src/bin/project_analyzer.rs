use anyhow::{Context, Result};
use clap::Parser;
use code_extractor::analyzer::{analyze_project, write_ndjson, AnalyzeConfig};
use code_extractor::ExtractOptions;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "project_analyzer", version, about = "Scan Python sources and emit NDJSON metadata")]
struct Cli {
    /// Root directory of Python sources
    #[arg(long, value_name = "dir")]
    path: PathBuf,

    /// Repository identifier
    #[arg(long, value_name = "string")]
    repo_id: String,

    /// Output file for NDJSON (default stdout)
    #[arg(long, value_name = "file")]
    out: Option<PathBuf>,

    /// Stop each file at its first syntax error
    #[arg(long)]
    no_recovery: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = AnalyzeConfig {
        path: cli.path.clone(),
        repo_id: cli.repo_id.clone(),
        options: ExtractOptions {
            recovery: !cli.no_recovery,
        },
    };
    let records = analyze_project(&cfg)?;

    match cli.out {
        Some(p) => {
            let f = File::create(&p).with_context(|| format!("Failed to create {}", p.display()))?;
            write_ndjson(&records, &mut BufWriter::new(f))?;
        }
        None => {
            let mut out = io::stdout().lock();
            write_ndjson(&records, &mut out)?;
        }
    }
    Ok(())
}
