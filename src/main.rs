// Tapstat command line
// Analyzes key event logs and writes a report plus tap-hold training data

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use tapstat::pipeline::{analyze_sessions, Session, TraceBuilder, TraceWriter};
use tapstat::{dataset, AnalysisConfig, KeyTable};

#[derive(Parser)]
#[command(name = "tapstat", version, about = "Key press timing and tap-hold analysis")]
struct Args {
    /// Event logs (timestamp, is_down, key; tab separated, optionally gzipped)
    #[arg(required = true)]
    events: Vec<PathBuf>,

    /// Analysis configuration (JSON)
    #[arg(short, long, env = "TAPSTAT_CONFIG")]
    config: Option<PathBuf>,

    /// Write training rows here (`.gz` to compress)
    #[arg(long)]
    training_out: Option<PathBuf>,

    /// Write the report here instead of stdout
    #[arg(long)]
    report: Option<PathBuf>,

    /// Report as JSON instead of markdown
    #[arg(long)]
    json: bool,

    /// Append progress entries to this JSONL file
    #[arg(long)]
    trace: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AnalysisConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => AnalysisConfig::default(),
    };

    let trace = args.trace.clone().map(TraceWriter::new);
    if let Some(writer) = &trace {
        log::info!("Tracing run {} to {}", writer.run_id(), writer.path().display());
        writer.write(TraceBuilder::stage("ingest").start(format!("Loading {} logs", args.events.len())))?;
    }

    let mut keys = KeyTable::new();
    let mut sessions = Vec::with_capacity(args.events.len());
    for path in &args.events {
        let session = Session::load(path, &mut keys)
            .with_context(|| format!("Failed to load events: {}", path.display()))?;
        sessions.push(session);
    }

    if let Some(writer) = &trace {
        writer.write(TraceBuilder::stage("ingest").complete(format!("{} distinct keys", keys.len())))?;
    }

    let batch = analyze_sessions(&keys, &sessions, &config, trace.as_ref())?;

    if let Some(path) = &args.training_out {
        dataset::save(path, &batch.analysis.training.examples)
            .with_context(|| format!("Failed to write training data: {}", path.display()))?;
    }

    let report = batch.report(&keys, &config);
    let rendered = if args.json {
        String::from_utf8(report.to_json_bytes()?)?
    } else {
        report.render_markdown()
    };

    match &args.report {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write report: {}", path.display()))?;
            log::info!("Wrote report to {}", path.display());
        }
        None => print!("{}", rendered),
    }

    if let Some(writer) = &trace {
        writer.write(TraceBuilder::stage("report").complete("Report written"))?;
    }

    Ok(())
}
