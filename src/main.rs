use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use meta2deps::cli::{Cli, OutputFormat};
use meta2deps::config::ConfigBuilder;
use meta2deps::engine::MetaFileEngine;
use meta2deps::filesystem::HostFs;
use meta2deps::output::DependencyReport;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; -v for debug, -vv for trace
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

/// Append the per-file dependency lines for this directory
fn write_dpdeps(report: &DependencyReport, path: &std::path::Path, reldir: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    for line in report
        .depends_on_file_lines(reldir)
        .into_iter()
        .chain(report.depends_on_dir_lines(reldir))
    {
        writeln!(file, "{line}").with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.verbose);

    let builder = match &args.config {
        Some(path) => ConfigBuilder::from_file(path)?.merge(args.config_builder()),
        None => args.config_builder(),
    };
    let config = Arc::new(builder.build(&HostFs)?);

    if config.dpdeps().is_some() && config.reldir().is_none() {
        anyhow::bail!("--dpdeps requires --reldir (or RELDIR in the environment)");
    }

    let mut engine = MetaFileEngine::new(Arc::clone(&config));
    for meta in &args.meta_files {
        if !meta.exists() {
            warn!("{}: no such meta file, skipping", meta.display());
            continue;
        }
        engine
            .parse_file(meta)
            .with_context(|| format!("Failed to process {}", meta.display()))?;
    }

    let report = engine.report();
    match args.format {
        OutputFormat::Text => print!("{}", report.to_makefile()),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }

    if let (Some(path), Some(reldir)) = (config.dpdeps(), config.reldir()) {
        write_dpdeps(&report, path, reldir)?;
    }

    Ok(())
}
