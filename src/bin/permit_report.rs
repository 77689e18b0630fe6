//! Permit report CLI
//!
//! Runs the route against the provided layers, prints per-layer results and
//! failures, and writes the Markdown report when an output path is given.

use anyhow::{Context, Result};
use clap::Parser;
use route_permits::report::{build_report, export_tables};
use route_permits::{
    JsonFormatter, LayerInputs, LayerKind, PermitPipeline, PipelineConfig, SummaryPrompt,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "permit_report")]
#[command(about = "Find where a route crosses cities, counties, protected areas and rail", long_about = None)]
struct Args {
    /// Route file (.kmz or .shp)
    route: PathBuf,

    /// Cities shapefile
    #[arg(long)]
    cities: Option<PathBuf>,

    /// Counties shapefile
    #[arg(long)]
    counties: Option<PathBuf>,

    /// Protected areas (PADUS) shapefile
    #[arg(long)]
    padus: Option<PathBuf>,

    /// Rail lines shapefile
    #[arg(long)]
    rail: Option<PathBuf>,

    /// JSON file with CRS and column overrides
    #[arg(long)]
    config: Option<PathBuf>,

    /// Markdown report path (overrides the config file)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Print the text summarizer prompt
    #[arg(long)]
    prompt: bool,

    /// Directory to write one CSV per layer result
    #[arg(long)]
    tables: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Default log level: info for our crate, warn for others
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "route_permits=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    let pipeline = PermitPipeline::from_config(&config).context("Invalid pipeline configuration")?;

    let inputs = LayerInputs::from_paths(args.cities, args.counties, args.padus, args.rail);
    let outcome = pipeline
        .run(&args.route, inputs)
        .with_context(|| format!("Failed to process route {:?}", args.route))?;

    if let Some(error) = &outcome.route_parse_error {
        eprintln!("Warning: route document could not be parsed ({}); no route lines", error);
    }

    println!("Route: {} line geometries", outcome.route_features);
    for kind in LayerKind::ALL {
        match outcome.result(kind) {
            Some(result) => println!("  {:<9} {} intersecting features", kind.label(), result.len()),
            None => match outcome.failures.iter().find(|f| f.kind == kind) {
                Some(failure) => println!("  {:<9} FAILED: {}", kind.label(), failure.error),
                None => println!("  {:<9} not provided", kind.label()),
            },
        }
    }

    let summary = outcome.summary().context("Failed to aggregate layer results")?;

    if let Some(dir) = &args.tables {
        let written = export_tables(&outcome.results(), dir)
            .with_context(|| format!("Failed to export tables to {:?}", dir))?;
        println!("Wrote {} tables to {}", written.len(), dir.display());
    }

    let output = args.output.or(config.output_path);
    build_report(&summary, None, output.as_deref()).context("Failed to write report")?;
    if let Some(path) = &output {
        println!("Report saved to {}", path.display());
    }

    if args.json {
        println!("{}", JsonFormatter::format(&summary)?);
    }

    if args.prompt {
        let prompt = SummaryPrompt::new(&summary);
        println!("--- system ---\n{}\n--- user ---\n{}", prompt.system, prompt.user);
    }

    Ok(())
}
