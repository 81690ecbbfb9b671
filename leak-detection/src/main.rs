use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use leak_detection::{
    config::AppConfig,
    dataset::Dataset,
    metrics_export, observability,
    pipeline::{Pipeline, Sink, Source},
    scoring::{RiskTier, TierSummary},
    sinks::NdjsonRiskSink,
    sources::ConsumptionCsvFileSource,
};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let mut cfg = AppConfig::load()?;

    // Optional CLI arg overrides the configured input.
    if let Some(arg) = std::env::args().nth(1) {
        cfg.input.path = Some(arg);
    }
    let input = cfg
        .input
        .path
        .clone()
        .context("no input CSV: pass a path or set input.path")?;

    if cfg.metrics.is_some() {
        metrics_export::init()?;
    }

    // Fail on a bad configuration before reading any input.
    let pipeline = Pipeline::new(cfg.detection.clone())?;

    let source = ConsumptionCsvFileSource::new(&input);
    let dataset = Dataset::collect(source.stream().await).await?;
    tracing::info!(
        input = %input,
        meters = dataset.len(),
        filled_gaps = dataset.filled_gaps(),
        "dataset loaded"
    );

    let meters = dataset.into_meters();
    let scores = tokio::task::spawn_blocking(move || pipeline.run(&meters)).await??;

    let summary = TierSummary::from_scores(&scores);
    let sink = NdjsonRiskSink::new(cfg.output.path.as_ref().map(PathBuf::from));
    sink.run(futures::stream::iter(scores)).await?;

    for tier in RiskTier::ALL {
        tracing::info!(tier = tier.as_str(), meters = summary.count(tier), "tier");
    }
    tracing::info!(suspects = summary.suspects, events = summary.events, "run summary");

    if let Some(m) = &cfg.metrics {
        metrics_export::write_textfile(Path::new(&m.textfile_path)).await?;
    }

    Ok(())
}
