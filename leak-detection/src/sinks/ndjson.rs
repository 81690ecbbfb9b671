use std::path::PathBuf;

use futures::{Stream, StreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

use crate::{
    pipeline::{PipelineError, Sink},
    scoring::RiskScore,
};

/// Writes one JSON object per ranked score, to a file or to stdout.
pub struct NdjsonRiskSink {
    path: Option<PathBuf>,
}

impl NdjsonRiskSink {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

async fn write_all<W, S>(out: W, mut input: S) -> Result<usize, PipelineError>
where
    W: AsyncWrite + Unpin,
    S: Stream<Item = RiskScore> + Unpin,
{
    let mut out = BufWriter::new(out);
    let mut written = 0;
    while let Some(score) = input.next().await {
        let mut line = serde_json::to_vec(&score)
            .map_err(|e| PipelineError::Sink(format!("failed to encode score for '{}': {e}", score.meter_id)))?;
        line.push(b'\n');
        out.write_all(&line)
            .await
            .map_err(|e| PipelineError::Sink(format!("write failed: {e}")))?;
        written += 1;
    }
    out.flush()
        .await
        .map_err(|e| PipelineError::Sink(format!("flush failed: {e}")))?;
    Ok(written)
}

#[async_trait::async_trait]
impl Sink<RiskScore> for NdjsonRiskSink {
    async fn run<S>(&self, input: S) -> Result<(), PipelineError>
    where
        S: Stream<Item = RiskScore> + Send + Unpin + 'static,
    {
        let written = match &self.path {
            Some(path) => {
                let file = tokio::fs::File::create(path)
                    .await
                    .map_err(|e| PipelineError::Sink(format!("failed to create {}: {e}", path.display())))?;
                write_all(file, input).await?
            }
            None => write_all(tokio::io::stdout(), input).await?,
        };

        tracing::info!(written, destination = ?self.path, "risk scores written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        detectors::{AnomalyEvent, Severity},
        scoring::RiskTier,
    };

    fn score(id: &str) -> RiskScore {
        RiskScore {
            meter_id: id.into(),
            building_id: "B1".into(),
            total_score: 37.5,
            tier: RiskTier::Normal,
            events: vec![AnomalyEvent::ZeroStreak {
                start: "2023-02".parse().unwrap(),
                end: "2023-07".parse().unwrap(),
                length: 6,
                severity: Severity::High,
            }],
        }
    }

    #[tokio::test]
    async fn writes_one_line_per_score() {
        let path = std::env::temp_dir().join(format!("{}-scores.ndjson", std::process::id()));
        let sink = NdjsonRiskSink::new(Some(path.clone()));
        sink.run(futures::stream::iter(vec![score("M1"), score("M2")]))
            .await
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["meter_id"], "M1");
        assert_eq!(lines[0]["tier"], "normal");
        assert_eq!(lines[0]["events"][0]["kind"], "zero_streak");
        assert_eq!(lines[0]["events"][0]["length"], 6);
        assert_eq!(lines[1]["meter_id"], "M2");
    }
}
