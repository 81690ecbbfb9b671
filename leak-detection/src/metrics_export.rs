use std::path::Path;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static PROM_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder. Later calls are no-ops.
pub fn init() -> Result<(), BuildError> {
    if PROM_HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

/// Exposition text of everything recorded so far, if the recorder is installed.
pub fn render() -> Option<String> {
    PROM_HANDLE.get().map(|h| h.render())
}

/// Write the exposition text for a node-exporter style textfile collector.
///
/// The file is replaced atomically so a collector never reads half a run.
pub async fn write_textfile(path: &Path) -> std::io::Result<()> {
    let Some(text) = render() else {
        tracing::warn!("metrics recorder not installed; skipping textfile");
        return Ok(());
    };
    let tmp = path.with_extension("prom.tmp");
    tokio::fs::write(&tmp, text).await?;
    tokio::fs::rename(&tmp, path).await?;
    tracing::info!(path = %path.display(), "metrics textfile written");
    Ok(())
}
