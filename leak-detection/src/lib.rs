pub mod config;
pub mod dataset;
pub mod detectors;
pub mod metrics_export;
pub mod ml;
pub mod observability;
pub mod peer_stats;
pub mod pipeline;
pub mod scoring;
pub mod sinks;
pub mod sources;
pub mod stats;

pub use pipeline::{analyze, AnalysisError, Pipeline};
pub use scoring::{RiskScore, RiskTier};
