//! Unsupervised outlier model over per-meter feature vectors.
//!
//! The flow has a hard barrier: every qualifying meter's features are
//! extracted and the scaler is fit on the whole batch before any meter is
//! scored. Scores are therefore relative to the batch they were computed in.

pub mod features;
pub mod isolation_forest;
pub mod scaler;

pub use features::{FeatureExtractor, FeatureVector, FEATURE_NAMES};
pub use isolation_forest::{IsolationForest, IsolationForestParams};
pub use scaler::StandardScaler;
