//! Stream plumbing around the batch engine, and the engine entry point.
//!
//! Records come in through a [`Source`], are collected into a
//! [`Dataset`](crate::dataset::Dataset), analyzed in one pass by
//! [`Pipeline`], and the ranked scores go out through a [`Sink`].

mod analysis;

use std::pin::Pin;

use futures::Stream;

use crate::sources::SourceError;

pub use analysis::{analyze, AnalysisError, Pipeline};

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),
    #[error("analysis error: {0}")]
    Analysis(#[from] AnalysisError),
    #[error("sink error: {0}")]
    Sink(String),
}

pub type RecordStream<T> = Pin<Box<dyn Stream<Item = Result<T, SourceError>> + Send>>;

#[async_trait::async_trait]
pub trait Source<T>: Send + Sync {
    async fn stream(&self) -> RecordStream<T>;
}

#[async_trait::async_trait]
pub trait Sink<T>: Send + Sync {
    async fn run<S>(&self, input: S) -> Result<(), PipelineError>
    where
        S: Stream<Item = T> + Send + Unpin + 'static;
}
