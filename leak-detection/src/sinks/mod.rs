pub mod ndjson;

pub use ndjson::NdjsonRiskSink;
