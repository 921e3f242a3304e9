//! Application services above the repository layer.

pub mod ingest;

pub use ingest::{IngestOutcome, IngestRunner};
