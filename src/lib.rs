pub mod config;
pub mod error;
pub mod fetch;
pub mod ingest;
pub mod telemetry;

#[cfg(feature = "python")]
mod python;

pub use config::{IngestConfig, LoadConfig, PostgresConfig};
pub use error::IngestError;
pub use ingest::{launch_ingest, LoadSummary};
