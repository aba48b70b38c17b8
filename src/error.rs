use duckdb::arrow::datatypes::DataType;
use duckdb::arrow::error::ArrowError;

/// Everything that can stop an ingest run.
/// None of these are retried: the loader is a one-shot tool and every error is fatal.
#[derive(thiserror::Error)]
pub enum IngestError {
    #[error("Failed to fetch source '{url}'")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("I/O error")]
    Io(#[from] std::io::Error),
    #[error("Failed to connect to target '{target}'")]
    Connect {
        target: String,
        #[source]
        source: duckdb::Error,
    },
    #[error("Source has no header row")]
    EmptySource,
    #[error("Column '{column}' not found in source")]
    MissingColumn { column: String },
    #[error("Failed to parse column '{column}' as a timestamp")]
    Timestamp {
        column: String,
        #[source]
        source: ArrowError,
    },
    #[error("Column '{column}' has unsupported type {data_type}")]
    UnsupportedType { column: String, data_type: DataType },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Database error")]
    Database(#[from] duckdb::Error),
    #[error("Arrow error")]
    Arrow(#[from] ArrowError),
}

impl std::fmt::Debug for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

// Print the error followed by each cause in the chain
pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}
