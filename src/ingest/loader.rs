use duckdb::arrow::datatypes::SchemaRef;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::LoadConfig;
use crate::error::IngestError;
use crate::ingest::cursor::BatchCursor;
use crate::ingest::normalize::Normalizer;
use crate::ingest::schema::{read_csv_columns, TableRef};
use crate::ingest::source::CsvSource;
use crate::ingest::table_writer::TableWriter;

/// Where a load currently is. There is no way back to `SchemaBootstrapped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    SchemaBootstrapped,
    Streaming { batches: usize },
    Done,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::SchemaBootstrapped => f.write_str("schema-bootstrapped"),
            LoadState::Streaming { batches } => write!(f, "streaming({})", batches),
            LoadState::Done => f.write_str("done"),
        }
    }
}

/// Outcome of a completed load.
#[derive(Debug, Clone)]
pub struct LoadSummary {
    pub table: TableRef,
    pub schema: SchemaRef,
    pub batches: usize,
    pub rows: usize,
    pub elapsed: Duration,
}

// Reject tuning that could never make progress
fn validate(config: &LoadConfig) -> Result<(), IngestError> {
    if config.batch_size == 0 {
        return Err(IngestError::InvalidConfig(
            "batch size must be at least 1".to_string(),
        ));
    }
    if config.sample_rows == 0 {
        return Err(IngestError::InvalidConfig(
            "sample size must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Create `table` from a sample of `source`, then append the whole source in
/// batches of `config.batch_size` rows, in source order.
pub fn load<W: TableWriter + ?Sized>(
    source: &CsvSource,
    writer: &mut W,
    table: &TableRef,
    config: &LoadConfig,
) -> Result<LoadSummary, IngestError> {
    validate(config)?;
    let start = Instant::now();

    // Schema bootstrap: timestamps are declared as text and normalized like every later batch.
    // None of the sample is written.
    let described = source.describe(config.sample_rows)?;
    let columns = read_csv_columns(&described, &config.timestamp_columns);
    let sample = source.sample(&columns, config.sample_rows)?;
    let bootstrapped = Normalizer::new(config).normalize(sample)?;
    let schema = bootstrapped.schema();
    writer.create_table(table, &schema)?;

    let mut state = LoadState::SchemaBootstrapped;
    info!(
        %table,
        %state,
        sample_rows = bootstrapped.num_rows(),
        "table schema created from sample"
    );

    // Streaming append: the scan declares the same types as the sample and is
    // only read as far as the next batch needs
    let chunks = source.scan(&columns)?;
    let chunk_schema = chunks.schema();
    let mut cursor =
        BatchCursor::new(chunks, chunk_schema, config.batch_size, Normalizer::new(config));

    let mut batches = 0;
    let mut rows = 0;
    state = LoadState::Streaming { batches };
    debug!(%state, batch_size = config.batch_size, "streaming source");

    loop {
        let t_start = Instant::now();
        let Some(batch) = cursor.next() else {
            break;
        };
        rows += writer.append_batch(table, batch?)?;
        batches += 1;
        state = LoadState::Streaming { batches };

        let took = t_start.elapsed();
        info!(
            %state,
            rows,
            "inserted another chunk, took {:.3} second",
            took.as_secs_f64()
        );
    }

    state = LoadState::Done;
    info!(%table, %state, batches, rows, "completed");

    Ok(LoadSummary {
        table: table.clone(),
        schema,
        batches,
        rows,
        elapsed: start.elapsed(),
    })
}
