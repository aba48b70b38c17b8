pub mod cursor;
pub mod duckdb_writer;
pub mod loader;
pub mod normalize;
pub mod schema;
pub mod source;
pub mod table_writer;

use duckdb::Connection;
use tracing::info;

use crate::config::{IngestConfig, POSTGRES_ALIAS};
use crate::error::IngestError;
use crate::fetch::fetch_source;

pub use cursor::BatchCursor;
pub use duckdb_writer::DuckDbWriter;
pub use loader::{load, LoadState, LoadSummary};
pub use schema::TableRef;
pub use source::CsvSource;
pub use table_writer::TableWriter;

/// Fetch the source, attach the target Postgres database and load the table.
/// This is what the CLI and the Python binding call.
pub fn launch_ingest(config: &IngestConfig) -> Result<LoadSummary, IngestError> {
    let fetched = fetch_source(&config.url)?;
    info!(
        url = %config.url,
        compression = %fetched.compression(),
        "source ready"
    );

    // One in-memory engine: the writer and the reader each get their own connection to it
    let conn = Connection::open_in_memory()?;
    let mut writer = DuckDbWriter::attach_postgres(
        conn.try_clone()?,
        &config.postgres.conninfo(),
        POSTGRES_ALIAS,
    )
    .map_err(|e| match e {
        IngestError::Connect { source, .. } => IngestError::Connect {
            target: config.postgres.redacted(),
            source,
        },
        other => other,
    })?;
    let source = CsvSource::from_fetched(conn, &fetched);

    let table = TableRef::new(&config.table_name)
        .in_schema(&config.schema_name)
        .in_catalog(POSTGRES_ALIAS);

    let summary = load(&source, &mut writer, &table, &config.load)?;
    info!(
        table = %summary.table,
        rows = summary.rows,
        batches = summary.batches,
        elapsed = ?summary.elapsed,
        "ingest finished"
    );
    Ok(summary)
}
