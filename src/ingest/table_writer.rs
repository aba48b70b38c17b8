use duckdb::arrow::datatypes::Schema;
use duckdb::arrow::record_batch::RecordBatch;

use crate::error::IngestError;
use crate::ingest::schema::TableRef;

/// Destination for the chunked loader.
/// We could add writers for other stores here, the loader only needs these two calls.
pub trait TableWriter {
    /// Drop any existing table of the same name and create it with `schema`, writing no rows
    fn create_table(&mut self, table: &TableRef, schema: &Schema) -> Result<(), IngestError>;

    /// Append every row of `batch`, returning the number of rows written
    fn append_batch(&mut self, table: &TableRef, batch: RecordBatch) -> Result<usize, IngestError>;
}

impl<W: TableWriter + ?Sized> TableWriter for &mut W {
    fn create_table(&mut self, table: &TableRef, schema: &Schema) -> Result<(), IngestError> {
        (**self).create_table(table, schema)
    }

    fn append_batch(&mut self, table: &TableRef, batch: RecordBatch) -> Result<usize, IngestError> {
        (**self).append_batch(table, batch)
    }
}
