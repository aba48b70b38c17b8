use duckdb::arrow::datatypes::Schema;
use duckdb::arrow::record_batch::RecordBatch;
use duckdb::Connection;
use tracing::{debug, info, warn};

use crate::error::IngestError;
use crate::ingest::schema::{column_definitions, quote_ident, quote_literal, TableRef};
use crate::ingest::table_writer::TableWriter;

/// Local table every batch passes through before reaching the target
pub const STAGING_TABLE: &str = "ingest_staging";

// The appender converts Arrow data one DuckDB vector at a time
const APPENDER_CHUNK_ROWS: usize = 2048;

/// Writes through a DuckDB connection, either into its own catalog or into an
/// attached Postgres database.
pub struct DuckDbWriter {
    conn: Connection,
    attached: Option<String>,
}

impl DuckDbWriter {
    // Write into the connection's own catalog
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            attached: None,
        }
    }

    // Attach the Postgres database under `alias` and write there
    pub fn attach_postgres(
        conn: Connection,
        conninfo: &str,
        alias: &str,
    ) -> Result<Self, IngestError> {
        let connect_error = |source| IngestError::Connect {
            target: alias.to_string(),
            source,
        };

        // Install and load required extensions
        conn.execute("INSTALL postgres;", []).map_err(connect_error)?;
        conn.execute("LOAD postgres;", []).map_err(connect_error)?;
        conn.execute(
            &format!(
                "ATTACH {} AS {} (TYPE POSTGRES);",
                quote_literal(conninfo),
                quote_ident(alias)
            ),
            [],
        )
        .map_err(connect_error)?;
        info!(alias, "attached postgres database");

        Ok(Self {
            conn,
            attached: Some(alias.to_string()),
        })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn attached(&self) -> Option<&str> {
        self.attached.as_deref()
    }

    // Push the batch into the staging table, one appender chunk at a time
    fn stage(&self, batch: &RecordBatch) -> Result<(), IngestError> {
        let mut appender = self.conn.appender(STAGING_TABLE)?;
        let mut offset = 0;
        while offset < batch.num_rows() {
            let len = APPENDER_CHUNK_ROWS.min(batch.num_rows() - offset);
            appender.append_record_batch(batch.slice(offset, len))?;
            offset += len;
        }
        appender.flush()?;
        Ok(())
    }
}

impl TableWriter for DuckDbWriter {
    fn create_table(&mut self, table: &TableRef, schema: &Schema) -> Result<(), IngestError> {
        let columns = column_definitions(schema)?;
        let target = table.qualified();

        if let Some(schema) = table.qualified_schema() {
            self.conn
                .execute(&format!("CREATE SCHEMA IF NOT EXISTS {};", schema), [])?;
        }
        self.conn
            .execute(&format!("DROP TABLE IF EXISTS {};", target), [])?;
        self.conn
            .execute(&format!("CREATE TABLE {} ({});", target, columns), [])?;
        self.conn.execute(
            &format!(
                "CREATE OR REPLACE TABLE {} ({});",
                quote_ident(STAGING_TABLE),
                columns
            ),
            [],
        )?;

        info!(table = %target, columns = schema.fields().len(), "created table");
        Ok(())
    }

    fn append_batch(&mut self, table: &TableRef, batch: RecordBatch) -> Result<usize, IngestError> {
        let rows = batch.num_rows();
        if rows == 0 {
            return Ok(0);
        }

        self.stage(&batch)?;
        let staging = quote_ident(STAGING_TABLE);
        let inserted = self.conn.execute(
            &format!("INSERT INTO {} SELECT * FROM {};", table.qualified(), staging),
            [],
        )?;
        self.conn.execute(&format!("DELETE FROM {};", staging), [])?;

        debug!(table = %table, rows = inserted, "appended batch");
        Ok(inserted)
    }
}

// Release the attached database on every exit path
impl Drop for DuckDbWriter {
    fn drop(&mut self) {
        let _ = self
            .conn
            .execute(&format!("DROP TABLE IF EXISTS {};", quote_ident(STAGING_TABLE)), []);
        if let Some(alias) = self.attached.take() {
            match self
                .conn
                .execute(&format!("DETACH {};", quote_ident(&alias)), [])
            {
                Ok(_) => debug!(alias = %alias, "detached postgres database"),
                Err(e) => warn!(alias = %alias, error = %e, "failed to detach postgres database"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duckdb::arrow::array::{Int64Array, StringArray, TimestampMicrosecondArray};
    use duckdb::arrow::datatypes::{DataType, Field, TimeUnit};
    use std::sync::Arc;

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("index", DataType::Int64, false),
            Field::new(
                "tpep_pickup_datetime",
                DataType::Timestamp(TimeUnit::Microsecond, None),
                true,
            ),
            Field::new("store_and_fwd_flag", DataType::Utf8, true),
        ]))
    }

    fn batch(start: i64, rows: usize) -> RecordBatch {
        let end = start + rows as i64;
        RecordBatch::try_new(
            schema(),
            vec![
                Arc::new(Int64Array::from_iter_values(start..end)),
                Arc::new(TimestampMicrosecondArray::from_iter_values(
                    (start..end).map(|i| 1_609_459_200_000_000 + i * 1_000_000),
                )),
                Arc::new(StringArray::from_iter_values((start..end).map(|_| "N"))),
            ],
        )
        .unwrap()
    }

    fn count(writer: &DuckDbWriter, table: &str) -> i64 {
        writer
            .conn()
            .query_row(&format!("SELECT count(*) FROM {}", table), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn create_then_append() {
        let mut writer = DuckDbWriter::new(Connection::open_in_memory().unwrap());
        let table = TableRef::new("yellow_taxi_data");

        writer.create_table(&table, &schema()).unwrap();
        assert_eq!(count(&writer, "yellow_taxi_data"), 0);

        assert_eq!(writer.append_batch(&table, batch(0, 5000)).unwrap(), 5000);
        assert_eq!(writer.append_batch(&table, batch(5000, 10)).unwrap(), 10);
        assert_eq!(count(&writer, "yellow_taxi_data"), 5010);
        assert_eq!(count(&writer, STAGING_TABLE), 0);
    }

    #[test]
    fn timestamp_column_is_declared_timestamp() {
        let mut writer = DuckDbWriter::new(Connection::open_in_memory().unwrap());
        let table = TableRef::new("trips");
        writer.create_table(&table, &schema()).unwrap();

        let column_type: String = writer
            .conn()
            .query_row(
                "SELECT data_type FROM information_schema.columns \
                 WHERE table_name = 'trips' AND column_name = 'tpep_pickup_datetime'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(column_type, "TIMESTAMP");
    }

    #[test]
    fn create_replaces_existing_table() {
        let mut writer = DuckDbWriter::new(Connection::open_in_memory().unwrap());
        writer
            .conn()
            .execute_batch("CREATE TABLE trips (legacy BOOLEAN); INSERT INTO trips VALUES (true);")
            .unwrap();

        let table = TableRef::new("trips");
        writer.create_table(&table, &schema()).unwrap();
        assert_eq!(count(&writer, "trips"), 0);

        writer.append_batch(&table, batch(0, 3)).unwrap();
        assert_eq!(count(&writer, "trips"), 3);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let mut writer = DuckDbWriter::new(Connection::open_in_memory().unwrap());
        let table = TableRef::new("trips");
        writer.create_table(&table, &schema()).unwrap();
        assert_eq!(writer.append_batch(&table, batch(0, 0)).unwrap(), 0);
    }

    #[test]
    fn creates_missing_schema() {
        let mut writer = DuckDbWriter::new(Connection::open_in_memory().unwrap());
        let table = TableRef::new("trips").in_schema("taxi");

        writer.create_table(&table, &schema()).unwrap();
        writer.append_batch(&table, batch(0, 4)).unwrap();
        assert_eq!(count(&writer, "taxi.trips"), 4);

        // a second run finds the schema already there
        writer.create_table(&table, &schema()).unwrap();
        assert_eq!(count(&writer, "taxi.trips"), 0);
    }

    #[test]
    fn writes_into_named_schema() {
        let mut writer = DuckDbWriter::new(Connection::open_in_memory().unwrap());
        writer.conn().execute("CREATE SCHEMA staging_area;", []).unwrap();
        let table = TableRef::new("trips").in_schema("staging_area");

        writer.create_table(&table, &schema()).unwrap();
        writer.append_batch(&table, batch(0, 7)).unwrap();
        assert_eq!(count(&writer, "staging_area.trips"), 7);
    }
}
