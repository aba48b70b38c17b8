use duckdb::arrow::compute::concat_batches;
use duckdb::arrow::datatypes::SchemaRef;
use duckdb::arrow::record_batch::RecordBatch;
use duckdb::{Connection, Statement};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::IngestError;
use crate::fetch::{Compression, FetchedSource};
use crate::ingest::schema::{quote_literal, ColumnDecl};

/// CSV file read through DuckDB's `read_csv`.
pub struct CsvSource {
    conn: Connection,
    path: PathBuf,
    compression: Compression,
}

impl CsvSource {
    pub fn new(conn: Connection, path: &Path, compression: Compression) -> Self {
        Self {
            conn,
            path: path.to_path_buf(),
            compression,
        }
    }

    pub fn from_fetched(conn: Connection, fetched: &FetchedSource) -> Self {
        Self::new(conn, fetched.path(), fetched.compression())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_csv(&self, options: &str) -> String {
        format!(
            "read_csv({}, header = true, compression = '{}'{})",
            quote_literal(&self.path.to_string_lossy()),
            self.compression,
            options
        )
    }

    // Let DuckDB sniff names and types from the first `rows` rows, without reading any data
    pub fn describe(&self, rows: usize) -> Result<Vec<ColumnDecl>, IngestError> {
        let query = format!(
            "DESCRIBE SELECT * FROM {};",
            self.read_csv(&format!(", sample_size = {}", rows))
        );
        debug!(%query, "sniffing source columns");

        // Nothing to sniff a header from
        if std::fs::metadata(&self.path)?.len() == 0 {
            return Err(IngestError::EmptySource);
        }

        let mut stmt = self.conn.prepare(&query)?;
        let columns: Vec<ColumnDecl> = stmt
            .query_map([], |row| {
                Ok(ColumnDecl {
                    name: row.get(0)?,
                    sql_type: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if !has_header(&columns) {
            return Err(IngestError::EmptySource);
        }
        Ok(columns)
    }

    // Read the first `rows` rows with the declared column types
    pub fn sample(&self, columns: &str, rows: usize) -> Result<RecordBatch, IngestError> {
        let query = format!(
            "SELECT * FROM {} LIMIT {};",
            self.read_csv(&format!(", columns = {}", columns)),
            rows
        );
        debug!(%query, "reading schema sample");

        let chunks = self.stream(&query)?;
        let schema = chunks.schema();
        let chunks = chunks.collect::<Result<Vec<_>, _>>()?;
        Ok(concat_batches(&schema, &chunks)?)
    }

    // Prepare a full scan with every column's type fixed up front.
    // `columns` is a read_csv struct literal, see `schema::read_csv_columns`
    pub fn scan(&self, columns: &str) -> Result<ScanChunks<'_>, IngestError> {
        let query = format!(
            "SELECT * FROM {};",
            self.read_csv(&format!(", columns = {}", columns))
        );
        debug!(%query, "starting source scan");
        self.stream(&query)
    }

    // Execute `query` as a streaming result, nothing is fetched yet
    fn stream(&self, query: &str) -> Result<ScanChunks<'_>, IngestError> {
        let mut stmt = self.conn.prepare(query)?;
        let schema = stmt.stream_arrow([])?.get_schema();
        Ok(ScanChunks {
            stmt,
            schema,
            done: false,
        })
    }
}

// A lone `column0` is DuckDB's name for the first column of a file without a header
fn has_header(columns: &[ColumnDecl]) -> bool {
    match columns {
        [] => false,
        [only] => only.name != "column0",
        _ => true,
    }
}

/// Chunks of a streaming query, fetched from the engine one at a time.
///
/// Unlike the duckdb `Arrow` iterator this yields fetch errors instead of
/// panicking. After the first error or the end of the result it yields nothing.
pub struct ScanChunks<'conn> {
    stmt: Statement<'conn>,
    schema: SchemaRef,
    done: bool,
}

impl ScanChunks<'_> {
    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}

impl Iterator for ScanChunks<'_> {
    type Item = Result<RecordBatch, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.stmt.step() {
            Ok(Some(array)) => Some(Ok(RecordBatch::from(&array))),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e.into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duckdb::arrow::array::{Array, Int64Array};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn source(file: &NamedTempFile) -> CsvSource {
        CsvSource::new(
            Connection::open_in_memory().unwrap(),
            file.path(),
            Compression::None,
        )
    }

    fn csv(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn header_detection() {
        assert!(!has_header(&[]));
        assert!(!has_header(&[ColumnDecl::new("column0", "VARCHAR")]));
        assert!(has_header(&[ColumnDecl::new("VendorID", "BIGINT")]));
        assert!(has_header(&[
            ColumnDecl::new("column0", "VARCHAR"),
            ColumnDecl::new("column1", "VARCHAR"),
        ]));
    }

    #[test]
    fn zero_byte_source_is_empty() {
        let file = csv("");
        let err = source(&file).describe(100).unwrap_err();
        assert!(matches!(err, IngestError::EmptySource));
    }

    #[test]
    fn describe_reads_header_names() {
        let file = csv("VendorID,tpep_pickup_datetime\n1,2021-01-01 00:30:10\n");
        let names: Vec<String> = source(&file)
            .describe(100)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["VendorID", "tpep_pickup_datetime"]);
    }

    fn id_csv(rows: usize, tail: &str) -> NamedTempFile {
        let mut contents = String::from("id\n");
        for i in 0..rows {
            contents.push_str(&format!("{}\n", i));
        }
        contents.push_str(tail);
        csv(&contents)
    }

    #[test]
    fn scan_yields_every_row_in_order() {
        let file = id_csv(5000, "");
        let source = source(&file);
        let chunks = source.scan("{'id': 'BIGINT'}").unwrap();
        assert_eq!(chunks.schema().field(0).name(), "id");

        let mut next = 0i64;
        for chunk in chunks {
            let chunk = chunk.unwrap();
            let ids = chunk
                .column(0)
                .as_any()
                .downcast_ref::<Int64Array>()
                .unwrap();
            for id in ids.values() {
                assert_eq!(*id, next);
                next += 1;
            }
        }
        assert_eq!(next, 5000);
    }

    #[test]
    fn scan_reports_values_that_break_the_declared_type() {
        let file = id_csv(5000, "oops\n");
        let source = source(&file);

        // the engine may fail while starting the scan or while fetching a chunk
        let error = match source.scan("{'id': 'BIGINT'}") {
            Err(e) => e,
            Ok(mut chunks) => {
                let error = chunks
                    .by_ref()
                    .find_map(Result::err)
                    .expect("scan should fail on 'oops'");
                assert!(chunks.next().is_none());
                error
            }
        };
        assert!(matches!(error, IngestError::Database(_)));
    }
}
