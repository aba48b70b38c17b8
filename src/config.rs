use std::fmt;

/// Rows read to infer the table schema
pub const DEFAULT_SAMPLE_ROWS: usize = 100;

/// Rows appended per batch
pub const DEFAULT_BATCH_SIZE: usize = 100_000;

/// Name of the column that records each row's position in the source
pub const DEFAULT_INDEX_COLUMN: &str = "index";

/// Columns parsed from raw strings into timestamps before every write
pub const DEFAULT_TIMESTAMP_COLUMNS: [&str; 2] = ["tpep_pickup_datetime", "tpep_dropoff_datetime"];

/// Alias under which the target Postgres database is attached to DuckDB
pub const POSTGRES_ALIAS: &str = "ingest_target";

// Credentials and endpoint of the target Postgres database
#[derive(Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub db: String,
}

impl PostgresConfig {
    // Build a libpq key/value connection string, every value quoted
    pub fn conninfo(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password={}",
            conninfo_value(&self.host),
            self.port,
            conninfo_value(&self.db),
            conninfo_value(&self.user),
            conninfo_value(&self.password),
        )
    }

    // Conninfo with the password masked, for logs and error messages
    pub fn redacted(&self) -> String {
        format!(
            "host={} port={} dbname={} user={}",
            self.host, self.port, self.db, self.user
        )
    }
}

// Keep the password out of debug output
impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("user", &self.user)
            .field("password", &"***")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db", &self.db)
            .finish()
    }
}

fn conninfo_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

/// Tuning for the chunked loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadConfig {
    /// Rows read for schema inference. None of them are written.
    pub sample_rows: usize,
    /// Maximum rows per appended batch.
    pub batch_size: usize,
    /// Columns normalized from strings to timestamps.
    pub timestamp_columns: Vec<String>,
    /// Leading row-ordinal column, or `None` to write source columns only.
    pub index_column: Option<String>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            sample_rows: DEFAULT_SAMPLE_ROWS,
            batch_size: DEFAULT_BATCH_SIZE,
            timestamp_columns: DEFAULT_TIMESTAMP_COLUMNS
                .iter()
                .map(|c| c.to_string())
                .collect(),
            index_column: Some(DEFAULT_INDEX_COLUMN.to_string()),
        }
    }
}

impl LoadConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_sample_rows(mut self, sample_rows: usize) -> Self {
        self.sample_rows = sample_rows;
        self
    }

    pub fn with_timestamp_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.timestamp_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_index_column(mut self, index_column: Option<&str>) -> Self {
        self.index_column = index_column.map(str::to_string);
        self
    }
}

// Everything a single end-to-end run needs
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub postgres: PostgresConfig,
    pub schema_name: String,
    pub table_name: String,
    pub url: String,
    pub load: LoadConfig,
}
