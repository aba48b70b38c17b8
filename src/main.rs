use anyhow::Context;
use bpaf::Bpaf;
use tracing::info;

use duckdb_postgres_ingest::config::{IngestConfig, LoadConfig, PostgresConfig};
use duckdb_postgres_ingest::{launch_ingest, telemetry};

/// Ingest CSV data to Postgres
#[derive(Debug, Clone, Bpaf)]
#[bpaf(options, version)]
struct Opts {
    /// user name for postgres
    #[bpaf(long, argument("USER"))]
    user: String,
    /// password for postgres
    #[bpaf(long, env("PGPASSWORD"), argument("PASSWORD"))]
    password: String,
    /// host for postgres
    #[bpaf(long, argument("HOST"))]
    host: String,
    /// port for postgres
    #[bpaf(long, argument("PORT"))]
    port: u16,
    /// database name for postgres
    #[bpaf(long, argument("DB"))]
    db: String,
    /// name of the table where we will write the results to
    #[bpaf(long("table_name"), argument("TABLE"))]
    table_name: String,
    /// postgres schema holding the table
    #[bpaf(long("schema"), argument("SCHEMA"), fallback("public".to_string()))]
    schema_name: String,
    /// url of the csv file
    #[bpaf(long, argument("URL"))]
    url: String,
}

impl From<Opts> for IngestConfig {
    fn from(opts: Opts) -> Self {
        IngestConfig {
            postgres: PostgresConfig {
                user: opts.user,
                password: opts.password,
                host: opts.host,
                port: opts.port,
                db: opts.db,
            },
            schema_name: opts.schema_name,
            table_name: opts.table_name,
            url: opts.url,
            load: LoadConfig::default(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let opts = opts().run();
    telemetry::init_tracing().context("installing tracing subscriber")?;

    let config = IngestConfig::from(opts);
    info!(postgres = %config.postgres.redacted(), table = %config.table_name, "starting ingest");

    let summary = launch_ingest(&config)
        .with_context(|| format!("ingesting '{}' into '{}'", config.url, config.table_name))?;

    info!(rows = summary.rows, batches = summary.batches, "done");
    Ok(())
}
