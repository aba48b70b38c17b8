use pyo3::prelude::*;

use crate::config::{IngestConfig, LoadConfig, PostgresConfig};

#[pyfunction]
#[pyo3(signature = (user, password, host, port, db, table_name, url, schema_name = "public"))]
#[allow(clippy::too_many_arguments)]
fn ingest_csv(
    user: &str,
    password: &str,
    host: &str,
    port: u16,
    db: &str,
    table_name: &str,
    url: &str,
    schema_name: &str,
) -> PyResult<usize> {
    let config = IngestConfig {
        postgres: PostgresConfig {
            user: user.to_string(),
            password: password.to_string(),
            host: host.to_string(),
            port,
            db: db.to_string(),
        },
        schema_name: schema_name.to_string(),
        table_name: table_name.to_string(),
        url: url.to_string(),
        load: LoadConfig::default(),
    };

    let summary = crate::ingest::launch_ingest(&config)
        .map_err(|e| PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(e.to_string()))?;
    Ok(summary.rows)
}

#[pymodule]
#[pyo3(name = "duckdb_postgres_ingest")]
fn duckdb_postgres_ingest(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(ingest_csv, m)?)?;
    Ok(())
}
