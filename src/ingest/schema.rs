use duckdb::arrow::datatypes::{DataType, Schema, TimeUnit};
use std::fmt;

use crate::error::IngestError;

/// A possibly catalog- and schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub name: String,
}

impl TableRef {
    pub fn new(name: &str) -> Self {
        Self {
            catalog: None,
            schema: None,
            name: name.trim().to_string(),
        }
    }

    pub fn in_schema(mut self, schema: &str) -> Self {
        self.schema = Some(schema.to_string());
        self
    }

    pub fn in_catalog(mut self, catalog: &str) -> Self {
        self.catalog = Some(catalog.to_string());
        self
    }

    // Get the fully qualified, quoted table name
    pub fn qualified(&self) -> String {
        self.catalog
            .iter()
            .chain(self.schema.iter())
            .chain(std::iter::once(&self.name))
            .map(|part| quote_ident(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    // Quoted name of the schema holding the table, if one is set
    pub fn qualified_schema(&self) -> Option<String> {
        let schema = self.schema.as_ref()?;
        Some(
            self.catalog
                .iter()
                .chain(std::iter::once(schema))
                .map(|part| quote_ident(part))
                .collect::<Vec<_>>()
                .join("."),
        )
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified())
    }
}

pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

// Map an Arrow type onto the SQL type used for the table column
pub fn sql_type(data_type: &DataType) -> Option<String> {
    let sql = match data_type {
        DataType::Boolean => "BOOLEAN".to_string(),
        DataType::Int8 => "TINYINT".to_string(),
        DataType::Int16 => "SMALLINT".to_string(),
        DataType::Int32 => "INTEGER".to_string(),
        DataType::Int64 => "BIGINT".to_string(),
        DataType::UInt8 => "UTINYINT".to_string(),
        DataType::UInt16 => "USMALLINT".to_string(),
        DataType::UInt32 => "UINTEGER".to_string(),
        DataType::UInt64 => "UBIGINT".to_string(),
        DataType::Float32 => "FLOAT".to_string(),
        DataType::Float64 => "DOUBLE".to_string(),
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => "VARCHAR".to_string(),
        DataType::Binary | DataType::LargeBinary => "BLOB".to_string(),
        DataType::Date32 | DataType::Date64 => "DATE".to_string(),
        DataType::Time64(TimeUnit::Microsecond) => "TIME".to_string(),
        DataType::Timestamp(_, None) => "TIMESTAMP".to_string(),
        DataType::Timestamp(_, Some(_)) => "TIMESTAMPTZ".to_string(),
        DataType::Decimal128(precision, scale) => format!("DECIMAL({}, {})", precision, scale),
        _ => return None,
    };
    Some(sql)
}

fn column_sql_type(name: &str, data_type: &DataType) -> Result<String, IngestError> {
    sql_type(data_type).ok_or_else(|| IngestError::UnsupportedType {
        column: name.to_string(),
        data_type: data_type.clone(),
    })
}

// Column list for CREATE TABLE, e.g. `"id" BIGINT, "name" VARCHAR`
pub fn column_definitions(schema: &Schema) -> Result<String, IngestError> {
    let columns = schema
        .fields()
        .iter()
        .map(|field| {
            column_sql_type(field.name(), field.data_type())
                .map(|sql| format!("{} {}", quote_ident(field.name()), sql))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns.join(", "))
}

/// A source column as sniffed by DuckDB, with its DuckDB type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDecl {
    pub name: String,
    pub sql_type: String,
}

impl ColumnDecl {
    pub fn new(name: &str, sql_type: &str) -> Self {
        Self {
            name: name.to_string(),
            sql_type: sql_type.to_string(),
        }
    }
}

// Struct literal for read_csv's `columns` option.
// Columns listed in `raw_columns` are declared VARCHAR so their text reaches us untouched.
pub fn read_csv_columns(columns: &[ColumnDecl], raw_columns: &[String]) -> String {
    let columns = columns
        .iter()
        .map(|column| {
            let sql = if raw_columns.iter().any(|c| *c == column.name) {
                "VARCHAR"
            } else {
                column.sql_type.as_str()
            };
            format!("{}: {}", quote_literal(&column.name), quote_literal(sql))
        })
        .collect::<Vec<_>>();
    format!("{{{}}}", columns.join(", "))
}
