use duckdb::arrow::array::{Array, ArrayRef, Int64Array};
use duckdb::arrow::compute::{cast_with_options, CastOptions};
use duckdb::arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use duckdb::arrow::error::ArrowError;
use duckdb::arrow::record_batch::RecordBatch;
use std::sync::Arc;

use crate::config::LoadConfig;
use crate::error::IngestError;

/// Type every timestamp column is written as
pub const TIMESTAMP_TYPE: DataType = DataType::Timestamp(TimeUnit::Microsecond, None);

/// Applies the per-batch transformations in source order.
/// Owns the running row ordinal so the index column continues across batches.
#[derive(Debug, Clone)]
pub struct Normalizer {
    timestamp_columns: Vec<String>,
    index_column: Option<String>,
    next_index: i64,
}

impl Normalizer {
    pub fn new(config: &LoadConfig) -> Self {
        Self {
            timestamp_columns: config.timestamp_columns.clone(),
            index_column: config.index_column.clone(),
            next_index: 0,
        }
    }

    pub fn timestamp_columns(&self) -> &[String] {
        &self.timestamp_columns
    }

    pub fn next_index(&self) -> i64 {
        self.next_index
    }

    pub fn normalize(&mut self, batch: RecordBatch) -> Result<RecordBatch, IngestError> {
        let batch = normalize_timestamps(&batch, &self.timestamp_columns)?;
        match &self.index_column {
            Some(name) => {
                let stamped = with_row_index(&batch, name, self.next_index)?;
                self.next_index += batch.num_rows() as i64;
                Ok(stamped)
            }
            None => Ok(batch),
        }
    }
}

// Replace each named column with its timestamp-typed equivalent
pub fn normalize_timestamps(
    batch: &RecordBatch,
    columns: &[String],
) -> Result<RecordBatch, IngestError> {
    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let mut arrays: Vec<ArrayRef> = batch.columns().to_vec();

    for column in columns {
        let idx = schema
            .index_of(column)
            .map_err(|_| IngestError::MissingColumn {
                column: column.clone(),
            })?;
        arrays[idx] = to_timestamp(column, &arrays[idx])?;
        fields[idx] = fields[idx].clone().with_data_type(TIMESTAMP_TYPE);
    }

    let schema = Schema::new_with_metadata(fields, schema.metadata().clone());
    Ok(RecordBatch::try_new(Arc::new(schema), arrays)?)
}

// Strict cast: a value that does not parse fails the whole batch
fn to_timestamp(column: &str, array: &ArrayRef) -> Result<ArrayRef, IngestError> {
    match array.data_type() {
        DataType::Utf8
        | DataType::LargeUtf8
        | DataType::Utf8View
        | DataType::Null
        | DataType::Date32
        | DataType::Date64
        | DataType::Timestamp(_, _) => {
            let options = CastOptions {
                safe: false,
                ..Default::default()
            };
            cast_with_options(array, &TIMESTAMP_TYPE, &options).map_err(|source| {
                IngestError::Timestamp {
                    column: column.to_string(),
                    source,
                }
            })
        }
        other => Err(IngestError::Timestamp {
            column: column.to_string(),
            source: ArrowError::CastError(format!("{} values cannot be read as timestamps", other)),
        }),
    }
}

// Prepend an Int64 column holding each row's position in the source
pub fn with_row_index(
    batch: &RecordBatch,
    name: &str,
    start: i64,
) -> Result<RecordBatch, IngestError> {
    let schema = batch.schema();
    if schema.index_of(name).is_ok() {
        return Err(IngestError::InvalidConfig(format!(
            "index column '{}' collides with a source column",
            name
        )));
    }

    let end = start + batch.num_rows() as i64;
    let index: ArrayRef = Arc::new(Int64Array::from_iter_values(start..end));

    let mut fields = vec![Field::new(name, DataType::Int64, false)];
    fields.extend(schema.fields().iter().map(|f| f.as_ref().clone()));
    let mut arrays = vec![index];
    arrays.extend(batch.columns().iter().cloned());

    let schema = Schema::new_with_metadata(fields, schema.metadata().clone());
    Ok(RecordBatch::try_new(Arc::new(schema), arrays)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use duckdb::arrow::array::{StringArray, TimestampMicrosecondArray, TimestampSecondArray};

    fn raw_batch(pickups: Vec<Option<&str>>) -> RecordBatch {
        let n = pickups.len() as i64;
        let schema = Schema::new(vec![
            Field::new("VendorID", DataType::Int64, true),
            Field::new("tpep_pickup_datetime", DataType::Utf8, true),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(Int64Array::from_iter_values(0..n)),
                Arc::new(StringArray::from(pickups)),
            ],
        )
        .unwrap()
    }

    fn pickup_only() -> Vec<String> {
        vec!["tpep_pickup_datetime".to_string()]
    }

    #[test]
    fn strings_become_microsecond_timestamps() {
        let batch = raw_batch(vec![Some("2021-01-01 00:30:10"), None]);
        let out = normalize_timestamps(&batch, &pickup_only()).unwrap();

        let field = out.schema().field(1).clone();
        assert_eq!(field.data_type(), &TIMESTAMP_TYPE);

        let values = out
            .column(1)
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .unwrap();
        assert_eq!(values.value(0), 1_609_461_010_000_000);
        assert!(values.is_null(1));
    }

    #[test]
    fn existing_timestamps_are_rescaled() {
        let schema = Schema::new(vec![Field::new(
            "tpep_pickup_datetime",
            DataType::Timestamp(TimeUnit::Second, None),
            true,
        )]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(TimestampSecondArray::from(vec![1_609_461_010]))],
        )
        .unwrap();

        let out = normalize_timestamps(&batch, &pickup_only()).unwrap();
        let values = out
            .column(0)
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .unwrap();
        assert_eq!(values.value(0), 1_609_461_010_000_000);
    }

    #[test]
    fn malformed_timestamp_fails_the_batch() {
        let batch = raw_batch(vec![Some("2021-01-01 00:30:10"), Some("not a time")]);
        let err = normalize_timestamps(&batch, &pickup_only()).unwrap_err();
        assert!(
            matches!(err, IngestError::Timestamp { ref column, .. } if column == "tpep_pickup_datetime")
        );
    }

    #[test]
    fn numeric_column_is_not_a_timestamp() {
        let batch = raw_batch(vec![Some("2021-01-01 00:30:10")]);
        let err = normalize_timestamps(&batch, &["VendorID".to_string()]).unwrap_err();
        assert!(matches!(err, IngestError::Timestamp { .. }));
    }

    #[test]
    fn missing_timestamp_column_is_reported() {
        let batch = raw_batch(vec![Some("2021-01-01 00:30:10")]);
        let err = normalize_timestamps(&batch, &["tpep_dropoff_datetime".to_string()]).unwrap_err();
        assert!(
            matches!(err, IngestError::MissingColumn { ref column } if column == "tpep_dropoff_datetime")
        );
    }

    #[test]
    fn index_continues_across_batches() {
        let config = LoadConfig::default().with_timestamp_columns(pickup_only());
        let mut normalizer = Normalizer::new(&config);

        let first = normalizer
            .normalize(raw_batch(vec![Some("2021-01-01 00:00:00"); 3]))
            .unwrap();
        let second = normalizer
            .normalize(raw_batch(vec![Some("2021-01-01 00:00:00"); 2]))
            .unwrap();

        assert_eq!(first.schema().field(0).name(), "index");
        let index = second
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(index.values().to_vec(), vec![3, 4]);
        assert_eq!(normalizer.next_index(), 5);
    }

    #[test]
    fn index_column_can_be_disabled() {
        let config = LoadConfig::default()
            .with_timestamp_columns(pickup_only())
            .with_index_column(None);
        let mut normalizer = Normalizer::new(&config);
        let out = normalizer
            .normalize(raw_batch(vec![Some("2021-01-01 00:00:00")]))
            .unwrap();
        assert_eq!(out.num_columns(), 2);
        assert_eq!(out.schema().field(0).name(), "VendorID");
    }

    #[test]
    fn index_name_collision_is_rejected() {
        let batch = raw_batch(vec![Some("2021-01-01 00:00:00")]);
        let err = with_row_index(&batch, "VendorID", 0).unwrap_err();
        assert!(matches!(err, IngestError::InvalidConfig(_)));
    }
}
