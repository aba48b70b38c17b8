use duckdb::arrow::compute::concat_batches;
use duckdb::arrow::datatypes::SchemaRef;
use duckdb::arrow::record_batch::RecordBatch;

use crate::error::IngestError;
use crate::ingest::normalize::Normalizer;

/// One-directional reader over the scan result.
///
/// The upstream yields engine-sized chunks; the cursor pulls only as many as
/// the next batch needs, regroups them into batches of exactly `batch_size`
/// rows (the last may be shorter), normalizes each, and returns `None` once the
/// upstream is exhausted and nothing is buffered. An upstream error is yielded
/// once and ends the cursor. It cannot be rewound.
pub struct BatchCursor<I> {
    chunks: I,
    schema: SchemaRef,
    batch_size: usize,
    normalizer: Normalizer,
    pending: Vec<RecordBatch>,
    pending_rows: usize,
    exhausted: bool,
}

impl<I> BatchCursor<I>
where
    I: Iterator<Item = Result<RecordBatch, IngestError>>,
{
    pub fn new(chunks: I, schema: SchemaRef, batch_size: usize, normalizer: Normalizer) -> Self {
        Self {
            chunks,
            schema,
            batch_size: batch_size.max(1),
            normalizer,
            pending: Vec::new(),
            pending_rows: 0,
            exhausted: false,
        }
    }

    fn fill(&mut self) -> Result<(), IngestError> {
        while !self.exhausted && self.pending_rows < self.batch_size {
            match self.chunks.next() {
                Some(Ok(chunk)) if chunk.num_rows() == 0 => {}
                Some(Ok(chunk)) => {
                    self.pending_rows += chunk.num_rows();
                    self.pending.push(chunk);
                }
                Some(Err(e)) => {
                    // rows buffered ahead of the failure are never written
                    self.exhausted = true;
                    self.pending.clear();
                    self.pending_rows = 0;
                    return Err(e);
                }
                None => self.exhausted = true,
            }
        }
        Ok(())
    }

    // Split the buffered rows into the next batch and the carried-over remainder
    fn take_batch(&mut self) -> Result<RecordBatch, IngestError> {
        let take = self.pending_rows.min(self.batch_size);
        let buffered = if self.pending.len() == 1 {
            self.pending.remove(0)
        } else {
            let merged = concat_batches(&self.schema, &self.pending)?;
            self.pending.clear();
            merged
        };

        let rest = buffered.num_rows() - take;
        if rest > 0 {
            self.pending.push(buffered.slice(take, rest));
        }
        self.pending_rows = rest;
        Ok(buffered.slice(0, take))
    }
}

impl<I> Iterator for BatchCursor<I>
where
    I: Iterator<Item = Result<RecordBatch, IngestError>>,
{
    type Item = Result<RecordBatch, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Err(e) = self.fill() {
            return Some(Err(e));
        }
        if self.pending_rows == 0 {
            return None;
        }
        Some(
            self.take_batch()
                .and_then(|batch| self.normalizer.normalize(batch)),
        )
    }
}
