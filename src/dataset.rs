//! Dataset container for filtered and unfiltered records.
//!
//! [`ArrowDataset`] is the "whole collection" shape passed between sources,
//! transforms and callers in batch mode. Unlike a plain `Vec<RecordBatch>` it
//! always carries a schema, so a dataset with zero rows still describes its
//! structure.

use std::{io::Write, sync::Arc};

use arrow::{array::RecordBatch, compute::concat_batches, datatypes::SchemaRef};

use crate::error::{Error, Result};

/// An in-memory dataset backed by Arrow RecordBatches sharing one schema.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use arrow::{
///     array::{Int32Array, RecordBatch},
///     datatypes::{DataType, Field, Schema},
/// };
/// use tamiz::ArrowDataset;
///
/// let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int32, false)]));
/// let batch = RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(vec![1, 2, 3]))])?;
/// let dataset = ArrowDataset::from_batch(batch)?;
/// assert_eq!(dataset.len(), 3);
/// # Ok::<(), tamiz::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ArrowDataset {
    batches: Vec<RecordBatch>,
    schema: SchemaRef,
    row_count: usize,
}

impl ArrowDataset {
    /// Creates a new ArrowDataset from a non-empty vector of RecordBatches.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The batches vector is empty
    /// - The batches have inconsistent schemas
    pub fn new(batches: Vec<RecordBatch>) -> Result<Self> {
        let schema = batches.first().ok_or(Error::EmptyDataset)?.schema();
        Self::with_schema(schema, batches)
    }

    /// Creates a dataset with an explicit schema. `batches` may be empty.
    ///
    /// # Errors
    ///
    /// Returns an error if any batch does not match `schema`.
    pub fn with_schema(schema: SchemaRef, batches: Vec<RecordBatch>) -> Result<Self> {
        for (i, batch) in batches.iter().enumerate() {
            if batch.schema().fields() != schema.fields() {
                return Err(Error::schema_mismatch(format!(
                    "Batch {} has different schema than the dataset",
                    i
                )));
            }
        }

        let row_count = batches.iter().map(RecordBatch::num_rows).sum();

        Ok(Self {
            batches,
            schema,
            row_count,
        })
    }

    /// Creates an ArrowDataset from a single RecordBatch.
    ///
    /// # Errors
    ///
    /// Infallible in practice; kept fallible to match [`ArrowDataset::new`].
    pub fn from_batch(batch: RecordBatch) -> Result<Self> {
        Self::new(vec![batch])
    }

    /// Returns the total number of rows in the dataset.
    pub fn len(&self) -> usize {
        self.row_count
    }

    /// Returns true if the dataset contains no rows.
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Returns the schema of the dataset.
    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    /// Returns the number of batches in the dataset.
    pub fn num_batches(&self) -> usize {
        self.batches.len()
    }

    /// Returns the underlying batches.
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Concatenates every batch into a single RecordBatch.
    ///
    /// # Errors
    ///
    /// Returns an error if Arrow fails to concatenate the columns.
    pub fn concat(&self) -> Result<RecordBatch> {
        concat_batches(&self.schema, &self.batches).map_err(Error::Arrow)
    }

    /// Writes the dataset as CSV with a header row.
    ///
    /// A dataset without records still writes the header.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = arrow_csv::WriterBuilder::new()
            .with_header(true)
            .build(writer);

        if self.batches.is_empty() {
            writer
                .write(&RecordBatch::new_empty(self.schema()))
                .map_err(Error::Arrow)?;
        }
        for batch in &self.batches {
            writer.write(batch).map_err(Error::Arrow)?;
        }

        Ok(())
    }

    /// Writes the dataset as JSON Lines, one object per row.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_json<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = arrow_json::LineDelimitedWriter::new(writer);

        for batch in &self.batches {
            writer.write(batch).map_err(Error::Arrow)?;
        }

        writer.finish().map_err(Error::Arrow)
    }
}
