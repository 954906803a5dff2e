//! Parquet source backed by the `parquet` Arrow reader.

use std::sync::Arc;

use arrow::{array::RecordBatch, datatypes::SchemaRef};
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};

use super::{check_record, require, Location, RowCursor, Source, SourceInput};
use crate::{
    dataset::ArrowDataset,
    error::{Error, Result},
};

/// A source that reads Parquet files or in-memory Parquet bytes.
///
/// Structure comes from the file footer, so [`Source::structure`] never
/// decodes row groups.
#[derive(Debug)]
pub struct ParquetSource {
    batch_size: usize,
    location: Option<Location>,
    structure: Option<SchemaRef>,
    cursor: Option<RowCursor>,
}

impl Default for ParquetSource {
    fn default() -> Self {
        Self::new(8192)
    }
}

impl ParquetSource {
    /// Creates a Parquet source reading `batch_size` rows per decode step.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            location: None,
            structure: None,
            cursor: None,
        }
    }

    /// Opens a reader and returns it along with the file's Arrow schema.
    fn open_batches(&self, location: &Location) -> Result<(SchemaRef, ParquetRecordBatchReader)> {
        let (schema, reader) = match location {
            Location::File(path) => {
                let file = std::fs::File::open(path).map_err(|e| Error::io(e, path))?;
                let builder = ParquetRecordBatchReaderBuilder::try_new(file)
                    .map_err(Error::Parquet)?
                    .with_batch_size(self.batch_size);
                let schema = Arc::clone(builder.schema());
                (schema, builder.build())
            }
            Location::Bytes(bytes) => {
                let builder = ParquetRecordBatchReaderBuilder::try_new(bytes.clone())
                    .map_err(Error::Parquet)?
                    .with_batch_size(self.batch_size);
                let schema = Arc::clone(builder.schema());
                (schema, builder.build())
            }
        };

        Ok((schema, reader.map_err(Error::Parquet)?))
    }
}

impl Source for ParquetSource {
    fn set_source(&mut self, input: SourceInput) -> Result<()> {
        self.location = None;
        self.structure = None;
        self.cursor = None;
        self.location = Some(Location::resolve(input)?);
        Ok(())
    }

    fn structure(&mut self) -> Result<SchemaRef> {
        if let Some(schema) = &self.structure {
            return Ok(Arc::clone(schema));
        }

        let (schema, _) = self.open_batches(require(self.location.as_ref())?)?;
        self.structure = Some(Arc::clone(&schema));
        Ok(schema)
    }

    fn data_set(&mut self) -> Result<ArrowDataset> {
        let (schema, reader) = self.open_batches(require(self.location.as_ref())?)?;
        self.structure = Some(Arc::clone(&schema));

        let batches: Vec<RecordBatch> = reader
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::Arrow)?;

        ArrowDataset::with_schema(schema, batches)
    }

    fn next_record(&mut self, expected: &SchemaRef) -> Result<Option<RecordBatch>> {
        if self.cursor.is_none() {
            let (schema, reader) = self.open_batches(require(self.location.as_ref())?)?;
            self.structure = Some(schema);
            self.cursor = Some(RowCursor::new(Box::new(reader)));
        }

        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };
        let record = cursor.next_row()?;
        if let Some(record) = &record {
            check_record(expected, record)?;
        }
        Ok(record)
    }

    fn reset(&mut self) -> Result<()> {
        self.cursor = None;
        Ok(())
    }

    fn file_extension(&self) -> &'static str {
        ".parquet"
    }

    fn file_extensions(&self) -> Vec<&'static str> {
        vec![".parquet", ".pq"]
    }

    fn description(&self) -> &'static str {
        "Apache Parquet files"
    }
}
