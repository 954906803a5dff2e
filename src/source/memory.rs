//! In-memory source over pre-built record batches.

use arrow::{array::RecordBatch, datatypes::SchemaRef, error::ArrowError};

use super::{check_record, RowCursor, Source, SourceInput};
use crate::{
    dataset::ArrowDataset,
    error::{Error, Result},
};

/// A source backed by in-memory RecordBatches.
///
/// Useful for testing or when records are already in memory but should go
/// through a filtered loader. The batches are the location; there is nothing
/// to point the source at, so [`Source::set_source`] is unsupported.
#[derive(Debug)]
pub struct MemorySource {
    data: ArrowDataset,
    cursor: Option<RowCursor>,
    incremental: bool,
}

impl MemorySource {
    /// Creates a memory source from a non-empty vector of batches.
    ///
    /// # Errors
    ///
    /// Returns an error if the batches vector is empty or the schemas differ.
    pub fn new(batches: Vec<RecordBatch>) -> Result<Self> {
        Ok(Self::from_dataset(ArrowDataset::new(batches)?))
    }

    /// Creates a memory source from an existing dataset, which may be empty.
    pub fn from_dataset(data: ArrowDataset) -> Self {
        Self {
            data,
            cursor: None,
            incremental: true,
        }
    }

    /// Disables incremental reads, making this a batch-only source.
    #[must_use]
    pub fn batch_only(mut self) -> Self {
        self.incremental = false;
        self
    }
}

impl Source for MemorySource {
    fn set_source(&mut self, input: SourceInput) -> Result<()> {
        Err(Error::unsupported(format!(
            "in-memory source cannot be pointed at {:?}",
            input
        )))
    }

    fn structure(&mut self) -> Result<SchemaRef> {
        Ok(self.data.schema())
    }

    fn data_set(&mut self) -> Result<ArrowDataset> {
        Ok(self.data.clone())
    }

    fn next_record(&mut self, expected: &SchemaRef) -> Result<Option<RecordBatch>> {
        if !self.incremental {
            return Err(Error::unsupported(
                "batch-only in-memory source cannot read records incrementally",
            ));
        }

        let cursor = self.cursor.get_or_insert_with(|| {
            let batches: Vec<_> = self.data.batches().iter().cloned().map(Ok::<_, ArrowError>).collect();
            RowCursor::new(Box::new(batches.into_iter()))
        });

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
        ""
    }

    fn file_extensions(&self) -> Vec<&'static str> {
        Vec::new()
    }

    fn description(&self) -> &'static str {
        "In-memory record batches"
    }
}

impl From<ArrowDataset> for MemorySource {
    fn from(data: ArrowDataset) -> Self {
        Self::from_dataset(data)
    }
}

impl Clone for MemorySource {
    /// Clones the records; the copy starts reading from the beginning.
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            cursor: None,
            incremental: self.incremental,
        }
    }
}
