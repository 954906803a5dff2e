//! CSV source backed by `arrow-csv`.

use std::sync::Arc;

use arrow::{
    array::RecordBatch,
    datatypes::{Schema, SchemaRef},
};
use arrow_csv::{reader::Format, ReaderBuilder};
use tracing::debug;

use super::{check_record, require, Location, RowCursor, Source, SourceInput};
use crate::{
    dataset::ArrowDataset,
    error::{Error, Result},
};

/// Number of leading records used for schema inference.
const INFER_RECORDS: usize = 1000;

/// Options for CSV parsing.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    /// Whether the CSV file has a header row.
    pub has_header: bool,
    /// Delimiter character (default is comma).
    pub delimiter: Option<u8>,
    /// Batch size for reading.
    pub batch_size: usize,
    /// Optional schema (inferred if not provided).
    pub schema: Option<Schema>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            has_header: true,
            delimiter: None,
            batch_size: 8192,
            schema: None,
        }
    }
}

impl CsvOptions {
    /// Creates new CSV options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the file has a header row.
    #[must_use]
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Sets the delimiter character.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    /// Sets the batch size for reading.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Sets the schema for parsing.
    #[must_use]
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// A source that reads comma-separated (or otherwise delimited) text.
///
/// Structure is inferred from the first records of the location unless a
/// schema is supplied through [`CsvOptions::with_schema`].
#[derive(Debug, Default)]
pub struct CsvSource {
    options: CsvOptions,
    location: Option<Location>,
    structure: Option<SchemaRef>,
    cursor: Option<RowCursor>,
}

impl CsvSource {
    /// Creates a CSV source with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a CSV source with the given options.
    pub fn with_options(options: CsvOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Returns the parsing options.
    pub fn options(&self) -> &CsvOptions {
        &self.options
    }

    fn infer(&self, location: &Location) -> Result<SchemaRef> {
        if let Some(schema) = &self.options.schema {
            return Ok(Arc::new(schema.clone()));
        }

        let mut format = Format::default().with_header(self.options.has_header);
        if let Some(delim) = self.options.delimiter {
            format = format.with_delimiter(delim);
        }

        let (inferred, records) = format
            .infer_schema(location.open()?, Some(INFER_RECORDS))
            .map_err(Error::Arrow)?;
        if inferred.fields().is_empty() {
            return Err(Error::EmptyDataset);
        }

        debug!(
            fields = inferred.fields().len(),
            records, "inferred CSV structure"
        );
        Ok(Arc::new(inferred))
    }

    fn open_batches(
        &self,
        location: &Location,
        schema: SchemaRef,
    ) -> Result<arrow_csv::Reader<Box<dyn std::io::BufRead + Send>>> {
        let mut builder = ReaderBuilder::new(schema)
            .with_batch_size(self.options.batch_size)
            .with_header(self.options.has_header);

        if let Some(delim) = self.options.delimiter {
            builder = builder.with_delimiter(delim);
        }

        builder.build(location.open()?).map_err(Error::Arrow)
    }
}

impl Source for CsvSource {
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

        let schema = self.infer(require(self.location.as_ref())?)?;
        self.structure = Some(Arc::clone(&schema));
        Ok(schema)
    }

    fn data_set(&mut self) -> Result<ArrowDataset> {
        let schema = self.structure()?;
        let reader = self.open_batches(require(self.location.as_ref())?, Arc::clone(&schema))?;

        let batches: Vec<RecordBatch> = reader
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::Arrow)?;

        ArrowDataset::with_schema(schema, batches)
    }

    fn next_record(&mut self, expected: &SchemaRef) -> Result<Option<RecordBatch>> {
        if self.cursor.is_none() {
            let schema = self.structure()?;
            let reader = self.open_batches(require(self.location.as_ref())?, schema)?;
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
        ".csv"
    }

    fn description(&self) -> &'static str {
        "CSV data files"
    }
}
