//! JSON Lines source backed by `arrow-json`.

use std::sync::Arc;

use arrow::{
    array::RecordBatch,
    datatypes::{Schema, SchemaRef},
};
use arrow_json::ReaderBuilder;
use tracing::debug;

use super::{check_record, require, Location, RowCursor, Source, SourceInput};
use crate::{
    dataset::ArrowDataset,
    error::{Error, Result},
};

/// Number of leading records used for schema inference.
const INFER_RECORDS: usize = 1000;

/// Options for JSON/JSONL parsing.
#[derive(Debug, Clone)]
pub struct JsonOptions {
    /// Batch size for reading.
    pub batch_size: usize,
    /// Optional schema (inferred if not provided).
    pub schema: Option<Schema>,
}

impl Default for JsonOptions {
    fn default() -> Self {
        Self {
            batch_size: 8192,
            schema: None,
        }
    }
}

impl JsonOptions {
    /// Creates new JSON options with default values.
    pub fn new() -> Self {
        Self::default()
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

/// A source that reads newline-delimited JSON objects, one record per line.
#[derive(Debug, Default)]
pub struct JsonSource {
    options: JsonOptions,
    location: Option<Location>,
    structure: Option<SchemaRef>,
    cursor: Option<RowCursor>,
}

impl JsonSource {
    /// Creates a JSON source with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a JSON source with the given options.
    pub fn with_options(options: JsonOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    fn infer(&self, location: &Location) -> Result<SchemaRef> {
        if let Some(schema) = &self.options.schema {
            return Ok(Arc::new(schema.clone()));
        }

        let (inferred, records) =
            arrow_json::reader::infer_json_schema(location.open()?, Some(INFER_RECORDS))
                .map_err(Error::Arrow)?;
        if inferred.fields().is_empty() {
            return Err(Error::EmptyDataset);
        }

        debug!(
            fields = inferred.fields().len(),
            records, "inferred JSON structure"
        );
        Ok(Arc::new(inferred))
    }

    fn open_batches(
        &self,
        location: &Location,
        schema: SchemaRef,
    ) -> Result<arrow_json::Reader<Box<dyn std::io::BufRead + Send>>> {
        ReaderBuilder::new(schema)
            .with_batch_size(self.options.batch_size)
            .build(location.open()?)
            .map_err(Error::Arrow)
    }
}

impl Source for JsonSource {
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
        ".jsonl"
    }

    fn file_extensions(&self) -> Vec<&'static str> {
        vec![".jsonl", ".json", ".ndjson"]
    }

    fn description(&self) -> &'static str {
        "JSON Lines data files"
    }
}
