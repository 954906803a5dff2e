//! Record sources.
//!
//! A [`Source`] discovers the structure of a location and hands out its
//! records, either all at once ([`Source::data_set`]) or one at a time
//! ([`Source::next_record`]). Sources know nothing about filtering; the
//! [`loader`](crate::loader) module composes them with a
//! [`Transform`](crate::transform::Transform).

use std::{
    fmt,
    io::{BufRead, BufReader, Cursor, Read},
    path::{Path, PathBuf},
};

use arrow::{array::RecordBatch, datatypes::SchemaRef, error::ArrowError};
use bytes::Bytes;

use crate::{
    dataset::ArrowDataset,
    error::{Error, Result},
};

mod csv;
mod json;
mod memory;
mod parquet_file;

pub use self::{
    csv::{CsvOptions, CsvSource},
    json::{JsonOptions, JsonSource},
    memory::MemorySource,
    parquet_file::ParquetSource,
};

/// Where a source reads its records from.
pub enum SourceInput {
    /// A file on the local filesystem.
    Path(PathBuf),
    /// An already-open byte stream.
    Reader(Box<dyn Read + Send>),
}

impl SourceInput {
    /// Creates a file input.
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Creates a stream input.
    pub fn reader(reader: impl Read + Send + 'static) -> Self {
        Self::Reader(Box::new(reader))
    }

    /// Returns the file path, if this input is a file.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            Self::Reader(_) => None,
        }
    }
}

impl fmt::Debug for SourceInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Reader(_) => f.debug_tuple("Reader").finish_non_exhaustive(),
        }
    }
}

/// A generic record source.
///
/// Implementations own their location exclusively and must be able to start
/// over from the beginning after [`Source::reset`].
pub trait Source: Send {
    /// Points the source at a new location, discarding any read state.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the location cannot be read.
    fn set_source(&mut self, input: SourceInput) -> Result<()>;

    /// Returns the structure of the location without reading its records.
    ///
    /// # Errors
    ///
    /// Returns an error if the location cannot be parsed.
    fn structure(&mut self) -> Result<SchemaRef>;

    /// Reads every record of the location.
    ///
    /// # Errors
    ///
    /// Returns an error if the location cannot be read or parsed.
    fn data_set(&mut self) -> Result<ArrowDataset>;

    /// Returns the next record as a single-row batch, or `None` at end of
    /// data. `expected` is the structure the caller obtained earlier.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails, or an unsupported-operation error if
    /// this source cannot stream.
    fn next_record(&mut self, expected: &SchemaRef) -> Result<Option<RecordBatch>> {
        let _ = expected;
        Err(Error::unsupported(format!(
            "{} cannot read records incrementally",
            self.description()
        )))
    }

    /// Rewinds the source to the beginning of its location.
    ///
    /// # Errors
    ///
    /// Returns an error if the location can no longer be opened.
    fn reset(&mut self) -> Result<()>;

    /// Returns the primary file extension, including the leading dot.
    fn file_extension(&self) -> &'static str;

    /// Returns every file extension this source understands.
    fn file_extensions(&self) -> Vec<&'static str> {
        vec![self.file_extension()]
    }

    /// Returns a short human-readable description of the format.
    fn description(&self) -> &'static str;
}

impl Source for Box<dyn Source> {
    fn set_source(&mut self, input: SourceInput) -> Result<()> {
        (**self).set_source(input)
    }

    fn structure(&mut self) -> Result<SchemaRef> {
        (**self).structure()
    }

    fn data_set(&mut self) -> Result<ArrowDataset> {
        (**self).data_set()
    }

    fn next_record(&mut self, expected: &SchemaRef) -> Result<Option<RecordBatch>> {
        (**self).next_record(expected)
    }

    fn reset(&mut self) -> Result<()> {
        (**self).reset()
    }

    fn file_extension(&self) -> &'static str {
        (**self).file_extension()
    }

    fn file_extensions(&self) -> Vec<&'static str> {
        (**self).file_extensions()
    }

    fn description(&self) -> &'static str {
        (**self).description()
    }
}

/// A resolved, re-openable location.
///
/// Streams are drained into memory when assigned so that the source can be
/// reset.
#[derive(Debug, Clone)]
pub(crate) enum Location {
    File(PathBuf),
    Bytes(Bytes),
}

impl Location {
    pub(crate) fn resolve(input: SourceInput) -> Result<Self> {
        match input {
            SourceInput::Path(path) => {
                let meta = std::fs::metadata(&path).map_err(|e| Error::io(e, &path))?;
                if !meta.is_file() {
                    return Err(Error::io(
                        std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file"),
                        path,
                    ));
                }
                Ok(Self::File(path))
            }
            SourceInput::Reader(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).map_err(Error::io_no_path)?;
                Ok(Self::Bytes(Bytes::from(buf)))
            }
        }
    }

    pub(crate) fn open(&self) -> Result<Box<dyn BufRead + Send>> {
        match self {
            Self::File(path) => {
                let file = std::fs::File::open(path).map_err(|e| Error::io(e, path))?;
                Ok(Box::new(BufReader::new(file)))
            }
            Self::Bytes(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
        }
    }
}

pub(crate) fn require(location: Option<&Location>) -> Result<&Location> {
    location.ok_or_else(|| Error::invalid_config("No source location has been set"))
}

type BatchStream = Box<dyn Iterator<Item = std::result::Result<RecordBatch, ArrowError>> + Send>;

/// Hands out single-row slices from a stream of batches.
pub(crate) struct RowCursor {
    batches: BatchStream,
    current: Option<RecordBatch>,
    row: usize,
    done: bool,
}

impl RowCursor {
    pub(crate) fn new(batches: BatchStream) -> Self {
        Self {
            batches,
            current: None,
            row: 0,
            done: false,
        }
    }

    pub(crate) fn next_row(&mut self) -> Result<Option<RecordBatch>> {
        loop {
            if self.done {
                return Ok(None);
            }

            if let Some(batch) = &self.current {
                if self.row < batch.num_rows() {
                    let row = batch.slice(self.row, 1);
                    self.row += 1;
                    return Ok(Some(row));
                }
            }

            match self.batches.next() {
                Some(Ok(batch)) => {
                    self.current = Some(batch);
                    self.row = 0;
                }
                Some(Err(e)) => return Err(Error::Arrow(e)),
                None => {
                    self.current = None;
                    self.done = true;
                }
            }
        }
    }
}

impl fmt::Debug for RowCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowCursor")
            .field("row", &self.row)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

/// Checks that a streamed record has the structure the caller expects.
pub(crate) fn check_record(expected: &SchemaRef, record: &RecordBatch) -> Result<()> {
    if record.schema().fields() == expected.fields() {
        Ok(())
    } else {
        Err(Error::schema_mismatch(format!(
            "record has fields {:?}, expected {:?}",
            field_names(&record.schema()),
            field_names(expected)
        )))
    }
}

fn field_names(schema: &SchemaRef) -> Vec<&str> {
    schema.fields().iter().map(|f| f.name().as_str()).collect()
}

#[cfg(test)]
mod tests {
    use std::{io::Write, sync::Arc};

    use arrow::{
        array::Int32Array,
        datatypes::{DataType, Field, Schema},
    };

    use super::*;

    fn batch(values: Vec<i32>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int32, false)]));
        RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(values))])
            .ok()
            .unwrap_or_else(|| panic!("Should create batch"))
    }

    #[test]
    fn test_row_cursor_spans_batches() {
        let batches: Vec<std::result::Result<RecordBatch, ArrowError>> =
            vec![Ok(batch(vec![1, 2])), Ok(batch(vec![])), Ok(batch(vec![3]))];
        let mut cursor = RowCursor::new(Box::new(batches.into_iter()));

        let mut seen = 0;
        while let Ok(Some(row)) = cursor.next_row() {
            assert_eq!(row.num_rows(), 1);
            seen += 1;
        }
        assert_eq!(seen, 3);
    }

    #[test]
    fn test_row_cursor_stays_exhausted() {
        let batches: Vec<std::result::Result<RecordBatch, ArrowError>> = vec![Ok(batch(vec![1]))];
        let mut cursor = RowCursor::new(Box::new(batches.into_iter()));
        assert!(cursor.next_row().ok().flatten().is_some());
        assert!(cursor.next_row().ok().flatten().is_none());
        assert!(cursor.next_row().ok().flatten().is_none());
    }

    #[test]
    fn test_row_cursor_propagates_errors() {
        let batches: Vec<std::result::Result<RecordBatch, ArrowError>> =
            vec![Err(ArrowError::ParseError("bad row".to_string()))];
        let mut cursor = RowCursor::new(Box::new(batches.into_iter()));
        assert!(matches!(cursor.next_row(), Err(Error::Arrow(_))));
    }

    #[test]
    fn test_location_missing_file() {
        let result = Location::resolve(SourceInput::path("/definitely/not/here.csv"));
        assert!(matches!(result, Err(Error::Io { path: Some(_), .. })));
    }

    #[test]
    fn test_location_directory_rejected() {
        let dir = tempfile::tempdir()
            .ok()
            .unwrap_or_else(|| panic!("Should create temp dir"));
        let result = Location::resolve(SourceInput::path(dir.path()));
        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[test]
    fn test_location_stream_is_reopenable() {
        let location = Location::resolve(SourceInput::reader(Cursor::new(b"a\n1\n".to_vec())))
            .ok()
            .unwrap_or_else(|| panic!("Should resolve stream"));

        for _ in 0..2 {
            let mut text = String::new();
            location
                .open()
                .ok()
                .unwrap_or_else(|| panic!("Should open"))
                .read_to_string(&mut text)
                .ok();
            assert_eq!(text, "a\n1\n");
        }
    }

    #[test]
    fn test_location_file_is_reopenable() {
        let mut file = tempfile::NamedTempFile::new()
            .ok()
            .unwrap_or_else(|| panic!("Should create temp file"));
        file.write_all(b"hello").ok();

        let location = Location::resolve(SourceInput::path(file.path()))
            .ok()
            .unwrap_or_else(|| panic!("Should resolve file"));
        let mut text = String::new();
        location
            .open()
            .ok()
            .unwrap_or_else(|| panic!("Should open"))
            .read_to_string(&mut text)
            .ok();
        assert_eq!(text, "hello");
    }

    #[test]
    fn test_check_record_mismatch() {
        let expected = Arc::new(Schema::new(vec![Field::new("b", DataType::Int32, false)]));
        let result = check_record(&expected, &batch(vec![1]));
        assert!(matches!(result, Err(Error::SchemaMismatch { .. })));
    }

    #[test]
    fn test_source_input_debug() {
        let input = SourceInput::path("data.csv");
        assert!(format!("{:?}", input).contains("data.csv"));
        assert_eq!(input.as_path(), Some(Path::new("data.csv")));

        let stream = SourceInput::reader(Cursor::new(Vec::new()));
        assert!(format!("{:?}", stream).contains("Reader"));
        assert!(stream.as_path().is_none());
    }
}
