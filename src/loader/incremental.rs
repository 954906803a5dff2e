//! Incremental filtered source.

use std::{fmt, path::Path, sync::Arc};

use arrow::{array::RecordBatch, datatypes::SchemaRef};
use tracing::{debug, warn};

use super::{Core, FilteredSource, RetrievalMode, Session};
use crate::{
    dataset::ArrowDataset,
    error::{Error, Result},
    source::{Source, SourceInput},
    transform::Transform,
};

/// Streams records one at a time through a transform.
///
/// The filtered structure is derived from the source's structure without
/// reading records. Each record is fed to the transform, flushed with
/// [`Transform::batch_finished`] and read back as exactly one output record.
///
/// # One-to-one transforms only
///
/// A transform used here must produce exactly one output record for each
/// input record. Aggregating, windowing or row-dropping transforms yield no
/// output after the flush and make [`FilteredSource::next_record`] fail.
///
/// The whole dataset can still be drained in one call with
/// [`FilteredSource::data_set`], as long as no record has been read
/// incrementally in the same session.
pub struct IncrementalFilteredSource<S, T> {
    core: Core<S, T>,
}

impl<S: Source, T: Transform> IncrementalFilteredSource<S, T> {
    /// Composes `source` with `transform`.
    pub fn new(source: S, transform: T) -> Self {
        Self {
            core: Core::new(source, transform),
        }
    }

    /// Returns the wrapped source.
    pub fn source(&self) -> &S {
        &self.core.source
    }

    /// Returns the wrapped transform.
    pub fn transform(&self) -> &T {
        &self.core.transform
    }

    /// Returns an iterator draining the remaining records.
    pub fn records(&mut self) -> Records<'_, S, T> {
        Records {
            loader: self,
            done: false,
        }
    }

    /// Derives and caches the base and filtered structures.
    fn discover(&mut self) -> Result<SchemaRef> {
        if let Some(output) = self.core.session.cached_output() {
            return Ok(output);
        }

        let base = match self.core.session.cached_base() {
            Some(base) => base,
            None => {
                let base = self.core.source.structure()?;
                self.core.session.set_base(Arc::clone(&base));
                base
            }
        };

        let transform = &mut self.core.transform;
        let output = transform
            .set_input_format(&base)
            .and_then(|_| transform.output_format());

        match output {
            Ok(output) => {
                debug!(
                    transform = transform.name(),
                    fields_in = base.fields().len(),
                    fields_out = output.fields().len(),
                    "discovered structure"
                );
                self.core.session.set_output(Arc::clone(&output));
                Ok(output)
            }
            Err(e) => {
                warn!(transform = transform.name(), error = %e, "structure discovery failed");
                self.core.session.clear_output();
                Err(Error::structure_discovery(e))
            }
        }
    }

    fn filter_record(&mut self, record: RecordBatch) -> Result<RecordBatch> {
        let transform = &mut self.core.transform;
        transform.input(record)?;
        transform.batch_finished()?;

        let output = transform.output().ok_or_else(|| {
            Error::processing(format!(
                "{} produced no output for the record; only one-to-one transforms can be used incrementally",
                transform.name()
            ))
        })?;

        if transform.output().is_some() {
            while transform.output().is_some() {}
            return Err(Error::processing(format!(
                "{} produced more than one output for the record",
                transform.name()
            )));
        }
        Ok(output)
    }
}

impl<S, T> fmt::Debug for IncrementalFilteredSource<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncrementalFilteredSource")
            .field("session", &self.core.session)
            .field("location", &self.core.location())
            .finish_non_exhaustive()
    }
}

impl<S: Source, T: Transform> FilteredSource for IncrementalFilteredSource<S, T> {
    fn set_source(&mut self, input: SourceInput) -> Result<()> {
        self.core.set_source(input)
    }

    fn reset(&mut self) -> Result<()> {
        self.core.reset()
    }

    fn structure(&mut self) -> Result<SchemaRef> {
        self.discover()
    }

    fn data_set(&mut self) -> Result<ArrowDataset> {
        self.core.read_batch()
    }

    fn next_record(&mut self) -> Result<Option<RecordBatch>> {
        self.core.session.enter(RetrievalMode::Incremental)?;
        self.discover()?;

        let base = self
            .core
            .session
            .cached_base()
            .ok_or(Error::StructureUnavailable)?;
        let Some(record) = self.core.source.next_record(&base)? else {
            debug!("end of data");
            return Ok(None);
        };

        self.filter_record(record).map(Some).map_err(|e| {
            warn!(error = %e, "record filtering failed");
            Error::filter_failure("Failed to filter record", e)
        })
    }

    fn file_extension(&self) -> &'static str {
        self.core.file_extension()
    }

    fn file_extensions(&self) -> Vec<&'static str> {
        self.core.file_extensions()
    }

    fn description(&self) -> &'static str {
        self.core.description()
    }

    fn session(&self) -> &Session {
        &self.core.session
    }

    fn location(&self) -> Option<&Path> {
        self.core.location()
    }
}

/// Iterator over the remaining filtered records of an
/// [`IncrementalFilteredSource`].
///
/// Stops after the end of data or after the first error.
pub struct Records<'a, S, T> {
    loader: &'a mut IncrementalFilteredSource<S, T>,
    done: bool,
}

impl<S: Source, T: Transform> Iterator for Records<'_, S, T> {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.loader.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<S, T> fmt::Debug for Records<'_, S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Records")
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use arrow::{
        array::Int64Array,
        datatypes::{DataType, Field, Schema},
    };

    use super::*;
    use crate::{
        source::{CsvSource, MemorySource},
        transform::{Identity, Map, NormMethod, Normalize, RecordMap, Select},
    };

    fn batch(values: Vec<i64>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int64, false)]));
        RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(values))])
            .ok()
            .unwrap_or_else(|| panic!("Should create batch"))
    }

    fn memory() -> MemorySource {
        MemorySource::new(vec![batch(vec![1, 2, 3])])
            .ok()
            .unwrap_or_else(|| panic!("Should create source"))
    }

    fn first_value(record: &RecordBatch) -> Option<i64> {
        record
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .map(|a| a.value(0))
    }

    fn double(batch: RecordBatch) -> Result<RecordBatch> {
        let col = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| Error::processing("Expected Int64Array"))?;
        let doubled: Int64Array = col.iter().map(|v| v.map(|v| v * 2)).collect();
        RecordBatch::try_new(batch.schema(), vec![Arc::new(doubled)]).map_err(Error::Arrow)
    }

    #[test]
    fn test_streams_doubled_records() {
        let mut loader = IncrementalFilteredSource::new(memory(), Map::new(double).rowwise());

        let mut seen = Vec::new();
        while let Some(record) = loader
            .next_record()
            .ok()
            .unwrap_or_else(|| panic!("Should read record"))
        {
            assert_eq!(record.num_rows(), 1);
            seen.extend(first_value(&record));
        }
        assert_eq!(seen, vec![2, 4, 6]);
        assert_eq!(loader.session().mode(), RetrievalMode::Incremental);
        assert!(loader.next_record().ok().flatten().is_none());
    }

    #[test]
    fn test_structure_before_reading() {
        let mut loader = IncrementalFilteredSource::new(memory(), Identity::transform());
        let structure = loader
            .structure()
            .ok()
            .unwrap_or_else(|| panic!("Should discover"));
        assert_eq!(structure.field(0).name(), "a");
        assert_eq!(loader.session().mode(), RetrievalMode::None);
        assert!(loader.session().base_structure().is_some());
    }

    #[test]
    fn test_structure_is_cached() {
        let mut loader = IncrementalFilteredSource::new(memory(), Identity::transform());
        let first = loader.structure().ok();
        let second = loader.structure().ok();
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn test_discovery_failure_wraps_cause() {
        let mut loader =
            IncrementalFilteredSource::new(memory(), Select::new(vec!["missing"]).rowwise());

        let result = loader.structure();
        assert!(matches!(
            result,
            Err(Error::StructureDiscovery { ref source }) if matches!(**source, Error::Configuration { .. })
        ));
        assert!(loader.session().output_structure().is_none());
    }

    #[test]
    fn test_next_record_discovers_lazily() {
        let mut loader = IncrementalFilteredSource::new(memory(), Identity::transform());
        let record = loader
            .next_record()
            .ok()
            .flatten()
            .unwrap_or_else(|| panic!("Should read record"));
        assert_eq!(first_value(&record), Some(1));
        assert!(loader.session().output_structure().is_some());
    }

    #[test]
    fn test_next_record_surfaces_discovery_failure() {
        let mut loader =
            IncrementalFilteredSource::new(memory(), Select::new(vec!["missing"]).rowwise());
        assert!(matches!(
            loader.next_record(),
            Err(Error::StructureDiscovery { .. })
        ));
    }

    #[test]
    fn test_data_set_after_next_record_conflicts() {
        let mut loader = IncrementalFilteredSource::new(memory(), Identity::transform());
        loader.next_record().ok();
        assert!(matches!(
            loader.data_set(),
            Err(Error::ModeConflict {
                active: RetrievalMode::Incremental
            })
        ));
    }

    #[test]
    fn test_next_record_after_data_set_conflicts() {
        let mut loader = IncrementalFilteredSource::new(memory(), Identity::transform());
        let data = loader
            .data_set()
            .ok()
            .unwrap_or_else(|| panic!("Should read"));
        assert_eq!(data.len(), 3);
        assert!(matches!(
            loader.next_record(),
            Err(Error::ModeConflict {
                active: RetrievalMode::Batch
            })
        ));
    }

    #[test]
    fn test_reset_allows_other_mode() {
        let mut loader = IncrementalFilteredSource::new(memory(), Identity::transform());
        loader.next_record().ok();
        loader.reset().ok().unwrap_or_else(|| panic!("Should reset"));

        let data = loader
            .data_set()
            .ok()
            .unwrap_or_else(|| panic!("Should read after reset"));
        assert_eq!(data.len(), 3);
    }

    #[test]
    fn test_reset_restarts_stream() {
        let mut loader = IncrementalFilteredSource::new(memory(), Identity::transform());
        let first: Vec<_> = loader.records().filter_map(|r| r.ok()).collect();
        loader.reset().ok();
        let second: Vec<_> = loader.records().filter_map(|r| r.ok()).collect();
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
    }

    #[test]
    fn test_no_output_is_filter_failure() {
        let swallow = Map::new(|b: RecordBatch| Ok(b.slice(0, 0))).rowwise();
        let mut loader = IncrementalFilteredSource::new(memory(), swallow);

        let result = loader.next_record();
        assert!(matches!(result, Err(Error::FilterFailure { .. })));
    }

    #[test]
    fn test_record_failure_keeps_structure() {
        let reject = Map::new(|_b| Err(Error::processing("rejected"))).rowwise();
        let mut loader = IncrementalFilteredSource::new(memory(), reject);

        assert!(matches!(
            loader.next_record(),
            Err(Error::FilterFailure { .. })
        ));
        assert!(loader.structure().is_ok());
    }

    #[test]
    fn test_records_iterator_stops_on_error() {
        let reject = Map::new(|_b| Err(Error::processing("rejected"))).rowwise();
        let mut loader = IncrementalFilteredSource::new(memory(), reject);

        let results: Vec<_> = loader.records().collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[test]
    fn test_batch_only_source_is_unsupported() {
        let source = memory().batch_only();
        let mut loader = IncrementalFilteredSource::new(source, Identity::transform());
        assert!(matches!(
            loader.next_record(),
            Err(Error::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_normalize_streams_with_fitted_first_record() {
        let mut loader =
            IncrementalFilteredSource::new(memory(), Normalize::all_numeric(NormMethod::MinMax));
        let records: Vec<_> = loader.records().collect();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.is_ok()));
        assert!(loader.transform().is_fitted());
    }

    #[test]
    fn test_debug_output() {
        let loader = IncrementalFilteredSource::new(memory(), Identity::transform());
        let debug = format!("{:?}", loader);
        assert!(debug.contains("IncrementalFilteredSource"));
        assert!(debug.contains("location: None"));
    }

    #[test]
    fn test_debug_shows_file_location() {
        let dir = tempfile::tempdir()
            .ok()
            .unwrap_or_else(|| panic!("Should create temp dir"));
        let path = dir.path().join("rows.csv");
        std::fs::write(&path, "a\n1\n2\n")
            .ok()
            .unwrap_or_else(|| panic!("Should write file"));

        let mut loader = IncrementalFilteredSource::new(CsvSource::new(), Identity::transform());
        loader
            .set_source(SourceInput::path(&path))
            .ok()
            .unwrap_or_else(|| panic!("Should set source"));
        loader.next_record().ok();

        let debug = format!("{:?}", loader);
        assert!(debug.contains("rows.csv"));
        assert!(debug.contains("Incremental"));
    }
}
