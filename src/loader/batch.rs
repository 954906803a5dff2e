//! Batch filtered source.

use std::{fmt, path::Path};

use arrow::{array::RecordBatch, datatypes::SchemaRef};

use super::{Core, FilteredSource, Session};
use crate::{
    dataset::ArrowDataset,
    error::{Error, Result},
    source::{Source, SourceInput},
    transform::Transform,
};

/// Reads the whole dataset and filters it in one step.
///
/// The filtered structure is only known after [`FilteredSource::data_set`]
/// has run, since transforms with data-dependent output need to see every
/// record first. Incremental reads are never supported, whatever the
/// wrapped source and transform could do.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use arrow::{
///     array::{Int64Array, RecordBatch},
///     datatypes::{DataType, Field, Schema},
/// };
/// use tamiz::{loader::FilteredSource, BatchFilteredSource, Identity, MemorySource};
///
/// let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int64, false)]));
/// let batch = RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2, 3]))])?;
///
/// let mut loader = BatchFilteredSource::new(MemorySource::new(vec![batch])?, Identity::transform());
/// assert!(loader.structure().is_err());
///
/// let data = loader.data_set()?;
/// assert_eq!(data.len(), 3);
/// assert_eq!(loader.structure()?, data.schema());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct BatchFilteredSource<S, T> {
    core: Core<S, T>,
}

impl<S: Source, T: Transform> BatchFilteredSource<S, T> {
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
}

impl<S, T> fmt::Debug for BatchFilteredSource<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchFilteredSource")
            .field("session", &self.core.session)
            .field("location", &self.core.location())
            .finish_non_exhaustive()
    }
}

impl<S: Source, T: Transform> FilteredSource for BatchFilteredSource<S, T> {
    fn set_source(&mut self, input: SourceInput) -> Result<()> {
        self.core.set_source(input)
    }

    fn reset(&mut self) -> Result<()> {
        self.core.reset()
    }

    fn structure(&mut self) -> Result<SchemaRef> {
        self.core
            .session
            .cached_output()
            .ok_or(Error::StructureUnavailable)
    }

    fn data_set(&mut self) -> Result<ArrowDataset> {
        self.core.read_batch()
    }

    fn next_record(&mut self) -> Result<Option<RecordBatch>> {
        Err(Error::unsupported(
            "a batch filtered source cannot read records incrementally",
        ))
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
