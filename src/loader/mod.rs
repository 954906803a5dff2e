//! Filtered loaders: a [`Source`] composed with a [`Transform`].
//!
//! [`BatchFilteredSource`] reads and filters a whole dataset in one call.
//! [`IncrementalFilteredSource`] exposes the filtered structure up front and
//! streams records through the transform one at a time. Both enforce that a
//! session never mixes the two retrieval modes.

use std::path::{Path, PathBuf};

use arrow::{array::RecordBatch, datatypes::SchemaRef};
use tracing::{debug, warn};

use crate::{
    dataset::ArrowDataset,
    error::{Error, Result},
    source::{Source, SourceInput},
    transform::Transform,
};

mod batch;
mod incremental;
mod session;

pub use batch::BatchFilteredSource;
pub use incremental::{IncrementalFilteredSource, Records};
pub use session::{RetrievalMode, Session};

/// A source whose records pass through a transform before reaching the
/// caller.
pub trait FilteredSource: Send {
    /// Points the wrapped source at a new location, starting a new session.
    ///
    /// # Errors
    ///
    /// Propagates the wrapped source's failure to accept the input.
    fn set_source(&mut self, input: SourceInput) -> Result<()>;

    /// Starts a fresh session over the last file location, if any.
    ///
    /// # Errors
    ///
    /// Propagates failures of the wrapped source.
    fn reset(&mut self) -> Result<()>;

    /// Returns the filtered structure with zero records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StructureUnavailable`] if the structure cannot be
    /// known yet, or a discovery failure.
    fn structure(&mut self) -> Result<SchemaRef>;

    /// Reads and filters the whole dataset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModeConflict`] if records are being read
    /// incrementally, [`Error::FilterFailure`] if the transform fails, or the
    /// source's own error.
    fn data_set(&mut self) -> Result<ArrowDataset>;

    /// Reads and filters the next record; `Ok(None)` marks the end of data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedOperation`] if this composition cannot
    /// read incrementally, [`Error::ModeConflict`] after a batch read, or
    /// [`Error::FilterFailure`] if the transform fails on the record.
    fn next_record(&mut self) -> Result<Option<RecordBatch>>;

    /// Returns the primary file extension of the wrapped source.
    fn file_extension(&self) -> &'static str;

    /// Returns all file extensions of the wrapped source.
    fn file_extensions(&self) -> Vec<&'static str>;

    /// Returns a description of the wrapped source.
    fn description(&self) -> &'static str;

    /// Returns the current session state.
    fn session(&self) -> &Session;

    /// Returns the last file location, if the source was pointed at a file.
    fn location(&self) -> Option<&Path>;
}

impl FilteredSource for Box<dyn FilteredSource> {
    fn set_source(&mut self, input: SourceInput) -> Result<()> {
        (**self).set_source(input)
    }

    fn reset(&mut self) -> Result<()> {
        (**self).reset()
    }

    fn structure(&mut self) -> Result<SchemaRef> {
        (**self).structure()
    }

    fn data_set(&mut self) -> Result<ArrowDataset> {
        (**self).data_set()
    }

    fn next_record(&mut self) -> Result<Option<RecordBatch>> {
        (**self).next_record()
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

    fn session(&self) -> &Session {
        (**self).session()
    }

    fn location(&self) -> Option<&Path> {
        (**self).location()
    }
}

/// State and operations shared by both filtered sources.
#[derive(Debug)]
pub(crate) struct Core<S, T> {
    pub(crate) source: S,
    pub(crate) transform: T,
    pub(crate) session: Session,
    location: Option<PathBuf>,
}

impl<S, T> Core<S, T> {
    pub(crate) fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }
}

impl<S: Source, T: Transform> Core<S, T> {
    pub(crate) fn new(source: S, transform: T) -> Self {
        Self {
            source,
            transform,
            session: Session::new(),
            location: None,
        }
    }

    pub(crate) fn set_source(&mut self, input: SourceInput) -> Result<()> {
        self.session.invalidate();
        self.location = None;
        let path = input.as_path().map(Path::to_path_buf);
        debug!(input = ?input, "assigning source");

        self.source.set_source(input)?;
        self.location = path;
        Ok(())
    }

    pub(crate) fn reset(&mut self) -> Result<()> {
        self.session.invalidate();
        if let Some(path) = &self.location {
            debug!(path = %path.display(), "re-reading source location");
            self.source.set_source(SourceInput::path(path.clone()))?;
        }
        self.source.reset()
    }

    /// Reads the whole dataset and filters it as one batch.
    pub(crate) fn read_batch(&mut self) -> Result<ArrowDataset> {
        self.session.enter(RetrievalMode::Batch)?;
        self.session.clear_output();

        let data = self.source.data_set()?;
        let base = data.schema();
        self.session.set_base(base.clone());

        let filtered = self
            .transform
            .set_input_format(&base)
            .and_then(|_| self.transform.apply_batch(&data));

        match filtered {
            Ok(filtered) => {
                debug!(
                    transform = self.transform.name(),
                    rows_in = data.len(),
                    rows_out = filtered.len(),
                    "filtered batch"
                );
                self.session.set_output(filtered.schema());
                Ok(filtered)
            }
            Err(e) => {
                warn!(transform = self.transform.name(), error = %e, "batch filtering failed");
                self.session.clear_output();
                Err(Error::filter_failure("Failed to filter data", e))
            }
        }
    }

    pub(crate) fn file_extension(&self) -> &'static str {
        self.source.file_extension()
    }

    pub(crate) fn file_extensions(&self) -> Vec<&'static str> {
        self.source.file_extensions()
    }

    pub(crate) fn description(&self) -> &'static str {
        self.source.description()
    }
}
