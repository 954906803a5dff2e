//! Session state of a filtered source.

use std::{fmt, sync::Arc};

use arrow::datatypes::SchemaRef;

use crate::error::{Error, Result};

/// How records are being retrieved in the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RetrievalMode {
    /// No records have been requested yet.
    #[default]
    None,
    /// The whole dataset was read in one call.
    Batch,
    /// Records are read one at a time.
    Incremental,
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Batch => "batch",
            Self::Incremental => "incremental",
        };
        f.write_str(name)
    }
}

/// One loading run against one source location.
///
/// The retrieval mode only moves away from [`RetrievalMode::None`] once; the
/// two retrieval modes exclude each other until the session is replaced by
/// [`Session::invalidate`]. Both cached structures are `None` until
/// discovered and are dropped together on invalidation.
#[derive(Debug, Clone, Default)]
pub struct Session {
    mode: RetrievalMode,
    output_structure: Option<SchemaRef>,
    base_structure: Option<SchemaRef>,
}

impl Session {
    /// Creates a fresh session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current retrieval mode.
    pub fn mode(&self) -> RetrievalMode {
        self.mode
    }

    /// Returns the filtered structure, if known.
    pub fn output_structure(&self) -> Option<&SchemaRef> {
        self.output_structure.as_ref()
    }

    /// Returns the unfiltered structure produced by the source, if known.
    pub fn base_structure(&self) -> Option<&SchemaRef> {
        self.base_structure.as_ref()
    }

    /// Moves the session into `mode`.
    ///
    /// Entering the mode the session is already in, or entering
    /// [`RetrievalMode::None`], is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModeConflict`] if the session is locked into the other
    /// retrieval mode.
    pub fn enter(&mut self, mode: RetrievalMode) -> Result<()> {
        match (self.mode, mode) {
            (_, RetrievalMode::None) => Ok(()),
            (RetrievalMode::None, _) => {
                self.mode = mode;
                Ok(())
            }
            (active, requested) if active == requested => Ok(()),
            (active, _) => Err(Error::ModeConflict { active }),
        }
    }

    /// Returns the session to its initial state.
    pub fn invalidate(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn set_output(&mut self, schema: SchemaRef) {
        self.output_structure = Some(schema);
    }

    pub(crate) fn clear_output(&mut self) {
        self.output_structure = None;
    }

    pub(crate) fn set_base(&mut self, schema: SchemaRef) {
        self.base_structure = Some(schema);
    }

    pub(crate) fn cached_output(&self) -> Option<SchemaRef> {
        self.output_structure.as_ref().map(Arc::clone)
    }

    pub(crate) fn cached_base(&self) -> Option<SchemaRef> {
        self.base_structure.as_ref().map(Arc::clone)
    }
}
