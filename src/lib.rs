//! tamiz - filtered data loading over Apache Arrow
//!
//! Composes a record [`Source`] with a stateful [`Transform`] so records are
//! filtered on the fly before reaching the caller. Two loaders share one
//! session model:
//!
//! - [`BatchFilteredSource`] reads the whole dataset, filters it in one step
//!   and only then knows the filtered structure.
//! - [`IncrementalFilteredSource`] derives the filtered structure up front and
//!   streams records one at a time through the transform.
//!
//! A session is locked into whichever retrieval mode is used first; mixing
//! batch and incremental reads fails with [`Error::ModeConflict`] until the
//! loader is reset or pointed at a new location.
//!
//! # Quick Start
//!
//! ```no_run
//! use tamiz::{loader::FilteredSource, CsvSource, IncrementalFilteredSource, RecordMap, Select};
//! use tamiz::source::SourceInput;
//!
//! let mut loader =
//!     IncrementalFilteredSource::new(CsvSource::new(), Select::new(vec!["id", "score"]).rowwise());
//! loader.set_source(SourceInput::path("data/train.csv"))?;
//!
//! println!("{:?}", loader.structure()?);
//! for record in loader.records() {
//!     println!("{} row", record?.num_rows());
//! }
//! # Ok::<(), tamiz::Error>(())
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
// Allow common test patterns
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::cast_lossless,
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_precision_loss,
        clippy::redundant_clone,
        clippy::float_cmp,
        clippy::similar_names
    )
)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

/// CLI module for command-line interface
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod loader;
pub mod source;
pub mod transform;

// Re-export arrow types commonly needed
pub use arrow::{
    array::RecordBatch,
    datatypes::{Schema, SchemaRef},
};
pub use config::{LoaderConfig, Mode, SourceKind, SourceOptions, TransformSpec};
pub use dataset::ArrowDataset;
pub use error::{Error, Result};
pub use loader::{
    BatchFilteredSource, FilteredSource, IncrementalFilteredSource, RetrievalMode, Session,
};
pub use source::{
    CsvOptions, CsvSource, JsonOptions, JsonSource, MemorySource, ParquetSource, Source,
    SourceInput,
};
pub use transform::{
    Cast, Chain, Drop, FillNull, FillStrategy, Identity, Map, NormMethod, Normalize, RecordMap,
    Rename, Rowwise, Select, Transform,
};
