//! Error types for tamiz.

use std::path::PathBuf;

use crate::loader::RetrievalMode;

/// Result type alias for tamiz operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tamiz operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// I/O error while reading a source location.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        /// The path where the error occurred, if known.
        path: Option<PathBuf>,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Arrow error while decoding or assembling records.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error while reading a Parquet location.
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Invalid loader or source configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// Unsupported file format.
    #[error("Unsupported format: {format}")]
    UnsupportedFormat {
        /// The unsupported format name or extension.
        format: String,
    },

    /// The source location holds no records and no usable header.
    #[error("Dataset is empty")]
    EmptyDataset,

    /// A record did not match the schema it was expected to have.
    #[error("Schema mismatch: {message}")]
    SchemaMismatch {
        /// Description of the schema mismatch.
        message: String,
    },

    /// Parse error in a source location or a configuration file.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parse error.
        message: String,
    },

    /// A transform rejected the schema it was configured with.
    #[error("Transform configuration error: {message}")]
    Configuration {
        /// Description of the configuration failure.
        message: String,
    },

    /// A transform failed while processing records.
    #[error("Transform processing error: {message}")]
    Processing {
        /// Description of the processing failure.
        message: String,
    },

    /// Filtering data failed; the transform's error is attached as the cause.
    #[error("{context}: {source}")]
    FilterFailure {
        /// What was being filtered when the failure happened.
        context: &'static str,
        /// The underlying transform error.
        #[source]
        source: Box<Error>,
    },

    /// The filtered structure could not be derived from the source structure.
    #[error("Failed to obtain structure from base source: {source}")]
    StructureDiscovery {
        /// The underlying transform error.
        #[source]
        source: Box<Error>,
    },

    /// Batch and incremental retrieval were mixed within one session.
    #[error("Cannot mix batch and incremental retrieval: session is already in {active} mode")]
    ModeConflict {
        /// The mode the session is locked into.
        active: RetrievalMode,
    },

    /// The operation is structurally impossible for this source or mode.
    #[error("Unsupported operation: {operation}")]
    UnsupportedOperation {
        /// Description of the rejected operation.
        operation: String,
    },

    /// Structure was requested before it could be known.
    #[error("Cannot determine structure before loading data")]
    StructureUnavailable,
}

impl Error {
    /// Create an I/O error with a path context.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            path: Some(path.into()),
            source,
        }
    }

    /// Create an I/O error without path context.
    pub fn io_no_path(source: std::io::Error) -> Self {
        Self::Io { path: None, source }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an unsupported format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Create a schema mismatch error.
    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: message.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create a transform configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a transform processing error.
    pub fn processing(message: impl Into<String>) -> Self {
        Self::Processing {
            message: message.into(),
        }
    }

    /// Wrap a transform error raised while filtering.
    pub fn filter_failure(context: &'static str, cause: Error) -> Self {
        Self::FilterFailure {
            context,
            source: Box::new(cause),
        }
    }

    /// Wrap a transform error raised during structure discovery.
    pub fn structure_discovery(cause: Error) -> Self {
        Self::StructureDiscovery {
            source: Box::new(cause),
        }
    }

    /// Create an unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            operation: operation.into(),
        }
    }
}
