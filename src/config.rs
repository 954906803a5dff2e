//! Loader configuration.
//!
//! A [`LoaderConfig`] names a source kind, its options, a list of transforms
//! and a retrieval mode. It is usually read from a JSON file:
//!
//! ```json
//! {
//!   "source": "csv",
//!   "options": { "delimiter": ";" },
//!   "transforms": [
//!     { "type": "select", "columns": ["id", "score"] },
//!     { "type": "normalize", "columns": ["score"], "method": "z_score" }
//!   ],
//!   "mode": "incremental"
//! }
//! ```

use std::{collections::HashMap, path::Path};

use arrow::datatypes::DataType;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{Error, Result},
    loader::{BatchFilteredSource, FilteredSource, IncrementalFilteredSource},
    source::{CsvOptions, CsvSource, JsonOptions, JsonSource, ParquetSource, Source, SourceInput},
    transform::{
        Cast, Chain, Drop, FillNull, FillStrategy, Identity, NormMethod, Normalize, RecordMap,
        Rename, Select, Transform,
    },
};

/// Which source implementation reads the location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum SourceKind {
    /// Pick by file extension.
    #[default]
    Auto,
    /// Delimited text.
    Csv,
    /// Newline-delimited JSON.
    Json,
    /// Apache Parquet.
    Parquet,
}

impl SourceKind {
    /// The concrete source kinds, in detection order.
    pub const CONCRETE: [SourceKind; 3] = [Self::Csv, Self::Json, Self::Parquet];

    /// Returns the lowercase name used in configuration files.
    pub fn name(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Parquet => "parquet",
        }
    }

    /// Resolves [`SourceKind::Auto`] against the extension of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] if no source handles the
    /// extension.
    pub fn resolve(self, path: &Path) -> Result<Self> {
        if self != Self::Auto {
            return Ok(self);
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .ok_or_else(|| Error::unsupported_format(path.display().to_string()))?;

        let options = SourceOptions::default();
        Self::CONCRETE
            .into_iter()
            .find(|kind| {
                kind.create(&options)
                    .is_some_and(|source| source.file_extensions().contains(&ext.as_str()))
            })
            .ok_or_else(|| Error::unsupported_format(ext))
    }

    /// Creates a source of this kind, or `None` for [`SourceKind::Auto`].
    pub fn create(self, options: &SourceOptions) -> Option<Box<dyn Source>> {
        let source: Box<dyn Source> = match self {
            Self::Auto => return None,
            Self::Csv => {
                let mut csv = CsvOptions::new()
                    .with_header(options.has_header)
                    .with_batch_size(options.batch_size);
                if let Ok(delimiter) = u8::try_from(options.delimiter) {
                    csv = csv.with_delimiter(delimiter);
                }
                Box::new(CsvSource::with_options(csv))
            }
            Self::Json => Box::new(JsonSource::with_options(
                JsonOptions::new().with_batch_size(options.batch_size),
            )),
            Self::Parquet => Box::new(ParquetSource::new(options.batch_size)),
        };
        Some(source)
    }
}

/// Options handed to the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceOptions {
    /// Whether delimited text starts with a header row.
    #[serde(default = "default_has_header")]
    pub has_header: bool,
    /// Field delimiter of delimited text; must be ASCII.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Rows decoded per read step.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            has_header: default_has_header(),
            delimiter: default_delimiter(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_has_header() -> bool {
    true
}

fn default_delimiter() -> char {
    ','
}

fn default_batch_size() -> usize {
    8192
}

/// Target types for [`TransformSpec::Cast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
    /// UTF-8 string.
    Utf8,
    /// Boolean.
    Boolean,
}

impl From<ColumnType> for DataType {
    fn from(ty: ColumnType) -> Self {
        match ty {
            ColumnType::Int32 => DataType::Int32,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Float32 => DataType::Float32,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Utf8 => DataType::Utf8,
            ColumnType::Boolean => DataType::Boolean,
        }
    }
}

/// Constant used by [`TransformSpec::FillNull`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FillValue {
    /// Boolean constant.
    Bool(bool),
    /// Integer constant.
    Int(i64),
    /// Float constant.
    Float(f64),
    /// String constant.
    Text(String),
}

impl From<FillValue> for FillStrategy {
    fn from(value: FillValue) -> Self {
        match value {
            FillValue::Bool(b) => Self::Bool(b),
            FillValue::Int(v) => Self::Int(v),
            FillValue::Float(v) => Self::Float(v),
            FillValue::Text(s) => Self::String(s),
        }
    }
}

/// Normalization method names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum NormKind {
    /// Scale to [0, 1].
    #[default]
    MinMax,
    /// Center on the mean, scale by standard deviation.
    ZScore,
    /// Scale to unit L2 norm.
    L2,
}

impl From<NormKind> for NormMethod {
    fn from(kind: NormKind) -> Self {
        match kind {
            NormKind::MinMax => Self::MinMax,
            NormKind::ZScore => Self::ZScore,
            NormKind::L2 => Self::L2,
        }
    }
}

/// One transform of the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum TransformSpec {
    /// Pass records through unchanged.
    Identity,
    /// Keep only the named columns.
    Select {
        /// Columns to keep, in output order.
        columns: Vec<String>,
    },
    /// Remove the named columns.
    Drop {
        /// Columns to remove.
        columns: Vec<String>,
    },
    /// Rename columns.
    Rename {
        /// Old name to new name.
        mapping: HashMap<String, String>,
    },
    /// Cast one column.
    Cast {
        /// Column to cast.
        column: String,
        /// Target type.
        to: ColumnType,
    },
    /// Replace nulls in one column.
    FillNull {
        /// Column to fill.
        column: String,
        /// Fill constant.
        value: FillValue,
    },
    /// Normalize numeric columns.
    Normalize {
        /// Columns to normalize; all numeric columns when absent.
        #[serde(default)]
        columns: Option<Vec<String>>,
        /// Normalization method.
        #[serde(default)]
        method: NormKind,
    },
}

impl TransformSpec {
    /// Builds the transform this entry describes.
    pub fn build(&self) -> Box<dyn Transform> {
        match self {
            Self::Identity => Box::new(Identity::transform()),
            Self::Select { columns } => Box::new(Select::new(columns.clone()).rowwise()),
            Self::Drop { columns } => Box::new(Drop::new(columns.clone()).rowwise()),
            Self::Rename { mapping } => Box::new(Rename::new(mapping.clone()).rowwise()),
            Self::Cast { column, to } => {
                Box::new(Cast::new([(column.clone(), DataType::from(*to))]).rowwise())
            }
            Self::FillNull { column, value } => {
                Box::new(FillNull::new(column.clone(), value.clone().into()).rowwise())
            }
            Self::Normalize { columns, method } => Box::new(match columns {
                Some(columns) => Normalize::new(columns.clone(), (*method).into()),
                None => Normalize::all_numeric((*method).into()),
            }),
        }
    }

    fn validate(&self) -> Result<()> {
        let empty = match self {
            Self::Select { columns } | Self::Drop { columns } => columns.is_empty(),
            Self::Rename { mapping } => mapping.is_empty(),
            Self::Normalize {
                columns: Some(columns),
                ..
            } => columns.is_empty(),
            _ => false,
        };

        if empty {
            return Err(Error::invalid_config(format!(
                "{:?} needs at least one column",
                self
            )));
        }
        Ok(())
    }
}

/// Retrieval mode of the built loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Mode {
    /// Read and filter everything in one call.
    #[default]
    Batch,
    /// Stream records one at a time.
    Incremental,
}

/// Everything needed to build a filtered loader.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoaderConfig {
    /// Source implementation.
    #[serde(default)]
    pub source: SourceKind,
    /// Source options.
    #[serde(default)]
    pub options: SourceOptions,
    /// Transforms applied in order.
    #[serde(default)]
    pub transforms: Vec<TransformSpec>,
    /// Retrieval mode.
    #[serde(default)]
    pub mode: Mode,
}

impl LoaderConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read or a parse error if it
    /// is not a valid configuration.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(e, path))?;
        Self::from_json_str(&text)
    }

    /// Parses a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns a parse error if the text is not a valid configuration.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| Error::parse(format!("invalid loader configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Appends a transform.
    #[must_use]
    pub fn with_transform(mut self, spec: TransformSpec) -> Self {
        self.transforms.push(spec);
        self
    }

    /// Sets the retrieval mode.
    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the source kind.
    #[must_use]
    pub fn with_source(mut self, source: SourceKind) -> Self {
        self.source = source;
        self
    }

    /// Checks option values and transform entries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.options.batch_size == 0 {
            return Err(Error::invalid_config("batch_size must be positive"));
        }
        if !self.options.delimiter.is_ascii() {
            return Err(Error::invalid_config(format!(
                "delimiter {:?} is not an ASCII character",
                self.options.delimiter
            )));
        }
        self.transforms.iter().try_for_each(TransformSpec::validate)
    }

    /// Builds the transform chain; no entries means identity.
    pub fn transform(&self) -> Box<dyn Transform> {
        match self.transforms.as_slice() {
            [] => Box::new(Identity::transform()),
            [single] => single.build(),
            many => Box::new(
                many.iter()
                    .fold(Chain::new(), |chain, spec| chain.then_boxed(spec.build())),
            ),
        }
    }

    /// Builds a filtered loader and points it at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, no source handles
    /// the path, or the source rejects the location.
    pub fn build(&self, path: impl AsRef<Path>) -> Result<Box<dyn FilteredSource>> {
        self.validate()?;
        let path = path.as_ref();

        let kind = self.source.resolve(path)?;
        let source = kind
            .create(&self.options)
            .ok_or_else(|| Error::unsupported_format(path.display().to_string()))?;
        let transform = self.transform();
        debug!(
            source = ?kind,
            transform = transform.name(),
            mode = ?self.mode,
            "building loader"
        );

        let mut loader: Box<dyn FilteredSource> = match self.mode {
            Mode::Batch => Box::new(BatchFilteredSource::new(source, transform)),
            Mode::Incremental => Box::new(IncrementalFilteredSource::new(source, transform)),
        };
        loader.set_source(SourceInput::path(path))?;
        Ok(loader)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::loader::RetrievalMode;

    fn write_csv(dir: &tempfile::TempDir, name: &str, text: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path)
            .ok()
            .unwrap_or_else(|| panic!("Should create file"));
        file.write_all(text.as_bytes()).ok();
        path
    }

    #[test]
    fn test_defaults() {
        let config = LoaderConfig::new();
        assert_eq!(config.source, SourceKind::Auto);
        assert_eq!(config.mode, Mode::Batch);
        assert!(config.options.has_header);
        assert_eq!(config.options.delimiter, ',');
        assert_eq!(config.options.batch_size, 8192);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let config = LoaderConfig::from_json_str(
            r#"{
                "source": "csv",
                "options": { "delimiter": ";", "has_header": false },
                "transforms": [
                    { "type": "select", "columns": ["a", "b"] },
                    { "type": "rename", "mapping": { "a": "x" } },
                    { "type": "cast", "column": "b", "to": "float64" },
                    { "type": "fill_null", "column": "b", "value": 0 },
                    { "type": "normalize", "method": "z_score" }
                ],
                "mode": "incremental"
            }"#,
        )
        .ok()
        .unwrap_or_else(|| panic!("Should parse"));

        assert_eq!(config.source, SourceKind::Csv);
        assert_eq!(config.options.delimiter, ';');
        assert!(!config.options.has_header);
        assert_eq!(config.options.batch_size, 8192);
        assert_eq!(config.mode, Mode::Incremental);
        assert_eq!(config.transforms.len(), 5);
        assert_eq!(
            config.transforms[3],
            TransformSpec::FillNull {
                column: "b".into(),
                value: FillValue::Int(0)
            }
        );
        assert_eq!(
            config.transforms[4],
            TransformSpec::Normalize {
                columns: None,
                method: NormKind::ZScore
            }
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = LoaderConfig::from_json_str(r#"{ "sauce": "csv" }"#);
        assert!(matches!(result, Err(Error::Parse { .. })));
    }

    #[test]
    fn test_unknown_transform_rejected() {
        let result = LoaderConfig::from_json_str(r#"{ "transforms": [{ "type": "explode" }] }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_batch_size_invalid() {
        let result = LoaderConfig::from_json_str(r#"{ "options": { "batch_size": 0 } }"#);
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_empty_select_invalid() {
        let config = LoaderConfig::new().with_transform(TransformSpec::Select { columns: vec![] });
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_non_ascii_delimiter_invalid() {
        let mut config = LoaderConfig::new();
        config.options.delimiter = 'é';
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_by_extension() {
        let kind = |p: &str| SourceKind::Auto.resolve(Path::new(p)).ok();
        assert_eq!(kind("data.csv"), Some(SourceKind::Csv));
        assert_eq!(kind("DATA.CSV"), Some(SourceKind::Csv));
        assert_eq!(kind("rows.jsonl"), Some(SourceKind::Json));
        assert_eq!(kind("rows.json"), Some(SourceKind::Json));
        assert_eq!(kind("table.parquet"), Some(SourceKind::Parquet));
        assert_eq!(kind("table.pq"), Some(SourceKind::Parquet));
        assert_eq!(kind("image.png"), None);
        assert_eq!(kind("no_extension"), None);
        assert_eq!(
            SourceKind::Csv.resolve(Path::new("anything.bin")).ok(),
            Some(SourceKind::Csv)
        );
    }

    #[test]
    fn test_transform_chain_shapes() {
        assert_eq!(LoaderConfig::new().transform().name(), "identity");

        let one = LoaderConfig::new().with_transform(TransformSpec::Drop {
            columns: vec!["x".into()],
        });
        assert_eq!(one.transform().name(), "drop");

        let two = one.with_transform(TransformSpec::Identity);
        assert_eq!(two.transform().name(), "chain");
    }

    #[test]
    fn test_build_batch_loader() {
        let dir = tempfile::tempdir()
            .ok()
            .unwrap_or_else(|| panic!("Should create temp dir"));
        let path = write_csv(&dir, "data.csv", "a,b\n1,x\n2,y\n3,z\n");

        let config = LoaderConfig::new().with_transform(TransformSpec::Select {
            columns: vec!["a".into()],
        });
        let mut loader = config
            .build(&path)
            .ok()
            .unwrap_or_else(|| panic!("Should build"));
        assert_eq!(loader.location(), Some(path.as_path()));
        assert_eq!(loader.file_extension(), ".csv");

        let data = loader
            .data_set()
            .ok()
            .unwrap_or_else(|| panic!("Should read"));
        assert_eq!(data.len(), 3);
        assert_eq!(data.schema().fields().len(), 1);
        assert!(matches!(
            loader.next_record(),
            Err(Error::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_build_incremental_loader() {
        let dir = tempfile::tempdir()
            .ok()
            .unwrap_or_else(|| panic!("Should create temp dir"));
        let path = write_csv(&dir, "data.txt", "a;b\n1;x\n2;y\n");

        let mut config = LoaderConfig::new()
            .with_source(SourceKind::Csv)
            .with_mode(Mode::Incremental);
        config.options.delimiter = ';';

        let mut loader = config
            .build(&path)
            .ok()
            .unwrap_or_else(|| panic!("Should build"));
        let structure = loader
            .structure()
            .ok()
            .unwrap_or_else(|| panic!("Should discover"));
        assert_eq!(structure.fields().len(), 2);

        let mut count = 0;
        while let Ok(Some(_)) = loader.next_record() {
            count += 1;
        }
        assert_eq!(count, 2);
        assert_eq!(loader.session().mode(), RetrievalMode::Incremental);
    }

    #[test]
    fn test_build_unknown_extension() {
        let result = LoaderConfig::new().build("notes.docx");
        assert!(matches!(result, Err(Error::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_from_json_file_missing() {
        let result = LoaderConfig::from_json_file("/no/such/config.json");
        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = LoaderConfig::new()
            .with_mode(Mode::Incremental)
            .with_transform(TransformSpec::Cast {
                column: "a".into(),
                to: ColumnType::Int64,
            });
        let text = serde_json::to_string(&config)
            .ok()
            .unwrap_or_else(|| panic!("Should serialize"));
        let parsed = LoaderConfig::from_json_str(&text)
            .ok()
            .unwrap_or_else(|| panic!("Should parse"));
        assert_eq!(parsed, config);
    }
}
