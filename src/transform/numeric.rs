//! Numeric operations: casting, null filling, and normalization.

use std::{collections::VecDeque, sync::Arc};

use arrow::{
    array::{
        Array, ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, Scalar, StringArray,
    },
    compute::{can_cast_types, cast, is_null, kernels::zip::zip},
    datatypes::{DataType, Field, Schema, SchemaRef},
};
use tracing::debug;

use super::{RecordMap, Transform};
use crate::{
    dataset::ArrowDataset,
    error::{Error, Result},
};

fn is_numeric_type(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float16
            | DataType::Float32
            | DataType::Float64
    )
}

fn column_index(schema: &SchemaRef, name: &str) -> Result<usize> {
    schema
        .index_of(name)
        .map_err(|_| Error::configuration(format!("Column '{}' not found in input format", name)))
}

/// Casts columns to different data types.
///
/// # Example
///
/// ```
/// use arrow::datatypes::DataType;
/// use tamiz::transform::{Cast, RecordMap};
///
/// let cast = Cast::new(vec![
///     ("id", DataType::Int64),
///     ("value", DataType::Float64),
/// ])
/// .rowwise();
/// ```
#[derive(Debug, Clone)]
pub struct Cast {
    mappings: Vec<(String, DataType)>,
}

impl Cast {
    /// Creates a new Cast operation with column-to-type mappings.
    pub fn new<S: Into<String>>(mappings: impl IntoIterator<Item = (S, DataType)>) -> Self {
        Self {
            mappings: mappings
                .into_iter()
                .map(|(name, dtype)| (name.into(), dtype))
                .collect(),
        }
    }

    /// Returns the cast mappings.
    pub fn mappings(&self) -> &[(String, DataType)] {
        &self.mappings
    }
}

impl RecordMap for Cast {
    fn name(&self) -> &'static str {
        "cast"
    }

    fn output_schema(&self, input: &SchemaRef) -> Result<SchemaRef> {
        let mut fields: Vec<Field> = input.fields().iter().map(|f| f.as_ref().clone()).collect();

        for (name, target) in &self.mappings {
            let idx = column_index(input, name)?;
            let source = input.field(idx).data_type();
            if !can_cast_types(source, target) {
                return Err(Error::configuration(format!(
                    "Cannot cast column '{}' from {:?} to {:?}",
                    name, source, target
                )));
            }
            fields[idx] = fields[idx].clone().with_data_type(target.clone());
        }

        Ok(Arc::new(Schema::new(fields)))
    }

    fn map(&self, batch: RecordBatch, output: &SchemaRef) -> Result<RecordBatch> {
        let arrays = batch
            .columns()
            .iter()
            .zip(output.fields().iter())
            .map(|(col, field)| {
                if col.data_type() == field.data_type() {
                    return Ok(Arc::clone(col));
                }
                cast(col.as_ref(), field.data_type()).map_err(|e| {
                    Error::processing(format!(
                        "Failed to cast column '{}' to {:?}: {}",
                        field.name(),
                        field.data_type(),
                        e
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        RecordBatch::try_new(Arc::clone(output), arrays).map_err(Error::Arrow)
    }
}

/// Strategy for filling null values.
#[derive(Debug, Clone, PartialEq)]
pub enum FillStrategy {
    /// Fill with a constant integer value
    Int(i64),
    /// Fill with a constant float value
    Float(f64),
    /// Fill with a constant string value
    String(String),
    /// Fill with a constant boolean value
    Bool(bool),
    /// Fill with zero (numeric columns only)
    Zero,
}

impl FillStrategy {
    fn literal(&self) -> ArrayRef {
        match self {
            Self::Int(v) => Arc::new(Int64Array::from(vec![*v])),
            Self::Float(v) => Arc::new(Float64Array::from(vec![*v])),
            Self::String(s) => Arc::new(StringArray::from(vec![s.as_str()])),
            Self::Bool(b) => Arc::new(BooleanArray::from(vec![*b])),
            Self::Zero => Arc::new(Int64Array::from(vec![0_i64])),
        }
    }
}

/// Replaces null values in one column with a constant.
///
/// The constant is converted to the column's type when the operation is
/// configured, so an integer fill works for float columns as well.
///
/// # Example
///
/// ```
/// use tamiz::transform::{FillNull, FillStrategy, RecordMap};
///
/// let fill = FillNull::new("score", FillStrategy::Float(0.0)).rowwise();
/// ```
#[derive(Debug, Clone)]
pub struct FillNull {
    column: String,
    strategy: FillStrategy,
}

impl FillNull {
    /// Creates a FillNull operation for the specified column.
    pub fn new<S: Into<String>>(column: S, strategy: FillStrategy) -> Self {
        Self {
            column: column.into(),
            strategy,
        }
    }

    /// Creates a FillNull operation that fills with zero.
    pub fn with_zero<S: Into<String>>(column: S) -> Self {
        Self::new(column, FillStrategy::Zero)
    }

    /// Returns the column name.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Returns the fill strategy.
    pub fn strategy(&self) -> &FillStrategy {
        &self.strategy
    }

    fn fill_value(&self, target: &DataType) -> Result<ArrayRef> {
        if self.strategy == FillStrategy::Zero && !is_numeric_type(target) {
            return Err(Error::configuration(format!(
                "Zero fill requires a numeric column, '{}' is {:?}",
                self.column, target
            )));
        }

        let literal = self.strategy.literal();
        if !can_cast_types(literal.data_type(), target) {
            return Err(Error::configuration(format!(
                "Fill value {:?} does not fit column '{}' of type {:?}",
                self.strategy, self.column, target
            )));
        }

        let value = cast(literal.as_ref(), target).map_err(|e| {
            Error::configuration(format!(
                "Fill value {:?} does not fit column '{}': {}",
                self.strategy, self.column, e
            ))
        })?;
        if value.is_null(0) {
            return Err(Error::configuration(format!(
                "Fill value {:?} is out of range for column '{}'",
                self.strategy, self.column
            )));
        }
        Ok(value)
    }
}

impl RecordMap for FillNull {
    fn name(&self) -> &'static str {
        "fill_null"
    }

    fn output_schema(&self, input: &SchemaRef) -> Result<SchemaRef> {
        let idx = column_index(input, &self.column)?;
        self.fill_value(input.field(idx).data_type())?;
        Ok(Arc::clone(input))
    }

    fn map(&self, batch: RecordBatch, output: &SchemaRef) -> Result<RecordBatch> {
        let idx = column_index(output, &self.column)?;
        let col = batch
            .columns()
            .get(idx)
            .ok_or_else(|| Error::processing(format!("Record has no column {}", idx)))?;
        if col.null_count() == 0 {
            return Ok(batch);
        }

        let fill = Scalar::new(self.fill_value(col.data_type())?);
        let mask = is_null(col.as_ref()).map_err(Error::Arrow)?;
        let filled = zip(&mask, &fill, col).map_err(Error::Arrow)?;

        let mut arrays = batch.columns().to_vec();
        arrays[idx] = filled;
        RecordBatch::try_new(Arc::clone(output), arrays).map_err(Error::Arrow)
    }
}

/// Normalization method for numeric columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormMethod {
    /// Min-max normalization: (x - min) / (max - min), scales to [0, 1]
    MinMax,
    /// Z-score normalization: (x - mean) / std, centers around 0
    ZScore,
    /// Scale to unit length (L2 norm)
    L2,
}

/// Running statistics of one column.
#[derive(Debug, Clone, Copy)]
struct Accumulator {
    count: usize,
    sum: f64,
    sum_sq: f64,
    min: f64,
    max: f64,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            sum_sq: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl Accumulator {
    fn push_all(&mut self, values: &Float64Array) {
        for v in values.iter().flatten() {
            self.count += 1;
            self.sum += v;
            self.sum_sq += v * v;
            self.min = self.min.min(v);
            self.max = self.max.max(v);
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(&self, method: NormMethod) -> Scale {
        if self.count == 0 {
            return Scale {
                offset: 0.0,
                divisor: 0.0,
            };
        }

        match method {
            NormMethod::MinMax => Scale {
                offset: self.min,
                divisor: self.max - self.min,
            },
            NormMethod::ZScore => {
                let n = self.count as f64;
                let mean = self.sum / n;
                let variance = (self.sum_sq / n - mean * mean).max(0.0);
                Scale {
                    offset: mean,
                    divisor: variance.sqrt(),
                }
            }
            NormMethod::L2 => Scale {
                offset: 0.0,
                divisor: self.sum_sq.sqrt(),
            },
        }
    }
}

/// Fitted parameters of one column: `(x - offset) / divisor`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Scale {
    offset: f64,
    divisor: f64,
}

impl Scale {
    fn apply(self, values: &Float64Array) -> Float64Array {
        values
            .iter()
            .map(|v| {
                v.map(|v| {
                    if self.divisor == 0.0 {
                        0.0
                    } else {
                        (v - self.offset) / self.divisor
                    }
                })
            })
            .collect()
    }
}

fn as_float(col: &ArrayRef) -> Result<Float64Array> {
    let casted = cast(col.as_ref(), &DataType::Float64).map_err(|e| {
        Error::processing(format!("Failed to cast to Float64: {}", e))
    })?;
    casted
        .as_any()
        .downcast_ref::<Float64Array>()
        .cloned()
        .ok_or_else(|| Error::processing("Expected Float64Array after cast"))
}

/// Normalizes numeric columns to `Float64`.
///
/// Normalization statistics are fitted on the first batch processed after
/// [`Transform::set_input_format`] and reused for every later batch. When
/// used record by record, the first record is that batch, so for
/// meaningful statistics prefer batch retrieval.
///
/// # Example
///
/// ```
/// use tamiz::transform::{NormMethod, Normalize};
///
/// // Min-max normalize specific columns
/// let normalize = Normalize::new(vec!["feature1", "feature2"], NormMethod::MinMax);
///
/// // Z-score normalize all numeric columns
/// let normalize = Normalize::all_numeric(NormMethod::ZScore);
/// ```
#[derive(Debug, Clone)]
pub struct Normalize {
    columns: Option<Vec<String>>,
    method: NormMethod,
    output: Option<SchemaRef>,
    targets: Vec<usize>,
    scales: Option<Vec<Scale>>,
    pending: Vec<RecordBatch>,
    ready: VecDeque<RecordBatch>,
}

impl Normalize {
    /// Creates a Normalize transform for specific columns.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>, method: NormMethod) -> Self {
        Self::build(Some(columns.into_iter().map(Into::into).collect()), method)
    }

    /// Creates a Normalize transform that applies to all numeric columns.
    pub fn all_numeric(method: NormMethod) -> Self {
        Self::build(None, method)
    }

    fn build(columns: Option<Vec<String>>, method: NormMethod) -> Self {
        Self {
            columns,
            method,
            output: None,
            targets: Vec::new(),
            scales: None,
            pending: Vec::new(),
            ready: VecDeque::new(),
        }
    }

    /// Returns the columns to normalize (None means all numeric).
    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    /// Returns the normalization method.
    pub fn method(&self) -> NormMethod {
        self.method
    }

    /// Returns true once normalization statistics have been fitted.
    pub fn is_fitted(&self) -> bool {
        self.scales.is_some()
    }

    fn resolve_targets(&self, schema: &SchemaRef) -> Result<Vec<usize>> {
        let targets = match &self.columns {
            Some(names) => names
                .iter()
                .map(|name| {
                    let idx = column_index(schema, name)?;
                    let dtype = schema.field(idx).data_type();
                    if !is_numeric_type(dtype) {
                        return Err(Error::configuration(format!(
                            "Column '{}' is not numeric (type: {:?})",
                            name, dtype
                        )));
                    }
                    Ok(idx)
                })
                .collect::<Result<Vec<_>>>()?,
            None => schema
                .fields()
                .iter()
                .enumerate()
                .filter(|(_, f)| is_numeric_type(f.data_type()))
                .map(|(idx, _)| idx)
                .collect(),
        };

        if targets.is_empty() {
            return Err(Error::configuration("normalize: no numeric columns"));
        }
        Ok(targets)
    }

    fn fit(&mut self, batches: &[RecordBatch]) -> Result<()> {
        let mut accumulators = vec![Accumulator::default(); self.targets.len()];
        for batch in batches {
            for (acc, &idx) in accumulators.iter_mut().zip(&self.targets) {
                acc.push_all(&as_float(self.column(batch, idx)?)?);
            }
        }

        let scales: Vec<Scale> = accumulators.iter().map(|a| a.finish(self.method)).collect();
        debug!(columns = scales.len(), method = ?self.method, "fitted normalization");
        self.scales = Some(scales);
        Ok(())
    }

    fn column<'a>(&self, batch: &'a RecordBatch, idx: usize) -> Result<&'a ArrayRef> {
        batch
            .columns()
            .get(idx)
            .ok_or_else(|| Error::processing(format!("Record has no column {}", idx)))
    }

    fn normalize(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let output = self.output_format()?;
        let scales = self
            .scales
            .as_ref()
            .ok_or_else(|| Error::processing("normalize: statistics not fitted"))?;
        if batch.num_columns() != output.fields().len() {
            return Err(Error::processing(format!(
                "normalize: expected {} columns, got {}",
                output.fields().len(),
                batch.num_columns()
            )));
        }

        let mut arrays = batch.columns().to_vec();
        for (scale, &idx) in scales.iter().zip(&self.targets) {
            let values = as_float(self.column(batch, idx)?)?;
            arrays[idx] = Arc::new(scale.apply(&values));
        }

        RecordBatch::try_new(output, arrays).map_err(Error::Arrow)
    }
}

impl Transform for Normalize {
    fn name(&self) -> &'static str {
        "normalize"
    }

    fn set_input_format(&mut self, schema: &SchemaRef) -> Result<bool> {
        self.output = None;
        self.scales = None;
        self.pending.clear();
        self.ready.clear();

        let targets = self.resolve_targets(schema)?;
        let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
        for &idx in &targets {
            fields[idx] = fields[idx].clone().with_data_type(DataType::Float64);
        }

        self.targets = targets;
        self.output = Some(Arc::new(Schema::new(fields)));
        Ok(true)
    }

    fn output_format(&self) -> Result<SchemaRef> {
        self.output
            .clone()
            .ok_or_else(|| Error::configuration("normalize: no input format defined"))
    }

    fn apply_batch(&mut self, data: &ArrowDataset) -> Result<ArrowDataset> {
        let output = self.output_format()?;
        if self.scales.is_none() {
            self.fit(data.batches())?;
        }

        let batches = data
            .batches()
            .iter()
            .map(|batch| self.normalize(batch))
            .collect::<Result<Vec<_>>>()?;
        ArrowDataset::with_schema(output, batches)
    }

    fn input(&mut self, record: RecordBatch) -> Result<()> {
        self.output_format()?;
        if self.scales.is_some() {
            let normalized = self.normalize(&record)?;
            self.ready.push_back(normalized);
        } else {
            self.pending.push(record);
        }
        Ok(())
    }

    fn batch_finished(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let pending = std::mem::take(&mut self.pending);
        if self.scales.is_none() {
            self.fit(&pending)?;
        }
        for record in &pending {
            let normalized = self.normalize(record)?;
            self.ready.push_back(normalized);
        }
        Ok(())
    }

    fn output(&mut self) -> Option<RecordBatch> {
        self.ready.pop_front()
    }
}
