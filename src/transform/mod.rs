//! Record transforms.
//!
//! A [`Transform`] is a stateful, schema-aware filter. It is configured with
//! an input structure, then processes records either as one whole dataset
//! ([`Transform::apply_batch`]) or one record at a time through the
//! `input` / `batch_finished` / `output` protocol.
//!
//! Most transforms are plain per-batch operations with a 1:1 row
//! correspondence. Those implement [`RecordMap`] and are wrapped in
//! [`Rowwise`], which supplies the stateful protocol.

use std::{collections::VecDeque, sync::Arc};

use arrow::{array::RecordBatch, datatypes::SchemaRef};

use crate::{
    dataset::ArrowDataset,
    error::{Error, Result},
};

mod numeric;
mod selection;

pub use numeric::{Cast, FillNull, FillStrategy, NormMethod, Normalize};
pub use selection::{Drop, Rename, Select};

/// A stateful record filter.
///
/// # Incremental use
///
/// The incremental protocol feeds one record through [`Transform::input`],
/// flushes with [`Transform::batch_finished`] and expects exactly one record
/// back from [`Transform::output`]. Only transforms that keep a strict 1:1
/// correspondence between input and output records are valid incrementally.
/// Aggregating, windowing or row-dropping transforms must only be used in
/// batch mode.
pub trait Transform: Send {
    /// Short name used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Configures the transform for records of `schema`, discarding any
    /// previous state. Returns `true` when the output format is known
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the schema is incompatible.
    fn set_input_format(&mut self, schema: &SchemaRef) -> Result<bool>;

    /// Returns the output structure.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no input format has been set.
    fn output_format(&self) -> Result<SchemaRef>;

    /// Filters a whole dataset in one step.
    ///
    /// # Errors
    ///
    /// Returns an error if any record cannot be processed.
    fn apply_batch(&mut self, data: &ArrowDataset) -> Result<ArrowDataset>;

    /// Queues one record for processing.
    ///
    /// # Errors
    ///
    /// Returns a processing error if the record is rejected.
    fn input(&mut self, record: RecordBatch) -> Result<()>;

    /// Signals that no more input will arrive for the current batch, flushing
    /// any buffered records to the output queue.
    ///
    /// # Errors
    ///
    /// Returns a processing error if buffered records cannot be processed.
    fn batch_finished(&mut self) -> Result<()>;

    /// Takes the next processed record, if one is ready.
    fn output(&mut self) -> Option<RecordBatch>;
}

impl Transform for Box<dyn Transform> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn set_input_format(&mut self, schema: &SchemaRef) -> Result<bool> {
        (**self).set_input_format(schema)
    }

    fn output_format(&self) -> Result<SchemaRef> {
        (**self).output_format()
    }

    fn apply_batch(&mut self, data: &ArrowDataset) -> Result<ArrowDataset> {
        (**self).apply_batch(data)
    }

    fn input(&mut self, record: RecordBatch) -> Result<()> {
        (**self).input(record)
    }

    fn batch_finished(&mut self) -> Result<()> {
        (**self).batch_finished()
    }

    fn output(&mut self) -> Option<RecordBatch> {
        (**self).output()
    }
}

/// A per-batch operation whose output has exactly one row per input row.
pub trait RecordMap: Send {
    /// Short name used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Derives the output structure from the input structure.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the input structure is incompatible.
    fn output_schema(&self, input: &SchemaRef) -> Result<SchemaRef>;

    /// Maps one batch to a batch of the output structure.
    ///
    /// # Errors
    ///
    /// Returns a processing error if the batch cannot be mapped.
    fn map(&self, batch: RecordBatch, output: &SchemaRef) -> Result<RecordBatch>;

    /// Wraps this operation into a stateful [`Transform`].
    fn rowwise(self) -> Rowwise<Self>
    where
        Self: Sized,
    {
        Rowwise::new(self)
    }
}

/// Adapts a [`RecordMap`] to the stateful [`Transform`] protocol.
///
/// Each mapped batch is checked to keep its row count and to match the
/// configured output structure.
#[derive(Debug, Clone)]
pub struct Rowwise<M> {
    op: M,
    output: Option<SchemaRef>,
    ready: VecDeque<RecordBatch>,
}

impl<M: RecordMap> Rowwise<M> {
    /// Wraps `op`.
    pub fn new(op: M) -> Self {
        Self {
            op,
            output: None,
            ready: VecDeque::new(),
        }
    }

    /// Returns the wrapped operation.
    pub fn op(&self) -> &M {
        &self.op
    }

    fn map_checked(&self, batch: RecordBatch, output: &SchemaRef) -> Result<RecordBatch> {
        let rows = batch.num_rows();
        let mapped = self.op.map(batch, output)?;

        if mapped.num_rows() != rows {
            return Err(Error::processing(format!(
                "{} produced {} rows from {} input rows",
                self.op.name(),
                mapped.num_rows(),
                rows
            )));
        }
        if mapped.schema().fields() != output.fields() {
            return Err(Error::processing(format!(
                "{} produced records that do not match its output format",
                self.op.name()
            )));
        }
        if Arc::ptr_eq(&mapped.schema(), output) {
            return Ok(mapped);
        }

        RecordBatch::try_new(Arc::clone(output), mapped.columns().to_vec()).map_err(Error::Arrow)
    }
}

impl<M: RecordMap> Transform for Rowwise<M> {
    fn name(&self) -> &'static str {
        self.op.name()
    }

    fn set_input_format(&mut self, schema: &SchemaRef) -> Result<bool> {
        self.output = None;
        self.ready.clear();
        self.output = Some(self.op.output_schema(schema)?);
        Ok(true)
    }

    fn output_format(&self) -> Result<SchemaRef> {
        self.output.clone().ok_or_else(|| {
            Error::configuration(format!("{}: no input format defined", self.op.name()))
        })
    }

    fn apply_batch(&mut self, data: &ArrowDataset) -> Result<ArrowDataset> {
        let output = self.output_format()?;
        let batches = data
            .batches()
            .iter()
            .map(|batch| self.map_checked(batch.clone(), &output))
            .collect::<Result<Vec<_>>>()?;

        ArrowDataset::with_schema(output, batches)
    }

    fn input(&mut self, record: RecordBatch) -> Result<()> {
        let output = self.output_format()?;
        let mapped = self.map_checked(record, &output)?;
        self.ready.push_back(mapped);
        Ok(())
    }

    fn batch_finished(&mut self) -> Result<()> {
        Ok(())
    }

    fn output(&mut self) -> Option<RecordBatch> {
        self.ready.pop_front()
    }
}

/// Pass-through operation. The default transform of a filtered loader.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Identity {
    /// Creates an identity transform ready to use in a loader.
    pub fn transform() -> Rowwise<Self> {
        Self.rowwise()
    }
}

impl RecordMap for Identity {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn output_schema(&self, input: &SchemaRef) -> Result<SchemaRef> {
        Ok(Arc::clone(input))
    }

    fn map(&self, batch: RecordBatch, _output: &SchemaRef) -> Result<RecordBatch> {
        Ok(batch)
    }
}

/// An operation defined by a closure over each batch.
///
/// The closure must return one row per input row. Unless
/// [`Map::with_output`] declares a different structure, the output structure
/// equals the input structure.
///
/// # Example
///
/// ```
/// use tamiz::transform::{Map, RecordMap};
///
/// let identity = Map::new(|batch| Ok(batch)).rowwise();
/// ```
pub struct Map<F>
where
    F: Fn(RecordBatch) -> Result<RecordBatch> + Send,
{
    func: F,
    output: Option<SchemaRef>,
}

impl<F> Map<F>
where
    F: Fn(RecordBatch) -> Result<RecordBatch> + Send,
{
    /// Creates a Map whose output structure equals its input structure.
    pub fn new(func: F) -> Self {
        Self { func, output: None }
    }

    /// Creates a Map that always produces records of `output`.
    pub fn with_output(output: SchemaRef, func: F) -> Self {
        Self {
            func,
            output: Some(output),
        }
    }
}

impl<F> RecordMap for Map<F>
where
    F: Fn(RecordBatch) -> Result<RecordBatch> + Send,
{
    fn name(&self) -> &'static str {
        "map"
    }

    fn output_schema(&self, input: &SchemaRef) -> Result<SchemaRef> {
        Ok(Arc::clone(self.output.as_ref().unwrap_or(input)))
    }

    fn map(&self, batch: RecordBatch, _output: &SchemaRef) -> Result<RecordBatch> {
        (self.func)(batch)
    }
}

/// A chain of transforms applied in sequence.
///
/// Each stage is configured with the output format of the stage before it.
/// An empty chain passes records through unchanged.
///
/// # Example
///
/// ```
/// use tamiz::transform::{Chain, RecordMap, Rename, Select};
///
/// let chain = Chain::new()
///     .then(Select::new(vec!["id", "value"]).rowwise())
///     .then(Rename::from_pairs([("value", "score")]).rowwise());
/// assert_eq!(chain.len(), 2);
/// ```
#[derive(Default)]
pub struct Chain {
    stages: Vec<Box<dyn Transform>>,
    output: Option<SchemaRef>,
    ready: VecDeque<RecordBatch>,
}

impl Chain {
    /// Creates a new empty transform chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a transform to the chain.
    #[must_use]
    pub fn then<T: Transform + 'static>(mut self, transform: T) -> Self {
        self.stages.push(Box::new(transform));
        self
    }

    /// Adds an already boxed transform to the chain.
    #[must_use]
    pub fn then_boxed(mut self, transform: Box<dyn Transform>) -> Self {
        self.stages.push(transform);
        self
    }

    /// Returns the number of transforms in the chain.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the chain has no transforms.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.stages.iter().map(|s| s.name()).collect();
        f.debug_struct("Chain")
            .field("stages", &names)
            .field("configured", &self.output.is_some())
            .finish_non_exhaustive()
    }
}

impl Transform for Chain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn set_input_format(&mut self, schema: &SchemaRef) -> Result<bool> {
        self.output = None;
        self.ready.clear();

        let mut current = Arc::clone(schema);
        for stage in &mut self.stages {
            stage.set_input_format(&current)?;
            current = stage.output_format()?;
        }

        self.output = Some(current);
        Ok(true)
    }

    fn output_format(&self) -> Result<SchemaRef> {
        self.output
            .clone()
            .ok_or_else(|| Error::configuration("chain: no input format defined"))
    }

    fn apply_batch(&mut self, data: &ArrowDataset) -> Result<ArrowDataset> {
        self.output_format()?;

        let mut current = data.clone();
        for stage in &mut self.stages {
            current = stage.apply_batch(&current)?;
        }
        Ok(current)
    }

    fn input(&mut self, record: RecordBatch) -> Result<()> {
        self.output_format()?;

        match self.stages.first_mut() {
            Some(first) => first.input(record),
            None => {
                self.ready.push_back(record);
                Ok(())
            }
        }
    }

    fn batch_finished(&mut self) -> Result<()> {
        let count = self.stages.len();
        for i in 0..count {
            self.stages[i].batch_finished()?;
            while let Some(record) = self.stages[i].output() {
                match self.stages.get_mut(i + 1) {
                    Some(next) => next.input(record)?,
                    None => self.ready.push_back(record),
                }
            }
        }
        Ok(())
    }

    fn output(&mut self) -> Option<RecordBatch> {
        self.ready.pop_front()
    }
}
