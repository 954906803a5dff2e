//! Column selection and renaming operations.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use arrow::{
    array::RecordBatch,
    datatypes::{Field, Schema, SchemaRef},
};

use super::RecordMap;
use crate::error::{Error, Result};

/// Looks up `name` in `schema`, reporting a configuration error if missing.
fn position(schema: &SchemaRef, name: &str) -> Result<usize> {
    schema
        .index_of(name)
        .map_err(|_| Error::configuration(format!("Column '{}' not found in input format", name)))
}

/// Projects `batch` onto the input positions of the output columns.
fn project(batch: &RecordBatch, indices: &[usize], output: &SchemaRef) -> Result<RecordBatch> {
    let arrays = indices
        .iter()
        .map(|&idx| {
            batch
                .columns()
                .get(idx)
                .map(Arc::clone)
                .ok_or_else(|| Error::processing(format!("Record has no column {}", idx)))
        })
        .collect::<Result<Vec<_>>>()?;

    RecordBatch::try_new(Arc::clone(output), arrays).map_err(Error::Arrow)
}

/// Keeps only the named columns, in the given order.
///
/// # Example
///
/// ```
/// use tamiz::transform::{RecordMap, Select};
///
/// let select = Select::new(vec!["id", "name"]).rowwise();
/// ```
#[derive(Debug, Clone)]
pub struct Select {
    columns: Vec<String>,
}

impl Select {
    /// Creates a new Select operation for the given column names.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the columns to be selected.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn indices(&self, schema: &SchemaRef) -> Result<Vec<usize>> {
        self.columns
            .iter()
            .map(|name| position(schema, name))
            .collect()
    }
}

impl RecordMap for Select {
    fn name(&self) -> &'static str {
        "select"
    }

    fn output_schema(&self, input: &SchemaRef) -> Result<SchemaRef> {
        if self.columns.is_empty() {
            return Err(Error::configuration("select: no columns given"));
        }

        let fields: Vec<Field> = self
            .indices(input)?
            .into_iter()
            .map(|idx| input.field(idx).clone())
            .collect();
        Ok(Arc::new(Schema::new(fields)))
    }

    fn map(&self, batch: RecordBatch, output: &SchemaRef) -> Result<RecordBatch> {
        let indices = self.indices(&batch.schema())?;
        project(&batch, &indices, output)
    }
}

/// Removes the named columns.
///
/// # Example
///
/// ```
/// use tamiz::transform::{Drop, RecordMap};
///
/// let drop = Drop::new(vec!["temp_column", "debug_info"]).rowwise();
/// ```
#[derive(Debug, Clone)]
pub struct Drop {
    columns: Vec<String>,
}

impl Drop {
    /// Creates a new Drop operation for the given column names.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the columns to be dropped.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn kept(&self, schema: &SchemaRef) -> Vec<usize> {
        let drop_set: HashSet<&str> = self.columns.iter().map(String::as_str).collect();
        schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(_, field)| !drop_set.contains(field.name().as_str()))
            .map(|(idx, _)| idx)
            .collect()
    }
}

impl RecordMap for Drop {
    fn name(&self) -> &'static str {
        "drop"
    }

    fn output_schema(&self, input: &SchemaRef) -> Result<SchemaRef> {
        for name in &self.columns {
            position(input, name)?;
        }

        let kept = self.kept(input);
        if kept.is_empty() {
            return Err(Error::configuration("drop: cannot drop all columns"));
        }

        let fields: Vec<Field> = kept.into_iter().map(|idx| input.field(idx).clone()).collect();
        Ok(Arc::new(Schema::new(fields)))
    }

    fn map(&self, batch: RecordBatch, output: &SchemaRef) -> Result<RecordBatch> {
        let kept = self.kept(&batch.schema());
        project(&batch, &kept, output)
    }
}

/// Renames columns, leaving their values and order unchanged.
///
/// # Example
///
/// ```
/// use tamiz::transform::{RecordMap, Rename};
///
/// let rename = Rename::from_pairs([("old_name", "new_name")]).rowwise();
/// ```
#[derive(Debug, Clone)]
pub struct Rename {
    mapping: HashMap<String, String>,
}

impl Rename {
    /// Creates a new Rename operation with the given column mappings.
    pub fn new(mapping: HashMap<String, String>) -> Self {
        Self { mapping }
    }

    /// Creates a Rename operation from pairs of (old_name, new_name).
    pub fn from_pairs<S: Into<String>>(pairs: impl IntoIterator<Item = (S, S)>) -> Self {
        let mapping = pairs
            .into_iter()
            .map(|(old, new)| (old.into(), new.into()))
            .collect();
        Self { mapping }
    }
}

impl RecordMap for Rename {
    fn name(&self) -> &'static str {
        "rename"
    }

    fn output_schema(&self, input: &SchemaRef) -> Result<SchemaRef> {
        for old in self.mapping.keys() {
            position(input, old)?;
        }

        let fields: Vec<Field> = input
            .fields()
            .iter()
            .map(|field| match self.mapping.get(field.name()) {
                Some(new_name) => field.as_ref().clone().with_name(new_name),
                None => field.as_ref().clone(),
            })
            .collect();

        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name().as_str()) {
                return Err(Error::configuration(format!(
                    "rename: duplicate column '{}'",
                    field.name()
                )));
            }
        }

        Ok(Arc::new(Schema::new(fields)))
    }

    fn map(&self, batch: RecordBatch, output: &SchemaRef) -> Result<RecordBatch> {
        RecordBatch::try_new(Arc::clone(output), batch.columns().to_vec()).map_err(Error::Arrow)
    }
}

#[cfg(test)]
mod tests {
    use arrow::{
        array::{Int32Array, StringArray},
        datatypes::DataType,
    };

    use super::*;
    use crate::{
        dataset::ArrowDataset,
        transform::{Rowwise, Transform},
    };

    fn create_test_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int32, false),
            Field::new("name", DataType::Utf8, false),
            Field::new("value", DataType::Int32, false),
        ]));

        let id_array = Int32Array::from(vec![1, 2, 3, 4, 5]);
        let name_array = StringArray::from(vec!["a", "b", "c", "d", "e"]);
        let value_array = Int32Array::from(vec![10, 20, 30, 40, 50]);

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(id_array),
                Arc::new(name_array),
                Arc::new(value_array),
            ],
        )
        .ok()
        .unwrap_or_else(|| panic!("Should create batch"))
    }

    fn run<M: RecordMap>(op: M) -> Result<ArrowDataset> {
        let batch = create_test_batch();
        let mut transform = Rowwise::new(op);
        transform.set_input_format(&batch.schema())?;
        transform.apply_batch(&ArrowDataset::from_batch(batch)?)
    }

    #[test]
    fn test_select_columns() {
        let result = run(Select::new(vec!["id", "value"]))
            .ok()
            .unwrap_or_else(|| panic!("Should succeed"));

        let schema = result.schema();
        assert_eq!(schema.fields().len(), 2);
        assert_eq!(schema.field(0).name(), "id");
        assert_eq!(schema.field(1).name(), "value");
        assert_eq!(result.len(), 5);
    }

    #[test]
    fn test_select_reorders() {
        let result = run(Select::new(vec!["value", "id"]))
            .ok()
            .unwrap_or_else(|| panic!("Should succeed"));
        assert_eq!(result.schema().field(0).name(), "value");
    }

    #[test]
    fn test_select_missing_column_is_configuration_error() {
        let result = run(Select::new(vec!["id", "nonexistent"]));
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    #[test]
    fn test_select_nothing_is_error() {
        let result = run(Select::new(Vec::<String>::new()));
        assert!(result.is_err());
    }

    #[test]
    fn test_select_columns_getter() {
        let select = Select::new(vec!["a", "b"]);
        assert_eq!(select.columns(), &["a", "b"]);
    }

    #[test]
    fn test_drop_columns() {
        let result = run(Drop::new(vec!["name"]))
            .ok()
            .unwrap_or_else(|| panic!("Should succeed"));

        let schema = result.schema();
        assert_eq!(schema.fields().len(), 2);
        assert!(schema.field_with_name("name").is_err());
    }

    #[test]
    fn test_drop_all_columns_error() {
        let result = run(Drop::new(vec!["id", "name", "value"]));
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    #[test]
    fn test_drop_unknown_column_error() {
        let result = run(Drop::new(vec!["missing"]));
        assert!(result.is_err());
    }

    #[test]
    fn test_drop_columns_getter() {
        let drop = Drop::new(vec!["x"]);
        assert_eq!(drop.columns(), &["x"]);
    }

    #[test]
    fn test_rename_columns() {
        let result = run(Rename::from_pairs([("id", "identifier"), ("value", "amount")]))
            .ok()
            .unwrap_or_else(|| panic!("Should succeed"));

        let schema = result.schema();
        assert_eq!(schema.field(0).name(), "identifier");
        assert_eq!(schema.field(1).name(), "name");
        assert_eq!(schema.field(2).name(), "amount");
    }

    #[test]
    fn test_rename_from_map() {
        let mut mapping = HashMap::new();
        mapping.insert("name".to_string(), "label".to_string());
        let result = run(Rename::new(mapping))
            .ok()
            .unwrap_or_else(|| panic!("Should succeed"));
        assert!(result.schema().field_with_name("label").is_ok());
    }

    #[test]
    fn test_rename_collision_error() {
        let result = run(Rename::from_pairs([("id", "name")]));
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    #[test]
    fn test_rename_missing_column_error() {
        let result = run(Rename::from_pairs([("missing", "other")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_select_single_record() {
        let batch = create_test_batch();
        let mut transform = Select::new(vec!["name"]).rowwise();
        transform.set_input_format(&batch.schema()).ok();

        transform.input(batch.slice(2, 1)).ok();
        transform.batch_finished().ok();
        let out = transform
            .output()
            .unwrap_or_else(|| panic!("Should produce record"));

        let name = out
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .map(|a| a.value(0).to_string());
        assert_eq!(name.as_deref(), Some("c"));
    }
}
