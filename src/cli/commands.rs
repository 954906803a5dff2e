//! Subcommand implementations.

use std::io::{self, Write};

use arrow::{datatypes::SchemaRef, util::pretty::pretty_format_batches};

use super::{LoaderArgs, OutputFormat};
use crate::{
    config::{LoaderConfig, Mode, SourceKind, SourceOptions, TransformSpec},
    dataset::ArrowDataset,
    error::{Error, Result},
    loader::FilteredSource,
};

/// Builds the loader configuration from a config file and flags.
pub(crate) fn loader_config(args: &LoaderArgs) -> Result<LoaderConfig> {
    let mut config = match &args.config {
        Some(path) => LoaderConfig::from_json_file(path)?,
        None => LoaderConfig::new(),
    };

    if let Some(source) = args.source {
        config.source = source;
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if args.no_header {
        config.options.has_header = false;
    }
    if let Some(delimiter) = args.delimiter {
        config.options.delimiter = delimiter;
    }

    if !args.select.is_empty() {
        config.transforms.push(TransformSpec::Select {
            columns: args.select.clone(),
        });
    }
    if !args.drop.is_empty() {
        config.transforms.push(TransformSpec::Drop {
            columns: args.drop.clone(),
        });
    }
    if !args.rename.is_empty() {
        let mapping = args
            .rename
            .iter()
            .map(|pair| {
                pair.split_once('=')
                    .map(|(old, new)| (old.to_string(), new.to_string()))
                    .ok_or_else(|| {
                        Error::invalid_config(format!("--rename expects old=new, got '{}'", pair))
                    })
            })
            .collect::<Result<_>>()?;
        config.transforms.push(TransformSpec::Rename { mapping });
    }
    if !args.normalize.is_empty() {
        config.transforms.push(TransformSpec::Normalize {
            columns: Some(args.normalize.clone()),
            method: args.norm_method,
        });
    }

    config.validate()?;
    Ok(config)
}

/// Writes `data` to `out` in the requested format.
fn write_dataset<W: Write>(data: &ArrowDataset, format: OutputFormat, mut out: W) -> Result<()> {
    match format {
        OutputFormat::Table if data.is_empty() => {
            writeln!(out, "No records (columns: {})", column_names(&data.schema()))
                .map_err(Error::io_no_path)?;
        }
        OutputFormat::Table => {
            let table = pretty_format_batches(data.batches()).map_err(Error::Arrow)?;
            writeln!(out, "{}", table).map_err(Error::io_no_path)?;
        }
        OutputFormat::Csv => data.write_csv(&mut out)?,
        OutputFormat::Json => data.write_json(&mut out)?,
    }
    out.flush().map_err(Error::io_no_path)
}

fn column_names(structure: &SchemaRef) -> String {
    structure
        .fields()
        .iter()
        .map(|f| f.name().as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Loads the file and prints the filtered records.
pub(crate) fn cmd_load(args: &LoaderArgs, format: OutputFormat) -> Result<()> {
    let config = loader_config(args)?;
    let mut loader = config.build(&args.path)?;

    let data = match config.mode {
        Mode::Batch => loader.data_set()?,
        Mode::Incremental => {
            let structure = loader.structure()?;
            let mut records = Vec::new();
            while let Some(record) = loader.next_record()? {
                records.push(record);
            }
            ArrowDataset::with_schema(structure, records)?
        }
    };

    write_dataset(&data, format, io::stdout().lock())
}

/// Prints the filtered structure of the file.
pub(crate) fn cmd_schema(args: &LoaderArgs) -> Result<()> {
    let config = loader_config(args)?.with_mode(Mode::Incremental);
    let mut loader = config.build(&args.path)?;
    let structure = loader.structure()?;

    println!("Schema for {}:", args.path.display());
    println!();

    for (i, field) in structure.fields().iter().enumerate() {
        let nullable = if field.is_nullable() {
            "nullable"
        } else {
            "not null"
        };
        println!(
            "  {}: {} ({}) [{}]",
            i,
            field.name(),
            field.data_type(),
            nullable
        );
    }

    println!();
    println!("Total columns: {}", structure.fields().len());

    Ok(())
}

/// Lists each source kind with its extensions.
pub(crate) fn cmd_formats() -> Result<()> {
    let options = SourceOptions::default();
    for kind in SourceKind::CONCRETE {
        let Some(source) = kind.create(&options) else {
            continue;
        };
        println!(
            "{:<8} {:<28} {}",
            kind.name(),
            source.file_extensions().join(", "),
            source.description()
        );
    }
    Ok(())
}
