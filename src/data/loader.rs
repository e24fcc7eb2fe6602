use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};
use csv::ReaderBuilder;
use flate2::bufread::MultiGzDecoder;
use log::{debug, info, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::config::LoaderConfig;

use super::donor::derive_identifier;
use super::error::{LoaderError, Result};
use super::filter::select_files;
use super::model::{Table, Value, DONOR_ID};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Build the unified annotation table for `config`.
///
/// Lists the directory, keeps the files passing the filename filter, parses
/// each one, tags its rows with the donor identifier taken from the
/// filename, and concatenates everything. The first failing file aborts
/// the load.
pub fn load(config: &LoaderConfig) -> Result<Table> {
    let candidates = list_candidate_files(&config.directory)?;
    let selected = select_files(&candidates, config)?;

    info!("Filtered files ({}):", selected.len());
    for name in &selected {
        info!("  {name}");
    }

    let mut tables = Vec::with_capacity(selected.len());
    for name in &selected {
        let donor = derive_identifier(name)?;
        if donor.contains('.') {
            warn!("{name}: no '-' after the donor segment, identifier is '{donor}'");
        }
        info!("Parsing {name}...");
        let mut table = parse_record_file(&config.directory.join(name))?;
        debug!("{name}: {} rows, donor {donor}", table.n_rows());
        table.set_constant_column(DONOR_ID, Value::String(donor));
        tables.push(table);
    }

    let unified = Table::concat(tables);
    info!(
        "Loaded {} rows x {} columns from {} files",
        unified.n_rows(),
        unified.columns().len(),
        selected.len()
    );
    Ok(unified)
}

/// Names of the regular files in `directory`, sorted so repeated loads see
/// the same order.
pub fn list_candidate_files(directory: &Path) -> Result<Vec<String>> {
    let fs_err = |source| LoaderError::FilesystemAccess {
        path: directory.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in std::fs::read_dir(directory).map_err(fs_err)? {
        let entry = entry.map_err(fs_err)?;
        if !entry.path().is_file() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => warn!("Skipping non UTF-8 filename {raw:?}"),
        }
    }
    names.sort();
    Ok(names)
}

/// Parse one gzip-compressed, tab-separated annotation file with a header
/// row.
pub fn parse_record_file(path: &Path) -> Result<Table> {
    let reader = open_gz(path)?;
    read_delimited(reader, b'\t', path)
}

// ---------------------------------------------------------------------------
// Reading tables back
// ---------------------------------------------------------------------------

/// Read a table from disk, dispatching on the file extension.
///
/// Supported formats:
/// * `.txt.gz` / `.tsv.gz` – gzip-compressed, tab-separated
/// * `.tsv` / `.txt`       – tab-separated
/// * `.csv`                – comma-separated
/// * `.parquet`            – Parquet, one column per table column
pub fn read_table(path: &Path) -> Result<Table> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    if name.ends_with(".gz") {
        parse_record_file(path)
    } else if name.ends_with(".csv") {
        read_delimited(open(path)?, b',', path)
    } else if name.ends_with(".tsv") || name.ends_with(".txt") {
        read_delimited(open(path)?, b'\t', path)
    } else if name.ends_with(".parquet") || name.ends_with(".pq") {
        read_parquet(path)
    } else {
        Err(LoaderError::parse(path, "unsupported file extension"))
    }
}

/// First `n` lines of a gzip-compressed text file.
pub fn preview_lines(path: &Path, n: usize) -> Result<Vec<String>> {
    BufReader::new(open_gz(path)?)
        .lines()
        .take(n)
        .map(|line| {
            line.map_err(|source| LoaderError::Decompression {
                path: path.to_path_buf(),
                source,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Shared readers
// ---------------------------------------------------------------------------

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| LoaderError::FilesystemAccess {
        path: path.to_path_buf(),
        source,
    })
}

/// Decompressing reader over `path`. Handles multi-member gzip files.
pub(crate) fn open_gz(path: &Path) -> Result<MultiGzDecoder<BufReader<File>>> {
    Ok(MultiGzDecoder::new(BufReader::new(open(path)?)))
}

/// Header plus typed rows from any delimited text stream. Rows whose field
/// count differs from the header are rejected.
fn read_delimited<R: Read>(reader: R, delimiter: u8, path: &Path) -> Result<Table> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(reader);

    let header: Vec<String> = reader
        .headers()
        .map_err(|e| LoaderError::from_csv(path, e))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| LoaderError::from_csv(path, e))?;
        rows.push(record.iter().map(Value::infer).collect());
    }

    Ok(Table::from_rows(header, rows))
}

// ---------------------------------------------------------------------------
// Parquet reader
// ---------------------------------------------------------------------------

fn read_parquet(path: &Path) -> Result<Table> {
    let file = open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| LoaderError::parse(path, format!("reading parquet metadata: {e}")))?;
    let header: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder
        .build()
        .map_err(|e| LoaderError::parse(path, format!("building parquet reader: {e}")))?;

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for batch_result in reader {
        let batch = batch_result
            .map_err(|e| LoaderError::parse(path, format!("reading parquet record batch: {e}")))?;
        for row in 0..batch.num_rows() {
            rows.push(
                batch
                    .columns()
                    .iter()
                    .map(|col| extract_value(col, row))
                    .collect(),
            );
        }
    }

    Ok(Table::from_rows(header, rows))
}

/// Extract a single value from an Arrow column at a given row. Text is
/// typed by inference, as for the delimited formats.
fn extract_value(col: &ArrayRef, row: usize) -> Value {
    if col.is_null(row) {
        return Value::Null;
    }
    match col.data_type() {
        DataType::Utf8 => Value::infer(col.as_string::<i32>().value(row)),
        DataType::LargeUtf8 => Value::infer(col.as_string::<i64>().value(row)),
        DataType::Int32 => Value::Integer(col.as_primitive::<Int32Type>().value(row) as i64),
        DataType::Int64 => Value::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => Value::Float(col.as_primitive::<Float32Type>().value(row) as f64),
        DataType::Float64 => Value::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => Value::Bool(col.as_boolean().value(row)),
        other => Value::String(format!("{other:?}")),
    }
}
