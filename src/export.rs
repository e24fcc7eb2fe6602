use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde::Serialize;

use crate::analysis::frequency::{by_donor, DonorCellTypeFrequency};
use crate::data::model::{Column, Table, Value};

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Write the table as CSV with a header row. `Null` becomes an empty field.
pub fn write_table_csv(table: &Table, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer
        .write_record(table.column_names())
        .context("writing CSV header")?;
    for i in 0..table.n_rows() {
        writer
            .write_record(table.row(i).iter().map(|v| v.to_field()))
            .with_context(|| format!("writing CSV row {i}"))?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

/// Write serializable records (one struct per row) as CSV; field names
/// become the header.
pub fn write_records_csv<T: Serialize>(records: &[T], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for record in records {
        writer
            .serialize(record)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Text dump
// ---------------------------------------------------------------------------

/// Human-readable per-donor cell type counts.
pub fn write_donor_counts_text(rows: &[DonorCellTypeFrequency], path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for (donor, cell_types) in by_donor(rows) {
        let total: usize = cell_types.iter().map(|r| r.count).sum();
        writeln!(out, "Donor {donor} ({total} cells):")?;
        for row in cell_types {
            writeln!(
                out,
                "  {}: {} ({:.2}%)",
                row.cell_type,
                row.count,
                row.frequency * 100.0
            )?;
        }
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

/// Arrow type for a column whose non-null values all share one variant.
/// Mixed columns are stored as text in their field form and re-typed on
/// read, so `Integer(3)` next to `Float(0.5)` stays an integer.
fn arrow_type(col: &Column) -> DataType {
    let mut non_null = col.values.iter().filter(|v| !v.is_null()).peekable();
    if non_null.peek().is_none() {
        return DataType::Utf8;
    }
    let (mut ints, mut floats, mut bools) = (true, true, true);
    for v in non_null {
        ints &= matches!(v, Value::Integer(_));
        floats &= matches!(v, Value::Float(_));
        bools &= matches!(v, Value::Bool(_));
    }
    if ints {
        DataType::Int64
    } else if floats {
        DataType::Float64
    } else if bools {
        DataType::Boolean
    } else {
        DataType::Utf8
    }
}

fn arrow_array(col: &Column, data_type: &DataType) -> ArrayRef {
    match data_type {
        DataType::Int64 => Arc::new(Int64Array::from(
            col.values
                .iter()
                .map(|v| match v {
                    Value::Integer(i) => Some(*i),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        DataType::Float64 => Arc::new(Float64Array::from(
            col.values.iter().map(Value::as_f64).collect::<Vec<_>>(),
        )),
        DataType::Boolean => Arc::new(BooleanArray::from(
            col.values
                .iter()
                .map(|v| match v {
                    Value::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        _ => Arc::new(StringArray::from(
            col.values
                .iter()
                .map(|v| (!v.is_null()).then(|| v.to_field()))
                .collect::<Vec<_>>(),
        )),
    }
}

/// Write the table as a single-batch Parquet file, every column nullable.
pub fn write_table_parquet(table: &Table, path: &Path) -> Result<()> {
    let types: Vec<DataType> = table.columns().iter().map(arrow_type).collect();
    let schema = Arc::new(Schema::new(
        table
            .columns()
            .iter()
            .zip(&types)
            .map(|(col, t)| Field::new(col.name.as_str(), t.clone(), true))
            .collect::<Vec<_>>(),
    ));
    let arrays: Vec<ArrayRef> = table
        .columns()
        .iter()
        .zip(&types)
        .map(|(col, t)| arrow_array(col, t))
        .collect();
    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::frequency::{cell_type_frequencies, donor_cell_type_frequencies};
    use crate::data::loader::read_table;
    use crate::data::model::{CELL_TYPE, DONOR_ID};

    fn unified() -> Table {
        let a = Table::from_rows(
            vec!["Cell".into(), CELL_TYPE.into(), "Score".into(), DONOR_ID.into()],
            vec![
                vec!["c1".into(), "T".into(), Value::Float(2.0), "X1".into()],
                vec!["c2".into(), "B".into(), Value::Float(0.5), "X1".into()],
            ],
        );
        let b = Table::from_rows(
            vec!["Cell".into(), CELL_TYPE.into(), DONOR_ID.into(), "NumberOfReads".into()],
            vec![vec!["c3".into(), "T".into(), "X2".into(), Value::Integer(812)]],
        );
        Table::concat(vec![a, b])
    }

    #[test]
    fn csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotations_filtered.csv");
        let table = unified();
        write_table_csv(&table, &path).unwrap();
        assert_eq!(read_table(&path).unwrap(), table);
    }

    #[test]
    fn parquet_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotations_filtered.parquet");
        let table = unified();
        write_table_parquet(&table, &path).unwrap();
        assert_eq!(read_table(&path).unwrap(), table);
    }

    #[test]
    fn parquet_keeps_types_of_mixed_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.parquet");
        let first = Table::from_rows(
            vec!["Score".into(), "Tag".into()],
            vec![vec![Value::Integer(3), Value::Integer(7)]],
        );
        let second = Table::from_rows(
            vec!["Score".into(), "Tag".into(), "Flag".into()],
            vec![vec![Value::Float(0.5), "x".into(), Value::Bool(true)]],
        );
        let table = Table::concat(vec![first, second]);
        assert_eq!(
            table.columns().iter().map(arrow_type).collect::<Vec<_>>(),
            vec![DataType::Utf8, DataType::Utf8, DataType::Boolean]
        );

        write_table_parquet(&table, &path).unwrap();
        let back = read_table(&path).unwrap();
        assert_eq!(
            back.column("Score").unwrap().values,
            vec![Value::Integer(3), Value::Float(0.5)]
        );
        assert_eq!(
            back.column("Tag").unwrap().values,
            vec![Value::Integer(7), Value::from("x")]
        );
        assert_eq!(back, table);
    }

    #[test]
    fn narrows_column_types() {
        let t = unified();
        let types: Vec<DataType> = t.columns().iter().map(arrow_type).collect();
        assert_eq!(
            types,
            vec![DataType::Utf8, DataType::Utf8, DataType::Float64, DataType::Utf8, DataType::Int64]
        );
    }

    #[test]
    fn frequency_exports() {
        let dir = tempfile::tempdir().unwrap();
        let table = unified();

        let overall = dir.path().join("cell_type_frequencies.csv");
        write_records_csv(&cell_type_frequencies(&table).unwrap(), &overall).unwrap();
        let text = std::fs::read_to_string(&overall).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("CellType,Count,Frequency"));
        assert!(lines.next().unwrap().starts_with("T,2,0.66"));

        let donors = donor_cell_type_frequencies(&table).unwrap();
        let per_donor = dir.path().join("donor_cell_type_frequencies.csv");
        write_records_csv(&donors, &per_donor).unwrap();
        let text = std::fs::read_to_string(&per_donor).unwrap();
        assert_eq!(
            text,
            "DonorID,CellType,Count,Frequency\nX1,B,1,0.5\nX1,T,1,0.5\nX2,T,1,1.0\n"
        );

        let dump = dir.path().join("donor_cell_type_counts.txt");
        write_donor_counts_text(&donors, &dump).unwrap();
        let text = std::fs::read_to_string(&dump).unwrap();
        assert!(text.starts_with("Donor X1 (2 cells):\n  B: 1 (50.00%)\n  T: 1 (50.00%)\n"));
        assert!(text.contains("Donor X2 (1 cells):\n  T: 1 (100.00%)\n"));
    }
}
