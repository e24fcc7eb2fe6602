use std::collections::BTreeMap;

use serde::Serialize;

use crate::data::error::LoaderError;
use crate::data::model::{Table, Value, CELL_TYPE, DONOR_ID};

/// Share of all rows held by one cell type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellTypeFrequency {
    #[serde(rename = "CellType")]
    pub cell_type: Value,
    #[serde(rename = "Count")]
    pub count: usize,
    #[serde(rename = "Frequency")]
    pub frequency: f64,
}

/// Share of one donor's rows held by one cell type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DonorCellTypeFrequency {
    #[serde(rename = "DonorID")]
    pub donor: Value,
    #[serde(rename = "CellType")]
    pub cell_type: Value,
    #[serde(rename = "Count")]
    pub count: usize,
    #[serde(rename = "Frequency")]
    pub frequency: f64,
}

fn missing(column: &str) -> LoaderError {
    LoaderError::MissingColumn {
        columns: vec![column.to_string()],
    }
}

/// Cell types by descending count. Rows without a cell type are left out
/// of both the counts and the denominator.
pub fn cell_type_frequencies(table: &Table) -> Result<Vec<CellTypeFrequency>, LoaderError> {
    let counts: Vec<(Value, usize)> = table
        .value_counts(CELL_TYPE)
        .ok_or_else(|| missing(CELL_TYPE))?
        .into_iter()
        .filter(|(cell_type, _)| !cell_type.is_null())
        .collect();
    let total: usize = counts.iter().map(|(_, n)| n).sum();
    Ok(counts
        .into_iter()
        .map(|(cell_type, count)| CellTypeFrequency {
            cell_type,
            count,
            frequency: count as f64 / total as f64,
        })
        .collect())
}

/// Cell type counts within each donor, ordered by donor then cell type.
/// Rows missing either key are skipped.
pub fn donor_cell_type_frequencies(
    table: &Table,
) -> Result<Vec<DonorCellTypeFrequency>, LoaderError> {
    if !table.has_column(DONOR_ID) {
        return Err(missing(DONOR_ID));
    }
    let groups: Vec<(Vec<Value>, usize)> = table
        .group_count(&[DONOR_ID, CELL_TYPE])
        .ok_or_else(|| missing(CELL_TYPE))?
        .into_iter()
        .filter(|(key, _)| key.iter().all(|v| !v.is_null()))
        .collect();

    let mut donor_totals: BTreeMap<Value, usize> = BTreeMap::new();
    for (key, count) in &groups {
        *donor_totals.entry(key[0].clone()).or_default() += count;
    }

    Ok(groups
        .into_iter()
        .map(|(key, count)| {
            let mut key = key.into_iter();
            let donor = key.next().unwrap_or(Value::Null);
            let cell_type = key.next().unwrap_or(Value::Null);
            let total = donor_totals.get(&donor).copied().unwrap_or(count);
            DonorCellTypeFrequency {
                donor,
                cell_type,
                count,
                frequency: count as f64 / total as f64,
            }
        })
        .collect())
}

/// Regroup donor frequencies per donor, keeping each donor's cell types in
/// input order.
pub fn by_donor(
    rows: &[DonorCellTypeFrequency],
) -> BTreeMap<&Value, Vec<&DonorCellTypeFrequency>> {
    let mut grouped: BTreeMap<&Value, Vec<&DonorCellTypeFrequency>> = BTreeMap::new();
    for row in rows {
        grouped.entry(&row.donor).or_default().push(row);
    }
    grouped
}
