use std::collections::HashMap;
use std::path::Path;

use csv::ReaderBuilder;

use super::error::{LoaderError, Result};
use super::loader::open_gz;
use super::model::{Table, Value, CELL, CELL_TYPE};

// ---------------------------------------------------------------------------
// ExpressionMatrix – gene-by-cell counts from a `.dem.txt.gz` file
// ---------------------------------------------------------------------------

/// Dense gene-by-cell count matrix. `counts[g][c]` is the count of gene `g`
/// in cell `c`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionMatrix {
    pub genes: Vec<String>,
    pub cells: Vec<String>,
    pub counts: Vec<Vec<f64>>,
}

/// Load a gzip-compressed, tab-separated expression matrix: header row of
/// cell ids (after the gene column), one row per gene.
pub fn load_expression_file(path: &Path) -> Result<ExpressionMatrix> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_reader(open_gz(path)?);

    let cells: Vec<String> = reader
        .headers()
        .map_err(|e| LoaderError::from_csv(path, e))?
        .iter()
        .skip(1)
        .map(|h| h.to_string())
        .collect();

    let mut genes = Vec::new();
    let mut counts = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| LoaderError::from_csv(path, e))?;
        let mut fields = record.iter();
        let gene = fields.next().unwrap_or_default().to_string();
        let row = fields
            .enumerate()
            .map(|(j, tok)| {
                tok.trim().parse::<f64>().map_err(|_| {
                    LoaderError::parse(
                        path,
                        format!("gene {gene}, cell {}: '{tok}' is not a number", cells[j]),
                    )
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        genes.push(gene);
        counts.push(row);
    }

    Ok(ExpressionMatrix {
        genes,
        cells,
        counts,
    })
}

impl ExpressionMatrix {
    pub fn n_genes(&self) -> usize {
        self.genes.len()
    }

    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }

    /// Counts of one cell across all genes.
    pub fn cell_vector(&self, cell: usize) -> Vec<f64> {
        self.counts.iter().map(|row| row[cell]).collect()
    }

    /// Total counts per cell.
    pub fn total_counts_per_cell(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_cells()];
        for row in &self.counts {
            for (t, v) in totals.iter_mut().zip(row) {
                *t += v;
            }
        }
        totals
    }

    /// Sample variance (n - 1 denominator) of each gene across cells.
    pub fn gene_variances(&self) -> Vec<f64> {
        self.counts.iter().map(|row| sample_variance(row)).collect()
    }

    /// Pair expression profiles with annotation rows by `Cell`, keeping
    /// annotation order and dropping cells missing on either side.
    pub fn merge_with_annotations(&self, annotations: &Table) -> Result<MergedCells> {
        let (Some(cell_col), Some(type_col)) =
            (annotations.column(CELL), annotations.column(CELL_TYPE))
        else {
            let columns = [CELL, CELL_TYPE]
                .into_iter()
                .filter(|c| !annotations.has_column(c))
                .map(String::from)
                .collect();
            return Err(LoaderError::MissingColumn { columns });
        };

        let index: HashMap<&str, usize> = self
            .cells
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let mut merged = MergedCells::default();
        for (cell, label) in cell_col.values.iter().zip(&type_col.values) {
            let Value::String(cell) = cell else { continue };
            if let Some(&j) = index.get(cell.as_str()) {
                merged.cells.push(cell.clone());
                merged.labels.push(label.clone());
                merged.features.push(self.cell_vector(j));
            }
        }
        Ok(merged)
    }
}

/// Cell-by-gene rows joined with their annotation labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedCells {
    pub cells: Vec<String>,
    pub labels: Vec<Value>,
    pub features: Vec<Vec<f64>>,
}

// ---------------------------------------------------------------------------
// Summary statistics, in the shape of a dataframe `describe()`
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Describe {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl Describe {
    /// `None` for an empty sample.
    pub fn of(values: &[f64]) -> Option<Describe> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        Some(Describe {
            count: n,
            mean: sorted.iter().sum::<f64>() / n as f64,
            std: sample_variance(values).sqrt(),
            min: sorted[0],
            q25: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q75: quantile(&sorted, 0.75),
            max: sorted[n - 1],
        })
    }
}

impl std::fmt::Display for Describe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "count {} mean {:.4} std {:.4} min {:.4} 25% {:.4} 50% {:.4} 75% {:.4} max {:.4}",
            self.count, self.mean, self.std, self.min, self.q25, self.median, self.q75, self.max
        )
    }
}

fn sample_variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64
}

/// Linear interpolation between closest ranks, on sorted input.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
