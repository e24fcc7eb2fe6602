use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::analysis::check::{check_required_columns, log_overview};
use crate::analysis::embed::{standard_scale, umap_2d, UmapParams};
use crate::analysis::frequency::{by_donor, cell_type_frequencies, donor_cell_type_frequencies};
use crate::color::ColorMap;
use crate::config::{ExpressionPair, RunConfig};
use crate::data::expression::{load_expression_file, Describe};
use crate::data::loader::{load, parse_record_file, read_table};
use crate::data::model::{Table, Value, CELL_TYPE};
use crate::export;
use crate::plot;

/// Number of leading cell columns shown in the distribution plot.
const DISTRIBUTION_COLUMNS: usize = 5;

/// Load the annotations, summarize and export them, then run the optional
/// expression analysis.
pub fn run(config: &RunConfig) -> Result<()> {
    let out = config.output_dir.as_path();
    std::fs::create_dir_all(out)
        .with_context(|| format!("creating output directory {}", out.display()))?;

    let annotations = load(&config.loader).with_context(|| {
        format!("loading annotations from {}", config.loader.directory.display())
    })?;

    if annotations.is_empty() {
        warn!("The selected files contain no rows");
    }
    match check_required_columns(&annotations, &config.required_columns) {
        Ok(()) => info!("All required columns are present."),
        Err(e) => warn!("{e}"),
    }
    log_overview(&annotations);

    export::write_table_csv(&annotations, &out.join("annotations_filtered.csv"))?;
    export::write_table_parquet(&annotations, &out.join("annotations_filtered.parquet"))?;

    summarize_frequencies(&annotations, out)?;

    if let Some(pair) = &config.expression {
        analyze_expression(pair, &config.embedding, out)?;
    }
    info!("Outputs written to {}", out.display());
    Ok(())
}

/// Recompute the frequency outputs from a previously exported table.
pub fn summarize_table(table_path: &Path, out: &Path) -> Result<()> {
    std::fs::create_dir_all(out)
        .with_context(|| format!("creating output directory {}", out.display()))?;
    let table = read_table(table_path)
        .with_context(|| format!("reading {}", table_path.display()))?;
    info!("Read {} rows from {}", table.n_rows(), table_path.display());
    summarize_frequencies(&table, out)
}

fn summarize_frequencies(annotations: &Table, out: &Path) -> Result<()> {
    match cell_type_frequencies(annotations) {
        Ok(freqs) => {
            export::write_records_csv(&freqs, &out.join("cell_type_frequencies.csv"))?;
        }
        Err(e) => {
            warn!("Skipping cell type frequencies: {e}");
            return Ok(());
        }
    }

    let donors = match donor_cell_type_frequencies(annotations) {
        Ok(donors) => donors,
        Err(e) => {
            warn!("Skipping per-donor frequencies: {e}");
            return Ok(());
        }
    };
    export::write_records_csv(&donors, &out.join("donor_cell_type_frequencies.csv"))?;
    export::write_donor_counts_text(&donors, &out.join("donor_cell_type_counts.txt"))?;

    // One palette across donors so a cell type keeps its colour.
    let colors = ColorMap::new(donors.iter().map(|r| &r.cell_type));
    for (donor, rows) in by_donor(&donors) {
        let bars: Vec<(Value, f64)> = rows
            .iter()
            .map(|r| (r.cell_type.clone(), r.frequency))
            .collect();
        let path = out.join(format!("cell_type_frequencies_{}.png", donor.to_field()));
        plot::bar_chart(
            &path,
            &format!("Cell type frequencies for donor {donor}"),
            &bars,
            &colors,
        )?;
    }
    info!("Wrote frequency summaries for {} donors", by_donor(&donors).len());
    Ok(())
}

fn analyze_expression(pair: &ExpressionPair, params: &UmapParams, out: &Path) -> Result<()> {
    let matrix = load_expression_file(&pair.dem_file)
        .with_context(|| format!("loading expression matrix {}", pair.dem_file.display()))?;
    info!(
        "Expression matrix: {} genes x {} cells",
        matrix.n_genes(),
        matrix.n_cells()
    );
    if let Some(d) = Describe::of(&matrix.total_counts_per_cell()) {
        info!("Total counts per cell: {d}");
    }
    if let Some(d) = Describe::of(&matrix.gene_variances()) {
        info!("Gene variances: {d}");
    }

    let shown: Vec<(String, Vec<f64>)> = (0..matrix.n_cells().min(DISTRIBUTION_COLUMNS))
        .map(|c| (matrix.cells[c].clone(), matrix.cell_vector(c)))
        .collect();
    plot::box_plot(
        &out.join("distribution.png"),
        "Distribution of gene expression (first cells)",
        &shown,
    )?;

    let annotations = parse_record_file(&pair.anno_file)
        .with_context(|| format!("loading annotations {}", pair.anno_file.display()))?;
    let merged = matrix.merge_with_annotations(&annotations)?;
    if merged.cells.is_empty() {
        warn!("No annotated cells found in the expression matrix; skipping embedding");
        return Ok(());
    }
    info!("Embedding {} annotated cells", merged.cells.len());

    let points = umap_2d(&standard_scale(&merged.features), params);
    let colors = ColorMap::new(&merged.labels);
    plot::scatter(
        &out.join("umap_gene_expression.png"),
        "UMAP of gene expression",
        &points,
        &merged.labels,
        &colors,
    )?;
    Ok(())
}
