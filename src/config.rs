use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::embed::UmapParams;

// ---------------------------------------------------------------------------
// Loader configuration
// ---------------------------------------------------------------------------

/// Which files in a directory make up the annotation dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub directory: PathBuf,
    /// A file must contain at least one of these.
    pub include_keywords: Vec<String>,
    /// A file must contain none of this. Empty means no exclusion.
    pub exclude_keyword: String,
    pub suffix: String,
    /// A file must contain every one of these.
    pub required_keywords: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("Data/GSE116256_RAW"),
            include_keywords: vec!["BM".to_string()],
            exclude_keyword: "38n".to_string(),
            suffix: ".anno.txt.gz".to_string(),
            required_keywords: vec!["-D0".to_string()],
        }
    }
}

// ---------------------------------------------------------------------------
// Whole-run configuration
// ---------------------------------------------------------------------------

/// A matching expression matrix and annotation file for the embedding plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionPair {
    pub dem_file: PathBuf,
    pub anno_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub loader: LoaderConfig,
    pub output_dir: PathBuf,
    /// Columns whose absence after loading is reported.
    pub required_columns: Vec<String>,
    pub expression: Option<ExpressionPair>,
    /// Settings for the expression embedding.
    pub embedding: UmapParams,
}

impl Default for RunConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from("Data/GSE116256_RAW");
        Self {
            loader: LoaderConfig::default(),
            output_dir: PathBuf::from("."),
            required_columns: vec!["DonorID".to_string(), "CellType".to_string()],
            expression: Some(ExpressionPair {
                dem_file: data_dir.join("GSM3587923_AML1012-D0.dem.txt.gz"),
                anno_file: data_dir.join("GSM3587924_AML1012-D0.anno.txt.gz"),
            }),
            embedding: UmapParams::default(),
        }
    }
}

impl RunConfig {
    /// Read a JSON config. Missing fields take their defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }
}
