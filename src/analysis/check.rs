use log::info;

use crate::data::error::LoaderError;
use crate::data::model::{Table, CELL_TYPE, DONOR_ID};

/// Report required columns the table lacks.
pub fn check_required_columns(table: &Table, required: &[String]) -> Result<(), LoaderError> {
    let columns: Vec<String> = required
        .iter()
        .filter(|c| !table.has_column(c))
        .cloned()
        .collect();
    if columns.is_empty() {
        Ok(())
    } else {
        Err(LoaderError::MissingColumn { columns })
    }
}

/// Log what the unified table holds: donors, cell types, and columns.
pub fn log_overview(table: &Table) {
    for name in [DONOR_ID, CELL_TYPE] {
        if let Some(values) = table.unique(name) {
            let shown: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            info!("Unique {name} values ({}): {}", shown.len(), shown.join(", "));
        }
    }
    info!("Available columns: {}", table.column_names().join(", "));
}
