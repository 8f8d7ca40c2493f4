//! JSON export of fitted binning tables with run metadata

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::pipeline::table::BinningTable;
use crate::report::summary::iv_strength;

/// Metadata about the fit run
#[derive(Serialize, Deserialize)]
pub struct FitMetadata {
    /// Timestamp of the fit (ISO 8601 format)
    pub timestamp: String,
    /// Tool version
    pub version: String,
    /// Input file path
    pub input_file: String,
    /// Target column name
    pub target_column: String,
    /// Maximum bins per variable
    pub max_bins: usize,
    /// Minimum bin fraction
    pub min_bin_frac: f64,
    /// Whether monotonic WoE was enforced for numeric variables
    pub monotonic: bool,
}

/// A single variable's fitted table with its strength label
#[derive(Serialize, Deserialize)]
pub struct ExportEntry {
    #[serde(flatten)]
    pub table: BinningTable,
    pub strength: String,
}

/// Complete fit export: metadata plus per-variable tables
#[derive(Serialize, Deserialize)]
pub struct FitExport {
    pub metadata: FitMetadata,
    pub tables: Vec<ExportEntry>,
}

/// Parameters for the fit export metadata
pub struct ExportParams<'a> {
    pub input_file: &'a str,
    pub target_column: &'a str,
    pub max_bins: usize,
    pub min_bin_frac: f64,
    pub monotonic: bool,
}

/// Write fitted binning tables to a JSON file with run metadata.
///
/// Tables are ordered by descending total IV so the strongest variables
/// appear first.
pub fn export_fit(
    tables: &BTreeMap<String, BinningTable>,
    output_path: &Path,
    params: &ExportParams,
) -> Result<()> {
    let mut entries: Vec<ExportEntry> = tables
        .values()
        .map(|table| ExportEntry {
            table: table.clone(),
            strength: if table.degenerate {
                "degenerate".to_string()
            } else {
                iv_strength(table.total_iv).to_string()
            },
        })
        .collect();
    entries.sort_by(|a, b| {
        b.table
            .total_iv
            .partial_cmp(&a.table.total_iv)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let export = FitExport {
        metadata: FitMetadata {
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            input_file: params.input_file.to_string(),
            target_column: params.target_column.to_string(),
            max_bins: params.max_bins,
            min_bin_frac: params.min_bin_frac,
            monotonic: params.monotonic,
        },
        tables: entries,
    };

    let json =
        serde_json::to_string_pretty(&export).context("Failed to serialize fit export to JSON")?;

    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write fit export to {}", output_path.display()))?;

    Ok(())
}
