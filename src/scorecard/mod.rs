//! Scorecard module - points-based scoring built on fitted binning tables

pub mod apply;
pub mod builder;

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::pipeline::table::{BinBoundary, SpecialValue, VariableKind, CATEGORY_SEPARATOR};

pub use apply::{apply_scorecard, ScoreConfig};
pub use builder::{build_scorecard, Calibration, FittedModel};

/// Suffix the WoE encoder appends to variable columns; regression
/// coefficients are keyed by these column names
pub const WOE_SUFFIX: &str = "_woe";

/// Row label carrying the base points in the flat persisted form
const BASEPOINTS_ROW: &str = "basepoints";

/// Integer point allocation for one bin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorecardBin {
    /// Boundary cloned from the fitted binning table
    pub boundary: BinBoundary,
    pub points: i64,
}

/// Point allocations for one scored variable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorecardVariable {
    pub variable: String,
    pub kind: VariableKind,
    pub bins: Vec<ScorecardBin>,
    pub special_bins: Vec<ScorecardBin>,
}

/// A complete points-based scorecard: base score plus per-(variable, bin)
/// point allocations. Built once per fitted model, immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scorecard {
    pub base_points: i64,
    pub variables: BTreeMap<String, ScorecardVariable>,
}

impl Scorecard {
    /// Minimum and maximum achievable total score
    pub fn score_range(&self) -> (i64, i64) {
        let mut lo = self.base_points;
        let mut hi = self.base_points;
        for var in self.variables.values() {
            let points: Vec<i64> = var
                .bins
                .iter()
                .chain(var.special_bins.iter())
                .map(|b| b.points)
                .collect();
            lo += points.iter().copied().min().unwrap_or(0);
            hi += points.iter().copied().max().unwrap_or(0);
        }
        (lo, hi)
    }
}

/// Serialize a scorecard into the flat persisted form: one row per
/// (variable, bin) plus a `basepoints` row, mirroring the binning table
/// layout with a `points` column.
pub fn card_to_dataframe(card: &Scorecard) -> Result<DataFrame> {
    let mut variable: Vec<String> = vec![BASEPOINTS_ROW.to_string()];
    let mut bin_idx: Vec<u32> = vec![0];
    let mut kind: Vec<Option<String>> = vec![None];
    let mut lower: Vec<Option<f64>> = vec![None];
    let mut upper: Vec<Option<f64>> = vec![None];
    let mut categories: Vec<Option<String>> = vec![None];
    let mut is_special: Vec<bool> = vec![false];
    let mut is_missing: Vec<bool> = vec![false];
    let mut points: Vec<i64> = vec![card.base_points];

    for var in card.variables.values() {
        let all_bins = var.bins.iter().chain(var.special_bins.iter());
        for (i, bin) in all_bins.enumerate() {
            variable.push(var.variable.clone());
            bin_idx.push(i as u32);
            kind.push(Some(var.kind.to_string()));
            match &bin.boundary {
                BinBoundary::Interval { lower: lo, upper: hi } => {
                    lower.push(if lo.is_finite() { Some(*lo) } else { None });
                    upper.push(if hi.is_finite() { Some(*hi) } else { None });
                    categories.push(None);
                    is_special.push(false);
                    is_missing.push(false);
                }
                BinBoundary::Categories(cats) => {
                    lower.push(None);
                    upper.push(None);
                    categories.push(Some(cats.join(CATEGORY_SEPARATOR)));
                    is_special.push(false);
                    is_missing.push(false);
                }
                BinBoundary::Special(vals) => {
                    lower.push(None);
                    upper.push(None);
                    let joined = vals
                        .iter()
                        .map(|v| v.to_string())
                        .collect::<Vec<_>>()
                        .join(CATEGORY_SEPARATOR);
                    categories.push(Some(joined));
                    is_special.push(true);
                    is_missing.push(false);
                }
                BinBoundary::Missing => {
                    lower.push(None);
                    upper.push(None);
                    categories.push(None);
                    is_special.push(true);
                    is_missing.push(true);
                }
            }
            points.push(bin.points);
        }
    }

    let df = df! {
        "variable" => variable,
        "bin" => bin_idx,
        "kind" => kind,
        "lower" => lower,
        "upper" => upper,
        "categories" => categories,
        "is_special" => is_special,
        "is_missing" => is_missing,
        "points" => points,
    }?;

    Ok(df)
}

/// Reload a scorecard from the flat persisted form produced by
/// [`card_to_dataframe`]. Applying the reloaded card yields identical
/// scores to the in-memory original.
pub fn card_from_dataframe(df: &DataFrame) -> Result<Scorecard> {
    let variable: Vec<Option<String>> = df
        .column("variable")
        .context("Column 'variable' not found in scorecard")?
        .cast(&DataType::String)?
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect();
    let kind_col: Vec<Option<String>> = df
        .column("kind")
        .context("Column 'kind' not found in scorecard")?
        .cast(&DataType::String)?
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect();
    let lower: Vec<Option<f64>> = df
        .column("lower")?
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .collect();
    let upper: Vec<Option<f64>> = df
        .column("upper")?
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .collect();
    let categories: Vec<Option<String>> = df
        .column("categories")?
        .cast(&DataType::String)?
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect();
    let is_special: Vec<Option<bool>> = df
        .column("is_special")?
        .cast(&DataType::Boolean)?
        .bool()?
        .into_iter()
        .collect();
    let is_missing: Vec<Option<bool>> = df
        .column("is_missing")?
        .cast(&DataType::Boolean)?
        .bool()?
        .into_iter()
        .collect();
    let points: Vec<Option<i64>> = df
        .column("points")
        .context("Column 'points' not found in scorecard")?
        .cast(&DataType::Int64)?
        .i64()?
        .into_iter()
        .collect();

    let mut base_points: Option<i64> = None;
    let mut variables: BTreeMap<String, ScorecardVariable> = BTreeMap::new();

    for row in 0..df.height() {
        let var = variable[row]
            .clone()
            .context("Null variable name in scorecard")?;
        let row_points = points[row].context("Null points in scorecard")?;

        if var == BASEPOINTS_ROW {
            base_points = Some(row_points);
            continue;
        }

        let kind: VariableKind = kind_col[row]
            .as_deref()
            .context("Null kind in scorecard row")?
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;

        let boundary = if is_missing[row].unwrap_or(false) {
            BinBoundary::Missing
        } else if is_special[row].unwrap_or(false) {
            let joined = categories[row]
                .clone()
                .context("Special scorecard bin without values")?;
            BinBoundary::Special(
                joined
                    .split(CATEGORY_SEPARATOR)
                    .map(SpecialValue::parse)
                    .collect(),
            )
        } else {
            match kind {
                VariableKind::Numeric => BinBoundary::Interval {
                    lower: lower[row].unwrap_or(f64::NEG_INFINITY),
                    upper: upper[row].unwrap_or(f64::INFINITY),
                },
                VariableKind::Categorical => {
                    let joined = categories[row]
                        .clone()
                        .context("Categorical scorecard bin without categories")?;
                    BinBoundary::Categories(
                        joined
                            .split(CATEGORY_SEPARATOR)
                            .map(|s| s.to_string())
                            .collect(),
                    )
                }
            }
        };

        let entry = variables
            .entry(var.clone())
            .or_insert_with(|| ScorecardVariable {
                variable: var,
                kind,
                bins: Vec::new(),
                special_bins: Vec::new(),
            });
        let bin = ScorecardBin {
            boundary,
            points: row_points,
        };
        if matches!(
            bin.boundary,
            BinBoundary::Special(_) | BinBoundary::Missing
        ) {
            entry.special_bins.push(bin);
        } else {
            entry.bins.push(bin);
        }
    }

    Ok(Scorecard {
        base_points: base_points.context("Scorecard has no basepoints row")?,
        variables,
    })
}
