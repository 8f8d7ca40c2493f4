//! Binning applier: deterministic raw-value-to-bin mapping
//!
//! Given a finalized [`BinningTable`] and raw data, every value maps to
//! exactly one bin: regular values by interval or category membership,
//! special and missing values to their dedicated bins, and out-of-range
//! numeric values clamped to the extreme bins. The same bin-location logic
//! drives both WoE encoding here and point lookup in the scorecard applier.

use anyhow::{Context, Result};
use polars::prelude::*;
use thiserror::Error;

use super::special::{categorical_group_index, numeric_group_index};
use super::table::{BinBoundary, BinningTable, SpecialValue, VariableKind};
use std::collections::BTreeMap;

/// Typed apply-time errors, surfaced to the caller with the variable and
/// offending value rather than silently coerced
#[derive(Debug, Error, PartialEq)]
pub enum ApplyError {
    #[error("unknown category '{value}' for variable '{variable}'")]
    UnknownCategory { variable: String, value: String },

    #[error("variable '{variable}' is missing from the dataset")]
    SchemaMismatch { variable: String },

    #[error("variable '{variable}' has missing values but no fitted missing bin")]
    MissingNotFitted { variable: String },

    #[error("variable '{variable}' has no usable bins")]
    NoBins { variable: String },
}

/// Policy for values the table has no bin for (unseen categories, or missing
/// values when no missing bin was fitted)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownHandling {
    /// Surface a typed error (default): silent bucketing would bias scores
    #[default]
    Error,
    /// Route unknowns to the population-average WoE of zero
    NeutralWoe,
}

impl std::str::FromStr for UnknownHandling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(UnknownHandling::Error),
            "neutral" => Ok(UnknownHandling::NeutralWoe),
            _ => Err(format!(
                "Unknown handling policy: '{}'. Use 'error' or 'neutral'.",
                s
            )),
        }
    }
}

/// Options for the WoE encoding pass
#[derive(Debug, Clone, Default)]
pub struct ApplyConfig {
    pub unknown: UnknownHandling,
    /// Also emit `<var>_bin` label columns next to the WoE columns
    pub bin_labels: bool,
}

/// Where a raw value landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinLocation {
    /// Index into the regular bin order
    Regular(usize),
    /// Index into the special bin list
    Special(usize),
    /// No bin; caller substitutes the neutral WoE of zero
    Neutral,
}

/// Locate the bin for a numeric value against regular interval boundaries
/// and special groups. Out-of-range values clamp to the extreme bins.
pub fn locate_numeric(
    variable: &str,
    regular: &[&BinBoundary],
    special: &[&BinBoundary],
    value: Option<f64>,
    unknown: UnknownHandling,
) -> Result<BinLocation, ApplyError> {
    let value = match value {
        Some(v) => v,
        None => {
            if let Some(i) = missing_index(special) {
                return Ok(BinLocation::Special(i));
            }
            return match unknown {
                UnknownHandling::Error => Err(ApplyError::MissingNotFitted {
                    variable: variable.to_string(),
                }),
                UnknownHandling::NeutralWoe => Ok(BinLocation::Neutral),
            };
        }
    };

    for (i, boundary) in special.iter().enumerate() {
        if let BinBoundary::Special(group) = boundary {
            if numeric_group_index(value, std::slice::from_ref(group)).is_some() {
                return Ok(BinLocation::Special(i));
            }
        }
    }

    if regular.is_empty() {
        return match unknown {
            UnknownHandling::Error => Err(ApplyError::NoBins {
                variable: variable.to_string(),
            }),
            UnknownHandling::NeutralWoe => Ok(BinLocation::Neutral),
        };
    }

    for (i, boundary) in regular.iter().enumerate() {
        if let BinBoundary::Interval { lower, upper } = boundary {
            if value >= *lower && value < *upper {
                return Ok(BinLocation::Regular(i));
            }
        }
    }

    // Clamp: tables carry +/-inf sentinels, so this only fires for tables
    // built from explicit partial breaks or reloaded with trimmed bounds
    if let Some(BinBoundary::Interval { lower, .. }) = regular.first() {
        if value < *lower {
            return Ok(BinLocation::Regular(0));
        }
    }
    Ok(BinLocation::Regular(regular.len() - 1))
}

/// Locate the bin for a categorical value. Unseen categories follow the
/// configured unknown policy.
pub fn locate_categorical(
    variable: &str,
    regular: &[&BinBoundary],
    special: &[&BinBoundary],
    value: Option<&str>,
    unknown: UnknownHandling,
) -> Result<BinLocation, ApplyError> {
    let value = match value {
        Some(v) => v,
        None => {
            if let Some(i) = missing_index(special) {
                return Ok(BinLocation::Special(i));
            }
            return match unknown {
                UnknownHandling::Error => Err(ApplyError::MissingNotFitted {
                    variable: variable.to_string(),
                }),
                UnknownHandling::NeutralWoe => Ok(BinLocation::Neutral),
            };
        }
    };

    for (i, boundary) in special.iter().enumerate() {
        if let BinBoundary::Special(group) = boundary {
            if categorical_group_index(value, std::slice::from_ref(group)).is_some() {
                return Ok(BinLocation::Special(i));
            }
        }
    }

    for (i, boundary) in regular.iter().enumerate() {
        if let BinBoundary::Categories(cats) = boundary {
            if cats.iter().any(|c| c == value) {
                return Ok(BinLocation::Regular(i));
            }
        }
    }

    match unknown {
        UnknownHandling::Error => Err(ApplyError::UnknownCategory {
            variable: variable.to_string(),
            value: value.to_string(),
        }),
        UnknownHandling::NeutralWoe => Ok(BinLocation::Neutral),
    }
}

fn missing_index(special: &[&BinBoundary]) -> Option<usize> {
    special
        .iter()
        .position(|b| matches!(b, BinBoundary::Missing))
}

/// Per-column view used for row-wise lookup; built once per variable
struct TableView<'a> {
    regular: Vec<&'a BinBoundary>,
    special: Vec<&'a BinBoundary>,
    regular_woe: Vec<f64>,
    special_woe: Vec<f64>,
    regular_labels: Vec<String>,
    special_labels: Vec<String>,
}

impl<'a> TableView<'a> {
    fn new(table: &'a BinningTable) -> Self {
        Self {
            regular: table.bins.iter().map(|b| &b.boundary).collect(),
            special: table.special_bins.iter().map(|b| &b.boundary).collect(),
            regular_woe: table.bins.iter().map(|b| b.woe).collect(),
            special_woe: table.special_bins.iter().map(|b| b.woe).collect(),
            regular_labels: table.bins.iter().map(|b| b.boundary.label()).collect(),
            special_labels: table
                .special_bins
                .iter()
                .map(|b| b.boundary.label())
                .collect(),
        }
    }

    fn woe(&self, location: BinLocation) -> f64 {
        match location {
            BinLocation::Regular(i) => self.regular_woe[i],
            BinLocation::Special(i) => self.special_woe[i],
            BinLocation::Neutral => 0.0,
        }
    }

    fn label(&self, location: BinLocation) -> String {
        match location {
            BinLocation::Regular(i) => self.regular_labels[i].clone(),
            BinLocation::Special(i) => self.special_labels[i].clone(),
            BinLocation::Neutral => "neutral".to_string(),
        }
    }
}

/// WoE-encode a dataset against fitted binning tables.
///
/// Returns a DataFrame of identical height: the original columns plus one
/// `<var>_woe` column per table (and `<var>_bin` labels when configured).
/// Purely functional: re-applying to the fitting data reproduces the WoE
/// values the tables themselves were computed from.
pub fn apply_woe(
    df: &DataFrame,
    tables: &BTreeMap<String, BinningTable>,
    config: &ApplyConfig,
) -> Result<DataFrame> {
    let mut out = df.clone();

    for (name, table) in tables {
        let col = df.column(name).map_err(|_| ApplyError::SchemaMismatch {
            variable: name.clone(),
        })?;
        let view = TableView::new(table);
        let height = df.height();
        let mut woe_values: Vec<f64> = Vec::with_capacity(height);
        let mut labels: Vec<String> = if config.bin_labels {
            Vec::with_capacity(height)
        } else {
            Vec::new()
        };

        match table.kind {
            VariableKind::Numeric => {
                let values = col
                    .cast(&DataType::Float64)
                    .with_context(|| format!("Variable '{}' is not numeric at apply time", name))?;
                for value in values.f64()?.into_iter() {
                    let loc =
                        locate_numeric(name, &view.regular, &view.special, value, config.unknown)?;
                    woe_values.push(view.woe(loc));
                    if config.bin_labels {
                        labels.push(view.label(loc));
                    }
                }
            }
            VariableKind::Categorical => {
                let values = col.cast(&DataType::String).with_context(|| {
                    format!("Variable '{}' is not categorical at apply time", name)
                })?;
                for value in values.str()?.into_iter() {
                    let loc = locate_categorical(
                        name,
                        &view.regular,
                        &view.special,
                        value,
                        config.unknown,
                    )?;
                    woe_values.push(view.woe(loc));
                    if config.bin_labels {
                        labels.push(view.label(loc));
                    }
                }
            }
        }

        out.with_column(Column::new(format!("{}_woe", name).into(), woe_values))?;
        if config.bin_labels {
            out.with_column(Column::new(format!("{}_bin", name).into(), labels))?;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::table::Bin;

    fn numeric_table() -> BinningTable {
        BinningTable {
            variable: "age".to_string(),
            kind: VariableKind::Numeric,
            bins: vec![
                Bin {
                    boundary: BinBoundary::Interval {
                        lower: f64::NEG_INFINITY,
                        upper: 30.0,
                    },
                    count: 50,
                    events: 30,
                    event_rate: 0.6,
                    woe: 0.7,
                    iv: 0.2,
                },
                Bin {
                    boundary: BinBoundary::Interval {
                        lower: 30.0,
                        upper: f64::INFINITY,
                    },
                    count: 50,
                    events: 10,
                    event_rate: 0.2,
                    woe: -0.6,
                    iv: 0.15,
                },
            ],
            special_bins: vec![
                Bin {
                    boundary: BinBoundary::Special(vec![SpecialValue::Number(-999.0)]),
                    count: 3,
                    events: 2,
                    event_rate: 0.66,
                    woe: 0.9,
                    iv: 0.02,
                },
                Bin {
                    boundary: BinBoundary::Missing,
                    count: 4,
                    events: 1,
                    event_rate: 0.25,
                    woe: -0.2,
                    iv: 0.01,
                },
            ],
            total_iv: 0.38,
            degenerate: false,
        }
    }

    fn categorical_table() -> BinningTable {
        BinningTable {
            variable: "grade".to_string(),
            kind: VariableKind::Categorical,
            bins: vec![
                Bin {
                    boundary: BinBoundary::Categories(vec!["a".to_string()]),
                    count: 40,
                    events: 5,
                    event_rate: 0.125,
                    woe: -0.8,
                    iv: 0.1,
                },
                Bin {
                    boundary: BinBoundary::Categories(vec!["b".to_string(), "c".to_string()]),
                    count: 60,
                    events: 35,
                    event_rate: 0.58,
                    woe: 0.5,
                    iv: 0.12,
                },
            ],
            special_bins: Vec::new(),
            total_iv: 0.22,
            degenerate: false,
        }
    }

    #[test]
    fn test_numeric_lookup_and_clamp() {
        let table = numeric_table();
        let view: Vec<&BinBoundary> = table.bins.iter().map(|b| &b.boundary).collect();
        let special: Vec<&BinBoundary> = table.special_bins.iter().map(|b| &b.boundary).collect();

        let loc =
            locate_numeric("age", &view, &special, Some(25.0), UnknownHandling::Error).unwrap();
        assert_eq!(loc, BinLocation::Regular(0));

        // Below any finite boundary still lands in the lowest bin
        let loc =
            locate_numeric("age", &view, &special, Some(-1e12), UnknownHandling::Error).unwrap();
        assert_eq!(loc, BinLocation::Regular(0));

        let loc =
            locate_numeric("age", &view, &special, Some(1e12), UnknownHandling::Error).unwrap();
        assert_eq!(loc, BinLocation::Regular(1));
    }

    #[test]
    fn test_numeric_special_and_missing() {
        let table = numeric_table();
        let view: Vec<&BinBoundary> = table.bins.iter().map(|b| &b.boundary).collect();
        let special: Vec<&BinBoundary> = table.special_bins.iter().map(|b| &b.boundary).collect();

        let loc =
            locate_numeric("age", &view, &special, Some(-999.0), UnknownHandling::Error).unwrap();
        assert_eq!(loc, BinLocation::Special(0));

        let loc = locate_numeric("age", &view, &special, None, UnknownHandling::Error).unwrap();
        assert_eq!(loc, BinLocation::Special(1));
    }

    #[test]
    fn test_unknown_category_error_and_routing() {
        let table = categorical_table();
        let view: Vec<&BinBoundary> = table.bins.iter().map(|b| &b.boundary).collect();
        let special: Vec<&BinBoundary> = Vec::new();

        let err = locate_categorical("grade", &view, &special, Some("z"), UnknownHandling::Error)
            .unwrap_err();
        assert_eq!(
            err,
            ApplyError::UnknownCategory {
                variable: "grade".to_string(),
                value: "z".to_string(),
            }
        );

        let loc =
            locate_categorical("grade", &view, &special, Some("z"), UnknownHandling::NeutralWoe)
                .unwrap();
        assert_eq!(loc, BinLocation::Neutral);
    }

    #[test]
    fn test_missing_without_missing_bin() {
        let table = categorical_table();
        let view: Vec<&BinBoundary> = table.bins.iter().map(|b| &b.boundary).collect();
        let special: Vec<&BinBoundary> = Vec::new();

        let err =
            locate_categorical("grade", &view, &special, None, UnknownHandling::Error).unwrap_err();
        assert_eq!(
            err,
            ApplyError::MissingNotFitted {
                variable: "grade".to_string(),
            }
        );
    }

    #[test]
    fn test_apply_woe_columns() {
        let df = df! {
            "age" => [Some(20.0f64), Some(45.0), Some(-999.0), None],
            "grade" => ["a", "b", "c", "a"],
        }
        .unwrap();

        let mut tables = BTreeMap::new();
        tables.insert("age".to_string(), numeric_table());
        tables.insert("grade".to_string(), categorical_table());

        let config = ApplyConfig {
            unknown: UnknownHandling::Error,
            bin_labels: true,
        };
        let out = apply_woe(&df, &tables, &config).unwrap();

        assert_eq!(out.height(), 4);
        let age_woe: Vec<Option<f64>> = out.column("age_woe").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(age_woe, vec![Some(0.7), Some(-0.6), Some(0.9), Some(-0.2)]);

        let grade_woe: Vec<Option<f64>> =
            out.column("grade_woe").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(grade_woe, vec![Some(-0.8), Some(0.5), Some(0.5), Some(-0.8)]);

        let labels: Vec<Option<&str>> =
            out.column("age_bin").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(labels[3], Some("missing"));
    }

    #[test]
    fn test_apply_schema_mismatch() {
        let df = df! { "other" => [1.0f64, 2.0] }.unwrap();
        let mut tables = BTreeMap::new();
        tables.insert("age".to_string(), numeric_table());

        let err = apply_woe(&df, &tables, &ApplyConfig::default()).unwrap_err();
        let typed = err.downcast_ref::<ApplyError>().expect("typed apply error");
        assert_eq!(
            typed,
            &ApplyError::SchemaMismatch {
                variable: "age".to_string(),
            }
        );
    }
}
