//! Binning table data model and flat-table serialization
//!
//! A `BinningTable` is the immutable per-variable output of the binning
//! pipeline: ordered regular bins plus dedicated bins for special values and
//! missing data. Tables round-trip through a flat DataFrame (one row per bin)
//! so a scoring engine can reload a fitted pipeline without re-binning.

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Separator used when joining category sets into a single flat-table cell
pub const CATEGORY_SEPARATOR: &str = "%,%";

/// Kind of a binned variable, fixed once per fitting run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableKind {
    Numeric,
    Categorical,
}

impl std::fmt::Display for VariableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariableKind::Numeric => write!(f, "numeric"),
            VariableKind::Categorical => write!(f, "categorical"),
        }
    }
}

impl std::str::FromStr for VariableKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "numeric" => Ok(VariableKind::Numeric),
            "categorical" => Ok(VariableKind::Categorical),
            _ => Err(format!(
                "Unknown variable kind: '{}'. Use 'numeric' or 'categorical'.",
                s
            )),
        }
    }
}

/// A raw value held out of statistical binning and given its own bin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecialValue {
    Number(f64),
    Text(String),
}

impl SpecialValue {
    /// Parse from the flat-table string form: numbers stay numbers
    pub fn parse(s: &str) -> Self {
        match s.parse::<f64>() {
            Ok(n) => SpecialValue::Number(n),
            Err(_) => SpecialValue::Text(s.to_string()),
        }
    }
}

impl std::fmt::Display for SpecialValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpecialValue::Number(n) => write!(f, "{}", n),
            SpecialValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Boundary definition of a single bin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BinBoundary {
    /// Half-open numeric interval `[lower, upper)`; the extreme bins carry
    /// `-inf` / `+inf` sentinels so the intervals cover the whole real line
    Interval { lower: f64, upper: f64 },
    /// Set of category labels owned by this bin
    Categories(Vec<String>),
    /// Group of special values held out of statistical binning
    Special(Vec<SpecialValue>),
    /// Missing (null) values
    Missing,
}

impl BinBoundary {
    /// Human-readable label, also used for the optional bin-label columns
    pub fn label(&self) -> String {
        match self {
            BinBoundary::Interval { lower, upper } => {
                format!("[{},{})", format_bound(*lower), format_bound(*upper))
            }
            BinBoundary::Categories(cats) => cats.join(CATEGORY_SEPARATOR),
            BinBoundary::Special(vals) => {
                let joined = vals
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(CATEGORY_SEPARATOR);
                format!("special:{}", joined)
            }
            BinBoundary::Missing => "missing".to_string(),
        }
    }
}

fn format_bound(v: f64) -> String {
    if v == f64::NEG_INFINITY {
        "-inf".to_string()
    } else if v == f64::INFINITY {
        "inf".to_string()
    } else {
        format!("{}", v)
    }
}

/// A single bin with its boundary and WoE statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bin {
    /// Boundary definition (interval, category set, special group, or missing)
    pub boundary: BinBoundary,
    /// Observations in this bin
    pub count: usize,
    /// Observations with target = 1 (events)
    pub events: usize,
    /// Event rate (events / count)
    pub event_rate: f64,
    /// Weight of Evidence: ln(dist_events / dist_non_events)
    pub woe: f64,
    /// Contribution to the variable's total Information Value
    pub iv: f64,
}

/// Complete binning result for a single variable, immutable once produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinningTable {
    /// Name of the binned variable
    pub variable: String,
    /// Numeric or categorical
    pub kind: VariableKind,
    /// Ordered regular bins; numeric intervals are contiguous and cover
    /// `(-inf, +inf)`, categorical bins partition the observed categories
    pub bins: Vec<Bin>,
    /// Special-value bins and the missing bin, outside the regular order
    pub special_bins: Vec<Bin>,
    /// Sum of all bins' IV contributions (regular and special)
    pub total_iv: f64,
    /// Set when the variable could not be statistically binned and the table
    /// holds a single catch-all bin instead
    pub degenerate: bool,
}

impl BinningTable {
    /// Total observation count across regular and special bins
    pub fn total_count(&self) -> usize {
        self.bins
            .iter()
            .chain(self.special_bins.iter())
            .map(|b| b.count)
            .sum()
    }

    /// The missing bin, if any missing values were seen at fit time
    pub fn missing_bin(&self) -> Option<&Bin> {
        self.special_bins
            .iter()
            .find(|b| matches!(b.boundary, BinBoundary::Missing))
    }
}

/// Serialize a mapping of binning tables into the flat persisted form:
/// one row per (variable, bin). Interval sentinels are stored as nulls in
/// `lower`/`upper` so the table survives CSV round-trips.
pub fn tables_to_dataframe(tables: &BTreeMap<String, BinningTable>) -> Result<DataFrame> {
    let mut variable: Vec<String> = Vec::new();
    let mut bin_idx: Vec<u32> = Vec::new();
    let mut kind: Vec<String> = Vec::new();
    let mut lower: Vec<Option<f64>> = Vec::new();
    let mut upper: Vec<Option<f64>> = Vec::new();
    let mut categories: Vec<Option<String>> = Vec::new();
    let mut is_special: Vec<bool> = Vec::new();
    let mut is_missing: Vec<bool> = Vec::new();
    let mut count: Vec<u32> = Vec::new();
    let mut events: Vec<u32> = Vec::new();
    let mut event_rate: Vec<f64> = Vec::new();
    let mut woe: Vec<f64> = Vec::new();
    let mut iv: Vec<f64> = Vec::new();

    for table in tables.values() {
        let all_bins = table.bins.iter().chain(table.special_bins.iter());
        for (i, bin) in all_bins.enumerate() {
            variable.push(table.variable.clone());
            bin_idx.push(i as u32);
            kind.push(table.kind.to_string());
            match &bin.boundary {
                BinBoundary::Interval { lower: lo, upper: hi } => {
                    lower.push(finite_or_none(*lo));
                    upper.push(finite_or_none(*hi));
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
            count.push(bin.count as u32);
            events.push(bin.events as u32);
            event_rate.push(bin.event_rate);
            woe.push(bin.woe);
            iv.push(bin.iv);
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
        "count" => count,
        "events" => events,
        "event_rate" => event_rate,
        "woe" => woe,
        "iv" => iv,
    }?;

    Ok(df)
}

fn finite_or_none(v: f64) -> Option<f64> {
    if v.is_finite() {
        Some(v)
    } else {
        None
    }
}

/// Reload binning tables from the flat persisted form produced by
/// [`tables_to_dataframe`]. The reloaded tables apply identically to the
/// in-memory originals.
pub fn tables_from_dataframe(df: &DataFrame) -> Result<BTreeMap<String, BinningTable>> {
    let variable = string_column(df, "variable")?;
    let kind_col = string_column(df, "kind")?;
    let categories_col = string_column_optional(df, "categories")?;
    let lower = f64_column(df, "lower")?;
    let upper = f64_column(df, "upper")?;
    let is_special = bool_column(df, "is_special")?;
    let is_missing = bool_column(df, "is_missing")?;
    let count = u32_column(df, "count")?;
    let events = u32_column(df, "events")?;
    let event_rate = f64_column(df, "event_rate")?;
    let woe = f64_column(df, "woe")?;
    let iv = f64_column(df, "iv")?;

    let mut tables: BTreeMap<String, BinningTable> = BTreeMap::new();

    for row in 0..df.height() {
        let var = variable[row]
            .clone()
            .context("Null variable name in binning table")?;
        let kind: VariableKind = kind_col[row]
            .as_deref()
            .context("Null kind in binning table")?
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;

        let boundary = if is_missing[row].unwrap_or(false) {
            BinBoundary::Missing
        } else if is_special[row].unwrap_or(false) {
            let joined = categories_col[row]
                .clone()
                .context("Special bin without values in binning table")?;
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
                    let joined = categories_col[row]
                        .clone()
                        .context("Categorical bin without categories in binning table")?;
                    BinBoundary::Categories(
                        joined
                            .split(CATEGORY_SEPARATOR)
                            .map(|s| s.to_string())
                            .collect(),
                    )
                }
            }
        };

        let bin = Bin {
            boundary,
            count: count[row].unwrap_or(0) as usize,
            events: events[row].unwrap_or(0) as usize,
            event_rate: event_rate[row].unwrap_or(0.0),
            woe: woe[row].unwrap_or(0.0),
            iv: iv[row].unwrap_or(0.0),
        };

        let table = tables.entry(var.clone()).or_insert_with(|| BinningTable {
            variable: var,
            kind,
            bins: Vec::new(),
            special_bins: Vec::new(),
            total_iv: 0.0,
            degenerate: false,
        });
        table.total_iv += bin.iv;
        if matches!(
            bin.boundary,
            BinBoundary::Special(_) | BinBoundary::Missing
        ) {
            table.special_bins.push(bin);
        } else {
            table.bins.push(bin);
        }
    }

    for table in tables.values_mut() {
        table.degenerate = table.bins.len() <= 1;
    }

    Ok(tables)
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    Ok(string_column_optional(df, name)?)
}

fn string_column_optional(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let col = df
        .column(name)
        .with_context(|| format!("Column '{}' not found in binning table", name))?;
    Ok(col
        .cast(&DataType::String)?
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let col = df
        .column(name)
        .with_context(|| format!("Column '{}' not found in binning table", name))?;
    Ok(col.cast(&DataType::Float64)?.f64()?.into_iter().collect())
}

fn u32_column(df: &DataFrame, name: &str) -> Result<Vec<Option<u32>>> {
    let col = df
        .column(name)
        .with_context(|| format!("Column '{}' not found in binning table", name))?;
    Ok(col.cast(&DataType::UInt32)?.u32()?.into_iter().collect())
}

fn bool_column(df: &DataFrame, name: &str) -> Result<Vec<Option<bool>>> {
    let col = df
        .column(name)
        .with_context(|| format!("Column '{}' not found in binning table", name))?;
    Ok(col.cast(&DataType::Boolean)?.bool()?.into_iter().collect())
}
