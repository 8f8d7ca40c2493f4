//! Scorecard construction from fitted binning tables and a logistic model
//!
//! Points follow the standard pdo calibration: `factor = pdo / ln(2)`,
//! `offset = target_score - factor * ln(target_odds)`, per-bin points
//! `round(-factor * coef * woe)`. The intercept lands in the base points,
//! or is spread evenly across variables when `spread_base` is set.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::pipeline::table::BinningTable;
use crate::scorecard::{Scorecard, ScorecardBin, ScorecardVariable, WOE_SUFFIX};

/// Score calibration parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Calibration {
    /// Total score at the reference odds
    pub target_score: f64,
    /// Good:bad odds at the target score
    pub target_odds: f64,
    /// Points to double the odds
    pub pdo: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            target_score: 600.0,
            target_odds: 50.0,
            pdo: 20.0,
        }
    }
}

impl Calibration {
    pub fn factor(&self) -> f64 {
        self.pdo / std::f64::consts::LN_2
    }

    pub fn offset(&self) -> f64 {
        self.target_score - self.factor() * self.target_odds.ln()
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.pdo.is_finite() && self.pdo > 0.0) {
            anyhow::bail!("pdo must be positive, got {}", self.pdo);
        }
        if !(self.target_odds.is_finite() && self.target_odds > 0.0) {
            anyhow::bail!("target odds must be positive, got {}", self.target_odds);
        }
        if !self.target_score.is_finite() {
            anyhow::bail!("target score must be finite, got {}", self.target_score);
        }
        Ok(())
    }
}

/// Coefficients of a logistic regression fitted on WoE-encoded columns.
///
/// Keys in `coefficients` are the encoded column names, i.e. the variable
/// name with the `_woe` suffix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedModel {
    pub intercept: f64,
    pub coefficients: BTreeMap<String, f64>,
}

impl FittedModel {
    /// Load a model from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model file: {}", path.display()))?;
        let model: FittedModel = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse model file: {}", path.display()))?;
        if model.coefficients.is_empty() {
            anyhow::bail!("Model file {} has no coefficients", path.display());
        }
        Ok(model)
    }

    /// Variable name for a coefficient key, stripping the `_woe` suffix
    fn variable_name(key: &str) -> Result<&str> {
        key.strip_suffix(WOE_SUFFIX).with_context(|| {
            format!(
                "Coefficient key '{}' does not end in '{}'; \
                 the model must be fitted on WoE-encoded columns",
                key, WOE_SUFFIX
            )
        })
    }
}

/// Build a scorecard from fitted binning tables and model coefficients.
///
/// Every coefficient must have a matching binning table; tables without a
/// coefficient are skipped (the model selected against them). With
/// `spread_base` the base is divided evenly across variables and the
/// reported base points are zero.
pub fn build_scorecard(
    tables: &BTreeMap<String, BinningTable>,
    model: &FittedModel,
    calibration: &Calibration,
    spread_base: bool,
) -> Result<Scorecard> {
    calibration.validate()?;

    let factor = calibration.factor();
    let base_raw = calibration.offset() - factor * model.intercept;

    let n_vars = model.coefficients.len() as f64;
    let (base_points, share) = if spread_base {
        (0i64, base_raw / n_vars)
    } else {
        (base_raw.round() as i64, 0.0)
    };

    let mut variables = BTreeMap::new();
    for (key, &coef) in &model.coefficients {
        let name = FittedModel::variable_name(key)?;
        let table = tables.get(name).with_context(|| {
            format!(
                "Model coefficient '{}' has no matching binning table for variable '{}'",
                key, name
            )
        })?;

        let to_points = |woe: f64| (share - factor * coef * woe).round() as i64;

        let bins: Vec<ScorecardBin> = table
            .bins
            .iter()
            .map(|b| ScorecardBin {
                boundary: b.boundary.clone(),
                points: to_points(b.woe),
            })
            .collect();
        let special_bins: Vec<ScorecardBin> = table
            .special_bins
            .iter()
            .map(|b| ScorecardBin {
                boundary: b.boundary.clone(),
                points: to_points(b.woe),
            })
            .collect();

        variables.insert(
            name.to_string(),
            ScorecardVariable {
                variable: name.to_string(),
                kind: table.kind,
                bins,
                special_bins,
            },
        );
    }

    Ok(Scorecard {
        base_points,
        variables,
    })
}
