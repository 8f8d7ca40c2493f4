//! Scorecard applier: per-row total score computation
//!
//! Uses the same bin-location logic as the WoE encoder, so a row always
//! earns points from the same bin its WoE would come from. Neutral-routed
//! values earn zero points from that variable.

use anyhow::{Context, Result};
use polars::prelude::*;

use crate::pipeline::apply::{locate_categorical, locate_numeric, ApplyError, BinLocation, UnknownHandling};
use crate::pipeline::table::{BinBoundary, VariableKind};
use crate::scorecard::{Scorecard, ScorecardVariable};

/// Options for the scoring pass
#[derive(Debug, Clone, Default)]
pub struct ScoreConfig {
    pub unknown: UnknownHandling,
    /// Also emit per-variable `<var>_points` columns next to the total
    pub detail: bool,
}

/// Per-variable view used for row-wise point lookup
struct CardView<'a> {
    regular: Vec<&'a BinBoundary>,
    special: Vec<&'a BinBoundary>,
    regular_points: Vec<i64>,
    special_points: Vec<i64>,
}

impl<'a> CardView<'a> {
    fn new(var: &'a ScorecardVariable) -> Self {
        Self {
            regular: var.bins.iter().map(|b| &b.boundary).collect(),
            special: var.special_bins.iter().map(|b| &b.boundary).collect(),
            regular_points: var.bins.iter().map(|b| b.points).collect(),
            special_points: var.special_bins.iter().map(|b| b.points).collect(),
        }
    }

    fn points(&self, location: BinLocation) -> i64 {
        match location {
            BinLocation::Regular(i) => self.regular_points[i],
            BinLocation::Special(i) => self.special_points[i],
            BinLocation::Neutral => 0,
        }
    }
}

/// Score a dataset against a scorecard.
///
/// Returns a DataFrame of identical height: the original columns plus a
/// `score` column (base points plus the matched bin's points for every
/// scored variable), and per-variable point columns when configured.
pub fn apply_scorecard(
    df: &DataFrame,
    card: &Scorecard,
    config: &ScoreConfig,
) -> Result<DataFrame> {
    let mut out = df.clone();
    let height = df.height();
    let mut totals: Vec<i64> = vec![card.base_points; height];

    for (name, var) in &card.variables {
        let col = df.column(name).map_err(|_| ApplyError::SchemaMismatch {
            variable: name.clone(),
        })?;
        let view = CardView::new(var);
        let mut var_points: Vec<i64> = Vec::with_capacity(height);

        match var.kind {
            VariableKind::Numeric => {
                let values = col
                    .cast(&DataType::Float64)
                    .with_context(|| format!("Variable '{}' is not numeric at score time", name))?;
                for value in values.f64()?.into_iter() {
                    let loc =
                        locate_numeric(name, &view.regular, &view.special, value, config.unknown)?;
                    var_points.push(view.points(loc));
                }
            }
            VariableKind::Categorical => {
                let values = col.cast(&DataType::String).with_context(|| {
                    format!("Variable '{}' is not categorical at score time", name)
                })?;
                for value in values.str()?.into_iter() {
                    let loc = locate_categorical(
                        name,
                        &view.regular,
                        &view.special,
                        value,
                        config.unknown,
                    )?;
                    var_points.push(view.points(loc));
                }
            }
        }

        for (total, p) in totals.iter_mut().zip(var_points.iter()) {
            *total += p;
        }
        if config.detail {
            out.with_column(Column::new(format!("{}_points", name).into(), var_points))?;
        }
    }

    out.with_column(Column::new("score".into(), totals))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorecard::ScorecardBin;
    use std::collections::BTreeMap;

    fn sample_card() -> Scorecard {
        let mut variables = BTreeMap::new();
        variables.insert(
            "age".to_string(),
            ScorecardVariable {
                variable: "age".to_string(),
                kind: VariableKind::Numeric,
                bins: vec![
                    ScorecardBin {
                        boundary: BinBoundary::Interval {
                            lower: f64::NEG_INFINITY,
                            upper: 30.0,
                        },
                        points: -15,
                    },
                    ScorecardBin {
                        boundary: BinBoundary::Interval {
                            lower: 30.0,
                            upper: f64::INFINITY,
                        },
                        points: 20,
                    },
                ],
                special_bins: vec![ScorecardBin {
                    boundary: BinBoundary::Missing,
                    points: 2,
                }],
            },
        );
        variables.insert(
            "grade".to_string(),
            ScorecardVariable {
                variable: "grade".to_string(),
                kind: VariableKind::Categorical,
                bins: vec![
                    ScorecardBin {
                        boundary: BinBoundary::Categories(vec!["a".to_string()]),
                        points: 25,
                    },
                    ScorecardBin {
                        boundary: BinBoundary::Categories(vec![
                            "b".to_string(),
                            "c".to_string(),
                        ]),
                        points: -10,
                    },
                ],
                special_bins: Vec::new(),
            },
        );
        Scorecard {
            base_points: 500,
            variables,
        }
    }

    #[test]
    fn test_apply_scorecard_totals() {
        let df = df! {
            "age" => [Some(25.0f64), Some(40.0), None],
            "grade" => ["a", "c", "b"],
        }
        .unwrap();

        let card = sample_card();
        let out = apply_scorecard(&df, &card, &ScoreConfig::default()).unwrap();

        let scores: Vec<Option<i64>> =
            out.column("score").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(
            scores,
            vec![Some(500 - 15 + 25), Some(500 + 20 - 10), Some(500 + 2 - 10)]
        );
    }

    #[test]
    fn test_apply_scorecard_detail_columns() {
        let df = df! {
            "age" => [25.0f64, 40.0],
            "grade" => ["a", "b"],
        }
        .unwrap();

        let config = ScoreConfig {
            unknown: UnknownHandling::Error,
            detail: true,
        };
        let out = apply_scorecard(&df, &sample_card(), &config).unwrap();

        let age_points: Vec<Option<i64>> =
            out.column("age_points").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(age_points, vec![Some(-15), Some(20)]);
        let grade_points: Vec<Option<i64>> =
            out.column("grade_points").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(grade_points, vec![Some(25), Some(-10)]);
    }

    #[test]
    fn test_unknown_category_neutral_scores_zero() {
        let df = df! {
            "age" => [40.0f64],
            "grade" => ["zzz"],
        }
        .unwrap();

        let card = sample_card();
        let err = apply_scorecard(&df, &card, &ScoreConfig::default()).unwrap_err();
        assert!(err.downcast_ref::<ApplyError>().is_some());

        let config = ScoreConfig {
            unknown: UnknownHandling::NeutralWoe,
            detail: false,
        };
        let out = apply_scorecard(&df, &card, &config).unwrap();
        let scores: Vec<Option<i64>> =
            out.column("score").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(scores, vec![Some(500 + 20)]);
    }
}
