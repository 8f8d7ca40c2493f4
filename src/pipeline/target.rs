//! Target column validation and mapping
//!
//! The binning engine requires a binary 0/1 target. Non-binary targets can
//! be mapped through an explicit event / non-event value pair; rows whose
//! target matches neither value are excluded from fitting.

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Tolerance for floating point comparison when checking binary 0/1 values
const TOLERANCE: f64 = 1e-9;

/// Mapping configuration for converting target column values to binary 0/1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetMapping {
    /// Value that maps to 1 (event)
    pub event_value: String,
    /// Value that maps to 0 (non-event)
    pub non_event_value: String,
}

impl TargetMapping {
    pub fn new(event_value: String, non_event_value: String) -> Self {
        Self {
            event_value,
            non_event_value,
        }
    }
}

/// Produce the binary target mask used by every per-variable fit.
///
/// With a mapping, values are compared in string form; without one the
/// column must already be binary 0/1. Nulls and unmapped values yield `None`
/// and are dropped from fitting.
pub fn binary_target_mask(
    df: &DataFrame,
    target: &str,
    mapping: Option<&TargetMapping>,
) -> Result<Vec<Option<i32>>> {
    match mapping {
        Some(mapping) => create_target_mask(df, target, mapping),
        None => {
            validate_binary_target(df, target)?;
            let target_col = df.column(target)?;
            Ok(target_col
                .cast(&DataType::Int32)?
                .i32()?
                .into_iter()
                .collect())
        }
    }
}

/// Validate that the target column is binary (contains only 0 and 1).
///
/// Handles edge cases from CSV/Parquet ingestion: empty or all-null columns
/// and float columns holding 0.0/1.0.
pub fn validate_binary_target(df: &DataFrame, target: &str) -> Result<()> {
    let target_col = df
        .column(target)
        .with_context(|| format!("Target column '{}' not found", target))?;

    if target_col.len() == 0 {
        anyhow::bail!("Target column '{}' is empty", target);
    }

    if target_col.null_count() == target_col.len() {
        anyhow::bail!("Target column '{}' contains only null values", target);
    }

    let float_col = target_col
        .cast(&DataType::Float64)
        .with_context(|| format!("Target column '{}' is not numeric", target))?;
    let unique = float_col.unique()?;

    let unique_values: Vec<f64> = unique.f64()?.into_iter().flatten().collect();

    if unique_values.is_empty() {
        anyhow::bail!("Target column '{}' has no valid (non-null) values", target);
    }

    let valid = unique_values.len() <= 2
        && unique_values
            .iter()
            .all(|&v| (v - 0.0).abs() < TOLERANCE || (v - 1.0).abs() < TOLERANCE);

    if !valid {
        anyhow::bail!(
            "Target column '{}' must be binary (0/1). Found {} unique values: {:?}. \
             Use an event/non-event mapping for non-binary targets.",
            target,
            unique_values.len(),
            unique_values
        );
    }

    Ok(())
}

/// Create a binary target mask based on the mapping.
///
/// Returns `Some(1)` for event values, `Some(0)` for non-event values, and
/// `None` for anything else.
pub fn create_target_mask(
    df: &DataFrame,
    target: &str,
    mapping: &TargetMapping,
) -> Result<Vec<Option<i32>>> {
    let target_col = df
        .column(target)
        .with_context(|| format!("Target column '{}' not found", target))?;

    let string_values = column_to_string_vec(target_col)?;

    let mask: Vec<Option<i32>> = string_values
        .iter()
        .map(|v| match v {
            Some(s) if s == &mapping.event_value => Some(1),
            Some(s) if s == &mapping.non_event_value => Some(0),
            _ => None,
        })
        .collect();

    if !mask.iter().any(|v| v == &Some(1)) || !mask.iter().any(|v| v == &Some(0)) {
        anyhow::bail!(
            "Target mapping ('{}' -> 1, '{}' -> 0) matched no rows for one of the classes \
             in column '{}'",
            mapping.event_value,
            mapping.non_event_value,
            target
        );
    }

    Ok(mask)
}

/// Convert a column to string values for mapping comparison
fn column_to_string_vec(col: &Column) -> Result<Vec<Option<String>>> {
    let values: Vec<Option<String>> = match col.dtype() {
        DataType::String => col
            .str()?
            .into_iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect(),
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
            let cast = col.cast(&DataType::Int64)?;
            cast.i64()?
                .into_iter()
                .map(|v| v.map(|n| n.to_string()))
                .collect()
        }
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
            let cast = col.cast(&DataType::UInt64)?;
            cast.u64()?
                .into_iter()
                .map(|v| v.map(|n| n.to_string()))
                .collect()
        }
        DataType::Float32 | DataType::Float64 => {
            let cast = col.cast(&DataType::Float64)?;
            cast.f64()?
                .into_iter()
                .map(|v| v.map(|n| format!("{}", n)))
                .collect()
        }
        DataType::Boolean => col
            .bool()?
            .into_iter()
            .map(|v| v.map(|b| b.to_string()))
            .collect(),
        _ => {
            let cast = col.cast(&DataType::String)?;
            cast.str()?
                .into_iter()
                .map(|v| v.map(|s| s.to_string()))
                .collect()
        }
    };

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_binary_target_valid_int() {
        let df = df! {
            "target" => [0i32, 1, 0, 1, 0, 1],
            "feature" => [1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0],
        }
        .unwrap();

        assert!(validate_binary_target(&df, "target").is_ok());
    }

    #[test]
    fn test_validate_binary_target_valid_float() {
        let df = df! {
            "target" => [0.0f64, 1.0, 0.0, 1.0],
            "feature" => [1.0f64, 2.0, 3.0, 4.0],
        }
        .unwrap();

        assert!(validate_binary_target(&df, "target").is_ok());
    }

    #[test]
    fn test_validate_binary_target_non_binary() {
        let df = df! {
            "target" => [0i32, 1, 2, 0, 1, 2],
            "feature" => [1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0],
        }
        .unwrap();

        let result = validate_binary_target(&df, "target");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("must be binary"));
    }

    #[test]
    fn test_validate_binary_target_all_nulls() {
        let df = df! {
            "target" => [None::<i32>, None, None],
            "feature" => [1.0f64, 2.0, 3.0],
        }
        .unwrap();

        let result = validate_binary_target(&df, "target");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("null"));
    }

    #[test]
    fn test_create_target_mask_string_values() {
        let df = df! {
            "status" => ["good", "bad", "good", "bad", "unknown"],
        }
        .unwrap();

        let mapping = TargetMapping::new("bad".to_string(), "good".to_string());
        let mask = create_target_mask(&df, "status", &mapping).unwrap();

        assert_eq!(mask, vec![Some(0), Some(1), Some(0), Some(1), None]);
    }

    #[test]
    fn test_create_target_mask_one_sided_mapping_fails() {
        let df = df! {
            "status" => ["good", "good", "good"],
        }
        .unwrap();

        let mapping = TargetMapping::new("bad".to_string(), "good".to_string());
        assert!(create_target_mask(&df, "status", &mapping).is_err());
    }

    #[test]
    fn test_binary_target_mask_without_mapping() {
        let df = df! {
            "target" => [Some(0i32), Some(1), None, Some(1)],
        }
        .unwrap();

        let mask = binary_target_mask(&df, "target", None).unwrap();
        assert_eq!(mask, vec![Some(0), Some(1), None, Some(1)]);
    }
}
