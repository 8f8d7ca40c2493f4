//! Integration tests for target mapping through the full fit

mod common;

use polars::prelude::*;

use scorebin::pipeline::{fit_bins, BinningConfig, TargetMapping};

use common::credit_dataframe;

/// Replace the 0/1 target with good/bad labels
fn with_string_target(df: &DataFrame) -> DataFrame {
    let labels: Vec<&str> = df
        .column("target")
        .unwrap()
        .i32()
        .unwrap()
        .into_iter()
        .map(|v| if v == Some(1) { "bad" } else { "good" })
        .collect();
    let mut out = df.clone();
    out.with_column(Column::new("target".into(), labels)).unwrap();
    out
}

#[test]
fn test_mapped_fit_matches_binary_fit() {
    let binary = credit_dataframe();
    let labelled = with_string_target(&binary);

    let config = BinningConfig::default();
    let direct = fit_bins(&binary, "target", None, &config).unwrap();

    let mapping = TargetMapping::new("bad".to_string(), "good".to_string());
    let mapped = fit_bins(&labelled, "target", Some(&mapping), &config).unwrap();

    assert_eq!(direct.len(), mapped.len());
    for (name, table) in &direct {
        let other = &mapped[name];
        assert_eq!(table.bins.len(), other.bins.len(), "variable '{}'", name);
        for (a, b) in table.bins.iter().zip(other.bins.iter()) {
            assert_eq!(a.count, b.count);
            assert_eq!(a.events, b.events);
            assert!((a.woe - b.woe).abs() < 1e-12);
        }
        assert!((table.total_iv - other.total_iv).abs() < 1e-12);
    }
}

#[test]
fn test_string_target_without_mapping_fails() {
    let labelled = with_string_target(&credit_dataframe());
    let err = fit_bins(&labelled, "target", None, &BinningConfig::default()).unwrap_err();
    assert!(err.to_string().contains("target"));
}

#[test]
fn test_unmapped_rows_are_excluded_from_fit() {
    let mut labels: Vec<&str> = Vec::new();
    let mut age: Vec<f64> = Vec::new();
    for i in 0..100 {
        labels.push(match i % 10 {
            9 => "review", // neither class
            k if k < 3 => "bad",
            _ => "good",
        });
        age.push(20.0 + (i % 40) as f64);
    }
    let df = df! { "target" => labels, "age" => age }.unwrap();

    let mapping = TargetMapping::new("bad".to_string(), "good".to_string());
    let tables = fit_bins(&df, "target", Some(&mapping), &BinningConfig::default()).unwrap();

    let total: usize = tables["age"]
        .bins
        .iter()
        .chain(tables["age"].special_bins.iter())
        .map(|b| b.count)
        .sum();
    assert_eq!(total, 90, "rows with an unmapped target must be dropped");
}

#[test]
fn test_one_sided_mapping_fails() {
    let labelled = with_string_target(&credit_dataframe());
    let mapping = TargetMapping::new("bad".to_string(), "no-such-label".to_string());
    assert!(fit_bins(&labelled, "target", Some(&mapping), &BinningConfig::default()).is_err());
}
