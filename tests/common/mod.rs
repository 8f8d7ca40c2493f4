//! Shared test utilities and fixture generators

#![allow(dead_code)]

use polars::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

/// Create a deterministic credit-style DataFrame with known band structure.
///
/// 200 rows in four 50-row age bands with strictly decreasing event rates:
/// - age 25, grade "d": 30 events (rate 0.60)
/// - age 35, grade "c": 20 events (rate 0.40)
/// - age 45, grade "b": 10 events (rate 0.20)
/// - age 55, grade "a":  5 events (rate 0.10)
///
/// `income` is a continuous column trending with age so quantile pre-binning
/// has real work to do.
pub fn credit_dataframe() -> DataFrame {
    let bands: [(f64, &str, usize); 4] = [
        (25.0, "d", 30),
        (35.0, "c", 20),
        (45.0, "b", 10),
        (55.0, "a", 5),
    ];

    let mut target: Vec<i32> = Vec::with_capacity(200);
    let mut age: Vec<f64> = Vec::with_capacity(200);
    let mut grade: Vec<&str> = Vec::with_capacity(200);
    let mut income: Vec<f64> = Vec::with_capacity(200);

    for (band_idx, (band_age, band_grade, events)) in bands.iter().enumerate() {
        for i in 0..50 {
            target.push(if i < *events { 1 } else { 0 });
            age.push(*band_age);
            grade.push(band_grade);
            income.push(1000.0 + (band_idx * 50 + i) as f64 * 10.0);
        }
    }

    df! {
        "target" => target,
        "age" => age,
        "grade" => grade,
        "income" => income,
    }
    .unwrap()
}

/// Per-band (event rate, count) pairs of [`credit_dataframe`], age ascending
pub fn credit_band_rates() -> Vec<(f64, usize)> {
    vec![(0.60, 50), (0.40, 50), (0.20, 50), (0.10, 50)]
}

/// Create a DataFrame with missing values and a sentinel special value
pub fn messy_dataframe() -> DataFrame {
    let mut target: Vec<i32> = Vec::new();
    let mut balance: Vec<Option<f64>> = Vec::new();

    for i in 0..120 {
        target.push(if i % 3 == 0 { 1 } else { 0 });
        balance.push(match i % 10 {
            8 => None,
            9 => Some(-999.0),
            _ => Some((i % 40) as f64 * 25.0),
        });
    }

    df! {
        "target" => target,
        "balance" => balance,
    }
    .unwrap()
}

/// Create a temporary directory with a test CSV file
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("test_data.csv");

    let mut file = std::fs::File::create(&csv_path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();

    (temp_dir, csv_path)
}

/// Create a temporary directory with a test Parquet file
pub fn create_temp_parquet(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let parquet_path = temp_dir.path().join("test_data.parquet");

    let file = std::fs::File::create(&parquet_path).unwrap();
    ParquetWriter::new(file).finish(df).unwrap();

    (temp_dir, parquet_path)
}

/// Assert that a DataFrame contains specific columns
pub fn assert_has_columns(df: &DataFrame, expected_cols: &[&str]) {
    let actual_cols: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    for col in expected_cols {
        assert!(
            actual_cols.contains(&col.to_string()),
            "Missing expected column: '{}'. Actual columns: {:?}",
            col,
            actual_cols
        );
    }
}

/// Extract a float column as a plain vector, panicking on nulls
pub fn f64_column(df: &DataFrame, name: &str) -> Vec<f64> {
    df.column(name)
        .unwrap()
        .cast(&DataType::Float64)
        .unwrap()
        .f64()
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap())
        .collect()
}
