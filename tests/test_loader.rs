//! Integration tests for dataset loading and saving

mod common;

use std::path::Path;

use scorebin::pipeline::{load_dataset, save_dataset};

use common::{create_temp_csv, create_temp_parquet, credit_dataframe};

#[test]
fn test_csv_round_trip() {
    let mut df = credit_dataframe();
    let (_dir, path) = create_temp_csv(&mut df);

    let loaded = load_dataset(&path).unwrap();
    assert_eq!(loaded.shape(), df.shape());
    common::assert_has_columns(&loaded, &["target", "age", "grade", "income"]);
}

#[test]
fn test_parquet_round_trip() {
    let mut df = credit_dataframe();
    let (_dir, path) = create_temp_parquet(&mut df);

    let loaded = load_dataset(&path).unwrap();
    assert_eq!(loaded.shape(), df.shape());
}

#[test]
fn test_save_then_load_preserves_values() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("out.csv");

    let mut df = credit_dataframe();
    save_dataset(&mut df, &path).unwrap();
    let loaded = load_dataset(&path).unwrap();

    assert_eq!(
        common::f64_column(&loaded, "age"),
        common::f64_column(&df, "age")
    );
}

#[test]
fn test_unsupported_extension_fails() {
    let result = load_dataset(Path::new("data.xlsx"));
    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("Unsupported file format"));

    let mut df = credit_dataframe();
    let result = save_dataset(&mut df, Path::new("data.xlsx"));
    assert!(result.is_err());
}

#[test]
fn test_missing_file_fails_with_path_in_error() {
    let result = load_dataset(Path::new("/no/such/file.csv"));
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("file.csv"));
}
