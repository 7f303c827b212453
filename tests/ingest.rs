use std::fs;

use approx::assert_abs_diff_eq;
use chrono::NaiveDate;
use polars::prelude::*;
use tempfile::tempdir;

use tadawul_features::dataset::read_frame;
use tadawul_features::error::PipelineError;
use tadawul_features::ingest::{
    ParseNumericError, clean_vendor_index, parse_numeric, parse_percent,
};
use tadawul_features::{CHANGE_PCT_CANDIDATES, TimeSeriesTable, standardize_change_column};

#[test]
fn parse_numeric_expands_magnitude_suffixes() {
    assert_abs_diff_eq!(parse_numeric("12M").unwrap(), 12_000_000.0);
    assert_abs_diff_eq!(parse_numeric(" 1.5k ").unwrap(), 1_500.0);
    assert_abs_diff_eq!(parse_numeric("2B").unwrap(), 2_000_000_000.0);
    assert_abs_diff_eq!(parse_numeric("1,234.5").unwrap(), 1_234.5);
    assert_abs_diff_eq!(parse_numeric("-0.25").unwrap(), -0.25);
}

#[test]
fn parse_numeric_reports_original_token() {
    assert_eq!(
        parse_numeric("12X"),
        Err(ParseNumericError {
            token: "12X".to_string()
        })
    );
    assert_eq!(parse_numeric("M").unwrap_err().token, "M");
    assert!(parse_numeric("").is_err());
}

#[test]
fn parse_percent_strips_sign() {
    assert_abs_diff_eq!(parse_percent("-1.25%").unwrap(), -1.25);
    assert_abs_diff_eq!(parse_percent("0.40 %").unwrap(), 0.4);
    assert!(parse_percent("n/a%").is_err());
}

fn vendor_export() -> DataFrame {
    df!(
        "Date" => &["01/17/2024", "01/15/2024", "01/16/2024"],
        "Price" => &["11,950.30", "11,870.10", "11,900.00"],
        "Open" => &["11,900.00", "11,850.00", "11,870.10"],
        "High" => &["11,990.00", "11,900.00", "11,925.50"],
        "Low" => &["11,880.00", "11,820.00", "11,860.00"],
        "Vol." => &["250.3M", "-", "1.2B"],
        "Change %" => &["0.42%", "-0.31%", "0.25%"]
    )
    .unwrap()
}

#[test]
fn vendor_index_is_normalized_and_sorted() -> anyhow::Result<()> {
    let cleaned = clean_vendor_index(&vendor_export())?;

    let names = cleaned.get_column_names();
    assert!(names.contains(&"Close"));
    assert!(names.contains(&"Volume"));
    assert!(!names.contains(&"Price"));
    assert!(!names.contains(&"Vol."));

    let close: Vec<Option<f64>> = cleaned.column("Close")?.f64()?.into_iter().collect();
    assert_eq!(close, vec![Some(11_870.1), Some(11_900.0), Some(11_950.3)]);

    let volume: Vec<Option<f64>> = cleaned.column("Volume")?.f64()?.into_iter().collect();
    assert_eq!(volume[0], None);
    assert_abs_diff_eq!(volume[1].unwrap(), 1_200_000_000.0, epsilon = 1e-3);
    assert_abs_diff_eq!(volume[2].unwrap(), 250_300_000.0, epsilon = 1e-3);

    let change: Vec<Option<f64>> = cleaned.column("Change %")?.f64()?.into_iter().collect();
    assert_eq!(change, vec![Some(-0.31), Some(0.25), Some(0.42)]);
    Ok(())
}

#[test]
fn cleaned_index_feeds_the_standardizer() -> anyhow::Result<()> {
    let cleaned = clean_vendor_index(&vendor_export())?;
    let table = TimeSeriesTable::from_frame("TASI", cleaned)?;
    let standardized = standardize_change_column(&table, &CHANGE_PCT_CANDIDATES)?;
    assert!(
        standardized
            .frame()
            .get_column_names()
            .contains(&"TASI_Change_pct")
    );
    Ok(())
}

#[test]
fn unparsable_volume_is_an_error_naming_the_token() {
    let mut export = vendor_export();
    export
        .with_column(Series::new("Vol.", &["250.3M", "lots", "1.2B"]))
        .unwrap();

    match clean_vendor_index(&export).unwrap_err() {
        PipelineError::Parse {
            column,
            row,
            source,
        } => {
            assert_eq!(column, "Vol.");
            assert_eq!(row, 1);
            assert_eq!(source.token, "lots");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn existing_close_column_is_kept_over_price() -> anyhow::Result<()> {
    let frame = df!(
        "Date" => &["2024-01-01", "2024-01-02"],
        "Price" => &[1.0, 2.0],
        "Close" => &[10.0, 20.0]
    )?;
    let cleaned = clean_vendor_index(&frame)?;

    let close: Vec<Option<f64>> = cleaned.column("Close")?.f64()?.into_iter().collect();
    assert_eq!(close, vec![Some(10.0), Some(20.0)]);
    assert!(cleaned.get_column_names().contains(&"Price"));
    Ok(())
}

#[test]
fn vendor_csv_with_early_month_days_keeps_month_first_order() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("TASI_raw.csv");
    fs::write(
        &path,
        "Date,Price,Change %\n\
         01/03/2024,\"11,950.30\",0.42%\n\
         01/02/2024,\"11,870.10\",-0.31%\n\
         01/05/2024,\"11,900.00\",0.25%\n",
    )?;

    let cleaned = clean_vendor_index(&read_frame(&path)?)?;
    let dates = TimeSeriesTable::from_frame("TASI", cleaned.clone())?.dates()?;
    let expected: Vec<NaiveDate> = [2, 3, 5]
        .into_iter()
        .map(|day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap())
        .collect();
    assert_eq!(dates, expected);

    let close: Vec<Option<f64>> = cleaned.column("Close")?.f64()?.into_iter().collect();
    assert_eq!(close, vec![Some(11_870.1), Some(11_950.3), Some(11_900.0)]);
    Ok(())
}
