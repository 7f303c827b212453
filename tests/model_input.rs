use approx::assert_abs_diff_eq;
use polars::prelude::*;

use tadawul_features::error::{PipelineError, SchemaError};
use tadawul_features::evaluate_predictions;
use tadawul_features::metrics::{MSE, MetricsError, R2, mean_squared_error, r2_score};
use tadawul_features::model_input::{chronological_split, define_target, split_frame};

fn aligned_matrix() -> DataFrame {
    df!(
        "Date" => &["2024-01-01", "2024-01-02", "2024-01-03", "2024-01-04", "2024-01-05"],
        "Aramco_Change_pct" => &[0.1, 0.2, -0.1, 0.0, 0.3],
        "Aramco_Change_pct_lag_1" => &[0.0, 0.1, 0.2, -0.1, 0.0],
        "Aramco_Volatility_5" => &[0.1, 0.1, 0.1, 0.1, 0.1],
        "TASI_Change_pct" => &[0.05, 0.1, -0.2, 0.1, 0.2],
        "TASI_Change_pct_lag_1" => &[0.0, 0.05, 0.1, -0.2, 0.1]
    )
    .unwrap()
}

#[test]
fn target_excludes_its_own_ticker_from_predictors() -> anyhow::Result<()> {
    let input = define_target(&aligned_matrix(), "TASI")?;

    assert_eq!(input.target.name(), "TASI_Change_pct");
    assert_eq!(
        input.predictors.get_column_names(),
        vec!["Aramco_Change_pct", "Aramco_Change_pct_lag_1"]
    );
    Ok(())
}

#[test]
fn missing_target_is_a_schema_error() {
    let error = define_target(&aligned_matrix(), "Al_Rajhi").unwrap_err();
    assert!(matches!(
        error,
        PipelineError::Schema(SchemaError::MissingColumn { .. })
    ));
}

#[test]
fn chronological_split_holds_out_the_tail() -> anyhow::Result<()> {
    assert_eq!(chronological_split(10, 0.2)?, 8);
    assert_eq!(chronological_split(5, 0.2)?, 4);
    assert_eq!(chronological_split(7, 0.2)?, 5);

    let (train, test) = split_frame(&aligned_matrix(), 0.2)?;
    assert_eq!(train.height(), 4);
    assert_eq!(test.height(), 1);
    let last: Vec<Option<f64>> = test.column("TASI_Change_pct")?.f64()?.into_iter().collect();
    assert_eq!(last, vec![Some(0.2)]);
    Ok(())
}

#[test]
fn chronological_split_rejects_degenerate_inputs() {
    assert!(matches!(
        chronological_split(1, 0.2),
        Err(PipelineError::InsufficientData { .. })
    ));
    assert!(matches!(
        chronological_split(0, 0.2),
        Err(PipelineError::InsufficientData { .. })
    ));
    assert!(matches!(
        chronological_split(10, 0.0),
        Err(PipelineError::InvalidConfig(_))
    ));
    assert!(matches!(
        chronological_split(10, 1.0),
        Err(PipelineError::InvalidConfig(_))
    ));
}

#[test]
fn evaluator_reports_mse_and_r2() -> anyhow::Result<()> {
    let actual = [1.0, 2.0, 3.0, 4.0];
    let predicted = [1.0, 2.0, 3.0, 5.0];

    let metrics = evaluate_predictions(&actual, &predicted)?;
    assert_eq!(metrics.len(), 2);
    assert_abs_diff_eq!(metrics[MSE], 0.25, epsilon = 1e-12);
    assert_abs_diff_eq!(metrics[R2], 0.8, epsilon = 1e-12);

    let perfect = evaluate_predictions(&actual, &actual)?;
    assert_eq!(perfect[MSE], 0.0);
    assert_eq!(perfect[R2], 1.0);
    Ok(())
}

#[test]
fn r2_of_constant_target() {
    assert_eq!(r2_score(&[2.0, 2.0], &[2.0, 2.0]), Ok(1.0));
    assert_eq!(r2_score(&[2.0, 2.0], &[1.0, 3.0]), Ok(0.0));
}

#[test]
fn r2_holds_for_small_scale_returns() -> anyhow::Result<()> {
    assert_abs_diff_eq!(r2_score(&[1e-9, 2e-9], &[1e-9, 1e-9])?, -1.0, epsilon = 1e-9);

    let actual = [1e-10, 2e-10, 3e-10, 4e-10];
    let predicted = [1e-10, 2e-10, 3e-10, 5e-10];
    assert_abs_diff_eq!(r2_score(&actual, &predicted)?, 0.8, epsilon = 1e-9);
    Ok(())
}

#[test]
fn evaluator_rejects_malformed_inputs() {
    assert_eq!(
        mean_squared_error(&[1.0, 2.0], &[1.0]),
        Err(MetricsError::LengthMismatch {
            actual: 2,
            predicted: 1
        })
    );
    assert_eq!(mean_squared_error(&[], &[]), Err(MetricsError::Empty));
    assert_eq!(
        evaluate_predictions(&[1.0, f64::NAN], &[1.0, 2.0]),
        Err(MetricsError::NonFinite(1))
    );
}
