//! Forecast ensemble behaviour through the public API.

use edgelab_core::ensemble::{CombinePolicy, Ensemble, ForecastMatrix};
use edgelab_core::BacktestError;

#[test]
fn mean_of_two_models() {
    let m = ForecastMatrix::new(vec![vec![10.0, 20.0], vec![30.0, 40.0]]).unwrap();
    let out = Ensemble::new(CombinePolicy::Mean).predict(&m).unwrap();
    assert_eq!(out, vec![15.0, 35.0]);
}

#[test]
fn explicit_weighted_average() {
    let m = ForecastMatrix::new(vec![vec![10.0, 20.0]]).unwrap();
    let out = Ensemble::with_weights(vec![0.66, 0.34])
        .unwrap()
        .predict(&m)
        .unwrap();
    assert!((out[0] - 13.4).abs() < 1e-9);
}

#[test]
fn fitted_weights_favour_the_more_accurate_model() {
    let actual: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
    let good: Vec<f64> = actual.iter().map(|a| a + 0.5).collect();
    let bad: Vec<f64> = actual.iter().map(|a| a - 4.0).collect();
    let m = ForecastMatrix::from_columns(&[good, bad]).unwrap();

    let mut ens = Ensemble::new(CombinePolicy::WeightedAvg);
    let combined = ens.fit(&m, Some(actual.as_slice())).unwrap().predict(&m).unwrap();
    let w = ens.weights().unwrap();
    assert!((w[0] + w[1] - 1.0).abs() < 1e-12);
    assert!((w[0] - 8.0 / 9.0).abs() < 1e-12);

    let mae = combined
        .iter()
        .zip(&actual)
        .map(|(c, a)| (c - a).abs())
        .sum::<f64>()
        / actual.len() as f64;
    assert!(mae < 0.5 + 1e-9, "combined MAE {mae}");
}

#[test]
fn mean_and_geometric_ignore_fit() {
    let m = ForecastMatrix::new(vec![vec![4.0, 9.0]]).unwrap();
    let mut geo = Ensemble::new(CombinePolicy::GeometricMean);
    let out = geo.fit(&m, None).unwrap().predict(&m).unwrap();
    assert!((out[0] - 6.0).abs() < 1e-12);
}

#[test]
fn weighted_without_fit_is_not_fitted() {
    let m = ForecastMatrix::new(vec![vec![1.0, 2.0]]).unwrap();
    assert!(matches!(
        Ensemble::new(CombinePolicy::WeightedAvg).predict(&m),
        Err(BacktestError::NotFitted(_))
    ));
}

#[test]
fn matrix_round_trips_through_json_with_validation() {
    let m: ForecastMatrix = serde_json::from_str("[[1.0, 2.0], [3.0, 4.0]]").unwrap();
    assert_eq!(m.n_models(), 2);
    assert!(serde_json::from_str::<ForecastMatrix>("[[1.0, 2.0], [3.0]]").is_err());
}
