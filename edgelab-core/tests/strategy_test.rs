//! Strategy contract tests: alignment, naming, warmup checks and the scenarios
//! the crossover and fallback strategies are known for.

use chrono::NaiveDate;
use edgelab_core::domain::{Bar, BarSeries};
use edgelab_core::strategy::{SignalGenerator, Strategy};
use edgelab_core::BacktestError;

fn series(closes: &[f64]) -> BarSeries {
    let base = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            Bar::new(
                base + chrono::Duration::days(i as i64),
                c,
                c + 1.0,
                (c - 1.0).max(0.0),
                c,
                1_000.0,
            )
        })
        .collect();
    BarSeries::new(bars).unwrap()
}

#[test]
fn crossover_on_sixty_rising_closes() {
    let closes: Vec<f64> = (100..=159).map(f64::from).collect();
    let bars = series(&closes);
    let sig = Strategy::crossover(5, 20)
        .unwrap()
        .generate_signals(&bars)
        .unwrap();

    assert_eq!(sig.len(), 60);
    assert_eq!(sig.entry_count(), 1);
    assert!(sig.entries[19]);
    assert_eq!(sig.exit_count(), 0);
    assert_eq!(sig.source, "MA_Crossover_5_20");
}

#[test]
fn crossover_never_exits_on_strictly_increasing_closes() {
    for (fast, slow) in [(2, 5), (3, 10), (10, 30)] {
        let closes: Vec<f64> = (0..80).map(|i| 50.0 + i as f64 * 0.5).collect();
        let sig = Strategy::crossover(fast, slow)
            .unwrap()
            .generate_signals(&series(&closes))
            .unwrap();
        assert_eq!(sig.exit_count(), 0, "fast={fast} slow={slow}");
    }
}

#[test]
fn crossover_rejects_series_shorter_than_warmup() {
    let bars = series(&[1.0; 10]);
    let err = Strategy::crossover(20, 50)
        .unwrap()
        .generate_signals(&bars)
        .unwrap_err();
    assert!(matches!(err, BacktestError::InvalidInput(_)));
}

#[test]
fn crossover_rejects_zero_period() {
    assert!(matches!(
        Strategy::crossover(0, 5),
        Err(BacktestError::InvalidParameters(_))
    ));
}

#[test]
fn crossover_allows_fast_above_slow() {
    let s = Strategy::crossover(30, 10).unwrap();
    assert_eq!(s.name(), "MA_Crossover_30_10");
    assert_eq!(s.warmup_bars(), 30);
    let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i % 5) as f64).collect();
    assert_eq!(s.generate_signals(&series(&closes)).unwrap().len(), 40);
}

#[test]
fn momentum_alternating_closes() {
    let bars = series(&[10.0, 11.0, 10.0, 11.0, 10.0, 11.0]);
    let sig = Strategy::momentum().generate_signals(&bars).unwrap();
    assert_eq!(sig.entries, vec![false, true, false, true, false, true]);
    assert_eq!(sig.exits, vec![false, false, true, false, true, false]);
    assert_eq!(sig.source, "Simple_UpDown_Strategy");
}

#[test]
fn no_signal_is_both_entry_and_exit_for_deterministic_strategies() {
    let closes: Vec<f64> = (0..120)
        .map(|i| 100.0 + (i as f64 * 0.3).sin() * 8.0)
        .collect();
    let bars = series(&closes);
    for s in [Strategy::crossover(5, 15).unwrap(), Strategy::momentum()] {
        let sig = s.generate_signals(&bars).unwrap();
        assert!(
            sig.entries.iter().zip(&sig.exits).all(|(e, x)| !(*e && *x)),
            "{}",
            s.name()
        );
    }
}
