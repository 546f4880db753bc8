//! Property tests for the runner layer.
//!
//! 1. Synthetic bars: always a valid series of the requested length
//! 2. Synthetic determinism: same seed and symbol, same bars
//! 3. CSV persistence: writing and re-reading preserves every bar
//! 4. Run ids: stable across a TOML round trip, distinct per crossover pair

use edgelab_runner::{read_bars_csv, write_bars_csv, BacktestConfig, SyntheticBars, SyntheticConfig};
use proptest::prelude::*;

fn synthetic(seed: u64, n_bars: usize, volatility: f64, flip: f64) -> SyntheticBars {
    SyntheticBars::new(SyntheticConfig {
        seed,
        n_bars,
        volatility,
        regime_flip_prob: flip,
        ..SyntheticConfig::default()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn synthetic_series_is_valid(
        seed in any::<u64>(),
        n in 1usize..400,
        vol in 0.0..0.1_f64,
        flip in 0.0..=1.0_f64,
    ) {
        let series = synthetic(seed, n, vol, flip).generate("PROP").unwrap();
        prop_assert_eq!(series.len(), n);
        for bar in series.bars() {
            prop_assert!(bar.is_valid());
            prop_assert!(bar.low <= bar.open.min(bar.close));
            prop_assert!(bar.high >= bar.open.max(bar.close));
        }
    }

    #[test]
    fn synthetic_is_deterministic(seed in any::<u64>(), n in 1usize..100) {
        let a = synthetic(seed, n, 0.02, 0.05).generate("DET").unwrap();
        let b = synthetic(seed, n, 0.02, 0.05).generate("DET").unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn csv_round_trip_preserves_bars(seed in any::<u64>(), n in 1usize..60) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bars.csv");
        let series = synthetic(seed, n, 0.03, 0.1).generate("CSV").unwrap();
        write_bars_csv(&path, &series).unwrap();
        let back = read_bars_csv(std::fs::File::open(&path).unwrap()).unwrap();
        prop_assert_eq!(back, series);
    }

    #[test]
    fn run_id_stable_across_toml(fast in 1usize..50, extra in 1usize..100) {
        let slow = fast + extra;
        let config = BacktestConfig::from_toml_str("").unwrap().with_crossover(fast, slow);
        let text = config.to_toml_string().unwrap();
        let back = BacktestConfig::from_toml_str(&text).unwrap();
        prop_assert_eq!(back.run_id().unwrap(), config.run_id().unwrap());
        prop_assert_ne!(
            config.run_id().unwrap(),
            config.with_crossover(fast, slow + 1).run_id().unwrap()
        );
    }
}
