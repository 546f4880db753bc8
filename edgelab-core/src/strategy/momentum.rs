//! Up/down momentum: the fallback strategy when another strategy never trades.

use crate::domain::{BarSeries, SignalPair};
use crate::error::Result;

use super::SignalGenerator;

pub const UP_DOWN_NAME: &str = "Simple_UpDown_Strategy";

/// Enter on the first up-close after a bar that wasn't up; exit on the first
/// down-close after a bar that wasn't down. Bar 0 has no direction and never
/// emits.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpDownMomentum;

impl SignalGenerator for UpDownMomentum {
    fn name(&self) -> &str {
        UP_DOWN_NAME
    }

    fn warmup_bars(&self) -> usize {
        1
    }

    fn generate_signals(&self, bars: &BarSeries) -> Result<SignalPair> {
        let bars = bars.bars();
        let n = bars.len();
        let mut signals = SignalPair::empty(n, UP_DOWN_NAME);

        let mut prev_up = false;
        let mut prev_down = false;
        for i in 1..n {
            let up = bars[i].is_up_from(&bars[i - 1]);
            let down = bars[i].is_down_from(&bars[i - 1]);
            signals.entries[i] = up && !prev_up;
            signals.exits[i] = down && !prev_down;
            prev_up = up;
            prev_down = down;
        }
        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::series_from_closes;

    #[test]
    fn first_up_after_flat_or_down() {
        let bars = series_from_closes(&[10.0, 11.0, 12.0, 11.0, 11.0, 12.0, 10.0, 9.0]);
        let sig = UpDownMomentum.generate_signals(&bars).unwrap();
        assert_eq!(
            sig.entries,
            vec![false, true, false, false, false, true, false, false]
        );
        assert_eq!(
            sig.exits,
            vec![false, false, false, true, false, false, true, false]
        );
    }

    #[test]
    fn single_bar_emits_nothing() {
        let bars = series_from_closes(&[10.0]);
        let sig = UpDownMomentum.generate_signals(&bars).unwrap();
        assert_eq!(sig.len(), 1);
        assert_eq!(sig.entry_count() + sig.exit_count(), 0);
    }

    #[test]
    fn constant_series_never_signals() {
        let bars = series_from_closes(&[5.0; 12]);
        let sig = UpDownMomentum.generate_signals(&bars).unwrap();
        assert!(sig.lacks_round_trip());
        assert_eq!(sig.entry_count(), 0);
    }
}
