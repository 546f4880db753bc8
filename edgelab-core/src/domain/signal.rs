//! SignalPair: entry/exit flags aligned 1:1 with a bar series.

use serde::{Deserialize, Serialize};

use crate::error::{BacktestError, Result};

/// Per-bar tag attached to equity points by the vectorized engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalTag {
    Buy,
    Sell,
    Hold,
}

impl SignalTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalTag::Buy => "buy",
            SignalTag::Sell => "sell",
            SignalTag::Hold => "hold",
        }
    }
}

/// Entry and exit flags produced by one strategy for one bar series.
///
/// A flag at index `i` may only depend on bars `0..=i`. Strategies guarantee
/// this by construction; the simulators never look ahead either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalPair {
    pub entries: Vec<bool>,
    pub exits: Vec<bool>,
    /// Name of the strategy that produced the flags.
    pub source: String,
}

impl SignalPair {
    pub fn new(entries: Vec<bool>, exits: Vec<bool>, source: impl Into<String>) -> Result<Self> {
        if entries.len() != exits.len() {
            return Err(BacktestError::invalid_input(format!(
                "entries ({}) and exits ({}) differ in length",
                entries.len(),
                exits.len()
            )));
        }
        Ok(Self {
            entries,
            exits,
            source: source.into(),
        })
    }

    /// All-false pair of length `n`.
    pub fn empty(n: usize, source: impl Into<String>) -> Self {
        Self {
            entries: vec![false; n],
            exits: vec![false; n],
            source: source.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.iter().filter(|&&e| e).count()
    }

    pub fn exit_count(&self) -> usize {
        self.exits.iter().filter(|&&e| e).count()
    }

    /// True when the pair cannot produce a round trip on its own.
    pub fn lacks_round_trip(&self) -> bool {
        self.entry_count() == 0 || self.exit_count() == 0
    }

    /// Fail with `InvalidInput` unless the pair covers exactly `n` bars.
    pub fn ensure_aligned(&self, n: usize) -> Result<()> {
        if self.len() != n {
            return Err(BacktestError::invalid_input(format!(
                "signals cover {} bars but the series has {n}",
                self.len()
            )));
        }
        Ok(())
    }

    /// Raw tag at index `i`, before position state is considered.
    pub fn tag_at(&self, i: usize) -> SignalTag {
        match (self.entries[i], self.exits[i]) {
            (true, _) => SignalTag::Buy,
            (false, true) => SignalTag::Sell,
            (false, false) => SignalTag::Hold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_round_trip_detection() {
        let pair = SignalPair::new(
            vec![true, false, false, true],
            vec![false, false, false, false],
            "t",
        )
        .unwrap();
        assert_eq!(pair.entry_count(), 2);
        assert_eq!(pair.exit_count(), 0);
        assert!(pair.lacks_round_trip());
    }

    #[test]
    fn rejects_mismatched_lengths() {
        assert!(SignalPair::new(vec![true], vec![], "t").is_err());
    }

    #[test]
    fn alignment_check() {
        let pair = SignalPair::empty(3, "t");
        assert!(pair.ensure_aligned(3).is_ok());
        assert!(matches!(
            pair.ensure_aligned(4),
            Err(BacktestError::InvalidInput(_))
        ));
    }

    #[test]
    fn entry_wins_raw_tag() {
        let pair = SignalPair::new(vec![true, false, false], vec![true, true, false], "t").unwrap();
        assert_eq!(pair.tag_at(0), SignalTag::Buy);
        assert_eq!(pair.tag_at(1), SignalTag::Sell);
        assert_eq!(pair.tag_at(2), SignalTag::Hold);
    }

    #[test]
    fn tag_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&SignalTag::Buy).unwrap(), "\"buy\"");
        assert_eq!(SignalTag::Hold.as_str(), "hold");
    }
}
