//! BarFrequency: bar interval, used to annualize per-bar statistics.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BacktestError;

const SECONDS_PER_YEAR: f64 = 365.0 * 86_400.0;

/// Longest accepted bar interval: 100 years.
pub const MAX_FREQUENCY_SECONDS: u64 = 100 * 365 * 86_400;

/// Fixed bar interval, parsed from strings like `"1D"`, `"4h"`, `"15m"`, `"1W"`.
///
/// Annualization assumes a 24/7 calendar (365 days per year).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BarFrequency {
    seconds: u64,
}

impl BarFrequency {
    pub const DAILY: BarFrequency = BarFrequency { seconds: 86_400 };

    pub fn from_seconds(seconds: u64) -> Result<Self, BacktestError> {
        if seconds == 0 {
            return Err(BacktestError::invalid_params("bar frequency must be positive"));
        }
        if seconds > MAX_FREQUENCY_SECONDS {
            return Err(BacktestError::invalid_params(format!(
                "bar frequency of {seconds}s exceeds the {MAX_FREQUENCY_SECONDS}s limit"
            )));
        }
        Ok(Self { seconds })
    }

    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    pub fn periods_per_year(&self) -> f64 {
        SECONDS_PER_YEAR / self.seconds as f64
    }
}

impl Default for BarFrequency {
    fn default() -> Self {
        Self::DAILY
    }
}

impl FromStr for BarFrequency {
    type Err = BacktestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| BacktestError::invalid_params(format!("missing unit in '{s}'")))?;
        let (count, unit) = s.split_at(split);
        let count: u64 = if count.is_empty() {
            1
        } else {
            count
                .parse()
                .map_err(|_| BacktestError::invalid_params(format!("bad count in '{s}'")))?
        };
        let unit_seconds = match unit {
            "s" | "S" => 1,
            "m" | "min" | "T" => 60,
            "h" | "H" => 3_600,
            "d" | "D" => 86_400,
            "w" | "W" => 7 * 86_400,
            _ => {
                return Err(BacktestError::invalid_params(format!(
                    "unknown frequency unit '{unit}' in '{s}'"
                )))
            }
        };
        let seconds = count.checked_mul(unit_seconds).ok_or_else(|| {
            BacktestError::invalid_params(format!("frequency '{s}' is out of range"))
        })?;
        Self::from_seconds(seconds)
    }
}

impl fmt::Display for BarFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.seconds;
        if s % (7 * 86_400) == 0 {
            write!(f, "{}W", s / (7 * 86_400))
        } else if s % 86_400 == 0 {
            write!(f, "{}D", s / 86_400)
        } else if s % 3_600 == 0 {
            write!(f, "{}h", s / 3_600)
        } else if s % 60 == 0 {
            write!(f, "{}m", s / 60)
        } else {
            write!(f, "{s}s")
        }
    }
}

impl TryFrom<String> for BarFrequency {
    type Error = BacktestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BarFrequency> for String {
    fn from(value: BarFrequency) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_intervals() {
        assert_eq!("1D".parse::<BarFrequency>().unwrap().seconds(), 86_400);
        assert_eq!("4h".parse::<BarFrequency>().unwrap().seconds(), 14_400);
        assert_eq!("15m".parse::<BarFrequency>().unwrap().seconds(), 900);
        assert_eq!("1W".parse::<BarFrequency>().unwrap().seconds(), 604_800);
        assert_eq!("D".parse::<BarFrequency>().unwrap(), BarFrequency::DAILY);
    }

    #[test]
    fn daily_periods_per_year() {
        assert!((BarFrequency::DAILY.periods_per_year() - 365.0).abs() < 1e-12);
        let hourly: BarFrequency = "1h".parse().unwrap();
        assert!((hourly.periods_per_year() - 8760.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_garbage() {
        assert!("".parse::<BarFrequency>().is_err());
        assert!("12".parse::<BarFrequency>().is_err());
        assert!("3y".parse::<BarFrequency>().is_err());
        assert!("0D".parse::<BarFrequency>().is_err());
    }

    #[test]
    fn oversized_intervals_are_invalid_parameters() {
        for s in ["30500000000000000W", "18446744073709551615s", "101000000D", "99999999999999999999D"] {
            assert!(
                matches!(s.parse::<BarFrequency>(), Err(BacktestError::InvalidParameters(_))),
                "{s}"
            );
        }
        assert!(BarFrequency::from_seconds(MAX_FREQUENCY_SECONDS + 1).is_err());
        let longest = BarFrequency::from_seconds(MAX_FREQUENCY_SECONDS).unwrap();
        assert!(chrono::Duration::try_seconds(longest.seconds() as i64).is_some());
    }

    #[test]
    fn display_roundtrips_through_serde() {
        let f: BarFrequency = "4h".parse().unwrap();
        assert_eq!(f.to_string(), "4h");
        let json = serde_json::to_string(&f).unwrap();
        assert_eq!(json, "\"4h\"");
        let back: BarFrequency = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
    }
}
