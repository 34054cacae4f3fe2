use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
            Direction::Hold => write!(f, "HOLD"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalStrength {
    Weak,
    Medium,
    Strong,
}

impl SignalStrength {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 85.0 {
            SignalStrength::Strong
        } else if confidence >= 70.0 {
            SignalStrength::Medium
        } else {
            SignalStrength::Weak
        }
    }
}

impl fmt::Display for SignalStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdOutput {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

impl MacdOutput {
    pub fn neutral() -> Self {
        Self {
            line: 0.0,
            signal: 0.0,
            histogram: 0.0,
        }
    }
}

/// Where the latest close sits relative to the Bollinger bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandPosition {
    Upper,
    Middle,
    Lower,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerOutput {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    /// Band width collapsed below the configured threshold (volatility
    /// compression).
    pub squeeze: bool,
    pub position: BandPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StochasticOutput {
    pub k: f64,
    pub d: f64,
}

/// Full indicator state for one symbol, recomputed wholesale from the
/// current candle window each cycle, never incrementally patched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    /// Always within [0, 100].
    pub rsi: f64,
    pub macd: MacdOutput,
    pub bollinger: BollingerOutput,
    pub stochastic: StochasticOutput,
}

impl IndicatorSnapshot {
    /// Documented defaults when the candle window is too short for any
    /// meaningful computation.
    pub fn neutral() -> Self {
        Self {
            rsi: 50.0,
            macd: MacdOutput::neutral(),
            bollinger: BollingerOutput {
                upper: 0.0,
                middle: 0.0,
                lower: 0.0,
                squeeze: false,
                position: BandPosition::Middle,
            },
            stochastic: StochasticOutput { k: 50.0, d: 50.0 },
        }
    }
}

/// Composite trading signal for one symbol and one cycle.
///
/// Stateless per cycle: each generation fully supersedes the previous signal
/// for the symbol. Signals are never merged or mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub direction: Direction,
    /// Within [0, 100].
    pub confidence: f64,
    pub strength: SignalStrength,
    pub bullish_factors: Vec<String>,
    pub bearish_factors: Vec<String>,
    pub neutral_factors: Vec<String>,
    /// Epoch milliseconds.
    pub generated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strength_thresholds() {
        assert_eq!(SignalStrength::from_confidence(95.0), SignalStrength::Strong);
        assert_eq!(SignalStrength::from_confidence(85.0), SignalStrength::Strong);
        assert_eq!(SignalStrength::from_confidence(84.9), SignalStrength::Medium);
        assert_eq!(SignalStrength::from_confidence(70.0), SignalStrength::Medium);
        assert_eq!(SignalStrength::from_confidence(69.9), SignalStrength::Weak);
        assert_eq!(SignalStrength::from_confidence(0.0), SignalStrength::Weak);
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::Buy.to_string(), "BUY");
        assert_eq!(Direction::Sell.to_string(), "SELL");
        assert_eq!(Direction::Hold.to_string(), "HOLD");
    }
}
