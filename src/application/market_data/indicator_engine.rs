//! Windowed technical indicator computation.
//!
//! Every indicator is recomputed from the full candle window each cycle.
//! Nothing here carries state between cycles: a window rebuilt from scratch
//! (cold start, fallback re-seed) therefore can never blend stale EMA state
//! into a fresh series.

use crate::domain::market::types::Candle;
use crate::domain::trading::signal::{
    BandPosition, BollingerOutput, IndicatorSnapshot, MacdOutput, StochasticOutput,
};
use rust_decimal::prelude::ToPrimitive;
use statrs::statistics::Statistics;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub macd_fast_period: usize,
    pub macd_slow_period: usize,
    pub macd_signal_period: usize,
    pub bollinger_period: usize,
    pub bollinger_k: f64,
    /// Relative band width `(upper - lower) / middle` below which the bands
    /// count as squeezed.
    pub squeeze_threshold: f64,
    pub stochastic_period: usize,
    pub stochastic_smooth: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast_period: 12,
            macd_slow_period: 26,
            macd_signal_period: 9,
            bollinger_period: 20,
            bollinger_k: 2.0,
            squeeze_threshold: 0.04,
            stochastic_period: 14,
            stochastic_smooth: 3,
        }
    }
}

pub struct IndicatorEngine {
    config: IndicatorConfig,
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new(IndicatorConfig::default())
    }
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig) -> Self {
        Self { config }
    }

    /// Compute the full snapshot for one symbol's window. Deterministic and
    /// side-effect-free; short windows yield the documented neutral
    /// defaults instead of errors.
    pub fn compute(&self, window: &VecDeque<Candle>) -> IndicatorSnapshot {
        let closes: Vec<f64> = window.iter().filter_map(|c| c.close.to_f64()).collect();
        if closes.is_empty() {
            return IndicatorSnapshot::neutral();
        }
        let highs: Vec<f64> = window.iter().filter_map(|c| c.high.to_f64()).collect();
        let lows: Vec<f64> = window.iter().filter_map(|c| c.low.to_f64()).collect();

        IndicatorSnapshot {
            rsi: self.rsi(&closes),
            macd: self.macd(&closes),
            bollinger: self.bollinger(&closes),
            stochastic: self.stochastic(&highs, &lows, &closes),
        }
    }

    /// RSI over the trailing `rsi_period` deltas. Fewer than `period + 1`
    /// closes yields the neutral 50; a lossless window yields exactly 100.
    fn rsi(&self, closes: &[f64]) -> f64 {
        let period = self.config.rsi_period;
        if period == 0 || closes.len() < period + 1 {
            return 50.0;
        }

        let tail = &closes[closes.len() - (period + 1)..];
        let mut gain_sum = 0.0;
        let mut loss_sum = 0.0;
        for pair in tail.windows(2) {
            let delta = pair[1] - pair[0];
            if delta > 0.0 {
                gain_sum += delta;
            } else {
                loss_sum += -delta;
            }
        }

        let avg_gain = gain_sum / period as f64;
        let avg_loss = loss_sum / period as f64;

        if avg_loss == 0.0 {
            return 100.0;
        }

        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }

    /// MACD line, signal line and histogram. Windows shorter than the slow
    /// period return the zeroed neutral output.
    fn macd(&self, closes: &[f64]) -> MacdOutput {
        let fast = self.config.macd_fast_period;
        let slow = self.config.macd_slow_period;
        let signal_period = self.config.macd_signal_period;
        if closes.len() < slow || fast >= slow {
            return MacdOutput::neutral();
        }

        let fast_series = ema_series(closes, fast);
        let slow_series = ema_series(closes, slow);

        // Align both EMA series on the close index covered by the slow seed
        let offset = slow - fast;
        let macd_series: Vec<f64> = slow_series
            .iter()
            .enumerate()
            .map(|(i, s)| fast_series[i + offset] - s)
            .collect();

        let line = macd_series[macd_series.len() - 1];
        let signal = if macd_series.len() >= signal_period {
            let series = ema_series(&macd_series, signal_period);
            series[series.len() - 1]
        } else {
            // Too few MACD points for a seeded EMA; fall back to their mean
            macd_series.iter().sum::<f64>() / macd_series.len() as f64
        };

        MacdOutput {
            line,
            signal,
            histogram: line - signal,
        }
    }

    fn bollinger(&self, closes: &[f64]) -> BollingerOutput {
        let period = self.config.bollinger_period.min(closes.len()).max(1);
        let window = &closes[closes.len() - period..];

        let middle = window.mean();
        let stddev = window.population_std_dev();
        let upper = middle + self.config.bollinger_k * stddev;
        let lower = middle - self.config.bollinger_k * stddev;

        let last = closes[closes.len() - 1];
        let position = if last > upper {
            BandPosition::Upper
        } else if last < lower {
            BandPosition::Lower
        } else {
            BandPosition::Middle
        };

        let squeeze = middle > 0.0 && (upper - lower) / middle < self.config.squeeze_threshold;

        BollingerOutput {
            upper,
            middle,
            lower,
            squeeze,
            position,
        }
    }

    /// Stochastic oscillator: %K over the trailing lookback, %D as the
    /// moving average of the last `stochastic_smooth` %K values.
    fn stochastic(&self, highs: &[f64], lows: &[f64], closes: &[f64]) -> StochasticOutput {
        let period = self.config.stochastic_period;
        let smooth = self.config.stochastic_smooth.max(1);
        let n = closes.len().min(highs.len()).min(lows.len());
        if period == 0 || n < period {
            return StochasticOutput { k: 50.0, d: 50.0 };
        }

        let first_end = n.saturating_sub(smooth).max(period - 1);
        let mut k_series = Vec::with_capacity(smooth);
        for end in first_end..n {
            let start = end + 1 - period;
            let highest = highs[start..=end].iter().copied().fold(f64::MIN, f64::max);
            let lowest = lows[start..=end].iter().copied().fold(f64::MAX, f64::min);
            let range = highest - lowest;
            let k = if range <= 0.0 {
                // Flat window: close sits mid-range by definition
                50.0
            } else {
                100.0 * (closes[end] - lowest) / range
            };
            k_series.push(k);
        }

        let k = k_series[k_series.len() - 1];
        let d = k_series.iter().sum::<f64>() / k_series.len() as f64;
        StochasticOutput { k, d }
    }
}

/// EMA series seeded with the simple average of the first `period` values,
/// then the recurrence `ema = price * k + ema * (1 - k)` with
/// `k = 2 / (period + 1)`. Element 0 corresponds to input index
/// `period - 1`.
fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut series = Vec::with_capacity(values.len() - period + 1);
    series.push(seed);
    let mut ema = seed;
    for &value in &values[period..] {
        ema = value * k + ema * (1.0 - k);
        series.push(ema);
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn window_from_closes(closes: &[f64]) -> VecDeque<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let close = Decimal::from_f64_retain(c).unwrap();
                Candle {
                    symbol: "BTCUSDT".to_string(),
                    open: close,
                    high: close + dec!(0.5),
                    low: close - dec!(0.5),
                    close,
                    volume: dec!(1),
                    timestamp: i as i64 * 60_000,
                }
            })
            .collect()
    }

    #[test]
    fn test_rsi_all_gains_is_100() {
        let engine = IndicatorEngine::default();
        let closes: Vec<f64> = (1..=30).map(|i| i as f64).collect();
        let snapshot = engine.compute(&window_from_closes(&closes));
        assert_eq!(snapshot.rsi, 100.0);
    }

    #[test]
    fn test_rsi_all_losses_is_0() {
        let engine = IndicatorEngine::default();
        let closes: Vec<f64> = (1..=30).rev().map(|i| i as f64).collect();
        let snapshot = engine.compute(&window_from_closes(&closes));
        assert_eq!(snapshot.rsi, 0.0);
    }

    #[test]
    fn test_rsi_short_window_is_neutral_50() {
        let engine = IndicatorEngine::default();
        // 14 closes = 13 deltas, one short of the required 14
        let closes: Vec<f64> = (1..=14).map(|i| i as f64).collect();
        let snapshot = engine.compute(&window_from_closes(&closes));
        assert_eq!(snapshot.rsi, 50.0);
    }

    #[test]
    fn test_rsi_mixed_series_within_bounds() {
        let engine = IndicatorEngine::default();
        let closes: Vec<f64> = (0..40)
            .map(|i| {
                let swing = if i % 3 == 0 { -1.5 } else { 1.0 };
                100.0 + swing * (i % 7) as f64
            })
            .collect();
        let snapshot = engine.compute(&window_from_closes(&closes));
        assert!(snapshot.rsi > 0.0 && snapshot.rsi < 100.0);
    }

    #[test]
    fn test_macd_histogram_sign_tracks_trend() {
        let engine = IndicatorEngine::default();

        let rising: Vec<f64> = (1..=60).map(|i| 100.0 + i as f64).collect();
        let snapshot = engine.compute(&window_from_closes(&rising));
        assert!(snapshot.macd.line > 0.0, "fast EMA above slow EMA in an uptrend");
        assert!(snapshot.macd.histogram > 0.0);

        let falling: Vec<f64> = (1..=60).map(|i| 200.0 - i as f64).collect();
        let snapshot = engine.compute(&window_from_closes(&falling));
        assert!(snapshot.macd.line < 0.0, "fast EMA below slow EMA in a downtrend");
        assert!(snapshot.macd.histogram < 0.0);
    }

    #[test]
    fn test_macd_short_window_is_neutral() {
        let engine = IndicatorEngine::default();
        let closes: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let snapshot = engine.compute(&window_from_closes(&closes));
        assert_eq!(snapshot.macd, MacdOutput::neutral());
    }

    #[test]
    fn test_ema_seed_is_simple_average() {
        let series = ema_series(&[2.0, 4.0, 6.0], 3);
        assert_eq!(series, vec![4.0]);

        // Next value folds in with k = 2/(3+1) = 0.5
        let series = ema_series(&[2.0, 4.0, 6.0, 8.0], 3);
        assert_eq!(series, vec![4.0, 6.0]);
    }

    #[test]
    fn test_bollinger_flat_series_squeezes() {
        let engine = IndicatorEngine::default();
        let closes = vec![100.0; 30];
        let snapshot = engine.compute(&window_from_closes(&closes));
        assert!(snapshot.bollinger.squeeze);
        assert_eq!(snapshot.bollinger.position, BandPosition::Middle);
        assert!((snapshot.bollinger.middle - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_bollinger_breakout_classified_upper() {
        let engine = IndicatorEngine::default();
        let mut closes = vec![100.0; 29];
        closes.push(130.0);
        let snapshot = engine.compute(&window_from_closes(&closes));
        assert_eq!(snapshot.bollinger.position, BandPosition::Upper);
        assert!(!snapshot.bollinger.squeeze);
    }

    #[test]
    fn test_stochastic_top_of_range() {
        let engine = IndicatorEngine::default();
        let closes: Vec<f64> = (1..=30).map(|i| i as f64).collect();
        let snapshot = engine.compute(&window_from_closes(&closes));
        // Close of the last candle is at the top of its lookback range save
        // for the +0.5 high margin
        assert!(snapshot.stochastic.k > 90.0);
        assert!(snapshot.stochastic.d > 90.0);
    }

    #[test]
    fn test_stochastic_short_window_is_neutral() {
        let engine = IndicatorEngine::default();
        let closes: Vec<f64> = (1..=5).map(|i| i as f64).collect();
        let snapshot = engine.compute(&window_from_closes(&closes));
        assert_eq!(snapshot.stochastic.k, 50.0);
        assert_eq!(snapshot.stochastic.d, 50.0);
    }

    #[test]
    fn test_recompute_is_deterministic() {
        let engine = IndicatorEngine::default();
        let closes: Vec<f64> = (0..80)
            .map(|i| 1000.0 + 25.0 * ((i as f64) * 0.37).sin() + (i % 5) as f64)
            .collect();
        let window = window_from_closes(&closes);

        let first = engine.compute(&window);
        let second = IndicatorEngine::default().compute(&window);
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_window_is_fully_neutral() {
        let engine = IndicatorEngine::default();
        let snapshot = engine.compute(&VecDeque::new());
        assert_eq!(snapshot, IndicatorSnapshot::neutral());
    }
}
