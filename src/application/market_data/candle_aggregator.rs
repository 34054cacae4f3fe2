use crate::domain::market::types::{Candle, Tick};
use chrono::{DateTime, TimeZone, Timelike, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tracing::{debug, error, info};

/// Maximum allowed deviation from the current close price (as a ratio).
/// Ticks deviating more than this from the last known price are rejected as
/// outliers. 1.5% is generous enough for volatile crypto while filtering bad
/// mid-prices.
const MAX_PRICE_DEVIATION_PCT: Decimal = dec!(0.015);

#[derive(Debug)]
struct CandleBuilder {
    symbol: String,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    start_time: DateTime<Utc>,
    tick_count: u32,
}

impl CandleBuilder {
    fn new(symbol: String, price: Decimal, timestamp: DateTime<Utc>) -> Self {
        // Normalize start time to the beginning of the minute
        let start_time = timestamp
            .date_naive()
            .and_hms_opt(timestamp.hour(), timestamp.minute(), 0)
            .expect("valid hour/minute always produces a valid time")
            .and_utc();

        Self {
            symbol,
            open: price,
            high: price,
            low: price,
            close: price,
            start_time,
            tick_count: 0,
        }
    }

    /// Check whether a price is an outlier relative to the current close.
    fn is_outlier(&self, price: Decimal) -> bool {
        // Not enough data for filtering during the first few ticks
        if self.tick_count < 3 {
            return false;
        }
        if self.close <= Decimal::ZERO {
            return false;
        }
        let deviation = ((price - self.close) / self.close).abs();
        deviation > MAX_PRICE_DEVIATION_PCT
    }

    fn update(&mut self, price: Decimal) {
        self.tick_count += 1;
        if price > self.high {
            self.high = price;
        }
        if price < self.low {
            self.low = price;
        }
        self.close = price;
    }

    fn build(&self) -> Candle {
        Candle {
            symbol: self.symbol.clone(),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            // The ticker stream carries no per-trade size; live-aggregated
            // candles report zero volume while REST-seeded history keeps the
            // exchange-reported figures.
            volume: Decimal::ZERO,
            timestamp: self.start_time.timestamp_millis(),
        }
    }
}

/// Aggregates live ticks into minute OHLC candles, one in-progress builder
/// per symbol.
pub struct CandleAggregator {
    builders: HashMap<String, CandleBuilder>,
    /// Last confirmed close per symbol, for cross-candle outlier filtering.
    last_close: HashMap<String, Decimal>,
}

impl Default for CandleAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl CandleAggregator {
    pub fn new() -> Self {
        Self {
            builders: HashMap::new(),
            last_close: HashMap::new(),
        }
    }

    fn is_price_outlier(&self, symbol: &str, price: Decimal) -> bool {
        if let Some(builder) = self.builders.get(symbol)
            && builder.is_outlier(price)
        {
            return true;
        }

        // Cross-candle protection against a bad first tick of a fresh minute
        if let Some(last) = self.last_close.get(symbol)
            && *last > Decimal::ZERO
        {
            let deviation = ((price - last) / last).abs();
            if deviation > MAX_PRICE_DEVIATION_PCT {
                return true;
            }
        }

        false
    }

    /// Fold one tick into the in-progress candle. Returns `Some(Candle)`
    /// when the tick opens a new minute and thereby completes the previous
    /// candle.
    pub fn on_tick(&mut self, tick: &Tick) -> Option<Candle> {
        let timestamp = match Utc.timestamp_millis_opt(tick.timestamp).single() {
            Some(t) => t,
            None => {
                error!(
                    "CandleAggregator: invalid timestamp {} for {}",
                    tick.timestamp, tick.symbol
                );
                return None;
            }
        };

        if self.is_price_outlier(&tick.symbol, tick.price) {
            debug!(
                "CandleAggregator: {} outlier rejected: {} (last close: {})",
                tick.symbol,
                tick.price,
                self.last_close
                    .get(&tick.symbol)
                    .copied()
                    .unwrap_or(Decimal::ZERO)
            );
            return None;
        }

        let current_minute = timestamp
            .date_naive()
            .and_hms_opt(timestamp.hour(), timestamp.minute(), 0)
            .expect("valid hour/minute always produces a valid time")
            .and_utc();

        if let Some(builder) = self.builders.get_mut(&tick.symbol) {
            if builder.start_time == current_minute {
                builder.update(tick.price);
                None
            } else {
                // New minute: finalize the old candle and start a new one
                let completed = builder.build();

                info!(
                    "CandleAggregator: {} candle completed → O:{} H:{} L:{} C:{}",
                    tick.symbol, completed.open, completed.high, completed.low, completed.close
                );

                self.last_close
                    .insert(tick.symbol.clone(), completed.close);

                *builder = CandleBuilder::new(tick.symbol.clone(), tick.price, timestamp);
                builder.update(tick.price);

                Some(completed)
            }
        } else {
            info!(
                "CandleAggregator: {} - first tick @ {}, starting aggregation",
                tick.symbol, tick.price
            );
            let mut builder = CandleBuilder::new(tick.symbol.clone(), tick.price, timestamp);
            builder.update(tick.price);
            self.builders.insert(tick.symbol.clone(), builder);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tick(symbol: &str, price: Decimal, timestamp: i64) -> Tick {
        Tick {
            symbol: symbol.to_string(),
            price,
            pct_change: Decimal::ZERO,
            timestamp,
        }
    }

    fn ts(h: u32, m: u32, s: u32) -> i64 {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, s)
            .unwrap()
            .timestamp_millis()
    }

    #[test]
    fn test_minute_rollover_completes_candle() {
        let mut agg = CandleAggregator::new();

        assert!(agg.on_tick(&tick("BTCUSDT", dec!(68000), ts(0, 0, 1))).is_none());
        assert!(agg.on_tick(&tick("BTCUSDT", dec!(68150), ts(0, 0, 30))).is_none());
        assert!(agg.on_tick(&tick("BTCUSDT", dec!(68100), ts(0, 0, 45))).is_none());
        assert!(agg.on_tick(&tick("BTCUSDT", dec!(67900), ts(0, 0, 59))).is_none());

        // New minute completes the previous candle
        let candle = agg
            .on_tick(&tick("BTCUSDT", dec!(67950), ts(0, 1, 5)))
            .expect("rollover should complete the candle");

        assert_eq!(candle.open, dec!(68000));
        assert_eq!(candle.high, dec!(68150));
        assert_eq!(candle.low, dec!(67900));
        assert_eq!(candle.close, dec!(67900));
        assert_eq!(candle.timestamp, ts(0, 0, 0));
    }

    #[test]
    fn test_outlier_rejected_within_candle() {
        let mut agg = CandleAggregator::new();

        agg.on_tick(&tick("BTCUSDT", dec!(68000), ts(0, 0, 1)));
        agg.on_tick(&tick("BTCUSDT", dec!(68050), ts(0, 0, 5)));
        agg.on_tick(&tick("BTCUSDT", dec!(68020), ts(0, 0, 10)));
        agg.on_tick(&tick("BTCUSDT", dec!(68030), ts(0, 0, 15)));

        // 68030 * 1.015 = 69050.45, so 69500 is well above threshold
        let result = agg.on_tick(&tick("BTCUSDT", dec!(69500), ts(0, 0, 20)));
        assert!(result.is_none(), "outlier should be silently rejected");

        // The outlier must not have corrupted the candle
        let candle = agg
            .on_tick(&tick("BTCUSDT", dec!(68040), ts(0, 1, 1)))
            .unwrap();
        assert_eq!(candle.high, dec!(68050));
        assert_eq!(candle.low, dec!(68000));
        assert_eq!(candle.close, dec!(68030));
    }

    #[test]
    fn test_outlier_rejected_cross_candle() {
        let mut agg = CandleAggregator::new();

        agg.on_tick(&tick("ETHUSDT", dec!(3500), ts(0, 0, 1)));
        agg.on_tick(&tick("ETHUSDT", dec!(3510), ts(0, 0, 10)));
        agg.on_tick(&tick("ETHUSDT", dec!(3505), ts(0, 0, 20)));
        agg.on_tick(&tick("ETHUSDT", dec!(3502), ts(0, 0, 30)));

        let candle1 = agg.on_tick(&tick("ETHUSDT", dec!(3503), ts(0, 1, 1)));
        assert_eq!(candle1.unwrap().close, dec!(3502));

        // 3502 * 1.015 = 3554.53, so 3600 is an outlier for the new candle
        let result = agg.on_tick(&tick("ETHUSDT", dec!(3600), ts(0, 1, 5)));
        assert!(result.is_none(), "cross-candle outlier should be rejected");

        // A normal tick still lands in the same minute
        let result = agg.on_tick(&tick("ETHUSDT", dec!(3508), ts(0, 1, 10)));
        assert!(result.is_none());
    }

    #[test]
    fn test_normal_variation_not_rejected() {
        let mut agg = CandleAggregator::new();
        let prices = [
            dec!(68000),
            dec!(68050),
            dec!(68100),
            dec!(67980),
            dec!(68020),
            dec!(68150),
            dec!(67950),
        ];
        for (i, price) in prices.iter().enumerate() {
            let result = agg.on_tick(&tick("BTCUSDT", *price, ts(0, 0, 1) + i as i64 * 3000));
            assert!(result.is_none(), "normal price {} should not be rejected", price);
        }
    }
}
